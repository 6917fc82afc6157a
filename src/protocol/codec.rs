//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol.
//!
//! Every variable-length field is a single length byte followed by exactly
//! that many raw bytes. There is no escaping, and no field can exceed
//! [`MAX_FIELD_LEN`] bytes.

use std::io::{self, Read, Write};

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{KvdbError, Result};
use super::{Command, ErrorCode, Frame, Opcode, Response};

/// Largest key, value or message that fits a one-byte length prefix
pub const MAX_FIELD_LEN: usize = u8::MAX as usize;

// =============================================================================
// Command Encoding/Decoding
// =============================================================================

/// Encode a command to bytes
///
/// Field lengths are checked before any buffer is allocated.
pub fn encode_command(command: &Command) -> Result<Bytes> {
    let key = command.key();
    if key.len() > MAX_FIELD_LEN {
        return Err(KvdbError::KeyTooLong { len: key.len() });
    }

    let value = match command {
        Command::Set { value, .. } => {
            if value.len() > MAX_FIELD_LEN {
                return Err(KvdbError::ValueTooLong { len: value.len() });
            }
            Some(value.as_slice())
        }
        _ => None,
    };

    let capacity = 2 + key.len() + value.map_or(0, |v| 1 + v.len());
    let mut frame = BytesMut::with_capacity(capacity);
    frame.put_u8(command.opcode() as u8);
    put_field(&mut frame, key);
    if let Some(value) = value {
        put_field(&mut frame, value);
    }

    Ok(frame.freeze())
}

/// Decode exactly one frame from a byte slice
///
/// Unknown opcodes are not an error here; they come back as
/// [`Frame::Unknown`] for the caller to answer.
pub fn decode_frame(bytes: &[u8]) -> Result<Frame> {
    let mut reader = bytes;
    let frame = read_frame(&mut reader)?
        .ok_or_else(|| KvdbError::Protocol("empty frame".to_string()))?;

    if !reader.is_empty() {
        return Err(KvdbError::Protocol(format!(
            "{} trailing bytes after frame",
            reader.len()
        )));
    }

    Ok(frame)
}

// =============================================================================
// Response Encoding/Decoding
// =============================================================================

/// Encode a response to bytes
///
/// Format: error_code (1) [+ msg_len (1) + msg]
pub fn encode_response(response: &Response) -> Result<Bytes> {
    let code = response.error_code as u8;

    match &response.message {
        None => Ok(Bytes::copy_from_slice(&[code])),
        Some(message) => {
            if message.len() > MAX_FIELD_LEN {
                return Err(KvdbError::MessageTooLong { len: message.len() });
            }
            let mut frame = BytesMut::with_capacity(2 + message.len());
            frame.put_u8(code);
            put_field(&mut frame, message);
            Ok(frame.freeze())
        }
    }
}

/// Decode a response from bytes
///
/// A single byte is a bare error code; anything longer must be a complete
/// length-prefixed message.
pub fn decode_response(bytes: &[u8]) -> Result<Response> {
    let (&code_byte, rest) = bytes
        .split_first()
        .ok_or_else(|| KvdbError::Protocol("empty response".to_string()))?;
    let error_code = parse_error_code(code_byte)?;

    if rest.is_empty() {
        return Ok(Response::code(error_code));
    }

    let msg_len = rest[0] as usize;
    let body = &rest[1..];
    if body.len() < msg_len {
        return Err(KvdbError::Protocol(format!(
            "Incomplete response message: expected {} bytes, got {}",
            msg_len,
            body.len()
        )));
    }
    if body.len() > msg_len {
        return Err(KvdbError::Protocol(format!(
            "{} trailing bytes after response",
            body.len() - msg_len
        )));
    }

    Ok(Response {
        error_code,
        message: Some(body.to_vec()),
    })
}

fn parse_error_code(byte: u8) -> Result<ErrorCode> {
    ErrorCode::try_from(byte).map_err(|code| {
        KvdbError::Protocol(format!("Unknown response error code: 0x{:02x}", code))
    })
}

fn put_field(buf: &mut BytesMut, field: &[u8]) {
    buf.put_u8(field.len() as u8);
    buf.put_slice(field);
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read one opcode byte
///
/// Returns `None` when the stream ends cleanly before a new frame starts.
pub fn read_opcode<R: Read>(reader: &mut R) -> Result<Option<u8>> {
    let mut byte = [0u8; 1];
    loop {
        match reader.read(&mut byte) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(byte[0])),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

/// Read one length-prefixed field
///
/// End-of-stream anywhere inside the field is a protocol error.
pub fn read_field<R: Read>(reader: &mut R) -> Result<Vec<u8>> {
    let mut len = [0u8; 1];
    reader
        .read_exact(&mut len)
        .map_err(|e| truncated(e, "length prefix"))?;

    let mut field = vec![0u8; len[0] as usize];
    reader
        .read_exact(&mut field)
        .map_err(|e| truncated(e, "field bytes"))?;

    Ok(field)
}

/// Read a complete frame from a stream
///
/// Blocks until a complete frame is received, the stream ends before an
/// opcode (`Ok(None)`), or an error occurs.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Option<Frame>> {
    let opcode = match read_opcode(reader)? {
        Some(opcode) => opcode,
        None => return Ok(None),
    };

    let key = read_field(reader)?;
    let frame = match Opcode::try_from(opcode) {
        Ok(Opcode::Get) => Frame::Command(Command::Get { key }),
        Ok(Opcode::Set) => {
            let value = read_field(reader)?;
            Frame::Command(Command::Set { key, value })
        }
        Ok(Opcode::Delete) => Frame::Command(Command::Delete { key }),
        Err(opcode) => Frame::Unknown { opcode, key },
    };

    Ok(Some(frame))
}

/// Write a command to a stream
pub fn write_command<W: Write>(writer: &mut W, command: &Command) -> Result<()> {
    let bytes = encode_command(command)?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

/// Read the response to a command with the given opcode
///
/// Only a `NO_ERROR` reply to a GET carries a message, so the opcode decides
/// whether a message field follows the error code.
pub fn read_response<R: Read>(reader: &mut R, opcode: Opcode) -> Result<Response> {
    let mut code = [0u8; 1];
    reader
        .read_exact(&mut code)
        .map_err(|e| truncated(e, "response error code"))?;
    let error_code = parse_error_code(code[0])?;

    let message = if error_code == ErrorCode::NoError && opcode == Opcode::Get {
        Some(read_field(reader)?)
    } else {
        None
    };

    Ok(Response {
        error_code,
        message,
    })
}

/// Write a response to a stream
pub fn write_response<W: Write>(writer: &mut W, response: &Response) -> Result<()> {
    let bytes = encode_response(response)?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

fn truncated(err: io::Error, what: &str) -> KvdbError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        KvdbError::Protocol(format!("stream ended while reading {}", what))
    } else {
        KvdbError::Io(err)
    }
}
