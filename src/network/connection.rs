//! Connection Handler
//!
//! Handles individual client connections.
//!
//! ## State Machine
//! ```text
//!            ┌────────────────────────────────────────────────┐
//!            ▼                                                │
//!   AwaitingOpcode ──► ReadingKey ──► Dispatching ──► Responding
//!        │                 │  ▲            ▲
//!        │                 │  └ SET only ┐ │
//!        │                 ▼             │ │
//!        │            ReadingValue ──────┘─┘
//!        ▼
//!      Closed   (end of stream, or any error while reading a frame)
//! ```
//!
//! End of stream before an opcode is a clean close. A failure part-way
//! through a frame closes the connection without a response: the stream is
//! out of sync and cannot be resumed mid-frame.

use std::io::{BufReader, BufWriter, Read, Write};
use std::net::TcpStream;
use std::sync::Arc;

use crate::engine::Engine;
use crate::error::{KvdbError, Result};
use crate::protocol::{
    read_field, read_opcode, write_response, Command, Frame, Opcode, Response,
};
use crate::storage::{MemoryStorage, StorageBackend};
use crate::wal::{TextWal, WriteAheadLog};

/// Where a connection is in its command loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Waiting for the first byte of the next frame
    AwaitingOpcode,

    /// Opcode read, key field next
    ReadingKey { opcode: u8 },

    /// SET key read, value field next
    ReadingValue { key: Vec<u8> },

    /// Complete frame in hand
    Dispatching(Frame),

    /// Response ready to send
    Responding(Response),

    /// Terminal
    Closed,
}

/// Handles a single client connection
pub struct Connection<R, W, S = MemoryStorage, L = TextWal> {
    reader: R,

    writer: W,

    /// Reference to the shared engine
    engine: Arc<Engine<S, L>>,

    /// Peer address for logging
    peer_addr: String,

    state: ConnectionState,

    /// Responses sent so far
    commands_handled: u64,
}

impl<S, L> Connection<BufReader<TcpStream>, BufWriter<TcpStream>, S, L>
where
    S: StorageBackend,
    L: WriteAheadLog,
{
    /// Create a connection handler over a TCP stream
    ///
    /// Sets up buffered I/O on separate read/write handles.
    pub fn from_tcp(stream: TcpStream, engine: Arc<Engine<S, L>>) -> Result<Self> {
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        // Disable Nagle's algorithm for low latency
        stream.set_nodelay(true)?;

        let read_stream = stream.try_clone()?;
        let write_stream = stream;

        Ok(Self::new(
            BufReader::new(read_stream),
            BufWriter::new(write_stream),
            engine,
            peer_addr,
        ))
    }
}

impl<R, W, S, L> Connection<R, W, S, L>
where
    R: Read,
    W: Write,
    S: StorageBackend,
    L: WriteAheadLog,
{
    pub fn new(reader: R, writer: W, engine: Arc<Engine<S, L>>, peer_addr: impl Into<String>) -> Self {
        Self {
            reader,
            writer,
            engine,
            peer_addr: peer_addr.into(),
            state: ConnectionState::AwaitingOpcode,
            commands_handled: 0,
        }
    }

    /// Handle the connection (blocking until closed)
    ///
    /// Returns `Ok` when the client disconnects between frames, `Err` when
    /// the connection had to be dropped.
    pub fn handle(&mut self) -> Result<()> {
        tracing::debug!("Connection established from {}", self.peer_addr);

        while self.state != ConnectionState::Closed {
            self.step()?;
        }

        tracing::debug!(
            "Connection {} closed after {} commands",
            self.peer_addr,
            self.commands_handled
        );
        Ok(())
    }

    /// Advance the state machine by one transition
    ///
    /// On error the connection is left `Closed`.
    pub fn step(&mut self) -> Result<()> {
        let state = std::mem::replace(&mut self.state, ConnectionState::Closed);

        self.state = match state {
            ConnectionState::AwaitingOpcode => match read_opcode(&mut self.reader) {
                Ok(Some(opcode)) => ConnectionState::ReadingKey { opcode },
                Ok(None) => {
                    tracing::debug!("Client {} disconnected", self.peer_addr);
                    ConnectionState::Closed
                }
                Err(e) if e.is_disconnect() => {
                    tracing::debug!("Connection reset by client {}: {}", self.peer_addr, e);
                    ConnectionState::Closed
                }
                Err(e) => {
                    tracing::warn!("Error reading from {}: {}", self.peer_addr, e);
                    return Err(e);
                }
            },

            ConnectionState::ReadingKey { opcode } => {
                let key = self.read_frame_field("key")?;
                match Opcode::try_from(opcode) {
                    Ok(Opcode::Set) => ConnectionState::ReadingValue { key },
                    Ok(Opcode::Get) => ConnectionState::Dispatching(Frame::Command(Command::Get { key })),
                    Ok(Opcode::Delete) => {
                        ConnectionState::Dispatching(Frame::Command(Command::Delete { key }))
                    }
                    Err(opcode) => ConnectionState::Dispatching(Frame::Unknown { opcode, key }),
                }
            }

            ConnectionState::ReadingValue { key } => {
                let value = self.read_frame_field("value")?;
                ConnectionState::Dispatching(Frame::Command(Command::Set { key, value }))
            }

            ConnectionState::Dispatching(frame) => ConnectionState::Responding(self.dispatch(frame)),

            ConnectionState::Responding(response) => match self.send_response(&response) {
                Ok(()) => {
                    self.commands_handled += 1;
                    ConnectionState::AwaitingOpcode
                }
                Err(e) if e.is_disconnect() => {
                    // Client left before the response could be sent
                    tracing::debug!(
                        "Client {} disconnected before response could be sent: {}",
                        self.peer_addr,
                        e
                    );
                    ConnectionState::Closed
                }
                Err(e) => {
                    tracing::warn!("Error writing to {}: {}", self.peer_addr, e);
                    return Err(e);
                }
            },

            ConnectionState::Closed => ConnectionState::Closed,
        };

        Ok(())
    }

    /// Apply a decoded frame and build its response
    fn dispatch(&self, frame: Frame) -> Response {
        let command = match frame {
            Frame::Command(command) => command,
            Frame::Unknown { opcode, .. } => {
                tracing::debug!("Unknown opcode 0x{:02x} from {}", opcode, self.peer_addr);
                return Response::unknown_command();
            }
        };

        tracing::trace!("Received command from {}: {:?}", self.peer_addr, command);

        match self.engine.execute(&command) {
            Ok(value) => Response::ok(value),
            Err(KvdbError::KeyNotFound) => Response::server_error(),
            Err(e) => {
                tracing::warn!(
                    "{:?} from {} failed: {}",
                    command.opcode(),
                    self.peer_addr,
                    e
                );
                Response::server_error()
            }
        }
    }

    fn read_frame_field(&mut self, name: &str) -> Result<Vec<u8>> {
        read_field(&mut self.reader).map_err(|e| {
            tracing::warn!(
                "Dropping {}: failed to read {} field: {}",
                self.peer_addr,
                name,
                e
            );
            e
        })
    }

    /// Send a response to the client
    ///
    /// A value too long for the wire is reported as SERVER_ERROR instead.
    fn send_response(&mut self, response: &Response) -> Result<()> {
        match write_response(&mut self.writer, response) {
            Err(KvdbError::MessageTooLong { len }) => {
                tracing::warn!(
                    "Value of {} bytes for {} does not fit a response",
                    len,
                    self.peer_addr
                );
                write_response(&mut self.writer, &Response::server_error())
            }
            other => other,
        }
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn commands_handled(&self) -> u64 {
        self.commands_handled
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }

    /// Consume the handler, returning the writer half
    pub fn into_writer(self) -> W {
        self.writer
    }
}
