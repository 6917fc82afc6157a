//! Blocking client
//!
//! One persistent TCP connection; one request in flight at a time.

use std::io::{BufReader, BufWriter};
use std::net::{TcpStream, ToSocketAddrs};

use crate::error::Result;
use crate::protocol::{read_response, write_command, Command, Response};

/// Client for a kvdb server
pub struct Client {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
}

impl Client {
    /// Connect to a server
    pub fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;

        let read_stream = stream.try_clone()?;
        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(stream),
        })
    }

    /// Send a command and wait for its response
    ///
    /// Keys and values over 255 bytes are rejected before anything is sent.
    pub fn send(&mut self, command: &Command) -> Result<Response> {
        write_command(&mut self.writer, command)?;
        read_response(&mut self.reader, command.opcode())
    }

    pub fn get(&mut self, key: &[u8]) -> Result<Response> {
        self.send(&Command::Get { key: key.to_vec() })
    }

    pub fn set(&mut self, key: &[u8], value: &[u8]) -> Result<Response> {
        self.send(&Command::Set {
            key: key.to_vec(),
            value: value.to_vec(),
        })
    }

    pub fn delete(&mut self, key: &[u8]) -> Result<Response> {
        self.send(&Command::Delete { key: key.to_vec() })
    }

    pub fn peer_addr(&self) -> Result<std::net::SocketAddr> {
        Ok(self.reader.get_ref().peer_addr()?)
    }
}
