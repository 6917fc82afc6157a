//! Command definitions
//!
//! Represents commands from clients.

/// Opcodes understood by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    Get = 0x00,
    Set = 0x01,
    Delete = 0x02,
}

impl TryFrom<u8> for Opcode {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            0x00 => Ok(Opcode::Get),
            0x01 => Ok(Opcode::Set),
            0x02 => Ok(Opcode::Delete),
            other => Err(other),
        }
    }
}

/// A parsed command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Get a value by key
    Get { key: Vec<u8> },

    /// Set a key-value pair
    Set { key: Vec<u8>, value: Vec<u8> },

    /// Delete a key
    Delete { key: Vec<u8> },
}

impl Command {
    /// Get the opcode
    pub fn opcode(&self) -> Opcode {
        match self {
            Command::Get { .. } => Opcode::Get,
            Command::Set { .. } => Opcode::Set,
            Command::Delete { .. } => Opcode::Delete,
        }
    }

    pub fn key(&self) -> &[u8] {
        match self {
            Command::Get { key } | Command::Set { key, .. } | Command::Delete { key } => key,
        }
    }
}

/// One decoded client frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A frame with a known opcode
    Command(Command),

    /// An opcode outside the known set, with the key field that followed it
    Unknown { opcode: u8, key: Vec<u8> },
}
