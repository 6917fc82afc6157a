//! Response definitions
//!
//! Represents responses to clients.

use std::fmt;

/// Response error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ErrorCode {
    NoError = 0x00,
    ServerError = 0x01,
    UserError = 0x02,
    UnknownCommand = 0x03,
}

impl TryFrom<u8> for ErrorCode {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            0x00 => Ok(ErrorCode::NoError),
            0x01 => Ok(ErrorCode::ServerError),
            0x02 => Ok(ErrorCode::UserError),
            0x03 => Ok(ErrorCode::UnknownCommand),
            other => Err(other),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCode::NoError => "NO_ERROR",
            ErrorCode::ServerError => "SERVER_ERROR",
            ErrorCode::UserError => "USER_ERROR",
            ErrorCode::UnknownCommand => "UNKNOWN_COMMAND",
        };
        write!(f, "{} ({})", name, *self as u8)
    }
}

/// A response to send to client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Error code
    pub error_code: ErrorCode,

    /// Optional message (only the value of a successful GET)
    pub message: Option<Vec<u8>>,
}

impl Response {
    /// Create a NO_ERROR response with an optional message
    pub fn ok(message: Option<Vec<u8>>) -> Self {
        Self {
            error_code: ErrorCode::NoError,
            message,
        }
    }

    /// Create a SERVER_ERROR response
    pub fn server_error() -> Self {
        Self::code(ErrorCode::ServerError)
    }

    /// Create an UNKNOWN_COMMAND response
    pub fn unknown_command() -> Self {
        Self::code(ErrorCode::UnknownCommand)
    }

    /// Create a response carrying only an error code
    pub fn code(error_code: ErrorCode) -> Self {
        Self {
            error_code,
            message: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error_code == ErrorCode::NoError
    }
}
