//! Protocol Module
//!
//! Defines the wire protocol for client-server communication.
//!
//! ## Protocol Format (Single-Byte Length Prefixes)
//!
//! ### Request Format
//! ```text
//! GET     ┌──────────┬──────────┬───────────┐
//!         │ 0x00 (1) │ KLen (1) │    Key    │
//!         └──────────┴──────────┴───────────┘
//! SET     ┌──────────┬──────────┬───────────┬──────────┬───────────┐
//!         │ 0x01 (1) │ KLen (1) │    Key    │ VLen (1) │   Value   │
//!         └──────────┴──────────┴───────────┴──────────┴───────────┘
//! DELETE  ┌──────────┬──────────┬───────────┐
//!         │ 0x02 (1) │ KLen (1) │    Key    │
//!         └──────────┴──────────┴───────────┘
//! ```
//!
//! Any other opcode is still followed by a key field; it decodes to
//! [`Frame::Unknown`] and the connection answers `UNKNOWN_COMMAND`.
//!
//! ### Response Format
//! ```text
//! ┌──────────┐              ┌──────────┬──────────┬───────────┐
//! │ Code (1) │   or, GET    │ Code (1) │ MLen (1) │  Message  │
//! └──────────┘   hit only   └──────────┴──────────┴───────────┘
//! ```
//!
//! ### Error Codes
//! - 0x00: NO_ERROR
//! - 0x01: SERVER_ERROR
//! - 0x02: USER_ERROR
//! - 0x03: UNKNOWN_COMMAND

mod command;
mod response;
mod codec;

pub use command::{Command, Frame, Opcode};
pub use response::{ErrorCode, Response};
pub use codec::{
    encode_command, decode_frame, encode_response, decode_response,
    read_opcode, read_field, read_frame, read_response,
    write_command, write_response,
    MAX_FIELD_LEN,
};
