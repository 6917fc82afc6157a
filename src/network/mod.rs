//! Network Module
//!
//! TCP server and client handling.
//!
//! ## Architecture
//! - Single acceptor thread
//! - Dispatcher thread fed by a bounded channel of accepted sockets
//! - One worker thread per connection, all sharing one Engine

mod server;
mod connection;

pub use server::{Server, ShutdownHandle};
pub use connection::{Connection, ConnectionState};
