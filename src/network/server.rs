//! TCP Server
//!
//! Accepts connections and dispatches each one to its own worker thread.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam::channel::{self, Receiver};

use crate::config::Config;
use crate::engine::Engine;
use crate::error::Result;
use crate::storage::{MemoryStorage, StorageBackend};
use crate::wal::{TextWal, WriteAheadLog};
use super::Connection;

/// TCP server for kvdb
pub struct Server<S = MemoryStorage, L = TextWal> {
    config: Config,

    engine: Arc<Engine<S, L>>,

    listener: TcpListener,

    shutdown: Arc<AtomicBool>,
}

impl<S, L> Server<S, L>
where
    S: StorageBackend + 'static,
    L: WriteAheadLog + 'static,
{
    /// Bind the listener described by `config`
    pub fn bind(config: Config, engine: Arc<Engine<S, L>>) -> Result<Self> {
        config.validate()?;

        let listener = TcpListener::bind(config.listen_addr())?;
        tracing::info!("Listening on {}", listener.local_addr()?);

        Ok(Self {
            config,
            engine,
            listener,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Handle that stops `run` from another thread
    pub fn shutdown_handle(&self) -> Result<ShutdownHandle> {
        Ok(ShutdownHandle {
            flag: Arc::clone(&self.shutdown),
            addr: self.local_addr()?,
        })
    }

    /// Start the server (blocking)
    ///
    /// Accepted sockets are queued on a bounded channel; a dispatcher thread
    /// spawns one worker per connection. Returns after shutdown, once the
    /// WAL is closed.
    pub fn run(&self) -> Result<()> {
        let (tx, rx) = channel::bounded::<TcpStream>(self.config.connection_queue_size);

        let engine = Arc::clone(&self.engine);
        let dispatcher = thread::Builder::new()
            .name("kvdb-dispatch".to_string())
            .spawn(move || dispatch_connections(rx, engine))?;

        for stream in self.listener.incoming() {
            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }

            match stream {
                Ok(stream) => {
                    if tx.send(stream).is_err() {
                        tracing::error!("Connection dispatcher exited; stopping accept loop");
                        break;
                    }
                }
                Err(e) => tracing::warn!("Error accepting connection: {}", e),
            }
        }

        drop(tx);
        if dispatcher.join().is_err() {
            tracing::error!("Connection dispatcher panicked");
        }

        tracing::info!("Accept loop stopped; closing WAL");
        self.engine.close()
    }
}

/// Stops a running [`Server`]
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
    addr: SocketAddr,
}

impl ShutdownHandle {
    /// Signal the server to stop accepting connections
    ///
    /// The accept loop is blocked in `accept`, so a throwaway connection is
    /// made to wake it up.
    pub fn shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);

        let mut addr = self.addr;
        if addr.ip().is_unspecified() {
            let loopback = match addr.ip() {
                IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::LOCALHOST),
                IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::LOCALHOST),
            };
            addr.set_ip(loopback);
        }

        if let Err(e) = TcpStream::connect(addr) {
            tracing::debug!("Shutdown wake-up connection failed: {}", e);
        }
    }
}

fn dispatch_connections<S, L>(rx: Receiver<TcpStream>, engine: Arc<Engine<S, L>>)
where
    S: StorageBackend + 'static,
    L: WriteAheadLog + 'static,
{
    let mut next_id: u64 = 0;

    for stream in rx {
        next_id += 1;
        let engine = Arc::clone(&engine);

        let spawned = thread::Builder::new()
            .name(format!("kvdb-conn-{}", next_id))
            .spawn(move || serve(stream, engine));

        if let Err(e) = spawned {
            tracing::error!("Failed to spawn connection worker: {}", e);
        }
    }
}

fn serve<S, L>(stream: TcpStream, engine: Arc<Engine<S, L>>)
where
    S: StorageBackend,
    L: WriteAheadLog,
{
    let mut connection = match Connection::from_tcp(stream, engine) {
        Ok(connection) => connection,
        Err(e) => {
            tracing::warn!("Failed to set up connection: {}", e);
            return;
        }
    };

    if let Err(e) = connection.handle() {
        tracing::debug!("Connection {} dropped: {}", connection.peer_addr(), e);
    }
}
