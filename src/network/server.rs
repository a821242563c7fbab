//! TCP Server
//!
//! Accepts connections and dispatches each to its own handler thread.

use std::collections::HashMap;
use std::io::{BufWriter, ErrorKind};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use super::Connection;
use crate::config::ServerConfig;
use crate::error::{RegisterError, Result};
use crate::protocol::{write_response, Response};
use crate::store::ReplicaStore;

/// How long the acceptor sleeps when no connection is pending
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Cloneable handle that stops a running [`Server`]
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandle {
    /// Signal the server to shutdown
    pub fn shutdown(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_shutdown(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// TCP server for one replica
pub struct Server {
    config: ServerConfig,
    store: Arc<ReplicaStore>,
    listener: Option<TcpListener>,
    shutdown: ShutdownHandle,

    /// Live connections, closed on shutdown so clients see the replica go away
    connections: Arc<Mutex<HashMap<u64, TcpStream>>>,
    next_conn_id: AtomicU64,
    active: Arc<AtomicUsize>,
}

impl Server {
    /// Create a new server with the given config and store
    pub fn new(config: ServerConfig, store: Arc<ReplicaStore>) -> Self {
        Self {
            config,
            store,
            listener: None,
            shutdown: ShutdownHandle::default(),
            connections: Arc::new(Mutex::new(HashMap::new())),
            next_conn_id: AtomicU64::new(0),
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Bind the listen address; returns the bound address
    ///
    /// Called by `run` if not called explicitly. Useful with port 0.
    pub fn bind(&mut self) -> Result<SocketAddr> {
        if let Some(listener) = &self.listener {
            return Ok(listener.local_addr()?);
        }

        let listener = TcpListener::bind(&self.config.listen_addr).map_err(|e| {
            RegisterError::Config(format!("cannot bind {}: {}", self.config.listen_addr, e))
        })?;
        listener.set_nonblocking(true)?;
        let addr = listener.local_addr()?;
        self.listener = Some(listener);
        Ok(addr)
    }

    /// Handle for stopping the server from another thread
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Start the server (blocking until shutdown)
    pub fn run(&mut self) -> Result<()> {
        let addr = self.bind()?;
        tracing::info!("Replica is listening on {}", addr);

        let result = self.accept_loop();
        self.close_connections();

        tracing::info!("Replica on {} stopped", addr);
        result
    }

    /// Signal the server to shutdown gracefully
    pub fn shutdown(&self) {
        self.shutdown.shutdown();
    }

    /// Number of connections currently being served
    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    fn accept_loop(&self) -> Result<()> {
        let listener = match &self.listener {
            Some(l) => l,
            None => return Err(RegisterError::Config("server is not bound".to_string())),
        };

        while !self.shutdown.is_shutdown() {
            match listener.accept() {
                Ok((stream, peer)) => {
                    if let Err(e) = self.dispatch(stream) {
                        tracing::warn!("Failed to serve connection from {}: {}", peer, e);
                    }
                }
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Ok(())
    }

    /// Spawn a handler thread for an accepted connection
    fn dispatch(&self, stream: TcpStream) -> Result<()> {
        stream.set_nonblocking(false)?;

        if self.active.load(Ordering::Relaxed) >= self.config.max_connections {
            tracing::warn!(
                "Refusing connection: {} connections active",
                self.config.max_connections
            );
            let mut writer = BufWriter::new(stream);
            write_response(&mut writer, &Response::error("too many connections"))?;
            return Ok(());
        }

        // Prepare the handler before taking a slot
        let tracked = stream.try_clone()?;
        let mut connection = Connection::new(stream, Arc::clone(&self.store))?;
        connection.set_timeouts(self.config.read_timeout_ms, self.config.write_timeout_ms)?;

        // The slot is released when the handler thread ends, or right away
        // if the thread cannot be spawned
        let conn_id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);
        let slot = ConnectionSlot::acquire(conn_id, tracked, &self.connections, &self.active);

        thread::Builder::new()
            .name(format!("replica-conn-{}", conn_id))
            .spawn(move || {
                if let Err(e) = connection.handle() {
                    tracing::debug!("Connection {} ended: {}", connection.peer_addr(), e);
                }
                drop(slot);
            })?;

        Ok(())
    }

    fn close_connections(&self) {
        let mut connections = self.connections.lock();
        for (_, stream) in connections.drain() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }
}

/// A tracked connection, counted against `max_connections` while alive
struct ConnectionSlot {
    id: u64,
    connections: Arc<Mutex<HashMap<u64, TcpStream>>>,
    active: Arc<AtomicUsize>,
}

impl ConnectionSlot {
    fn acquire(
        id: u64,
        stream: TcpStream,
        connections: &Arc<Mutex<HashMap<u64, TcpStream>>>,
        active: &Arc<AtomicUsize>,
    ) -> Self {
        connections.lock().insert(id, stream);
        active.fetch_add(1, Ordering::Relaxed);
        Self {
            id,
            connections: Arc::clone(connections),
            active: Arc::clone(active),
        }
    }
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        self.connections.lock().remove(&self.id);
        self.active.fetch_sub(1, Ordering::Relaxed);
    }
}
