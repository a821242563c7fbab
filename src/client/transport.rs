//! Replica transports
//!
//! A [`ReplicaTransport`] carries one request to one replica and returns its
//! response. [`TcpReplica`] talks to a remote replica server;
//! [`LocalReplica`] serves requests from an in-process [`ReplicaStore`].

use std::io::{BufReader, BufWriter};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::{RegisterError, Result};
use crate::protocol::{read_response, write_request, Request, Response};
use crate::store::ReplicaStore;

/// One replica as seen by the quorum coordinator
pub trait ReplicaTransport: Send + Sync {
    /// Human-readable replica name (usually its address)
    fn name(&self) -> &str;

    /// Send `request` and wait for the replica's answer
    ///
    /// Any error means the replica did not respond for this call.
    fn call(&self, request: &Request) -> Result<Response>;
}

// =============================================================================
// TCP
// =============================================================================

/// Buffered halves of an open replica connection
struct ReplicaConn {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
}

/// Connection to a remote replica server
///
/// Calls are serialized over a single connection. A failed call drops the
/// connection; the next call dials again.
pub struct TcpReplica {
    addr: String,
    connect_timeout: Duration,
    call_timeout: Option<Duration>,
    conn: Mutex<Option<ReplicaConn>>,
}

impl TcpReplica {
    /// Create a replica handle without dialing; the first call connects
    pub fn new(
        addr: impl Into<String>,
        connect_timeout: Duration,
        call_timeout: Option<Duration>,
    ) -> Self {
        Self {
            addr: addr.into(),
            connect_timeout,
            call_timeout,
            conn: Mutex::new(None),
        }
    }

    /// Dial `addr`, failing if the replica is unreachable
    pub fn connect(
        addr: impl Into<String>,
        connect_timeout: Duration,
        call_timeout: Option<Duration>,
    ) -> Result<Self> {
        let replica = Self::new(addr, connect_timeout, call_timeout);
        replica.ensure_connected()?;
        Ok(replica)
    }

    /// Open a connection if none is open
    pub fn ensure_connected(&self) -> Result<()> {
        let mut slot = self.conn.lock();
        if slot.is_none() {
            *slot = Some(self.dial()?);
        }
        Ok(())
    }

    fn resolve(&self) -> Result<Vec<SocketAddr>> {
        let addrs: Vec<SocketAddr> = self
            .addr
            .to_socket_addrs()
            .map_err(|e| self.transport_error(format!("cannot resolve: {}", e)))?
            .collect();
        if addrs.is_empty() {
            return Err(self.transport_error("address resolved to nothing".to_string()));
        }
        Ok(addrs)
    }

    fn dial(&self) -> Result<ReplicaConn> {
        let mut last_err = None;
        for addr in self.resolve()? {
            match TcpStream::connect_timeout(&addr, self.connect_timeout) {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    stream.set_read_timeout(self.call_timeout)?;
                    stream.set_write_timeout(self.call_timeout)?;
                    let read_stream = stream.try_clone()?;
                    return Ok(ReplicaConn {
                        reader: BufReader::new(read_stream),
                        writer: BufWriter::new(stream),
                    });
                }
                Err(e) => last_err = Some(e),
            }
        }

        let reason = last_err
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no address to dial".to_string());
        Err(self.transport_error(format!("connect failed: {}", reason)))
    }

    fn transport_error(&self, reason: String) -> RegisterError {
        RegisterError::Transport {
            replica: self.addr.clone(),
            reason,
        }
    }

    /// Whether a connection is currently open
    pub fn is_connected(&self) -> bool {
        self.conn.lock().is_some()
    }
}

impl ReplicaTransport for TcpReplica {
    fn name(&self) -> &str {
        &self.addr
    }

    fn call(&self, request: &Request) -> Result<Response> {
        let mut slot = self.conn.lock();
        if slot.is_none() {
            *slot = Some(self.dial()?);
        }
        let conn = match slot.as_mut() {
            Some(conn) => conn,
            None => return Err(self.transport_error("not connected".to_string())),
        };

        let result = write_request(&mut conn.writer, request)
            .and_then(|()| read_response(&mut conn.reader));

        match result {
            Ok(Response::Error(message)) => {
                // Replicas close the connection after an ERROR frame.
                *slot = None;
                Err(RegisterError::Remote(message))
            }
            Ok(response) => Ok(response),
            Err(e) => {
                // The stream may hold half a frame; never reuse it.
                *slot = None;
                Err(self.transport_error(e.to_string()))
            }
        }
    }
}

// =============================================================================
// In-process
// =============================================================================

/// Replica backed by an in-process store
///
/// Can be taken offline or slowed down to exercise quorum behavior without
/// sockets.
pub struct LocalReplica {
    name: String,
    store: Arc<ReplicaStore>,
    online: AtomicBool,
    delay: Mutex<Duration>,
}

impl LocalReplica {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_store(name, Arc::new(ReplicaStore::new()))
    }

    pub fn with_store(name: impl Into<String>, store: Arc<ReplicaStore>) -> Self {
        Self {
            name: name.into(),
            store,
            online: AtomicBool::new(true),
            delay: Mutex::new(Duration::ZERO),
        }
    }

    /// Underlying store, for inspecting replica state
    pub fn store(&self) -> &Arc<ReplicaStore> {
        &self.store
    }

    /// Offline replicas fail every call
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Delay applied before serving each call
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }
}

impl ReplicaTransport for LocalReplica {
    fn name(&self) -> &str {
        &self.name
    }

    fn call(&self, request: &Request) -> Result<Response> {
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        if !self.is_online() {
            return Err(RegisterError::Transport {
                replica: self.name.clone(),
                reason: "replica offline".to_string(),
            });
        }
        Ok(self.store.execute(request))
    }
}
