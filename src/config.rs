//! Configuration for quorumreg
//!
//! Centralized configuration with sensible defaults. Replica servers are
//! configured by [`ServerConfig`], register clients by [`ClientConfig`].

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{RegisterError, Result};

// =============================================================================
// Server Configuration
// =============================================================================

/// Configuration for a single replica server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// TCP listen address
    pub listen_addr: String,

    /// Max concurrent client connections
    pub max_connections: usize,

    /// Connection read timeout (milliseconds, 0 = none)
    pub read_timeout_ms: u64,

    /// Connection write timeout (milliseconds, 0 = none)
    pub write_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            max_connections: 1024,
            read_timeout_ms: 0,
            write_timeout_ms: 5000,
        }
    }
}

impl ServerConfig {
    /// Create a new config builder
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }
}

/// Builder for ServerConfig
#[derive(Default)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the maximum number of concurrent connections
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    pub fn build(self) -> ServerConfig {
        self.config
    }
}

// =============================================================================
// Client Configuration
// =============================================================================

/// When a quorum phase is considered complete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PhasePolicy {
    /// Wait until every replica has answered or failed
    #[default]
    WaitAll,

    /// Return once a majority has answered, or once a majority can no
    /// longer be reached
    EarlyMajority,
}

/// Configuration for a register client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Replica addresses (host:port); order defines replica indices
    pub replicas: Vec<String>,

    /// Writer identity of this client (non-negative)
    pub client_id: i64,

    /// Per-call deadline; `None` waits indefinitely
    pub call_timeout: Option<Duration>,

    /// Deadline for establishing a replica connection
    pub connect_timeout: Duration,

    /// Phase completion policy
    pub phase_policy: PhasePolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            replicas: Vec::new(),
            client_id: 0,
            call_timeout: None,
            connect_timeout: Duration::from_secs(5),
            phase_policy: PhasePolicy::WaitAll,
        }
    }
}

/// On-disk replica list, e.g. `{"servers": ["localhost:8080"]}`
#[derive(Debug, Deserialize)]
struct ReplicaFile {
    #[serde(alias = "server")]
    servers: Vec<String>,
}

impl ClientConfig {
    /// Create a new config builder
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Load the replica list from a JSON file
    ///
    /// All other fields take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| {
            RegisterError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let file: ReplicaFile = serde_json::from_str(&raw)
            .map_err(|e| RegisterError::Config(format!("invalid {}: {}", path.display(), e)))?;

        let config = Self {
            replicas: file.servers,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the replica list and client identity
    pub fn validate(&self) -> Result<()> {
        if self.replicas.is_empty() {
            return Err(RegisterError::Config("replica list is empty".to_string()));
        }
        if self.client_id < 0 {
            return Err(RegisterError::Config(format!(
                "client id must be non-negative, got {}",
                self.client_id
            )));
        }
        if self.call_timeout == Some(Duration::ZERO) {
            return Err(RegisterError::Config(
                "call timeout must be non-zero (leave unset to wait indefinitely)".to_string(),
            ));
        }
        if self.connect_timeout.is_zero() {
            return Err(RegisterError::Config("connect timeout must be non-zero".to_string()));
        }
        for addr in &self.replicas {
            let malformed = match addr.rsplit_once(':') {
                Some((host, port)) => host.is_empty() || port.parse::<u16>().is_err(),
                None => true,
            };
            if malformed {
                return Err(RegisterError::Config(format!(
                    "malformed replica address: {:?}",
                    addr
                )));
            }
        }
        Ok(())
    }

    /// Majority quorum size for the configured replica set
    pub fn majority(&self) -> usize {
        self.replicas.len() / 2 + 1
    }
}

/// Builder for ClientConfig
#[derive(Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Append a replica address
    pub fn replica(mut self, addr: impl Into<String>) -> Self {
        self.config.replicas.push(addr.into());
        self
    }

    /// Replace the replica list
    pub fn replicas<I, S>(mut self, addrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.replicas = addrs.into_iter().map(Into::into).collect();
        self
    }

    /// Set the client (writer) identity
    pub fn client_id(mut self, id: i64) -> Self {
        self.config.client_id = id;
        self
    }

    /// Set a per-call deadline
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.config.call_timeout = Some(timeout);
        self
    }

    /// Set the connection deadline
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set the phase completion policy
    pub fn phase_policy(mut self, policy: PhasePolicy) -> Self {
        self.config.phase_policy = policy;
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}
