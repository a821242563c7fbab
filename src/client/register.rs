//! Register Client
//!
//! Linearizable `read` / `write` built from two quorum phases.
//!
//! ```text
//! Start ─► QueryPhase ─► QueryOk ─► PropagatePhase ─► Done
//!              │                          │
//!              └──► Fail(NoMajority) ◄────┘
//! ```
//!
//! A failed phase ends the operation; nothing is retried.

use std::sync::Arc;

use super::{QuorumCoordinator, ReplicaTransport, TcpReplica};
use crate::config::{ClientConfig, PhasePolicy};
use crate::error::{RegisterError, Result};
use crate::tag::Tag;

/// Client for the replicated register space
///
/// Safe to share between threads. Concurrent operations from the same
/// client are ordered only by the replicas' per-key locks.
#[derive(Debug)]
pub struct RegisterClient {
    coordinator: QuorumCoordinator,
    client_id: i64,
}

impl RegisterClient {
    /// Connect to the replicas in `config`
    ///
    /// Fails with a configuration error if the list is invalid or fewer than
    /// a majority of replicas are reachable. Unreachable replicas are dialed
    /// again on every later call.
    pub fn connect(config: &ClientConfig) -> Result<Self> {
        config.validate()?;

        let mut reachable = 0;
        let mut replicas: Vec<Arc<dyn ReplicaTransport>> = Vec::with_capacity(config.replicas.len());
        for addr in &config.replicas {
            let replica = TcpReplica::new(addr.as_str(), config.connect_timeout, config.call_timeout);
            match replica.ensure_connected() {
                Ok(()) => reachable += 1,
                Err(e) => tracing::warn!("Replica {} unreachable: {}", addr, e),
            }
            replicas.push(Arc::new(replica));
        }

        let required = config.majority();
        if reachable < required {
            return Err(RegisterError::Config(format!(
                "only {} of {} replicas reachable, {} required",
                reachable,
                config.replicas.len(),
                required
            )));
        }

        tracing::debug!(
            "Client {} connected to {} of {} replicas",
            config.client_id,
            reachable,
            replicas.len()
        );
        Self::with_replicas(config.client_id, replicas, config.phase_policy)
    }

    /// Build a client over already-constructed transports
    pub fn with_replicas(
        client_id: i64,
        replicas: Vec<Arc<dyn ReplicaTransport>>,
        policy: PhasePolicy,
    ) -> Result<Self> {
        if client_id < 0 {
            return Err(RegisterError::Config(format!(
                "client id must be non-negative, got {}",
                client_id
            )));
        }

        Ok(Self {
            coordinator: QuorumCoordinator::new(replicas, policy)?,
            client_id,
        })
    }

    /// Write `value` under a tag strictly above every tag a majority knows
    pub fn write(&self, key: &str, value: &str) -> Result<()> {
        let current = self.coordinator.query(key)?;
        let tag = self.next_tag(key, current.tag)?;

        self.coordinator.propagate(key, value, tag)?;
        tracing::trace!(key, %tag, "write done");
        Ok(())
    }

    /// Read the latest value, writing it back to a majority before returning
    pub fn read(&self, key: &str) -> Result<String> {
        let current = self.coordinator.query(key)?;
        if !current.exists {
            return Err(RegisterError::KeyNotFound(key.to_string()));
        }

        // Write-back: a later read must not observe anything older.
        let tag = self.next_tag(key, current.tag)?;
        self.coordinator.propagate(key, &current.value, tag)?;
        tracing::trace!(key, %tag, "read done");

        Ok(current.value)
    }

    /// Tag for this client's next propagate phase on `key`
    fn next_tag(&self, key: &str, current: Tag) -> Result<Tag> {
        current.successor(self.client_id).ok_or_else(|| {
            RegisterError::Protocol(format!("timestamp space exhausted for key {}", key))
        })
    }

    /// Writer identity of this client
    pub fn client_id(&self) -> i64 {
        self.client_id
    }

    pub fn replica_count(&self) -> usize {
        self.coordinator.replica_count()
    }

    pub fn majority(&self) -> usize {
        self.coordinator.majority()
    }
}
