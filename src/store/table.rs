//! Replica store implementation
//!
//! HashMap of per-key registers behind a RwLock, each register behind its
//! own Mutex.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::Register;
use crate::protocol::{GetRequest, GetResponse, Request, Response, SetRequest, SetResponse};
use crate::tag::Tag;

/// In-memory register store of one replica
///
/// ## Concurrency:
/// - `registers` map: RwLock, write-locked only to insert an unseen key
/// - each register: its own Mutex, held only while reading or updating it
/// - operations on different keys run in parallel
pub struct ReplicaStore {
    registers: RwLock<HashMap<String, Arc<Mutex<Register>>>>,
}

impl ReplicaStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            registers: RwLock::new(HashMap::new()),
        }
    }

    /// Look up the register for `key`, inserting a never-written one if absent
    ///
    /// Concurrent first touches of the same key all receive the same entry.
    fn register(&self, key: &str) -> Arc<Mutex<Register>> {
        // Fast path: the key was seen before
        if let Some(reg) = self.registers.read().get(key) {
            return Arc::clone(reg);
        }

        // Another thread may have inserted it since; entry() keeps the first
        let mut registers = self.registers.write();
        Arc::clone(
            registers
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(Register::new()))),
        )
    }

    /// Execute a request and build its response
    pub fn execute(&self, request: &Request) -> Response {
        match request {
            Request::Get(req) => Response::Get(self.get(req)),
            Request::Set(req) => Response::Set(self.set(req)),
        }
    }

    /// Conditional write; acknowledged whether or not it was applied
    pub fn set(&self, req: &SetRequest) -> SetResponse {
        let applied = self.apply(&req.key, &req.value, req.tag());
        tracing::trace!(key = %req.key, tag = %req.tag(), applied, "set");
        SetResponse { ok: true }
    }

    /// Snapshot of the register for `req.key`
    pub fn get(&self, req: &GetRequest) -> GetResponse {
        let (value, tag) = self.snapshot(&req.key);
        GetResponse {
            exists: tag.is_written(),
            value,
            timestamp: tag.timestamp,
            writer_id: tag.writer_id,
        }
    }

    /// Apply `(value, tag)` to `key` if `tag` is newer; returns whether it was
    pub fn apply(&self, key: &str, value: &str, tag: Tag) -> bool {
        let reg = self.register(key);
        let mut reg = reg.lock();
        reg.apply(value, tag)
    }

    /// Current value and tag of `key`
    pub fn snapshot(&self, key: &str) -> (String, Tag) {
        let reg = self.register(key);
        let reg = reg.lock();
        (reg.value.clone(), reg.tag)
    }

    /// Number of keys touched so far (including read-only touches)
    pub fn len(&self) -> usize {
        self.registers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.registers.read().is_empty()
    }
}

impl Default for ReplicaStore {
    fn default() -> Self {
        Self::new()
    }
}
