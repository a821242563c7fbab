//! Store Module
//!
//! Replica-side register storage.
//!
//! ## Responsibilities
//! - Hold one register `(value, timestamp, writer_id)` per key
//! - Create registers lazily on first touch (read or write)
//! - Apply a write only if its tag is strictly newer than the stored one
//! - Serialize operations on the same key, parallelize across keys
//!
//! Replicas never talk to each other. State is in-memory only and is lost
//! when the process exits.

mod register;
mod table;

pub use register::Register;
pub use table::ReplicaStore;
