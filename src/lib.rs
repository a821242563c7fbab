//! # quorumreg
//!
//! A linearizable key-value register emulated over a set of independent
//! in-memory replicas with the majority-quorum ABD protocol:
//! - Every key is an independent multi-writer atomic register
//! - Replicas never talk to each other; clients drive all coordination
//! - Reads and writes each take two quorum rounds (query + propagate)
//! - Tolerates crash/omission of any minority of replicas
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │              CLI / Benchmark Harness                         │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ read(key) / write(key, value)
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                 Register Client                              │
//! │        (query phase ─► propagate phase)                      │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │               Quorum Coordinator                             │
//! │      (fan-out to N, majority = N/2 + 1, max tag)             │
//! └──────┬──────────────┬──────────────────────┬────────────────┘
//!        │ TCP          │ TCP                  │ TCP
//!        ▼              ▼                      ▼
//!   ┌─────────┐    ┌─────────┐            ┌─────────┐
//!   │Replica 1│    │Replica 2│    ...     │Replica N│
//!   │ (Store) │    │ (Store) │            │ (Store) │
//!   └─────────┘    └─────────┘            └─────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod tag;

pub mod bench;
pub mod client;
pub mod network;
pub mod protocol;
pub mod store;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use client::RegisterClient;
pub use config::{ClientConfig, PhasePolicy, ServerConfig};
pub use error::{RegisterError, Result};
pub use store::ReplicaStore;
pub use tag::Tag;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of quorumreg
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
