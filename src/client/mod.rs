//! Client Module
//!
//! Client-side half of the register protocol.
//!
//! ## Layers
//! - `RegisterClient`: `read` / `write` as query + propagate phases
//! - `QuorumCoordinator`: fan-out to all replicas, majority check, max tag
//! - `ReplicaTransport`: one request to one replica (TCP or in-process)

mod quorum;
mod register;
mod transport;

pub use quorum::{QueryOutcome, QuorumCoordinator, MAX_PENDING_JOBS};
pub use register::RegisterClient;
pub use transport::{LocalReplica, ReplicaTransport, TcpReplica};
