//! Network Module
//!
//! Replica-side TCP server.
//!
//! ## Architecture
//! - Single acceptor thread polling a shutdown flag
//! - One handler thread per connection, capped by `max_connections`
//! - Requests executed directly against the `ReplicaStore`

mod connection;
mod server;

pub use connection::Connection;
pub use server::{Server, ShutdownHandle};
