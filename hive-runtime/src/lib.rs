//! Hive Runtime
//!
//! Hosts one agent per process:
//! - A single task owns all node state and advances it on a fixed tick
//! - Peers push into an event channel; readers see a published snapshot
//! - Side effects (gossip push, attestation, synthesis, signal log) run
//!   detached and report back as events
//! - Durable JSON snapshots restore credits and counters across restarts

pub mod config;
pub mod node;
pub mod server;
pub mod snapshot;
pub mod view;

pub use config::*;
pub use node::*;
pub use server::*;
pub use snapshot::*;
pub use view::*;
