//! Hive Gossip Layer
//!
//! Best-effort pheromone dissemination between peers:
//! - Push a freshly emitted signal to every peer (fire-and-forget per peer)
//! - Pull every peer's known signals on each tick
//! - Hard per-call timeouts; unreachable peers contribute nothing
//!
//! The transport never mutates a store. It returns what it received and the
//! caller decides what to insert.

pub mod client;
pub mod peer;

pub use client::*;
pub use peer::*;
