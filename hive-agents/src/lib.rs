//! Hive Agents
//!
//! Everything an agent needs to choose and carry out its next action:
//! - **Scorer**: softmax-weighted choice among tier-permitted actions
//! - **Actions**: the action catalogue and its executor
//! - **Personas**: TOML-defined scoring weights, affinities and prompts
//! - **Collaborators**: reasoning, dataset fetch, attestation and synthesis
//!   interfaces, with HTTP-backed implementations
//!
//! ## Modular Personas
//!
//! Agent temperaments are defined via TOML persona files in `personas/`.
//! See [`persona::PersonaRegistry`] for loading and managing personas.

pub mod actions;
pub mod attest;
pub mod backend;
pub mod dataset;
pub mod persona;
pub mod reasoner;
pub mod scorer;
pub mod traits;

pub use actions::*;
pub use attest::*;
pub use backend::*;
pub use dataset::*;
pub use persona::*;
pub use reasoner::*;
pub use scorer::*;
pub use traits::*;
