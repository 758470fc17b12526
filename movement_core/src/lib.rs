//! # Movement Core
//!
//! Turns a free-text movement command into a single position update in the
//! polar world. This crate talks to the outside world through three seams:
//! the spatial store, the language oracle and the embedding oracle.
//!
//! ## Core Components
//!
//! - **store**: the `SpatialStore` contract and a durable snapshot-backed store
//! - **oracle**: language and embedding oracle contracts, prompts and HTTP clients
//! - **resolver**: destination (semantic, then substring) and direction resolution
//! - **movement**: the orchestrator that composes everything per request
//! - **config**: TOML configuration for thresholds, oracles and storage
//!
//! ## Design Philosophy
//!
//! - **Injected**: every collaborator is handed in at construction; there is no global state
//! - **Per-request**: nothing is shared between requests except the store
//! - **Never throws at the caller**: oracle trouble degrades to a fallback, store trouble to a failed result

pub mod config;
pub mod movement;
pub mod oracle;
pub mod resolver;
pub mod store;

pub use config::*;
pub use movement::*;
pub use oracle::*;
pub use resolver::*;
pub use store::*;
