//! # World Rules
//!
//! The data model of the exploration world - polar positions, users, scenes
//! and their description embeddings. This crate is the single source of truth
//! for world data and does not contain any oracle or language logic.

pub mod embedding;
pub mod entities;
pub mod error;
pub mod geometry;
pub mod world_state;

pub use embedding::*;
pub use entities::*;
pub use error::*;
pub use geometry::*;
pub use world_state::*;
