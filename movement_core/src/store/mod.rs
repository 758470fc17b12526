//! Spatial store - durable users and scenes plus proximity and similarity lookups.
//!
//! The store is reached through two traits:
//! - [`StoreConnector`] hands out a scoped session per request
//! - [`SpatialStore`] is the query contract a session fulfils
//!
//! Dropping a session releases it, on every exit path.

mod snapshot;
mod world_store;

pub use world_store::*;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use world_rules::{
    Embedding, NearbyScene, NodeLabel, Position, PositionLookup, Scene, SceneId, SimilarScene,
    UserId, WorldError,
};

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Store-level faults. None of these mean "not found".
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store state lock poisoned")]
    Poisoned,

    #[error("snapshot I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    World(#[from] WorldError),
}

/// One embedding to attach in a batch write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub node_id: SceneId,
    pub embedding: Embedding,
    pub label: NodeLabel,
}

/// The query contract for user positions and scene nodes.
///
/// Every write is idempotent per record. No operation is isolated from
/// concurrent writers; the last write wins.
pub trait SpatialStore {
    /// Read a user's position, creating the user at the origin if absent.
    fn get_position(&self, user_id: &UserId) -> StoreResult<PositionLookup>;

    /// Overwrite a user's position. `Ok(false)` means the user does not exist.
    fn set_position(&self, user_id: &UserId, position: Position) -> StoreResult<bool>;

    /// Create a user or overwrite its position.
    fn create_user(&self, user_id: &UserId, position: Position) -> StoreResult<()>;

    /// Insert or replace a scene.
    fn create_scene(&self, scene: Scene) -> StoreResult<SceneId>;

    /// Case-insensitive substring search over scene descriptions, unranked.
    fn find_scene_by_text(&self, query: &str, limit: usize) -> StoreResult<Vec<Scene>>;

    /// Scenes within the per-axis box around `position`, closest first.
    fn find_nearby_scenes(&self, position: Position, radius: f64) -> StoreResult<Vec<NearbyScene>>;

    /// Register which label carries embeddings of which width.
    fn declare_vector_index(&self, label: NodeLabel, dimension: usize) -> StoreResult<()>;

    /// Attach a description embedding to a node.
    fn store_embedding(
        &self,
        node_id: &SceneId,
        embedding: Embedding,
        label: NodeLabel,
    ) -> StoreResult<()>;

    /// Attach several embeddings, stopping at the first failure.
    fn store_embeddings(&self, records: Vec<EmbeddingRecord>) -> StoreResult<()> {
        for record in records {
            self.store_embedding(&record.node_id, record.embedding, record.label)?;
        }
        Ok(())
    }

    /// Cosine-ranked scenes at or above `min_similarity`, best first.
    fn find_nearest_by_embedding(
        &self,
        embedding: &Embedding,
        label: NodeLabel,
        min_similarity: f32,
        limit: usize,
    ) -> StoreResult<Vec<SimilarScene>>;
}

/// Hands out one scoped store session per request.
pub trait StoreConnector {
    type Session<'a>: SpatialStore
    where
        Self: 'a;

    fn connect(&self) -> StoreResult<Self::Session<'_>>;
}
