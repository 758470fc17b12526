//! Scene nodes placed in the polar plane.

use serde::{Deserialize, Serialize};

use super::SceneId;
use crate::embedding::Embedding;
use crate::geometry::Position;

/// An authored scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub id: SceneId,
    pub description: String,
    pub position: Position,

    /// Description embedding, attached after authoring.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Embedding>,
}

impl Scene {
    /// Create a scene with a generated ID and no embedding.
    pub fn new(description: impl Into<String>, position: Position) -> Self {
        Self {
            id: SceneId::generate(),
            description: description.into(),
            position,
            embedding: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<SceneId>) -> Self {
        self.id = id.into();
        self
    }

    /// Case-insensitive substring test against the description.
    pub fn description_contains(&self, query: &str) -> bool {
        self.description
            .to_lowercase()
            .contains(&query.to_lowercase())
    }
}

/// A scene found by a proximity query, with its coordinate gap to the query point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyScene {
    pub scene: Scene,
    pub distance: f64,
}

/// A scene found by embedding search, with its cosine similarity to the query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarScene {
    pub scene: Scene,
    pub similarity: f32,
}
