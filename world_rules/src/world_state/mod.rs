//! World state - the tables of users and scenes plus the lookups over them.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::embedding::{Embedding, EMBEDDING_DIM};
use crate::entities::{NearbyScene, NodeLabel, Scene, SceneId, SimilarScene, User, UserId};
use crate::error::{WorldError, WorldResult};
use crate::geometry::Position;

/// Outcome of reading a user's position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PositionLookup {
    /// The user already existed.
    Found(Position),
    /// The user was missing and has just been created at the origin.
    Provisioned(Position),
}

impl PositionLookup {
    pub fn position(&self) -> Position {
        match self {
            PositionLookup::Found(p) | PositionLookup::Provisioned(p) => *p,
        }
    }

    pub fn was_provisioned(&self) -> bool {
        matches!(self, PositionLookup::Provisioned(_))
    }
}

/// A declared vector index: which label carries embeddings of which width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorIndex {
    pub label: NodeLabel,
    pub dimension: usize,
}

/// The complete persisted state of the world.
///
/// Scenes are keyed in a `BTreeMap`, so "store order" for unranked queries is
/// ascending scene ID.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WorldState {
    /// All users, keyed by ID.
    pub users: HashMap<UserId, User>,

    /// All scenes, keyed by ID.
    pub scenes: BTreeMap<SceneId, Scene>,

    /// Declared vector indexes.
    #[serde(default)]
    pub vector_indexes: Vec<VectorIndex>,
}

impl WorldState {
    /// Create a new empty world state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a user's position, creating the user at the origin if absent.
    pub fn ensure_user(&mut self, id: &UserId) -> PositionLookup {
        match self.users.get(id) {
            Some(user) => PositionLookup::Found(user.position),
            None => {
                self.users.insert(id.clone(), User::new(id.clone()));
                PositionLookup::Provisioned(Position::ORIGIN)
            }
        }
    }

    pub fn get_user(&self, id: &UserId) -> Option<&User> {
        self.users.get(id)
    }

    /// Create the user or overwrite its position.
    pub fn upsert_user(&mut self, id: &UserId, position: Position) {
        self.users
            .entry(id.clone())
            .and_modify(|u| u.position = position)
            .or_insert_with(|| User::at(id.clone(), position));
    }

    /// Overwrite an existing user's position. Returns `false` if the user is unknown.
    pub fn set_user_position(&mut self, id: &UserId, position: Position) -> bool {
        match self.users.get_mut(id) {
            Some(user) => {
                user.position = position;
                true
            }
            None => false,
        }
    }

    /// Add a scene, replacing any scene with the same ID.
    pub fn add_scene(&mut self, scene: Scene) -> SceneId {
        let id = scene.id.clone();
        self.scenes.insert(id.clone(), scene);
        id
    }

    pub fn get_scene(&self, id: &SceneId) -> Option<&Scene> {
        self.scenes.get(id)
    }

    /// Scenes whose description contains `query`, ignoring case, in store order.
    pub fn scenes_matching_text(&self, query: &str, limit: usize) -> Vec<&Scene> {
        self.scenes
            .values()
            .filter(|s| s.description_contains(query))
            .take(limit)
            .collect()
    }

    /// Scenes inside the per-axis box of half-width `radius` around `center`,
    /// ranked by coordinate gap (closest first).
    pub fn nearby_scenes(&self, center: Position, radius: f64) -> Vec<NearbyScene> {
        let mut nearby: Vec<_> = self
            .scenes
            .values()
            .filter(|s| center.within_box(&s.position, radius))
            .map(|s| NearbyScene {
                distance: center.coordinate_gap(&s.position),
                scene: s.clone(),
            })
            .collect();

        nearby.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        nearby
    }

    /// Register the embedding width carried by a label.
    pub fn declare_vector_index(&mut self, label: NodeLabel, dimension: usize) -> WorldResult<()> {
        if !label.carries_embeddings() {
            return Err(WorldError::UnsupportedLabel(label));
        }
        if dimension != EMBEDDING_DIM {
            return Err(WorldError::DimensionMismatch {
                expected: EMBEDDING_DIM,
                actual: dimension,
            });
        }
        if !self.vector_indexes.iter().any(|i| i.label == label) {
            self.vector_indexes.push(VectorIndex { label, dimension });
        }
        Ok(())
    }

    /// The declared index for `label`.
    pub fn vector_index(&self, label: NodeLabel) -> WorldResult<&VectorIndex> {
        if !label.carries_embeddings() {
            return Err(WorldError::UnsupportedLabel(label));
        }
        self.vector_indexes
            .iter()
            .find(|i| i.label == label)
            .ok_or(WorldError::MissingVectorIndex(label))
    }

    /// Attach a description embedding to a node. The label must have a declared index.
    pub fn attach_embedding(
        &mut self,
        label: NodeLabel,
        id: &SceneId,
        embedding: Embedding,
    ) -> WorldResult<()> {
        let index = self.vector_index(label)?;
        if embedding.as_slice().len() != index.dimension {
            return Err(WorldError::DimensionMismatch {
                expected: index.dimension,
                actual: embedding.as_slice().len(),
            });
        }
        let scene = self
            .scenes
            .get_mut(id)
            .ok_or_else(|| WorldError::UnknownScene(id.clone()))?;
        scene.embedding = Some(embedding);
        Ok(())
    }

    /// Scenes ranked by cosine similarity to `query`, best first.
    ///
    /// Scenes without an embedding are skipped; scenes below `min_similarity`
    /// are dropped rather than ranked lower. Fails if `label` has no declared index.
    pub fn nearest_by_embedding(
        &self,
        query: &Embedding,
        label: NodeLabel,
        min_similarity: f32,
        limit: usize,
    ) -> WorldResult<Vec<SimilarScene>> {
        self.vector_index(label)?;

        let mut hits: Vec<_> = self
            .scenes
            .values()
            .filter_map(|scene| {
                let embedding = scene.embedding.as_ref()?;
                let similarity = embedding.cosine_similarity(query);
                (similarity >= min_similarity).then(|| SimilarScene {
                    scene: scene.clone(),
                    similarity,
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit);
        Ok(hits)
    }

    /// Serialize the whole world to pretty JSON.
    pub fn to_json(&self) -> WorldResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Restore a world from JSON produced by [`WorldState::to_json`].
    pub fn from_json(json: &str) -> WorldResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
