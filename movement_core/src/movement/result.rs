use serde::{Deserialize, Serialize};
use thiserror::Error;
use world_rules::{NearbyScene, Position, SceneId};

use crate::resolver::{MatchSource, Step};

/// Why a movement request did not complete.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum MovementFailure {
    #[error("cannot determine current position")]
    PositionUnavailable,

    #[error("destination not found: {0}")]
    DestinationNotFound(String),

    #[error("command not understood")]
    NotUnderstood,

    #[error("failed to update position")]
    UpdateFailed,

    #[error("store unavailable")]
    StoreUnavailable,

    /// The step was persisted but the surroundings could not be read.
    #[error("moved, but nearby scenes are unavailable")]
    NearbyUnavailable,
}

/// How the new position was chosen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Resolution {
    Destination {
        scene_id: SceneId,
        source: MatchSource,
        similarity: Option<f32>,
    },
    Step(Step),
}

/// Outcome of one movement command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementResult {
    pub success: bool,
    /// Human-readable outcome; for failures, the [`MovementFailure`] text.
    pub message: String,
    /// Present on success, and after a persisted step whose nearby lookup failed.
    pub new_position: Option<Position>,
    pub nearby_scenes: Option<Vec<NearbyScene>>,
    pub resolution: Option<Resolution>,
    pub failure: Option<MovementFailure>,
}

impl MovementResult {
    /// A failed result carrying `failure`'s message and no position.
    pub fn failed(failure: MovementFailure) -> Self {
        Self {
            success: false,
            message: failure.to_string(),
            new_position: None,
            nearby_scenes: None,
            resolution: None,
            failure: Some(failure),
        }
    }
}
