//! Users moving through the world.

use serde::{Deserialize, Serialize};

use super::UserId;
use crate::geometry::Position;

/// A user and where they currently stand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub position: Position,
}

impl User {
    /// Create a user standing at the origin.
    pub fn new(id: impl Into<UserId>) -> Self {
        Self {
            id: id.into(),
            position: Position::ORIGIN,
        }
    }

    pub fn at(id: impl Into<UserId>, position: Position) -> Self {
        Self {
            id: id.into(),
            position,
        }
    }
}
