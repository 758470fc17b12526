//! Polar geometry: positions, compass directions and the step transform.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::WorldError;

/// Shortest step a single movement command may take.
pub const MIN_STEP: f64 = 0.1;

/// Longest step a single movement command may take.
pub const MAX_STEP: f64 = 2.0;

/// A location in the polar plane.
///
/// `theta` is an angle in radians but is never wrapped into `[0, 2π)`;
/// repeated moves accumulate it without bound.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub r: f64,
    pub theta: f64,
}

impl Position {
    /// The origin, where new users start.
    pub const ORIGIN: Position = Position { r: 0.0, theta: 0.0 };

    pub fn new(r: f64, theta: f64) -> Self {
        Self { r, theta }
    }

    /// Apply a `(dr, dtheta)` delta component-wise.
    pub fn offset(&self, delta: (f64, f64)) -> Self {
        Self {
            r: self.r + delta.0,
            theta: self.theta + delta.1,
        }
    }

    /// Whether `other` lies inside the per-axis box of half-width `radius`.
    ///
    /// Each coordinate is bounded independently; this is not a disc.
    pub fn within_box(&self, other: &Position, radius: f64) -> bool {
        (other.r - self.r).abs() <= radius && (other.theta - self.theta).abs() <= radius
    }

    /// `sqrt(Δr² + Δθ²)` over the raw coordinate pair.
    ///
    /// This treats the angle as a linear coordinate, so it is not the
    /// Euclidean distance between the two points in the plane.
    pub fn coordinate_gap(&self, other: &Position) -> f64 {
        let dr = other.r - self.r;
        let dtheta = other.theta - self.theta;
        (dr * dr + dtheta * dtheta).sqrt()
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.2}, {:.2})", self.r, self.theta)
    }
}

/// The eight compass points a movement command can resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Compass {
    N,
    NE,
    E,
    SE,
    S,
    SW,
    W,
    NW,
}

impl Compass {
    pub const ALL: [Compass; 8] = [
        Compass::N,
        Compass::NE,
        Compass::E,
        Compass::SE,
        Compass::S,
        Compass::SW,
        Compass::W,
        Compass::NW,
    ];

    /// Heading in degrees, counter-clockwise from east.
    pub fn degrees(&self) -> f64 {
        match self {
            Compass::E => 0.0,
            Compass::NE => 45.0,
            Compass::N => 90.0,
            Compass::NW => 135.0,
            Compass::W => 180.0,
            Compass::SW => 225.0,
            Compass::S => 270.0,
            Compass::SE => 315.0,
        }
    }

    pub fn radians(&self) -> f64 {
        self.degrees().to_radians()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Compass::N => "N",
            Compass::NE => "NE",
            Compass::E => "E",
            Compass::SE => "SE",
            Compass::S => "S",
            Compass::SW => "SW",
            Compass::W => "W",
            Compass::NW => "NW",
        }
    }
}

impl FromStr for Compass {
    type Err = WorldError;

    /// Parses the exact upper-case token.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Compass::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| WorldError::InvalidDirection(s.to_string()))
    }
}

impl std::fmt::Display for Compass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Convert a compass heading and step length into a polar delta.
///
/// Returns `(distance·cos θ, distance·sin θ)` and adds it to `(r, θ)` as if
/// both were linear coordinates. Not a true polar vector composition; callers
/// depend on this exact mapping.
pub fn to_delta(direction: Compass, distance: f64) -> (f64, f64) {
    let theta = direction.radians();
    (distance * theta.cos(), distance * theta.sin())
}

/// Clamp a raw step length into `[MIN_STEP, MAX_STEP]`.
pub fn clamp_step(distance: f64) -> f64 {
    distance.clamp(MIN_STEP, MAX_STEP)
}
