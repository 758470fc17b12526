//! Description embeddings and cosine similarity.

use serde::{Deserialize, Serialize};

use crate::error::{WorldError, WorldResult};

/// Width of every description embedding in the world.
pub const EMBEDDING_DIM: usize = 768;

/// A description vector of exactly [`EMBEDDING_DIM`] finite floats.
///
/// The length is checked on construction and on deserialization, so any
/// `Embedding` taking part in a comparison has the expected width.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f32>", into = "Vec<f32>")]
pub struct Embedding(Vec<f32>);

impl Embedding {
    /// Wrap a raw vector, rejecting the wrong width instead of padding it.
    pub fn new(values: Vec<f32>) -> WorldResult<Self> {
        if values.len() != EMBEDDING_DIM {
            return Err(WorldError::DimensionMismatch {
                expected: EMBEDDING_DIM,
                actual: values.len(),
            });
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(WorldError::NonFiniteEmbedding);
        }
        Ok(Self(values))
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<f32> {
        self.0
    }

    pub fn norm(&self) -> f32 {
        self.0.iter().map(|v| v * v).sum::<f32>().sqrt()
    }

    /// Scale to unit length. A zero vector is returned unchanged.
    pub fn normalized(mut self) -> Self {
        let norm = self.norm();
        if norm > 0.0 {
            for v in &mut self.0 {
                *v /= norm;
            }
        }
        self
    }

    /// Cosine similarity in `[-1, 1]`; 0.0 when either side is a zero vector.
    pub fn cosine_similarity(&self, other: &Embedding) -> f32 {
        cosine_similarity(&self.0, &other.0).unwrap_or(0.0)
    }
}

impl TryFrom<Vec<f32>> for Embedding {
    type Error = WorldError;

    fn try_from(values: Vec<f32>) -> Result<Self, Self::Error> {
        Embedding::new(values)
    }
}

impl From<Embedding> for Vec<f32> {
    fn from(embedding: Embedding) -> Self {
        embedding.0
    }
}

/// Cosine similarity over two raw slices of equal length.
///
/// Fails on a length mismatch. Returns `Ok(0.0)` if either vector has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> WorldResult<f32> {
    if a.len() != b.len() {
        return Err(WorldError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }
    Ok(dot / (norm_a.sqrt() * norm_b.sqrt()))
}
