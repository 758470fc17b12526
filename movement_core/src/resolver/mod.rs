//! Resolvers - turn command text into a destination scene or a compass step.
//!
//! Both resolvers swallow oracle failures: an oracle that times out, errors or
//! answers nonsense simply yields `None`. Only store faults propagate.

mod destination;
mod direction;

pub use destination::*;
pub use direction::*;

use crate::config::OracleConfig;

/// Sampling parameters for the two prompt contracts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PromptSettings {
    pub destination_temperature: f32,
    pub destination_max_tokens: u32,
    pub direction_temperature: f32,
    pub direction_max_tokens: u32,
}

impl Default for PromptSettings {
    fn default() -> Self {
        Self::from(&OracleConfig::default())
    }
}

impl From<&OracleConfig> for PromptSettings {
    fn from(config: &OracleConfig) -> Self {
        Self {
            destination_temperature: config.destination_temperature,
            destination_max_tokens: config.destination_max_tokens,
            direction_temperature: config.direction_temperature,
            direction_max_tokens: config.direction_max_tokens,
        }
    }
}
