//! Configuration for movement resolution, oracles and storage.
//!
//! Everything has a default, so an empty TOML document is a valid config:
//!
//! ```toml
//! [movement]
//! similarity_floor = 0.6
//! nearby_radius = 2.0
//!
//! [oracle]
//! base_url = "http://localhost:11434"
//! api_key_env = "WANDERER_ORACLE_KEY"
//!
//! [store]
//! world_path = "world.json"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WandererConfig {
    pub movement: MovementConfig,
    pub oracle: OracleConfig,
    pub store: StoreConfig,
}

impl WandererConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.movement.validate()?;
        self.oracle.validate()
    }
}

/// Thresholds used while resolving a movement command.
///
/// Step lengths are fixed to `[MIN_STEP, MAX_STEP]` and are not part of
/// this table; unknown keys are rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MovementConfig {
    /// Minimum cosine similarity for a semantic destination match.
    pub similarity_floor: f32,

    /// How many substring matches to fetch in the text fallback.
    pub text_fallback_limit: usize,

    /// Half-width of the box searched for nearby scenes after a step.
    pub nearby_radius: f64,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            similarity_floor: 0.6,
            text_fallback_limit: 5,
            nearby_radius: 2.0,
        }
    }
}

impl MovementConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(-1.0..=1.0).contains(&self.similarity_floor) {
            return Err(ConfigError::Invalid(format!(
                "similarity_floor must be within [-1, 1], got {}",
                self.similarity_floor
            )));
        }
        if self.text_fallback_limit == 0 {
            return Err(ConfigError::Invalid("text_fallback_limit must be > 0".to_string()));
        }
        if !(self.nearby_radius > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "nearby_radius must be > 0, got {}",
                self.nearby_radius
            )));
        }
        Ok(())
    }
}

/// Connection settings for the OpenAI-compatible oracle endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub base_url: String,
    pub chat_model: String,
    pub embedding_model: String,

    /// Name of the environment variable holding the bearer key.
    /// The key itself never lives in the config file.
    pub api_key_env: Option<String>,

    pub timeout_secs: u64,

    pub destination_temperature: f32,
    pub destination_max_tokens: u32,
    pub direction_temperature: f32,
    pub direction_max_tokens: u32,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            chat_model: "deepseek-ai/DeepSeek-V3".to_string(),
            embedding_model: "sentence-transformers/paraphrase-mpnet-base-v2".to_string(),
            api_key_env: None,
            timeout_secs: 30,
            destination_temperature: 0.1,
            destination_max_tokens: 50,
            direction_temperature: 0.3,
            direction_max_tokens: 10,
        }
    }
}

impl OracleConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Resolve the bearer key from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        self.api_key_env
            .as_deref()
            .and_then(|name| std::env::var(name).ok())
            .filter(|key| !key.is_empty())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.is_empty() {
            return Err(ConfigError::Invalid("oracle base_url cannot be empty".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid("oracle timeout_secs must be > 0".to_string()));
        }
        Ok(())
    }
}

/// Where the world snapshot lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub world_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            world_path: PathBuf::from("world.json"),
        }
    }
}
