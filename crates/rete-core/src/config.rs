//! Engine configuration surface.
//!
//! A small, serializable knob set: which conflict-resolution strategy to
//! install by default, the Gambler's Bucket Brigade learning parameters, and
//! an optional cycle cap for [`crate::engine::InferenceEngine::run`].

use crate::conflict_resolution::StrategyKind;
use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Construction-time configuration for an [`crate::engine::InferenceEngine`].
///
/// Embedders that want file-based config can round-trip this through JSON;
/// the engine itself never touches the filesystem.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Starting weight assigned to a production the first time GBB sees it.
    pub initial_weight: f64,
    /// GBB learning rate applied in `provide_feedback`.
    pub learning_rate: f64,
    /// Floor a GBB weight can never drop below.
    pub epsilon: f64,
    /// Strategy installed by `InferenceEngine::new`/`with_config`.
    pub default_strategy: StrategyKind,
    /// Hard cap on recognize-act cycles per `run`; `None` means unlimited.
    pub max_cycles: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_weight: 1.0,
            learning_rate: 0.5,
            epsilon: 1e-3,
            default_strategy: StrategyKind::default(),
            max_cycles: None,
        }
    }
}

impl EngineConfig {
    /// Parses a config from a JSON string, falling back to [`Default`] for
    /// any field the document omits.
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a config from a JSON file on disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Serializes this config to a pretty-printed JSON string.
    pub fn to_json(&self) -> Result<String, EngineError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn with_strategy(mut self, strategy: StrategyKind) -> Self {
        self.default_strategy = strategy;
        self
    }

    pub fn with_max_cycles(mut self, max_cycles: u64) -> Self {
        self.max_cycles = Some(max_cycles);
        self
    }

    pub fn with_gbb_params(mut self, initial_weight: f64, learning_rate: f64, epsilon: f64) -> Self {
        self.initial_weight = initial_weight;
        self.learning_rate = learning_rate;
        self.epsilon = epsilon;
        self
    }
}
