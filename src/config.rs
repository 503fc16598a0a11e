/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{tune, EvalWeights};

/// Search settings used when a caller does not supply its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchDefaults {
    /// Maximum depth of each search.
    pub depth: usize,

    /// Milliseconds each search may spend.
    pub movetime_ms: u64,

    /// Whether to skip searching and play glitched moves.
    pub glitch: bool,
}

impl Default for SearchDefaults {
    fn default() -> Self {
        Self {
            depth: tune::default_depth!(),
            movetime_ms: tune::default_movetime_ms!(),
            glitch: false,
        }
    }
}

/// Every tunable setting of the engine.
///
/// Any field left out of a config file takes its default value, so `{}` is a valid config.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub search: SearchDefaults,
    pub eval: EvalWeights,
}

impl EngineConfig {
    /// Parses a config from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse engine config")
    }

    /// Reads and parses a JSON config file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read engine config at {}", path.display()))?;

        let config = Self::from_json(&contents)?;
        info!("Loaded engine config from {}", path.display());
        Ok(config)
    }

    /// Serializes this config as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PieceKind;

    #[test]
    fn test_empty_config_is_default() {
        let config = EngineConfig::from_json("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.search.depth, 4);
    }

    #[test]
    fn test_partial_config() {
        let json = r#"{ "search": { "glitch": true }, "eval": { "mobility": 0 } }"#;
        let config = EngineConfig::from_json(json).unwrap();
        assert!(config.search.glitch);
        assert_eq!(config.search.movetime_ms, 2_000);
        assert_eq!(config.eval.mobility, 0);
        assert_eq!(
            config.eval.value_of(PieceKind::Queen),
            PieceKind::Queen.value()
        );
    }

    #[test]
    fn test_round_trip_and_errors() {
        let config = EngineConfig::default();
        let json = config.to_json().unwrap();
        assert_eq!(EngineConfig::from_json(&json).unwrap(), config);

        assert!(EngineConfig::from_json("{ \"search\": 5 }").is_err());
        assert!(EngineConfig::from_path("/definitely/not/a/config.json").is_err());
    }
}
