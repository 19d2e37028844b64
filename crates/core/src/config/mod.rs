use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{BpmRange, MetronomeError, Result, StagePolicy};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub metronome: MetronomeConfig,
}

impl AppConfig {
    /// Parses a JSON document. Missing fields fall back to their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        tracing::debug!(path = %path.display(), "loaded configuration file");
        Self::from_json_str(&text)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.metronome.validate()
    }
}

/// Options recognised by the tempo core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetronomeConfig {
    pub bpm_range: BpmRange,
    pub initial_bpm: u32,
    pub stage_policy: StagePolicy,
    pub sink: SinkConfig,
}

impl Default for MetronomeConfig {
    fn default() -> Self {
        Self {
            bpm_range: BpmRange::default(),
            initial_bpm: 120,
            stage_policy: StagePolicy::default(),
            sink: SinkConfig::default(),
        }
    }
}

impl MetronomeConfig {
    pub fn validate(&self) -> Result<()> {
        self.bpm_range.validate()?;
        let BpmRange { min, max } = self.bpm_range;
        if !self.bpm_range.contains(i64::from(self.initial_bpm)) {
            return Err(MetronomeError::InvalidConfig(format!(
                "initial_bpm {} is outside {min}..={max}",
                self.initial_bpm
            )));
        }
        Ok(())
    }
}

/// Settings owned entirely by the tick sink. The engine never reads them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    pub haptic_enabled: bool,
    pub audio_asset_id: String,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            haptic_enabled: true,
            audio_asset_id: "tick".to_string(),
        }
    }
}
