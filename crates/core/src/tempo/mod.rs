use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{MetronomeError, Result};

/// Inclusive range of BPM values accepted by the model and the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BpmRange {
    pub min: u32,
    pub max: u32,
}

impl Default for BpmRange {
    fn default() -> Self {
        Self { min: 1, max: 420 }
    }
}

impl BpmRange {
    pub fn contains(&self, value: i64) -> bool {
        value >= i64::from(self.min) && value <= i64::from(self.max)
    }

    /// Requires `1 <= min <= max`.
    pub fn validate(&self) -> Result<()> {
        if self.min == 0 {
            return Err(MetronomeError::InvalidConfig(
                "bpm_range.min must be at least 1".to_string(),
            ));
        }
        if self.min > self.max {
            return Err(MetronomeError::InvalidConfig(format!(
                "bpm_range.min ({}) is greater than bpm_range.max ({})",
                self.min, self.max
            )));
        }
        Ok(())
    }

    /// Pins `value` into the range. An inverted range pins to `max`.
    pub fn clamp(&self, value: i64) -> u32 {
        value.max(i64::from(self.min)).min(i64::from(self.max)) as u32
    }

    pub fn check(&self, value: i64) -> Result<u32> {
        if self.contains(value) {
            Ok(value as u32)
        } else {
            Err(self.invalid(value))
        }
    }

    pub(crate) fn invalid(&self, value: i64) -> MetronomeError {
        MetronomeError::InvalidBpm {
            value,
            min: self.min,
            max: self.max,
        }
    }
}

/// Interval between two ticks at the given tempo.
pub fn tick_interval(bpm: u32) -> Result<Duration> {
    if bpm == 0 {
        return Err(MetronomeError::InvalidBpm {
            value: 0,
            min: 1,
            max: u32::MAX,
        });
    }
    Ok(Duration::from_secs_f64(60.0 / f64::from(bpm)))
}

/// Current tempo of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempoModel {
    bpm: u32,
    range: BpmRange,
}

impl Default for TempoModel {
    fn default() -> Self {
        Self {
            bpm: 120,
            range: BpmRange::default(),
        }
    }
}

impl TempoModel {
    /// Creates a model, validating `range` and then `bpm` against it.
    pub fn new(bpm: u32, range: BpmRange) -> Result<Self> {
        range.validate()?;
        let bpm = range.check(i64::from(bpm))?;
        Ok(Self { bpm, range })
    }

    /// Skips validation so tests can reach states the constructor refuses.
    #[cfg(test)]
    pub(crate) fn unchecked(bpm: u32, range: BpmRange) -> Self {
        Self { bpm, range }
    }

    pub fn bpm(&self) -> u32 {
        self.bpm
    }

    pub fn range(&self) -> BpmRange {
        self.range
    }

    /// Stores `value` when it lies within the range. On failure the previous
    /// value is kept.
    ///
    /// A running engine keeps the interval it computed at start.
    pub fn set_bpm(&mut self, value: i64) -> Result<()> {
        self.bpm = self.range.check(value)?;
        Ok(())
    }

    pub fn interval(&self) -> Result<Duration> {
        tick_interval(self.bpm)
    }
}
