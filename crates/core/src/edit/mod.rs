use serde::{Deserialize, Serialize};

use crate::{BpmRange, MetronomeError, Result, TempoModel};

/// How [`EditSession::set_staged`] treats values outside the range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StagePolicy {
    /// Pin to the nearest bound. Dial input should never fail mid-gesture.
    #[default]
    Clamp,
    /// Refuse with [`MetronomeError::InvalidBpm`] and keep the staged value.
    Reject,
}

/// Scratch state while the BPM editor is presented.
///
/// The model is only written on [`commit`](EditSession::commit); cancelling
/// therefore never has to restore anything.
#[derive(Debug, Clone)]
pub struct EditSession {
    range: BpmRange,
    policy: StagePolicy,
    staged_bpm: u32,
    original_bpm: u32,
    active: bool,
}

impl EditSession {
    /// Fails with [`MetronomeError::InvalidConfig`] when `range` is empty or
    /// starts at zero.
    pub fn new(range: BpmRange, policy: StagePolicy) -> Result<Self> {
        range.validate()?;
        Ok(Self {
            range,
            policy,
            staged_bpm: range.min,
            original_bpm: range.min,
            active: false,
        })
    }

    /// Snapshots `current_bpm`. The caller stops playback first.
    ///
    /// Calling again while active takes a fresh snapshot.
    pub fn begin(&mut self, current_bpm: u32) {
        self.original_bpm = current_bpm;
        self.staged_bpm = current_bpm;
        self.active = true;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn staged_bpm(&self) -> u32 {
        self.staged_bpm
    }

    pub fn original_bpm(&self) -> u32 {
        self.original_bpm
    }

    pub fn policy(&self) -> StagePolicy {
        self.policy
    }

    /// Updates the staged value according to the configured policy and
    /// returns what was staged.
    pub fn set_staged(&mut self, value: i64) -> Result<u32> {
        self.ensure_active()?;
        self.staged_bpm = match self.policy {
            StagePolicy::Clamp => self.range.clamp(value),
            StagePolicy::Reject => self.range.check(value)?,
        };
        Ok(self.staged_bpm)
    }

    /// Moves the staged value by whole detents, as a crown or dial does.
    /// Always clamps.
    pub fn nudge(&mut self, detents: i32) -> Result<u32> {
        self.ensure_active()?;
        let target = i64::from(self.staged_bpm) + i64::from(detents);
        self.staged_bpm = self.range.clamp(target);
        Ok(self.staged_bpm)
    }

    /// Writes the staged value into `tempo` and closes the session.
    pub fn commit(&mut self, tempo: &mut TempoModel) -> Result<u32> {
        self.ensure_active()?;
        tempo.set_bpm(i64::from(self.staged_bpm))?;
        self.active = false;
        tracing::info!(
            from = self.original_bpm,
            to = self.staged_bpm,
            "tempo committed"
        );
        Ok(self.staged_bpm)
    }

    /// Discards the staged value. The model was never written.
    pub fn cancel(&mut self) -> Result<()> {
        self.ensure_active()?;
        self.staged_bpm = self.original_bpm;
        self.active = false;
        tracing::debug!(kept = self.original_bpm, "tempo edit cancelled");
        Ok(())
    }

    fn ensure_active(&self) -> Result<()> {
        if self.active {
            Ok(())
        } else {
            Err(MetronomeError::NoEditSession)
        }
    }
}
