use std::time::Instant;

use crate::{
    EditSession, EngineState, Indicator, MetronomeConfig, MetronomeEngine, MetronomeError,
    Result, TempoModel, TickSink,
};

/// Application root: owns the tempo and lends it to the engine and the
/// editor.
///
/// Every method runs on the thread that owns the session and returns without
/// waiting on a tick.
#[derive(Debug)]
pub struct MetronomeSession {
    tempo: TempoModel,
    engine: MetronomeEngine,
    edit: EditSession,
}

impl MetronomeSession {
    pub fn new(config: &MetronomeConfig, sink: impl TickSink + 'static) -> Result<Self> {
        config.validate()?;
        let tempo = TempoModel::new(config.initial_bpm, config.bpm_range)?;
        Ok(Self {
            tempo,
            engine: MetronomeEngine::new(sink)?,
            edit: EditSession::new(config.bpm_range, config.stage_policy)?,
        })
    }

    pub fn bpm(&self) -> u32 {
        self.tempo.bpm()
    }

    pub fn tempo(&self) -> &TempoModel {
        &self.tempo
    }

    pub fn engine(&self) -> &MetronomeEngine {
        &self.engine
    }

    pub fn edit(&self) -> &EditSession {
        &self.edit
    }

    pub fn state(&self) -> EngineState {
        self.engine.state()
    }

    pub fn is_playing(&self) -> bool {
        self.engine.is_playing()
    }

    pub fn is_editing(&self) -> bool {
        self.edit.is_active()
    }

    /// Play/pause. The control is hidden while the editor is presented, so a
    /// toggle there is refused.
    pub fn toggle(&mut self) -> Result<EngineState> {
        if self.edit.is_active() {
            return Err(MetronomeError::EditInProgress);
        }
        self.engine.toggle(&self.tempo)
    }

    /// Stops playback and opens the editor on the current tempo.
    pub fn begin_edit(&mut self) -> Result<u32> {
        self.engine.stop()?;
        self.edit.begin(self.tempo.bpm());
        Ok(self.edit.staged_bpm())
    }

    pub fn set_staged(&mut self, value: i64) -> Result<u32> {
        self.edit.set_staged(value)
    }

    pub fn nudge(&mut self, detents: i32) -> Result<u32> {
        self.edit.nudge(detents)
    }

    /// Applies the staged tempo. Playback stays stopped.
    pub fn commit_edit(&mut self) -> Result<u32> {
        self.edit.commit(&mut self.tempo)
    }

    /// Closes the editor without touching the tempo. Playback stays stopped.
    pub fn cancel_edit(&mut self) -> Result<()> {
        self.edit.cancel()
    }

    pub fn indicator(&self, now: Instant) -> Indicator {
        self.engine.indicator(now)
    }
}
