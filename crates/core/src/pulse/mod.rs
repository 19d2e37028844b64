use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::{EngineState, TickSchedule};

/// Peak rotation of the play control while pulsing.
pub const PULSE_SWING_DEGREES: f32 = 60.0;

/// Glyph shown on the play/pause control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlIcon {
    Play,
    Playing,
}

impl ControlIcon {
    pub fn for_state(state: EngineState) -> Self {
        if state.is_active() {
            ControlIcon::Playing
        } else {
            ControlIcon::Play
        }
    }

    /// Symbol name on the watch face.
    pub fn symbol_name(&self) -> &'static str {
        match self {
            ControlIcon::Play => "play.fill",
            ControlIcon::Playing => "play",
        }
    }
}

/// Auto-reversing sweep that spends one tick interval travelling in each
/// direction.
#[derive(Debug, Clone, Copy)]
pub struct Pulse {
    schedule: TickSchedule,
}

impl Pulse {
    pub fn new(schedule: TickSchedule) -> Self {
        Self { schedule }
    }

    /// Triangle wave in `[0, 1]`: 0 at every even tick, 1 at every odd one.
    pub fn phase_at(&self, elapsed: Duration) -> f32 {
        let interval = self.schedule.interval().as_secs_f64();
        if interval <= 0.0 {
            return 0.0;
        }
        let cycle = (elapsed.as_secs_f64() / interval) % 2.0;
        let phase = if cycle <= 1.0 { cycle } else { 2.0 - cycle };
        phase as f32
    }

    pub fn angle_degrees_at(&self, elapsed: Duration) -> f32 {
        self.phase_at(elapsed) * PULSE_SWING_DEGREES
    }

    pub fn phase_at_instant(&self, now: Instant) -> f32 {
        self.phase_at(self.schedule.elapsed_at(now))
    }

    pub fn angle_degrees_at_instant(&self, now: Instant) -> f32 {
        self.angle_degrees_at(self.schedule.elapsed_at(now))
    }
}

/// What the renderer needs to draw the control for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Indicator {
    pub playing: bool,
    pub phase: f32,
    pub angle_degrees: f32,
    pub icon: ControlIcon,
}

impl Indicator {
    pub fn idle() -> Self {
        Self {
            playing: false,
            phase: 0.0,
            angle_degrees: 0.0,
            icon: ControlIcon::Play,
        }
    }
}

impl Default for Indicator {
    fn default() -> Self {
        Self::idle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pulse(interval_ms: u64) -> Pulse {
        Pulse::new(TickSchedule::new(
            Instant::now(),
            Duration::from_millis(interval_ms),
        ))
    }

    #[test]
    fn sweeps_out_and_back_over_two_ticks() {
        let pulse = pulse(500);
        assert_eq!(pulse.phase_at(Duration::ZERO), 0.0);
        assert!((pulse.phase_at(Duration::from_millis(250)) - 0.5).abs() < 1e-6);
        assert!((pulse.phase_at(Duration::from_millis(500)) - 1.0).abs() < 1e-6);
        assert!((pulse.phase_at(Duration::from_millis(750)) - 0.5).abs() < 1e-6);
        assert!(pulse.phase_at(Duration::from_millis(1000)) < 1e-6);
    }

    #[test]
    fn angle_peaks_at_sixty_degrees() {
        let pulse = pulse(200);
        let peak = pulse.angle_degrees_at(Duration::from_millis(200));
        assert!((peak - 60.0).abs() < 1e-4);
    }

    #[test]
    fn icon_tracks_engine_state() {
        assert_eq!(ControlIcon::for_state(EngineState::Stopped), ControlIcon::Play);
        assert_eq!(ControlIcon::for_state(EngineState::Playing), ControlIcon::Playing);
        assert_eq!(ControlIcon::Play.symbol_name(), "play.fill");
    }
}
