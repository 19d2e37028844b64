use std::time::{Duration, Instant};

/// One pulse emitted by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    /// 1-based position within the current playback run.
    pub sequence: u64,
    /// Playback run that produced the tick. Bumped on every start and stop.
    pub generation: u64,
    pub bpm: u32,
    /// Deadline the tick was scheduled for.
    pub scheduled_at: Instant,
}

/// Absolute-deadline schedule for a single playback run.
///
/// Deadlines are derived from the run origin rather than re-armed from the
/// previous wakeup, so late wakeups never accumulate into tempo drift.
#[derive(Debug, Clone, Copy)]
pub struct TickSchedule {
    origin: Instant,
    interval: Duration,
}

impl TickSchedule {
    pub fn new(origin: Instant, interval: Duration) -> Self {
        Self { origin, interval }
    }

    pub fn origin(&self) -> Instant {
        self.origin
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Deadline of the `sequence`-th tick. The first tick lands one full
    /// interval after the origin.
    pub fn deadline(&self, sequence: u64) -> Instant {
        self.origin + self.interval.mul_f64(sequence as f64)
    }

    /// Time left until the `sequence`-th deadline, zero once it has passed.
    pub fn wait_for(&self, sequence: u64, now: Instant) -> Duration {
        self.deadline(sequence).saturating_duration_since(now)
    }

    /// Time elapsed since the origin, used by the visual pulse.
    pub fn elapsed_at(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.origin)
    }
}
