//! Core library for the Bing Bong metronome.
//!
//! The crate turns a BPM value into a steady stream of ticks and manages the
//! play/pause and tempo-edit state around it. Rendering, audio and haptics
//! stay outside: they consume ticks through the [`TickSink`] trait and read
//! [`Indicator`] snapshots to animate the control.

pub mod config;
pub mod edit;
pub mod engine;
pub mod error;
pub mod pulse;
pub mod schedule;
pub mod session;
pub mod sink;
pub mod tempo;

pub use config::{AppConfig, MetronomeConfig, SinkConfig};
pub use edit::{EditSession, StagePolicy};
pub use engine::{EngineState, MetronomeEngine};
pub use error::{MetronomeError, Result};
pub use pulse::{ControlIcon, Indicator, Pulse, PULSE_SWING_DEGREES};
pub use schedule::{Tick, TickSchedule};
pub use session::MetronomeSession;
pub use sink::{ChannelSink, FnSink, NullSink, TickSink};
pub use tempo::{tick_interval, BpmRange, TempoModel};
