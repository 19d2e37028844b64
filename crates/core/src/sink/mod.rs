use std::fmt;
use std::sync::mpsc::{self, Receiver, Sender};

use crate::{Result, Tick};

/// Consumer of tick events: audio click, haptic pulse, or anything else.
///
/// Sinks run on the engine's dispatch thread, never on the thread that owns
/// the tempo state. A sink that touches UI state must marshal back to the UI
/// thread itself; [`ChannelSink`] does exactly that.
pub trait TickSink: Send {
    /// Called once per tick, in schedule order, never concurrently.
    fn on_tick(&mut self, tick: &Tick);

    /// Whether [`TickSink::prepare`] does real work. While it runs the engine
    /// reports [`EngineState::Starting`](crate::EngineState::Starting).
    fn needs_preparation(&self) -> bool {
        false
    }

    /// Initialises the backend. Runs on the dispatch thread before the first
    /// tick of a playback run. A failure silences ticks for that run.
    ///
    /// The first tick is scheduled one interval after this returns. It must
    /// return eventually: a call that never does keeps the dispatch thread
    /// alive, and dropping the engine then detaches that thread instead of
    /// joining it.
    fn prepare(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Sink that drops every tick.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl TickSink for NullSink {
    fn on_tick(&mut self, _tick: &Tick) {}
}

/// Forwards ticks over a channel to whichever thread owns the receiver.
#[derive(Debug)]
pub struct ChannelSink {
    tx: Sender<Tick>,
}

impl ChannelSink {
    pub fn new() -> (Self, Receiver<Tick>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx }, rx)
    }
}

impl TickSink for ChannelSink {
    fn on_tick(&mut self, tick: &Tick) {
        if self.tx.send(*tick).is_err() {
            tracing::trace!(sequence = tick.sequence, "tick receiver dropped");
        }
    }
}

/// Adapts a closure into a sink.
pub struct FnSink<F> {
    f: F,
}

impl<F> FnSink<F>
where
    F: FnMut(&Tick) + Send,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> TickSink for FnSink<F>
where
    F: FnMut(&Tick) + Send,
{
    fn on_tick(&mut self, tick: &Tick) {
        (self.f)(tick)
    }
}

impl<F> fmt::Debug for FnSink<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnSink").finish()
    }
}
