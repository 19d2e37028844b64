use std::fmt;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::{
    tick_interval, ControlIcon, Indicator, MetronomeError, Pulse, Result, TempoModel, Tick,
    TickSchedule, TickSink,
};

/// Playback state of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineState {
    #[default]
    Stopped,
    /// The sink is still being prepared. Toggles are rejected until it
    /// finishes.
    Starting,
    Playing,
}

impl EngineState {
    /// True for both `Starting` and `Playing`.
    pub fn is_active(&self) -> bool {
        !matches!(self, EngineState::Stopped)
    }
}

/// Converts a tempo into a periodic stream of ticks delivered to a
/// [`TickSink`].
///
/// All public methods are synchronous and return without waiting on a tick.
/// Two background threads do the work: a scheduler per playback run that
/// sleeps until each absolute deadline, and a long-lived dispatcher that
/// invokes the sink. A slow sink therefore delays delivery but never the
/// schedule.
pub struct MetronomeEngine {
    shared: Arc<Shared>,
    dispatch_tx: Option<Sender<Dispatch>>,
    dispatcher: Option<JoinHandle<()>>,
    run: Option<Sender<RunControl>>,
}

impl MetronomeEngine {
    pub fn new(sink: impl TickSink + 'static) -> Result<Self> {
        Self::with_boxed_sink(Box::new(sink))
    }

    pub fn with_boxed_sink(sink: Box<dyn TickSink>) -> Result<Self> {
        let shared = Arc::new(Shared {
            gate: Mutex::new(Gate {
                generation: 0,
                needs_preparation: sink.needs_preparation(),
                sink: Some(sink),
                silenced: false,
            }),
            status: Mutex::new(Status::default()),
        });
        let (dispatch_tx, dispatch_rx) = mpsc::channel();
        let dispatcher = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("bingbong-dispatch".to_string())
                .spawn(move || dispatch_loop(&shared, dispatch_rx))?
        };

        Ok(Self {
            shared,
            dispatch_tx: Some(dispatch_tx),
            dispatcher: Some(dispatcher),
            run: None,
        })
    }

    pub fn state(&self) -> EngineState {
        self.shared.status().state
    }

    /// True while ticks are being produced, including the `Starting` phase.
    pub fn is_playing(&self) -> bool {
        self.state().is_active()
    }

    /// Interval of the current playback run. Fixed at start.
    pub fn interval(&self) -> Option<Duration> {
        self.shared.status().schedule.map(|s| s.interval())
    }

    /// BPM captured when the current run started.
    pub fn running_bpm(&self) -> Option<u32> {
        let status = self.shared.status();
        status.schedule.map(|_| status.bpm)
    }

    /// False after the sink failed to prepare for the current run.
    pub fn sink_available(&self) -> bool {
        self.shared.status().sink_available
    }

    /// Starts when stopped, stops when playing. Returns the new state.
    pub fn toggle(&mut self, tempo: &TempoModel) -> Result<EngineState> {
        match self.state() {
            EngineState::Stopped => self.start(tempo)?,
            EngineState::Starting => return Err(MetronomeError::TogglePending),
            EngineState::Playing => self.stop()?,
        }
        Ok(self.state())
    }

    /// Begins a playback run at the model's current tempo. The first tick
    /// fires one full interval from now, or, for a sink that needs
    /// preparation, one full interval after preparation finishes. Does
    /// nothing if already running.
    pub fn start(&mut self, tempo: &TempoModel) -> Result<()> {
        if self.state().is_active() {
            return Ok(());
        }

        let bpm = tempo.bpm();
        let interval = tick_interval(bpm).map_err(|_| tempo.range().invalid(i64::from(bpm)))?;
        let dispatch_tx = self
            .dispatch_tx
            .clone()
            .ok_or_else(|| MetronomeError::msg("dispatcher has shut down"))?;

        let schedule = TickSchedule::new(Instant::now(), interval);
        let (generation, needs_preparation) = {
            let mut gate = self.shared.lock_gate()?;
            gate.generation += 1;
            gate.silenced = false;
            let needs_preparation = gate.needs_preparation;

            let mut status = self.shared.status();
            status.state = if needs_preparation {
                EngineState::Starting
            } else {
                EngineState::Playing
            };
            status.schedule = Some(schedule);
            status.bpm = bpm;
            status.sink_available = true;
            (gate.generation, needs_preparation)
        };

        let (control_tx, control_rx) = mpsc::channel();
        if needs_preparation {
            // the scheduler idles until the dispatcher sends the real origin
            let _ = dispatch_tx.send(Dispatch::Prepare {
                generation,
                begin: control_tx.clone(),
            });
        }

        let spawned = thread::Builder::new()
            .name("bingbong-scheduler".to_string())
            .spawn(move || {
                let run = Run {
                    generation,
                    bpm,
                    interval,
                    awaiting_begin: needs_preparation,
                };
                schedule_loop(run, schedule, &control_rx, &dispatch_tx)
            });
        if let Err(err) = spawned {
            self.stop()?;
            return Err(err.into());
        }
        self.run = Some(control_tx);

        tracing::debug!(
            bpm,
            interval_ms = interval.as_secs_f64() * 1000.0,
            generation,
            needs_preparation,
            "metronome started"
        );
        Ok(())
    }

    /// Halts tick emission. Once this returns the sink sees no further tick
    /// from the stopped run.
    ///
    /// If the sink is inside [`TickSink::on_tick`] at that moment, `stop`
    /// waits for that one call to return. It never waits on the scheduler's
    /// sleep or on [`TickSink::prepare`]. Sinks should hand work off quickly,
    /// as [`ChannelSink`](crate::ChannelSink) does.
    pub fn stop(&mut self) -> Result<()> {
        if !self.state().is_active() && self.run.is_none() {
            return Ok(());
        }

        let generation = {
            // holding the gate waits out a tick that is mid-delivery
            let mut gate = self.shared.lock_gate()?;
            gate.generation += 1;
            let mut status = self.shared.status();
            status.state = EngineState::Stopped;
            status.schedule = None;
            gate.generation
        };

        if let Some(control) = self.run.take() {
            let _ = control.send(RunControl::Stop);
        }

        tracing::debug!(generation, "metronome stopped");
        Ok(())
    }

    /// Visual pulse of the current run.
    pub fn pulse(&self) -> Option<Pulse> {
        let status = self.shared.status();
        match status.state {
            EngineState::Playing => status.schedule.map(Pulse::new),
            _ => None,
        }
    }

    /// Snapshot for the renderer at `now`.
    pub fn indicator(&self, now: Instant) -> Indicator {
        let state = self.state();
        match self.pulse() {
            Some(pulse) => Indicator {
                playing: true,
                phase: pulse.phase_at_instant(now),
                angle_degrees: pulse.angle_degrees_at_instant(now),
                icon: ControlIcon::for_state(state),
            },
            None => Indicator {
                icon: ControlIcon::for_state(state),
                ..Indicator::idle()
            },
        }
    }
}

impl Drop for MetronomeEngine {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            tracing::warn!(%err, "failed to stop metronome on drop");
        }
        self.dispatch_tx.take();

        // a sink stuck in prepare would hang the join, so leave the
        // dispatcher to finish on its own
        let preparing = self.shared.status().preparing;
        if preparing {
            tracing::debug!("sink still preparing, detaching dispatcher");
            self.dispatcher.take();
            return;
        }
        if let Some(handle) = self.dispatcher.take() {
            if handle.join().is_err() {
                tracing::warn!("tick dispatcher panicked");
            }
        }
    }
}

impl fmt::Debug for MetronomeEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = self.shared.status();
        f.debug_struct("MetronomeEngine")
            .field("state", &status.state)
            .field("bpm", &status.bpm)
            .field("sink_available", &status.sink_available)
            .finish()
    }
}

enum Dispatch {
    Prepare {
        generation: u64,
        begin: Sender<RunControl>,
    },
    Tick(Tick),
}

enum RunControl {
    /// Preparation finished: schedule from this origin.
    Begin(Instant),
    Stop,
}

/// Fixed parameters of one playback run.
struct Run {
    generation: u64,
    bpm: u32,
    interval: Duration,
    awaiting_begin: bool,
}

struct Gate {
    generation: u64,
    /// Lent out to the dispatcher while it prepares, so a slow backend never
    /// holds the gate.
    sink: Option<Box<dyn TickSink>>,
    needs_preparation: bool,
    silenced: bool,
}

#[derive(Debug, Clone, Copy)]
struct Status {
    state: EngineState,
    schedule: Option<TickSchedule>,
    bpm: u32,
    sink_available: bool,
    preparing: bool,
}

impl Default for Status {
    fn default() -> Self {
        Self {
            state: EngineState::Stopped,
            schedule: None,
            bpm: 0,
            sink_available: true,
            preparing: false,
        }
    }
}

/// Lock order is always gate, then status.
struct Shared {
    gate: Mutex<Gate>,
    status: Mutex<Status>,
}

impl Shared {
    fn lock_gate(&self) -> Result<MutexGuard<'_, Gate>> {
        self.gate
            .lock()
            .map_err(|_| MetronomeError::msg("tick sink has been poisoned"))
    }

    fn status(&self) -> MutexGuard<'_, Status> {
        // status is plain data, a panic elsewhere cannot leave it torn
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn schedule_loop(
    run: Run,
    mut schedule: TickSchedule,
    control: &Receiver<RunControl>,
    dispatch: &Sender<Dispatch>,
) {
    let generation = run.generation;
    if run.awaiting_begin {
        match control.recv() {
            Ok(RunControl::Begin(origin)) => schedule = TickSchedule::new(origin, run.interval),
            Ok(RunControl::Stop) | Err(_) => {
                tracing::trace!(generation, "run stopped before it began");
                return;
            }
        }
    }

    let mut sequence = 1_u64;
    loop {
        let wait = schedule.wait_for(sequence, Instant::now());
        match control.recv_timeout(wait) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(_) | Err(RecvTimeoutError::Disconnected) => break,
        }

        let scheduled_at = schedule.deadline(sequence);
        let lateness = Instant::now().saturating_duration_since(scheduled_at);
        if lateness > schedule.interval() {
            tracing::warn!(sequence, ?lateness, "scheduler woke more than one interval late");
        }

        let tick = Tick {
            sequence,
            generation,
            bpm: run.bpm,
            scheduled_at,
        };
        if dispatch.send(Dispatch::Tick(tick)).is_err() {
            break;
        }
        sequence += 1;
    }
    tracing::trace!(generation, ticks = sequence - 1, "scheduler exited");
}

fn dispatch_loop(shared: &Shared, rx: Receiver<Dispatch>) {
    for message in rx {
        let Ok(mut gate) = shared.gate.lock() else {
            tracing::warn!("tick sink poisoned, dispatcher exiting");
            return;
        };

        match message {
            Dispatch::Prepare { generation, begin } => {
                if gate.generation != generation {
                    continue;
                }
                let Some(mut sink) = gate.sink.take() else {
                    continue;
                };
                shared.status().preparing = true;
                drop(gate);

                let outcome = sink.prepare();

                let Ok(mut gate) = shared.gate.lock() else {
                    tracing::warn!("tick sink poisoned, dispatcher exiting");
                    return;
                };
                gate.sink = Some(sink);
                shared.status().preparing = false;
                if gate.generation != generation {
                    tracing::debug!(generation, "run stopped while the sink was preparing");
                    continue;
                }

                let available = match outcome {
                    Ok(()) => true,
                    Err(err) => {
                        let err = MetronomeError::SinkUnavailable(err.to_string());
                        tracing::warn!(%err, "ticks will be silent for this run");
                        false
                    }
                };
                gate.silenced = !available;

                let origin = Instant::now();
                let mut status = shared.status();
                status.sink_available = available;
                if status.state == EngineState::Starting {
                    status.state = EngineState::Playing;
                }
                if let Some(schedule) = status.schedule {
                    status.schedule = Some(TickSchedule::new(origin, schedule.interval()));
                }
                // still under the gate, so a concurrent stop cannot slip in
                // between the generation check and this send
                let _ = begin.send(RunControl::Begin(origin));
            }
            Dispatch::Tick(tick) => {
                if gate.generation != tick.generation {
                    tracing::trace!(sequence = tick.sequence, "dropping tick from a stopped run");
                    continue;
                }
                if gate.silenced {
                    continue;
                }
                if let Some(sink) = gate.sink.as_mut() {
                    sink.on_tick(&tick);
                }
            }
        }
    }
}
