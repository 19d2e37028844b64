// Integration tests: tick cadence and cancellation
//
// These run against the real clock. Tolerances are loose enough for a busy CI
// machine while still catching drift or a missed stop.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use bingbong_core::{
    BpmRange, ChannelSink, EngineState, FnSink, MetronomeEngine, TempoModel, Tick, TickSink,
};

const JITTER: Duration = Duration::from_millis(40);

fn tempo(bpm: u32) -> TempoModel {
    TempoModel::new(bpm, BpmRange::default()).unwrap()
}

fn abs_diff(a: Instant, b: Instant) -> Duration {
    if a > b {
        a - b
    } else {
        b - a
    }
}

#[test]
fn test_ticks_follow_absolute_deadlines() {
    const BPM: u32 = 300;
    const TICKS: usize = 12;

    let (sink, rx) = ChannelSink::new();
    let mut engine = MetronomeEngine::new(sink).unwrap();
    let started = Instant::now();
    engine.start(&tempo(BPM)).unwrap();

    let mut received = Vec::with_capacity(TICKS);
    for _ in 0..TICKS {
        let tick = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        received.push((tick, Instant::now()));
    }
    engine.stop().unwrap();

    let interval = Duration::from_secs(60) / BPM;
    for (index, (tick, arrived)) in received.iter().enumerate() {
        assert_eq!(tick.sequence, index as u64 + 1);
        assert_eq!(tick.bpm, BPM);

        // deadline k sits k intervals after start, no matter how late earlier
        // wakeups were
        let expected = started + interval * (index as u32 + 1);
        assert!(
            abs_diff(tick.scheduled_at, expected) < JITTER,
            "tick {} scheduled {:?} away from its deadline",
            tick.sequence,
            abs_diff(tick.scheduled_at, expected)
        );
        assert!(
            abs_diff(*arrived, expected) < JITTER,
            "tick {} arrived {:?} away from its deadline",
            tick.sequence,
            abs_diff(*arrived, expected)
        );
    }

    for pair in received.windows(2) {
        let gap = pair[1].0.scheduled_at - pair[0].0.scheduled_at;
        assert!(abs_diff(started + gap, started + interval) < Duration::from_millis(1));
    }
}

#[test]
fn test_first_tick_waits_a_full_interval() {
    let (sink, rx) = ChannelSink::new();
    let mut engine = MetronomeEngine::new(sink).unwrap();
    let started = Instant::now();
    engine.start(&tempo(120)).unwrap();

    let _tick = rx.recv_timeout(Duration::from_secs(2)).unwrap();
    let elapsed = started.elapsed();
    engine.stop().unwrap();

    assert!(
        elapsed + Duration::from_millis(5) >= Duration::from_millis(500),
        "first tick after {elapsed:?}"
    );
}

#[test]
fn test_toggle_twice_leaves_engine_stopped() {
    let (sink, rx) = ChannelSink::new();
    let mut engine = MetronomeEngine::new(sink).unwrap();
    let tempo = tempo(240);

    engine.toggle(&tempo).unwrap();
    engine.toggle(&tempo).unwrap();
    assert_eq!(engine.state(), EngineState::Stopped);

    thread::sleep(Duration::from_millis(400));
    assert_eq!(rx.try_iter().count(), 0);
}

#[test]
fn test_slow_sink_does_not_shift_schedule() {
    let stamps: Arc<Mutex<Vec<Tick>>> = Arc::default();
    let sink = {
        let stamps = Arc::clone(&stamps);
        FnSink::new(move |tick: &Tick| {
            // slower than the interval on the first tick only
            if tick.sequence == 1 {
                thread::sleep(Duration::from_millis(350));
            }
            stamps.lock().unwrap().push(*tick);
        })
    };

    let mut engine = MetronomeEngine::new(sink).unwrap();
    let started = Instant::now();
    engine.start(&tempo(300)).unwrap();
    thread::sleep(Duration::from_millis(1300));
    engine.stop().unwrap();

    let stamps = stamps.lock().unwrap();
    assert!(stamps.len() >= 4, "only {} ticks delivered", stamps.len());
    let interval = Duration::from_millis(200);
    for (index, tick) in stamps.iter().enumerate() {
        assert_eq!(tick.sequence, index as u64 + 1, "tick skipped");
        let expected = started + interval * (index as u32 + 1);
        assert!(abs_diff(tick.scheduled_at, expected) < JITTER);
    }
}

/// Records whether any tick reached it after the test flagged the stop.
struct FenceSink {
    stopped: Arc<AtomicBool>,
    late: Arc<AtomicU64>,
    delivered: Arc<AtomicU64>,
}

impl TickSink for FenceSink {
    fn on_tick(&mut self, _tick: &Tick) {
        // widen the window between the generation check and delivery
        thread::sleep(Duration::from_millis(3));
        if self.stopped.load(Ordering::SeqCst) {
            self.late.fetch_add(1, Ordering::SeqCst);
        }
        self.delivered.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_no_tick_observed_after_stop_returns() {
    let mut total_delivered = 0;
    for round in 0..20_u64 {
        let stopped = Arc::new(AtomicBool::new(false));
        let late = Arc::new(AtomicU64::new(0));
        let delivered = Arc::new(AtomicU64::new(0));
        let sink = FenceSink {
            stopped: Arc::clone(&stopped),
            late: Arc::clone(&late),
            delivered: Arc::clone(&delivered),
        };

        let mut engine = MetronomeEngine::new(sink).unwrap();
        engine.start(&tempo(420)).unwrap();
        // land the stop at a different offset into the tick cycle each round
        thread::sleep(Duration::from_millis(150 + round * 7));
        engine.stop().unwrap();
        stopped.store(true, Ordering::SeqCst);

        thread::sleep(Duration::from_millis(200));
        assert_eq!(
            late.load(Ordering::SeqCst),
            0,
            "round {round}: tick delivered after stop returned"
        );
        total_delivered += delivered.load(Ordering::SeqCst);
    }
    assert!(total_delivered > 0, "no round delivered a tick before stopping");
}

#[test]
fn test_restart_begins_a_fresh_run() {
    let (sink, rx) = ChannelSink::new();
    let mut engine = MetronomeEngine::new(sink).unwrap();

    engine.start(&tempo(400)).unwrap();
    let first = rx.recv_timeout(Duration::from_secs(2)).unwrap();
    engine.stop().unwrap();
    let _ = rx.try_iter().count();

    engine.start(&tempo(400)).unwrap();
    let second = rx.recv_timeout(Duration::from_secs(2)).unwrap();
    engine.stop().unwrap();

    assert_eq!(second.sequence, 1);
    assert!(second.generation > first.generation);
}
