//! Telemetry pipeline: queue bounds, rate limiting, retry and the
//! engine-to-sink path.

use std::sync::Arc;
use std::time::{Duration, Instant};

use thermocycler::adapters::time::{MonotonicClock, SimClock};
use thermocycler::app::events::{CycleRecord, RecordKind, status_text, zero_duration};
use thermocycler::app::ports::TransitionObserver;
use thermocycler::config::SystemConfig;
use thermocycler::cycle::{CycleEngine, CycleSettings};
use thermocycler::safety::SafetyPolicy;
use thermocycler::telemetry::notify::NotifyCategory;
use thermocycler::telemetry::queue::{QUEUE_CAPACITY, RecordQueue};
use thermocycler::telemetry::worker::{DeliveryWorker, PollOutcome, TelemetryProducer};

use crate::mock_hw::{Board, Inbox, RecordLog, RecordingSink, Script, StdDelay};

fn record(index: u32) -> CycleRecord {
    CycleRecord {
        kind: RecordKind::HeatToCool,
        status: status_text(RecordKind::HeatToCool.label()),
        temperature_c: Some(80.0),
        cycle_index: index,
        cycle_limit: 0,
        top_setpoint_c: 80.0,
        bottom_setpoint_c: 25.0,
        phase_duration: zero_duration(),
        cycle_duration: zero_duration(),
        timestamp_ms: 0,
    }
}

#[test]
fn burst_while_delivery_fails_stays_bounded_and_rate_limited() {
    let clock = SimClock::new();
    let queue = Arc::new(RecordQueue::new());
    let sink = RecordingSink::new(&clock, true);
    let mut worker = DeliveryWorker::new(
        Arc::clone(&queue),
        sink.clone(),
        Inbox::default(),
        clock.clone(),
        clock.clone(),
        &SystemConfig::default(),
    );

    for i in 0..25 {
        let _ = queue.submit(record(i));
        assert!(queue.len() <= QUEUE_CAPACITY);
    }
    let stats = queue.stats().snapshot();
    assert_eq!(stats.submitted, 25);
    assert!(stats.evicted > 0);

    for _ in 0..200 {
        if worker.poll_once() == PollOutcome::Idle {
            break;
        }
    }
    assert!(queue.is_empty());

    let firsts = sink.first_attempts();
    assert!(firsts.len() > 1);
    for pair in firsts.windows(2) {
        assert!(pair[1] - pair[0] >= 2000, "first attempts {pair:?} closer than 2 s");
    }
    let stats = queue.stats().snapshot();
    assert_eq!(stats.failed as usize, firsts.len());
    assert_eq!(stats.delivered, 0);
    assert_eq!(stats.last_success_ms, None);
}

#[test]
fn eviction_keeps_newest_records() {
    let queue = RecordQueue::new();
    for i in 0..25 {
        let _ = queue.submit(record(i));
    }
    let mut last = None;
    while let Some(r) = queue.recv_timeout(Duration::ZERO) {
        if let Some(prev) = last {
            assert!(r.cycle_index > prev, "order broken");
        }
        last = Some(r.cycle_index);
    }
    assert_eq!(last, Some(24));
}

#[test]
fn engine_records_reach_sink_in_order() {
    let clock = SimClock::new();
    let queue = Arc::new(RecordQueue::new());
    let board = Board::new();
    let observer = (RecordLog::default(), TelemetryProducer::new(Arc::clone(&queue)));
    let mut engine = CycleEngine::new(board.relays(), observer, CycleSettings::default(), SafetyPolicy::default());

    let mut script = Script::new([50.0, 80.0, 40.0, 25.0]);
    engine.start(0, &mut script);
    for t in 1..=4 {
        engine.tick(t * 1000, &mut script);
    }
    engine.stop(5000, &mut script);
    assert_eq!(queue.len(), engine.observer().0.0.len());

    let sink = RecordingSink::new(&clock, false);
    let inbox = Inbox::default();
    let mut worker =
        DeliveryWorker::new(Arc::clone(&queue), sink.clone(), inbox.clone(), clock.clone(), clock, &SystemConfig::default());
    while worker.poll_once() != PollOutcome::Idle {}

    let statuses: Vec<String> = sink.rows().iter().map(|r| r.status.to_string()).collect();
    assert_eq!(statuses, ["Start", "Heating to cooling", "Cooling to heating", "Stop"]);
    assert_eq!(
        inbox.categories(),
        [NotifyCategory::Start, NotifyCategory::Transition, NotifyCategory::Transition, NotifyCategory::Stop]
    );

    let cool_to_heat = &sink.rows()[2];
    assert_eq!(cool_to_heat.cycle_index, 1);
    assert_eq!(cool_to_heat.cycle_limit.as_str(), "inf");
    assert_eq!(cool_to_heat.phase_duration.as_str(), "0:02");
    assert_eq!(cool_to_heat.cycle_duration.as_str(), "0:04");
    assert_eq!(queue.stats().snapshot().delivered, 4);
}

#[test]
fn spawned_worker_drains_queue() {
    let queue = Arc::new(RecordQueue::new());
    let sink = RecordingSink::new(&SimClock::new(), false);
    let config = SystemConfig { min_delivery_interval_ms: 20, ..Default::default() };
    let worker = DeliveryWorker::new(
        Arc::clone(&queue),
        sink.clone(),
        Inbox::default(),
        MonotonicClock::new(),
        StdDelay,
        &config,
    );
    let _handle = worker.spawn().expect("spawn worker");

    let mut producer = TelemetryProducer::new(Arc::clone(&queue));
    for i in 1..=3 {
        producer.on_transition(&record(i));
    }

    let deadline = Instant::now() + Duration::from_secs(5);
    while sink.rows().len() < 3 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }
    let indices: Vec<u32> = sink.rows().iter().map(|r| r.cycle_index).collect();
    assert_eq!(indices, [1, 2, 3]);
}
