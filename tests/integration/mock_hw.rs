//! Mock hardware and collaborators for integration tests.
//!
//! Pins share one [`Board`] so tests can check both relay lines after
//! every single write, not just after each engine call.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, OutputPin};
use thermocycler::adapters::time::SimClock;
use thermocycler::app::events::{CycleRecord, RecordKind};
use thermocycler::app::ports::{
    Clock, Millis, Notifier, ReadingSource, RowSink, SensorChannel, SinkError, TransitionObserver,
};
use thermocycler::drivers::relay::RelayPair;
use thermocycler::error::SensorError;
use thermocycler::sensors::Reading;
use thermocycler::telemetry::notify::NotifyCategory;
use thermocycler::telemetry::row::LogRow;

// ── Relay board ───────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct BoardState {
    pub heater: bool,
    pub cooler: bool,
    /// Set if both lines were ever high at the same time.
    pub overlap_seen: bool,
    pub writes: usize,
}

#[derive(Clone, Default)]
pub struct Board(Rc<RefCell<BoardState>>);

#[allow(dead_code)]
impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn relays(&self) -> RelayPair<MockPin, MockPin> {
        RelayPair::new(
            MockPin { board: self.clone(), line: Line::Heater },
            MockPin { board: self.clone(), line: Line::Cooler },
        )
        .expect("mock pins never fail")
    }

    pub fn heater(&self) -> bool {
        self.0.borrow().heater
    }

    pub fn cooler(&self) -> bool {
        self.0.borrow().cooler
    }

    pub fn overlap_seen(&self) -> bool {
        self.0.borrow().overlap_seen
    }
}

#[derive(Clone, Copy)]
enum Line {
    Heater,
    Cooler,
}

pub struct MockPin {
    board: Board,
    line: Line,
}

impl MockPin {
    fn write(&mut self, level: bool) {
        let mut s = self.board.0.borrow_mut();
        match self.line {
            Line::Heater => s.heater = level,
            Line::Cooler => s.cooler = level,
        }
        s.writes += 1;
        if s.heater && s.cooler {
            s.overlap_seen = true;
        }
    }
}

impl ErrorType for MockPin {
    type Error = core::convert::Infallible;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.write(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.write(true);
        Ok(())
    }
}

// ── Thermocouple ──────────────────────────────────────────────

/// Thermocouple whose temperature the test sets directly; `None` = open circuit.
#[derive(Clone)]
pub struct Thermocouple(Rc<RefCell<Option<f32>>>);

#[allow(dead_code)]
impl Thermocouple {
    pub fn at(celsius: f32) -> Self {
        Self(Rc::new(RefCell::new(Some(celsius))))
    }

    pub fn set(&self, celsius: f32) {
        *self.0.borrow_mut() = Some(celsius);
    }

    pub fn unplug(&self) {
        *self.0.borrow_mut() = None;
    }

    pub fn get(&self) -> Option<f32> {
        *self.0.borrow()
    }
}

impl SensorChannel for Thermocouple {
    fn convert(&mut self) -> Result<f32, SensorError> {
        self.get().ok_or(SensorError::OpenCircuit)
    }
}

// ── Scripted reading source (engine-level tests) ──────────────

/// Hands out critical readings from a script; the last one repeats.
pub struct Script {
    readings: VecDeque<Reading>,
    last: Reading,
}

#[allow(dead_code)]
impl Script {
    pub fn new(values: impl IntoIterator<Item = f32>) -> Self {
        Self { readings: values.into_iter().map(Reading::new).collect(), last: Reading::UNAVAILABLE }
    }

    pub fn invalid() -> Self {
        Self { readings: VecDeque::new(), last: Reading::UNAVAILABLE }
    }

    pub fn push(&mut self, celsius: f32) {
        self.readings.push_back(Reading::new(celsius));
    }
}

impl ReadingSource for Script {
    fn critical(&mut self) -> Reading {
        if let Some(r) = self.readings.pop_front() {
            self.last = r;
        }
        self.last
    }

    fn median(&self) -> Reading {
        self.last
    }
}

// ── Observers ─────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordLog(pub Vec<CycleRecord>);

#[allow(dead_code)]
impl RecordLog {
    pub fn kinds(&self) -> Vec<RecordKind> {
        self.0.iter().map(|r| r.kind).collect()
    }

    pub fn count(&self, kind: RecordKind) -> usize {
        self.0.iter().filter(|r| r.kind == kind).count()
    }
}

impl TransitionObserver for RecordLog {
    fn on_transition(&mut self, record: &CycleRecord) {
        self.0.push(record.clone());
    }
}

// ── Remote collaborators ──────────────────────────────────────

/// Append attempts as `(cycle_index, at_ms)`, plus accepted rows.
#[derive(Default)]
pub struct SinkLog {
    pub attempts: Vec<(u32, Millis)>,
    pub rows: Vec<LogRow>,
}

/// Row sink on simulated time.  Thread-safe so it can also back a
/// spawned worker.
#[derive(Clone)]
pub struct RecordingSink {
    pub clock: SimClock,
    pub fail: bool,
    pub log: Arc<Mutex<SinkLog>>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new(clock: &SimClock, fail: bool) -> Self {
        Self { clock: clock.clone(), fail, log: Arc::default() }
    }

    /// Time of the first attempt for each distinct record, in order.
    pub fn first_attempts(&self) -> Vec<Millis> {
        let log = self.log.lock().expect("sink log");
        let mut seen = Vec::new();
        let mut out = Vec::new();
        for &(index, at) in &log.attempts {
            if !seen.contains(&index) {
                seen.push(index);
                out.push(at);
            }
        }
        out
    }

    pub fn rows(&self) -> Vec<LogRow> {
        self.log.lock().expect("sink log").rows.clone()
    }
}

impl RowSink for RecordingSink {
    fn is_ready(&self) -> bool {
        true
    }

    fn maintain(&mut self) {}

    fn append_row(&mut self, row: &LogRow) -> Result<(), SinkError> {
        let mut log = self.log.lock().expect("sink log");
        log.attempts.push((row.cycle_index, self.clock.now_ms()));
        if self.fail {
            return Err(SinkError::Timeout);
        }
        log.rows.push(row.clone());
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct Inbox(pub Arc<Mutex<Vec<(String, NotifyCategory)>>>);

#[allow(dead_code)]
impl Inbox {
    pub fn categories(&self) -> Vec<NotifyCategory> {
        self.0.lock().expect("inbox").iter().map(|(_, c)| *c).collect()
    }
}

impl Notifier for Inbox {
    fn send(&mut self, _title: &str, body: &str, category: NotifyCategory) -> Result<(), SinkError> {
        self.0.lock().expect("inbox").push((body.to_owned(), category));
        Ok(())
    }
}

/// Real sleeping delay for tests that spawn the worker thread.
#[allow(dead_code)]
pub struct StdDelay;

impl DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(std::time::Duration::from_nanos(u64::from(ns)));
    }
}
