//! Telemetry pipeline: decouples the control tick from slow, unreliable
//! remote logging.
//!
//! ```text
//! ┌─────────────┐ submit ┌─────────────┐ recv  ┌────────────────┐ append_row ┌──────────┐
//! │ CycleEngine │───────▶│ RecordQueue │──────▶│ DeliveryWorker │───────────▶│ RowSink  │
//! │ (control)   │ ≤10 ms │ (cap 20)    │       │ (own thread)   │───────────▶│ Notifier │
//! └─────────────┘        └─────────────┘       └────────────────┘    send    └──────────┘
//! ```
//!
//! The queue is the only shared resource.  Records are copied in, so the
//! worker owns an immutable snapshot.  Overflow and delivery failures are
//! counted in [`TelemetryStats`]; nothing here can stall relay control.

pub mod notify;
pub mod queue;
pub mod row;
pub mod worker;

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use serde::Serialize;

use crate::app::ports::Millis;

/// Lock-free counters shared between the producer, the worker and the
/// status surface.  32-bit atomics only (Xtensa has no 64-bit atomics).
#[derive(Debug, Default)]
pub struct TelemetryStats {
    submitted: AtomicU32,
    delivered: AtomicU32,
    failed: AtomicU32,
    evicted: AtomicU32,
    overflowed: AtomicU32,
    suppressed: AtomicU32,
    notified: AtomicU32,
    has_success: AtomicBool,
    last_success_ms: AtomicU32,
    has_attempt: AtomicBool,
    last_attempt_ms: AtomicU32,
}

impl TelemetryStats {
    pub fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_evicted(&self, n: u32) {
        self.evicted.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_overflow(&self) {
        self.overflowed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_suppressed(&self) {
        self.suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_notified(&self) {
        self.notified.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_attempt(&self, now: Millis) {
        self.last_attempt_ms.store(now, Ordering::Relaxed);
        self.has_attempt.store(true, Ordering::Release);
    }

    pub fn record_delivered(&self, now: Millis) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
        self.last_success_ms.store(now, Ordering::Relaxed);
        self.has_success.store(true, Ordering::Release);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        let load = |a: &AtomicU32| a.load(Ordering::Relaxed);
        TelemetrySnapshot {
            submitted: load(&self.submitted),
            delivered: load(&self.delivered),
            failed: load(&self.failed),
            evicted: load(&self.evicted),
            overflowed: load(&self.overflowed),
            suppressed: load(&self.suppressed),
            notified: load(&self.notified),
            last_success_ms: self
                .has_success
                .load(Ordering::Acquire)
                .then(|| load(&self.last_success_ms)),
            last_attempt_ms: self
                .has_attempt
                .load(Ordering::Acquire)
                .then(|| load(&self.last_attempt_ms)),
        }
    }
}

/// Point-in-time copy of [`TelemetryStats`] for the status surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TelemetrySnapshot {
    pub submitted: u32,
    pub delivered: u32,
    pub failed: u32,
    pub evicted: u32,
    pub overflowed: u32,
    pub suppressed: u32,
    pub notified: u32,
    pub last_success_ms: Option<Millis>,
    pub last_attempt_ms: Option<Millis>,
}
