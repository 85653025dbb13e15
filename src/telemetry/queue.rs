//! Bounded record queue between the control loop and the delivery worker.
//!
//! Single producer (engine), single consumer (worker).  A mutex-guarded
//! `heapless::Deque` plus two condition variables gives blocking waits with
//! timeouts on both sides; neither side ever spins.
//!
//! Overflow policy, oldest first:
//! 1. At [`EVICT_THRESHOLD`] entries, drop the [`EVICT_BATCH`] oldest before
//!    enqueuing.
//! 2. If the queue is still full after [`ENQUEUE_TIMEOUT`], drop
//!    [`EVICT_RETRY_BATCH`] more and retry once.
//! 3. Otherwise the record is dropped and counted as overflow.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use heapless::Deque;
use log::warn;

use super::TelemetryStats;
use crate::app::events::CycleRecord;
use crate::error::TelemetryError;

pub const QUEUE_CAPACITY: usize = 20;
pub const EVICT_THRESHOLD: usize = QUEUE_CAPACITY - 1;
pub const EVICT_BATCH: usize = 5;
pub const EVICT_RETRY_BATCH: usize = 3;
pub const ENQUEUE_TIMEOUT: Duration = Duration::from_millis(10);

type Inner = Deque<CycleRecord, QUEUE_CAPACITY>;

#[derive(Default)]
pub struct RecordQueue {
    inner: Mutex<Inner>,
    not_empty: Condvar,
    not_full: Condvar,
    stats: TelemetryStats,
}

impl RecordQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> &TelemetryStats {
        &self.stats
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Enqueue a copy of `record`.  Blocks for at most [`ENQUEUE_TIMEOUT`].
    pub fn submit(&self, record: CycleRecord) -> Result<(), TelemetryError> {
        self.stats.record_submitted();
        let mut q = self.lock();

        if q.len() >= EVICT_THRESHOLD {
            let n = evict_oldest(&mut q, EVICT_BATCH);
            self.stats.record_evicted(n);
            warn!("telemetry: queue near full, dropped {n} oldest records");
        }

        let (mut q, _) = self
            .not_full
            .wait_timeout_while(q, ENQUEUE_TIMEOUT, |q| q.is_full())
            .unwrap_or_else(PoisonError::into_inner);

        let pushed = q.push_back(record);
        let record = match pushed {
            Ok(()) => {
                drop(q);
                self.not_empty.notify_one();
                return Ok(());
            }
            Err(record) => record,
        };

        let n = evict_oldest(&mut q, EVICT_RETRY_BATCH);
        self.stats.record_evicted(n);
        warn!("telemetry: enqueue timed out, dropped {n} more records");
        let retried = q.push_back(record);
        match retried {
            Ok(()) => {
                drop(q);
                self.not_empty.notify_one();
                Ok(())
            }
            Err(_) => {
                self.stats.record_overflow();
                warn!("telemetry: queue overflow, record dropped");
                Err(TelemetryError::QueueOverflow)
            }
        }
    }

    /// Dequeue the oldest record, waiting up to `timeout` for one.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<CycleRecord> {
        let (mut q, _) = self
            .not_empty
            .wait_timeout_while(self.lock(), timeout, |q| q.is_empty())
            .unwrap_or_else(PoisonError::into_inner);
        let record = q.pop_front();
        if record.is_some() {
            drop(q);
            self.not_full.notify_one();
        }
        record
    }

    /// Put a record back at the head so it is delivered next.
    ///
    /// If the producer refilled the queue meanwhile, the record is the
    /// oldest entry and is the one evicted.
    pub fn requeue_front(&self, record: CycleRecord) {
        let mut q = self.lock();
        let pushed = q.push_front(record);
        if pushed.is_err() {
            self.stats.record_evicted(1);
            warn!("telemetry: queue full on requeue, oldest record dropped");
            return;
        }
        drop(q);
        self.not_empty.notify_one();
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn evict_oldest(q: &mut Inner, n: usize) -> u32 {
    let mut dropped = 0;
    for _ in 0..n {
        if q.pop_front().is_none() {
            break;
        }
        dropped += 1;
    }
    dropped
}
