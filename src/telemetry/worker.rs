//! Delivery worker: drains the [`RecordQueue`] on its own thread.
//!
//! One poll:
//! 1. Keep the remote session alive on the credential-refresh cadence.
//! 2. Wait briefly for a record.
//! 3. Too soon after the previous delivery: put it back at the head and
//!    sleep out the rest of the interval.
//! 4. Otherwise append the row (bounded retries with linear backoff inside
//!    the per-record budget) and push the notification, whatever the row
//!    outcome was.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use embedded_hal::delay::DelayNs;
use log::{debug, info, warn};

use super::notify::{NOTIFY_TITLE, NotifyFilter, classify, compose_body};
use super::queue::RecordQueue;
use super::row::{LogRow, Timestamp};
use super::TelemetryStats;
use crate::app::events::CycleRecord;
use crate::app::ports::{Clock, Millis, Notifier, RowSink, SinkError, TransitionObserver};
use crate::config::SystemConfig;
use crate::drivers::task_pin::{Core, TaskSpec, spawn_pinned};
use crate::error::TelemetryError;

/// How long one poll waits for a record.
pub const RECV_TIMEOUT: Duration = Duration::from_millis(10);
/// Pause between polls in [`DeliveryWorker::run`].
pub const IDLE_DELAY_MS: u32 = 5;

pub const WORKER_TASK: TaskSpec = TaskSpec {
    name: "telemetry\0",
    core: Core::App,
    priority: 1,
    stack_bytes: 16 * 1024,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryPolicy {
    pub min_interval_ms: u32,
    pub attempts: u8,
    pub budget_ms: u32,
    pub backoff_ms: u32,
    pub credential_refresh_ms: u32,
}

impl From<&SystemConfig> for DeliveryPolicy {
    fn from(c: &SystemConfig) -> Self {
        Self {
            min_interval_ms: c.min_delivery_interval_ms,
            attempts: c.delivery_attempts,
            budget_ms: c.delivery_budget_ms,
            backoff_ms: c.delivery_backoff_ms,
            credential_refresh_ms: c.credential_refresh_ms,
        }
    }
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        Self::from(&SystemConfig::default())
    }
}

/// Result of a single [`DeliveryWorker::poll_once`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Nothing queued.
    Idle,
    /// Record put back, interval not yet elapsed.
    Throttled,
    /// Sink had no credentials; row dropped.
    Suppressed,
    /// Row appended after this many attempts.
    Delivered { attempts: u8 },
    /// Every attempt failed or the budget ran out.
    Failed { attempts: u8 },
}

pub struct DeliveryWorker<R, N, K, D> {
    queue: Arc<RecordQueue>,
    sink: R,
    notifier: N,
    clock: K,
    delay: D,
    policy: DeliveryPolicy,
    filter: NotifyFilter,
    last_delivery: Option<Millis>,
    last_refresh: Option<Millis>,
}

impl<R, N, K, D> DeliveryWorker<R, N, K, D>
where
    R: RowSink,
    N: Notifier,
    K: Clock,
    D: DelayNs,
{
    pub fn new(
        queue: Arc<RecordQueue>,
        sink: R,
        notifier: N,
        clock: K,
        delay: D,
        config: &SystemConfig,
    ) -> Self {
        Self {
            queue,
            sink,
            notifier,
            clock,
            delay,
            policy: DeliveryPolicy::from(config),
            filter: config.notify,
            last_delivery: None,
            last_refresh: None,
        }
    }

    pub fn poll_once(&mut self) -> PollOutcome {
        self.maintain_session();

        let Some(record) = self.queue.recv_timeout(RECV_TIMEOUT) else {
            return PollOutcome::Idle;
        };

        let now = self.clock.now_ms();
        if let Some(last) = self.last_delivery {
            let since = now.wrapping_sub(last);
            if since < self.policy.min_interval_ms {
                self.queue.requeue_front(record);
                self.delay.delay_ms(self.policy.min_interval_ms - since);
                return PollOutcome::Throttled;
            }
        }

        let timestamp = self.clock.wall_timestamp(record.timestamp_ms);
        let outcome = match self.deliver(&record, timestamp.clone()) {
            Ok(attempts) => PollOutcome::Delivered { attempts },
            Err(TelemetryError::CredentialNotReady) => {
                self.stats().record_suppressed();
                debug!("telemetry: credentials not ready, row for '{}' suppressed", record.status);
                PollOutcome::Suppressed
            }
            Err(TelemetryError::DeliveryFailed { attempts }) => PollOutcome::Failed { attempts },
            Err(TelemetryError::QueueOverflow) => PollOutcome::Failed { attempts: 0 },
        };

        self.notify(&record, timestamp.as_ref());
        self.last_delivery = Some(self.clock.now_ms());
        outcome
    }

    /// Poll forever.  Only returns if the process does.
    pub fn run(mut self) {
        info!(
            "telemetry: worker running (interval {} ms, {} attempts, budget {} ms)",
            self.policy.min_interval_ms, self.policy.attempts, self.policy.budget_ms
        );
        loop {
            self.poll_once();
            self.delay.delay_ms(IDLE_DELAY_MS);
        }
    }

    pub fn sink(&self) -> &R {
        &self.sink
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn policy(&self) -> &DeliveryPolicy {
        &self.policy
    }

    fn stats(&self) -> &TelemetryStats {
        self.queue.stats()
    }

    fn maintain_session(&mut self) {
        let now = self.clock.now_ms();
        let due = self
            .last_refresh
            .is_none_or(|last| now.wrapping_sub(last) >= self.policy.credential_refresh_ms);
        if due {
            self.sink.maintain();
            self.last_refresh = Some(self.clock.now_ms());
        }
    }

    fn deliver(&mut self, record: &CycleRecord, timestamp: Option<Timestamp>) -> Result<u8, TelemetryError> {
        if !self.sink.is_ready() {
            return Err(TelemetryError::CredentialNotReady);
        }
        let row = LogRow::from_record(record, timestamp);
        let started = self.clock.now_ms();
        let budget = self.policy.budget_ms;
        let within_budget = move |now: Millis| now.wrapping_sub(started) < budget;

        let mut attempts: u8 = 0;
        let mut last_error = SinkError::Timeout;
        while attempts < self.policy.attempts && within_budget(self.clock.now_ms()) {
            self.stats().record_attempt(self.clock.now_ms());
            match self.sink.append_row(&row) {
                Ok(()) => {
                    let attempts = attempts + 1;
                    self.stats().record_delivered(self.clock.now_ms());
                    debug!("telemetry: '{}' delivered after {} attempt(s)", record.status, attempts);
                    return Ok(attempts);
                }
                Err(e) => last_error = e,
            }
            attempts += 1;
            if attempts < self.policy.attempts && within_budget(self.clock.now_ms()) {
                self.delay.delay_ms(self.policy.backoff_ms.saturating_mul(u32::from(attempts)));
            }
        }

        self.stats().record_failed();
        warn!(
            "telemetry: '{}' not delivered after {} attempt(s): {}",
            record.status, attempts, last_error
        );
        self.delay.delay_ms(self.policy.backoff_ms);
        Err(TelemetryError::DeliveryFailed { attempts })
    }

    fn notify(&mut self, record: &CycleRecord, timestamp: Option<&Timestamp>) {
        let category = classify(record.kind);
        if !self.filter.allows(category) {
            return;
        }
        let body = compose_body(record, timestamp);
        match self.notifier.send(NOTIFY_TITLE, &body, category) {
            Ok(()) => self.stats().record_notified(),
            Err(e) => warn!("telemetry: notification for '{}' failed: {}", record.status, e),
        }
    }
}

impl<R, N, K, D> DeliveryWorker<R, N, K, D>
where
    R: RowSink + Send + 'static,
    N: Notifier + Send + 'static,
    K: Clock + Send + 'static,
    D: DelayNs + Send + 'static,
{
    /// Move the worker onto its own task for the life of the process.
    pub fn spawn(self) -> std::io::Result<JoinHandle<()>> {
        spawn_pinned(WORKER_TASK, move || self.run())
    }
}

// ───────────────────────────────────────────────────────────────
// Producer side
// ───────────────────────────────────────────────────────────────

/// Engine-side handle: copies each record into the queue.
#[derive(Clone)]
pub struct TelemetryProducer {
    queue: Arc<RecordQueue>,
}

impl TelemetryProducer {
    pub fn new(queue: Arc<RecordQueue>) -> Self {
        Self { queue }
    }

    pub fn queue(&self) -> &Arc<RecordQueue> {
        &self.queue
    }
}

impl TransitionObserver for TelemetryProducer {
    fn on_transition(&mut self, record: &CycleRecord) {
        // Overflow is already counted and logged by the queue.
        let _ = self.queue.submit(record.clone());
    }
}
