//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ CycleEngine / DeliveryWorker (domain)
//! ```
//!
//! Driven adapters (thermocouple, relays, clocks, remote sinks, storage)
//! implement these traits.  The domain consumes them via generics, so the
//! control core never touches hardware or the network directly.
//!
//! ## Safety notes
//!
//! - **RelayPort** implementations MUST never leave both lines energised.
//! - **ConfigPort** implementations MUST validate before persisting.
//! - All port errors are typed; callers must handle every variant explicitly.

use crate::app::events::CycleRecord;
use crate::config::SystemConfig;
use crate::error::{ActuatorError, SensorError};
use crate::sensors::Reading;
use crate::telemetry::notify::NotifyCategory;
use crate::telemetry::row::LogRow;

/// Monotonic milliseconds since boot.  Wraps after ~49 days; every
/// duration is computed with `wrapping_sub`.
pub type Millis = u32;

// ───────────────────────────────────────────────────────────────
// Sensor ports (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// One physical thermocouple conversion.
///
/// Implementations report open-circuit and bus faults; range checks and
/// the conversion-time gate live in
/// [`TemperatureAcquisition`](crate::sensors::acquisition::TemperatureAcquisition).
pub trait SensorChannel {
    fn convert(&mut self) -> Result<f32, SensorError>;
}

/// Read-side port the cycle engine decides on.
pub trait ReadingSource {
    /// Majority-voted reading used for every threshold and safety decision.
    fn critical(&mut self) -> Reading;

    /// Rolling median of recent samples, used as a fallback and for display.
    fn median(&self) -> Reading;
}

// ───────────────────────────────────────────────────────────────
// Actuator port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// The three legal relay configurations.  "Both on" is unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drive {
    Heat,
    Cool,
    Off,
}

pub trait RelayPort {
    /// Move both relay lines to the requested configuration.
    fn apply(&mut self, drive: Drive) -> Result<(), ActuatorError>;
}

// ───────────────────────────────────────────────────────────────
// Time port
// ───────────────────────────────────────────────────────────────

pub trait Clock {
    fn now_ms(&self) -> Millis;

    /// Wall-clock rendering (`YY-MM-DD HH:MM:SS`) of a monotonic instant,
    /// or `None` while the clock is not synchronised.
    fn wall_timestamp(&self, _at: Millis) -> Option<heapless::String<20>> {
        None
    }
}

// ───────────────────────────────────────────────────────────────
// Transition observer (domain → telemetry / logging)
// ───────────────────────────────────────────────────────────────

/// Invoked synchronously by the engine on every emitted record.
///
/// Implementations must return quickly; slow work belongs behind the
/// telemetry queue.
pub trait TransitionObserver {
    fn on_transition(&mut self, record: &CycleRecord);
}

/// Fan out to two observers (e.g. log + telemetry producer).
impl<A: TransitionObserver, B: TransitionObserver> TransitionObserver for (A, B) {
    fn on_transition(&mut self, record: &CycleRecord) {
        self.0.on_transition(record);
        self.1.on_transition(record);
    }
}

impl<T: TransitionObserver + ?Sized> TransitionObserver for &mut T {
    fn on_transition(&mut self, record: &CycleRecord) {
        (**self).on_transition(record);
    }
}

// ───────────────────────────────────────────────────────────────
// Remote collaborators (worker → network)
// ───────────────────────────────────────────────────────────────

/// Row-oriented remote log (spreadsheet-style append).
pub trait RowSink {
    /// `false` while the outbound session has no valid credentials.
    fn is_ready(&self) -> bool;

    /// Refresh credentials / keep the session alive.  Called on a fixed
    /// cadence by the worker, between polls.
    fn maintain(&mut self);

    /// Append one row.  May block up to the transport's own timeout.
    fn append_row(&mut self, row: &LogRow) -> Result<(), SinkError>;
}

/// Push-notification collaborator.
pub trait Notifier {
    fn send(&mut self, title: &str, body: &str, category: NotifyCategory) -> Result<(), SinkError>;
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists system configuration.
///
/// # Safety
///
/// Implementations MUST validate config values before persisting.
/// Invalid ranges are rejected with [`ConfigError::ValidationFailed`],
/// not silently clamped.  A web form must not be able to push, say, a
/// safety threshold above the top setpoint.
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    /// Returns [`SystemConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<SystemConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`RowSink`] and [`Notifier`] calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkError {
    /// No network / session.
    NotConnected,
    /// Remote answered with a non-success status code.
    Rejected(u16),
    /// The request did not complete in time.
    Timeout,
    /// Generic transport failure.
    Io,
}

/// Errors from [`ConfigPort`] operations.
#[derive(Debug)]
pub enum ConfigError {
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl core::fmt::Display for SinkError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotConnected => write!(f, "not connected"),
            Self::Rejected(code) => write!(f, "rejected with status {code}"),
            Self::Timeout => write!(f, "timed out"),
            Self::Io => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
