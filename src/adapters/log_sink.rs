//! Serial-console transition observer.
//!
//! Writes every [`CycleRecord`] to the logger (UART / USB-CDC in
//! production).  Safety trips go out at `error!` so they are never
//! filtered away.

use log::{error, info, warn};

use crate::app::events::{CycleRecord, RecordKind};
use crate::app::ports::TransitionObserver;
use crate::telemetry::row::limit_text;

#[derive(Debug, Default)]
pub struct LogObserver {
    emitted: u32,
}

impl LogObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emitted(&self) -> u32 {
        self.emitted
    }
}

impl TransitionObserver for LogObserver {
    fn on_transition(&mut self, r: &CycleRecord) {
        self.emitted = self.emitted.wrapping_add(1);
        let temp = r.temperature_c.unwrap_or(f32::NAN);
        match r.kind {
            k if k.is_safety_trip() => error!(
                "SAFETY | {} | T={:.2}\u{00b0}C | cycle {}/{}",
                r.status,
                temp,
                r.cycle_index,
                limit_text(r.cycle_limit)
            ),
            RecordKind::PhaseDeviation => warn!(
                "CYCLE | {} | heating {} vs median {}",
                r.status, r.phase_duration, r.cycle_duration
            ),
            _ => info!(
                "CYCLE | {} | T={:.2}\u{00b0}C | cycle {}/{} | top={:.1} bottom={:.1} | phase={} cycle={}",
                r.status,
                temp,
                r.cycle_index,
                limit_text(r.cycle_limit),
                r.top_setpoint_c,
                r.bottom_setpoint_c,
                r.phase_duration,
                r.cycle_duration
            ),
        }
    }
}
