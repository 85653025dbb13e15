//! Time adapters.
//!
//! - [`MonotonicClock`]: on `target_os = "espidf"` wraps
//!   `esp_timer_get_time()` (microsecond precision, monotonic) and renders
//!   wall time once SNTP has set the system clock; on the host it uses
//!   `std::time::Instant`.
//! - [`SimClock`] (host only): shared simulated time that implements both
//!   the [`Clock`] port and [`DelayNs`], so every sensor delay advances it.

use crate::app::ports::{Clock, Millis};

/// Monotonic milliseconds since boot, wrapping at `u32::MAX`.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }

    /// Microseconds since boot.
    #[cfg(target_os = "espidf")]
    pub fn uptime_us(&self) -> u64 {
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64
    }

    /// Microseconds since boot.
    #[cfg(not(target_os = "espidf"))]
    pub fn uptime_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> Millis {
        (self.uptime_us() / 1000) as Millis
    }

    #[cfg(target_os = "espidf")]
    fn wall_timestamp(&self, at: Millis) -> Option<heapless::String<20>> {
        use core::fmt::Write as _;
        use core::ptr;

        let mut tv = esp_idf_svc::sys::timeval { tv_sec: 0, tv_usec: 0 };
        if unsafe { esp_idf_svc::sys::gettimeofday(&mut tv, ptr::null_mut()) } != 0 {
            return None;
        }
        // Reject obviously unsynced time (e.g. before 2020-01-01)
        const EPOCH_2020: i64 = 1_577_836_800;
        if (tv.tv_sec as i64) < EPOCH_2020 {
            return None;
        }
        let age_secs = i64::from(self.now_ms().wrapping_sub(at) / 1000);
        let secs = (tv.tv_sec as i64 - age_secs) as esp_idf_svc::sys::time_t;
        let mut tm: esp_idf_svc::sys::tm = unsafe { core::mem::zeroed() };
        if unsafe { esp_idf_svc::sys::localtime_r(&secs, &mut tm) }.is_null() {
            return None;
        }
        let mut out = heapless::String::new();
        write!(
            out,
            "{:02}-{:02}-{:02} {:02}:{:02}:{:02}",
            tm.tm_year % 100,
            tm.tm_mon + 1,
            tm.tm_mday,
            tm.tm_hour,
            tm.tm_min,
            tm.tm_sec
        )
        .ok()?;
        Some(out)
    }
}

// ── Simulation ────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
pub use sim::SimClock;

#[cfg(not(target_os = "espidf"))]
mod sim {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};

    use embedded_hal::delay::DelayNs;

    use crate::app::ports::{Clock, Millis};

    /// Deterministic shared clock for host tests and simulation.
    ///
    /// Clones share the same time base.  Delays advance it instead of
    /// sleeping.
    #[derive(Debug, Clone, Default)]
    pub struct SimClock {
        nanos: Arc<AtomicU64>,
    }

    impl SimClock {
        pub fn new() -> Self {
            Self::default()
        }

        /// Start at an arbitrary instant (e.g. just before `u32` wraparound).
        pub fn starting_at(ms: Millis) -> Self {
            let clock = Self::new();
            clock.set_ms(ms);
            clock
        }

        pub fn advance_ms(&self, ms: u32) {
            self.nanos.fetch_add(u64::from(ms) * 1_000_000, Ordering::SeqCst);
        }

        pub fn set_ms(&self, ms: Millis) {
            self.nanos.store(u64::from(ms) * 1_000_000, Ordering::SeqCst);
        }
    }

    impl Clock for SimClock {
        fn now_ms(&self) -> Millis {
            (self.nanos.load(Ordering::SeqCst) / 1_000_000) as Millis
        }
    }

    impl DelayNs for SimClock {
        fn delay_ns(&mut self, ns: u32) {
            self.nanos.fetch_add(u64::from(ns), Ordering::SeqCst);
        }
    }
}
