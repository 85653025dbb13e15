//! Control service: the hexagonal core.
//!
//! [`ControlService`] owns the acquisition pipeline and the cycle engine
//! and runs them on one schedule: a rate-limited sample on every poll, a
//! full engine evaluation once per control interval.  Commands from the
//! front panel or web UI arrive through [`handle_command`].
//!
//! ```text
//!  SensorChannel ──▶ ┌───────────────────────────────┐ ──▶ TransitionObserver
//!                    │        ControlService         │
//!      RelayPort ◀── │ Acquisition · Engine · Safety │
//!                    └───────────────────────────────┘
//! ```
//!
//! [`handle_command`]: ControlService::handle_command

use std::sync::Arc;

use embedded_hal::delay::DelayNs;
use log::{debug, info, warn};

use crate::config::{SENSOR_MAX_C, SENSOR_MIN_C, SystemConfig};
use crate::cycle::{CycleEngine, CycleSettings, CycleState};
use crate::safety::SafetyPolicy;
use crate::sensors::acquisition::{SensorTiming, TemperatureAcquisition};
use crate::telemetry::queue::RecordQueue;

use super::commands::{Command, CommandOutcome};
use super::events::CycleStatus;
use super::ports::{Clock, ConfigPort, Millis, ReadingSource, RelayPort, SensorChannel, TransitionObserver};

// ───────────────────────────────────────────────────────────────
// ControlService
// ───────────────────────────────────────────────────────────────

pub struct ControlService<S, D, K, R, O> {
    acquisition: TemperatureAcquisition<S, D, K>,
    engine: CycleEngine<R, O>,
    control_interval_ms: u32,
    last_tick: Option<Millis>,
    telemetry: Option<Arc<RecordQueue>>,
    /// Last applied configuration, written back on every accepted setter.
    config: SystemConfig,
    store: Option<Box<dyn ConfigPort + Send>>,
}

impl<S, D, K, R, O> ControlService<S, D, K, R, O>
where
    S: SensorChannel,
    D: DelayNs,
    K: Clock,
    R: RelayPort,
    O: TransitionObserver,
{
    /// Build the pipeline and the engine from one validated config.
    /// Relays are driven off during construction.
    pub fn new(config: &SystemConfig, channel: S, delay: D, clock: K, relays: R, observer: O) -> Self {
        let acquisition = TemperatureAcquisition::new(channel, delay, clock, SensorTiming::from(config));
        let engine = CycleEngine::new(
            relays,
            observer,
            CycleSettings::from(config),
            SafetyPolicy::from(config),
        );
        Self {
            acquisition,
            engine,
            control_interval_ms: config.control_loop_interval_ms,
            last_tick: None,
            telemetry: None,
            config: config.clone(),
            store: None,
        }
    }

    /// Include the queue's delivery counters in [`status`](Self::status).
    pub fn attach_telemetry(&mut self, queue: Arc<RecordQueue>) {
        self.telemetry = Some(queue);
    }

    /// Persist setpoint and cycle-limit changes through `store`.
    pub fn attach_config_store(&mut self, store: Box<dyn ConfigPort + Send>) {
        self.store = Some(store);
    }

    // ── Scheduling ────────────────────────────────────────────

    /// Call as often as convenient.  Returns `true` when this poll ran a
    /// control evaluation.
    pub fn poll(&mut self, now: Millis) -> bool {
        if let Some(reading) = self.acquisition.sample() {
            if !reading.valid {
                debug!("sample: no valid reading, median held at {:?}", self.acquisition.current().value());
            }
        }

        let due = self
            .last_tick
            .is_none_or(|last| now.wrapping_sub(last) >= self.control_interval_ms);
        if !due {
            return false;
        }
        self.last_tick = Some(now);
        self.engine.tick(now, &mut self.acquisition);
        true
    }

    // ── Commands ──────────────────────────────────────────────

    pub fn handle_command(&mut self, cmd: Command, now: Millis) -> CommandOutcome {
        let state = self.engine.state();
        let outcome = match cmd {
            Command::Start if state == CycleState::SafetyCooling => CommandOutcome::RejectedCoolingDown,
            Command::Start => applied(self.engine.start(now, &mut self.acquisition)),
            Command::Stop => applied(self.engine.stop(now, &mut self.acquisition)),
            Command::Reset => applied(self.engine.reset()),
            Command::SetTopSetpoint(c) => {
                if plausible(c) && c > self.engine.settings().bottom_setpoint_c {
                    self.engine.set_top_setpoint(c);
                    self.config.top_setpoint_c = c;
                    self.persist();
                    CommandOutcome::Applied
                } else {
                    CommandOutcome::Ignored
                }
            }
            Command::SetBottomSetpoint(c) => {
                if plausible(c) && c < self.engine.settings().top_setpoint_c {
                    self.engine.set_bottom_setpoint(c);
                    self.config.bottom_setpoint_c = c;
                    self.persist();
                    CommandOutcome::Applied
                } else {
                    CommandOutcome::Ignored
                }
            }
            Command::SetMaxCycles(n) => {
                self.engine.set_max_cycles(n);
                self.config.max_cycles = n;
                self.persist();
                CommandOutcome::Applied
            }
        };

        match outcome {
            CommandOutcome::Applied => info!("command {:?} applied ({})", cmd, self.engine.state().name()),
            CommandOutcome::Ignored => warn!("command {:?} ignored in {}", cmd, state.name()),
            CommandOutcome::RejectedCoolingDown => {
                warn!("command {:?} rejected: safety cooldown in progress", cmd);
            }
        }
        outcome
    }

    /// A failed save keeps the change in memory; it only lives until reboot.
    fn persist(&self) {
        let Some(store) = self.store.as_ref() else {
            return;
        };
        if let Err(e) = store.save(&self.config) {
            warn!("config: save failed, change kept until reboot: {e}");
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn status(&self, now: Millis) -> CycleStatus {
        let mut status = self.engine.status(now);
        status.median_c = self.acquisition.median().value();
        status.telemetry = self.telemetry.as_ref().map(|q| q.stats().snapshot());
        status
    }

    pub fn state(&self) -> CycleState {
        self.engine.state()
    }

    pub fn engine(&self) -> &CycleEngine<R, O> {
        &self.engine
    }

    pub fn acquisition(&self) -> &TemperatureAcquisition<S, D, K> {
        &self.acquisition
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }
}

fn applied(accepted: bool) -> CommandOutcome {
    if accepted { CommandOutcome::Applied } else { CommandOutcome::Ignored }
}

fn plausible(celsius: f32) -> bool {
    (SENSOR_MIN_C..=SENSOR_MAX_C).contains(&celsius)
}

#[cfg(all(test, not(target_os = "espidf")))]
mod tests {
    use super::*;
    use crate::adapters::time::SimClock;
    use crate::app::events::CycleRecord;
    use crate::app::ports::{ConfigError, Drive};
    use crate::error::{ActuatorError, SensorError};
    use std::cell::Cell;
    use std::rc::Rc;
    use std::sync::Mutex;

    #[derive(Clone)]
    struct Thermocouple(Rc<Cell<f32>>);

    impl SensorChannel for Thermocouple {
        fn convert(&mut self) -> Result<f32, SensorError> {
            Ok(self.0.get())
        }
    }

    #[derive(Default)]
    struct Relays(Vec<Drive>);

    impl RelayPort for Relays {
        fn apply(&mut self, drive: Drive) -> Result<(), ActuatorError> {
            self.0.push(drive);
            Ok(())
        }
    }

    #[derive(Default)]
    struct Records(Vec<CycleRecord>);

    impl TransitionObserver for Records {
        fn on_transition(&mut self, record: &CycleRecord) {
            self.0.push(record.clone());
        }
    }

    /// Records every saved config; optionally refuses the write.
    #[derive(Clone, Default)]
    struct Saved {
        configs: Arc<Mutex<Vec<SystemConfig>>>,
        fail: bool,
    }

    impl ConfigPort for Saved {
        fn load(&self) -> Result<SystemConfig, ConfigError> {
            Ok(SystemConfig::default())
        }

        fn save(&self, config: &SystemConfig) -> Result<(), ConfigError> {
            if self.fail {
                return Err(ConfigError::IoError);
            }
            self.configs.lock().unwrap_or_else(|e| e.into_inner()).push(config.clone());
            Ok(())
        }
    }

    impl Saved {
        fn all(&self) -> Vec<SystemConfig> {
            self.configs.lock().unwrap_or_else(|e| e.into_inner()).clone()
        }
    }

    type Service = ControlService<Thermocouple, SimClock, SimClock, Relays, Records>;

    fn service(temp: f32) -> (SimClock, Rc<Cell<f32>>, Service) {
        let clock = SimClock::new();
        let thermocouple = Rc::new(Cell::new(temp));
        let svc = ControlService::new(
            &SystemConfig::default(),
            Thermocouple(Rc::clone(&thermocouple)),
            clock.clone(),
            clock.clone(),
            Relays::default(),
            Records::default(),
        );
        (clock, thermocouple, svc)
    }

    #[test]
    fn start_heats_and_reports() {
        let (clock, _, mut svc) = service(22.0);
        assert_eq!(svc.handle_command(Command::Start, clock.now_ms()), CommandOutcome::Applied);
        assert_eq!(svc.state(), CycleState::Heating);
        assert_eq!(svc.engine().drive(), Drive::Heat);
        let status = svc.status(clock.now_ms());
        assert!(status.active && status.heating);
        assert!(status.telemetry.is_none());
    }

    #[test]
    fn start_while_running_is_ignored() {
        let (clock, _, mut svc) = service(22.0);
        svc.handle_command(Command::Start, 0);
        assert_eq!(svc.handle_command(Command::Start, clock.now_ms()), CommandOutcome::Ignored);
        assert_eq!(svc.engine().observer().0.len(), 1);
    }

    #[test]
    fn start_during_cooldown_is_rejected() {
        let (clock, _, mut svc) = service(60.0);
        svc.handle_command(Command::Start, 0);
        svc.handle_command(Command::Stop, clock.now_ms());
        assert_eq!(svc.state(), CycleState::SafetyCooling);
        assert_eq!(svc.handle_command(Command::Start, clock.now_ms()), CommandOutcome::RejectedCoolingDown);
        assert_eq!(svc.state(), CycleState::SafetyCooling);
    }

    #[test]
    fn tick_runs_once_per_control_interval() {
        let (clock, _, mut svc) = service(22.0);
        assert!(svc.poll(clock.now_ms()));
        clock.advance_ms(400);
        assert!(!svc.poll(clock.now_ms()));
        clock.advance_ms(600);
        assert!(svc.poll(clock.now_ms()));
    }

    #[test]
    fn reaching_top_setpoint_switches_to_cooling() {
        let (clock, thermocouple, mut svc) = service(22.0);
        svc.handle_command(Command::Start, clock.now_ms());
        thermocouple.set(81.0);
        clock.advance_ms(1000);
        svc.poll(clock.now_ms());
        assert_eq!(svc.state(), CycleState::Cooling);
        assert_eq!(svc.engine().drive(), Drive::Cool);
    }

    #[test]
    fn inverted_setpoint_is_ignored() {
        let (_, _, mut svc) = service(22.0);
        assert_eq!(svc.handle_command(Command::SetTopSetpoint(20.0), 0), CommandOutcome::Ignored);
        assert_eq!(svc.handle_command(Command::SetBottomSetpoint(85.0), 0), CommandOutcome::Ignored);
        assert_eq!(svc.handle_command(Command::SetTopSetpoint(95.0), 0), CommandOutcome::Applied);
        assert!((svc.engine().settings().top_setpoint_c - 95.0).abs() < f32::EPSILON);
    }

    #[test]
    fn status_carries_median_and_telemetry() {
        let (clock, _, mut svc) = service(30.0);
        svc.attach_telemetry(Arc::new(RecordQueue::new()));
        for _ in 0..3 {
            clock.advance_ms(300);
            svc.poll(clock.now_ms());
        }
        let status = svc.status(clock.now_ms());
        assert_eq!(status.median_c, Some(30.0));
        assert_eq!(status.telemetry.map(|t| t.submitted), Some(0));
    }

    #[test]
    fn accepted_setters_are_persisted() {
        let (_, _, mut svc) = service(22.0);
        let saved = Saved::default();
        svc.attach_config_store(Box::new(saved.clone()));

        assert_eq!(svc.handle_command(Command::SetTopSetpoint(90.0), 0), CommandOutcome::Applied);
        assert_eq!(svc.handle_command(Command::SetMaxCycles(12), 0), CommandOutcome::Applied);
        assert_eq!(svc.handle_command(Command::SetBottomSetpoint(95.0), 0), CommandOutcome::Ignored);

        let all = saved.all();
        assert_eq!(all.len(), 2);
        let last = all.last().expect("saved config");
        assert!((last.top_setpoint_c - 90.0).abs() < f32::EPSILON);
        assert_eq!(last.max_cycles, 12);
        assert_eq!(svc.config(), last);
    }

    #[test]
    fn failed_save_keeps_change_in_memory() {
        let (_, _, mut svc) = service(22.0);
        svc.attach_config_store(Box::new(Saved { fail: true, ..Saved::default() }));
        assert_eq!(svc.handle_command(Command::SetMaxCycles(3), 0), CommandOutcome::Applied);
        assert_eq!(svc.engine().settings().max_cycles, 3);
        assert_eq!(svc.config().max_cycles, 3);
    }

    #[test]
    fn invalid_sample_keeps_last_median() {
        let (clock, thermocouple, mut svc) = service(30.0);
        svc.poll(clock.now_ms());
        thermocouple.set(f32::NAN);
        clock.advance_ms(300);
        svc.poll(clock.now_ms());
        assert_eq!(svc.acquisition().current().value(), Some(30.0));
    }
}
