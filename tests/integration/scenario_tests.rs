//! Cycle scenarios driven through the public engine and service APIs.

use thermocycler::adapters::time::SimClock;
use thermocycler::app::commands::{Command, CommandOutcome};
use thermocycler::app::events::RecordKind;
use thermocycler::app::ports::{Clock, Drive};
use thermocycler::app::service::ControlService;
use thermocycler::config::SystemConfig;
use thermocycler::cycle::{CycleEngine, CycleSettings, CycleState};
use thermocycler::drivers::relay::RelayPair;
use thermocycler::safety::SafetyPolicy;
use thermocycler::sensors::acquisition::{SensorTiming, TemperatureAcquisition};

use crate::mock_hw::{Board, MockPin, Thermocouple, RecordLog, Script};

type Engine = CycleEngine<RelayPair<MockPin, MockPin>, RecordLog>;

fn engine(board: &Board, settings: CycleSettings) -> Engine {
    CycleEngine::new(board.relays(), RecordLog::default(), settings, SafetyPolicy::default())
}

/// Tick once per simulated second, starting one second after `from`.
fn tick_each_second(engine: &mut Engine, source: &mut Script, from: u32, ticks: u32) -> u32 {
    let mut now = from;
    for _ in 0..ticks {
        now += 1000;
        engine.tick(now, source);
    }
    now
}

/// Heat to the top and cool to the bottom once; returns the time after.
fn run_one_cycle(engine: &mut Engine, from: u32) -> u32 {
    let mut script = Script::new([50.0, 80.0]);
    let now = tick_each_second(engine, &mut script, from, 2);
    assert_eq!(engine.state(), CycleState::Cooling);
    let mut script = Script::new([60.0, 40.0, 25.0]);
    tick_each_second(engine, &mut script, now, 3)
}

#[test]
fn rising_readings_switch_to_cooling_once() {
    let board = Board::new();
    let mut e = engine(&board, CycleSettings { top_setpoint_c: 80.0, bottom_setpoint_c: 25.0, max_cycles: 0 });
    let mut script = Script::new((0..=11).map(|k| 25.0 + 5.0 * k as f32));
    assert!(e.start(0, &mut script));
    assert!(board.heater());

    let now = tick_each_second(&mut e, &mut script, 0, 12);
    tick_each_second(&mut e, &mut script, now, 5);

    assert_eq!(e.state(), CycleState::Cooling);
    assert_eq!(e.observer().count(RecordKind::HeatToCool), 1);
    let transition = e.observer().0.iter().find(|r| r.kind == RecordKind::HeatToCool).expect("record");
    assert!(transition.temperature_c.is_some_and(|c| c >= 80.0));
    assert!(board.cooler() && !board.heater());
}

#[test]
fn cycle_limit_ends_with_cool_to_heat_then_off() {
    let board = Board::new();
    let mut e = engine(&board, CycleSettings { top_setpoint_c: 80.0, bottom_setpoint_c: 25.0, max_cycles: 3 });
    let mut idle = Script::invalid();
    e.start(0, &mut idle);

    let mut now = run_one_cycle(&mut e, 0);
    now = run_one_cycle(&mut e, now);
    assert_eq!(e.cycle_index(), 3);

    let mut script = Script::new([50.0, 80.0]);
    now = tick_each_second(&mut e, &mut script, now, 2);
    assert_eq!(e.state(), CycleState::Cooling);

    let mut script = Script::new([70.0, 50.0, 30.0, 25.0]);
    tick_each_second(&mut e, &mut script, now, 4);

    let kinds = e.observer().kinds();
    assert_eq!(kinds[kinds.len() - 2..], [RecordKind::CoolToHeat, RecordKind::Off]);
    assert_eq!(e.state(), CycleState::Off);
    assert!(!board.heater() && !board.cooler());
    let last_transition = &e.observer().0[kinds.len() - 2];
    assert_eq!(last_transition.cycle_index, 3);
}

#[test]
fn no_runaway_trip_without_completed_heating_phase() {
    let board = Board::new();
    let mut e = engine(&board, CycleSettings::default());
    let mut script = Script::new([30.0]);
    e.start(0, &mut script);

    tick_each_second(&mut e, &mut script, 0, 3 * 3600);

    assert_eq!(e.state(), CycleState::Heating);
    assert_eq!(e.heating_average_ms(), None);
    assert_eq!(e.observer().kinds(), [RecordKind::Start]);
}

#[test]
fn stuck_temperature_trips_stagnation_once() {
    let board = Board::new();
    let mut e = engine(&board, CycleSettings::default());
    let mut script = Script::new((0..200).map(|i| [50.0, 48.0, 52.0, 51.0][i % 4]));
    e.start(0, &mut script);

    tick_each_second(&mut e, &mut script, 0, 130);

    assert_eq!(e.state(), CycleState::SafetyCooling);
    assert_eq!(e.observer().count(RecordKind::StagnationTrip), 1);
    assert!(board.cooler() && !board.heater());
}

#[test]
fn invalid_readings_change_nothing() {
    let board = Board::new();
    let mut e = engine(&board, CycleSettings::default());
    let mut script = Script::invalid();
    e.start(0, &mut script);

    tick_each_second(&mut e, &mut script, 0, 600);

    assert_eq!(e.state(), CycleState::Heating);
    assert_eq!(e.drive(), Drive::Heat);
    assert_eq!(e.observer().kinds(), [RecordKind::Start]);
}

#[test]
fn repeated_stop_is_idempotent() {
    let board = Board::new();
    let mut e = engine(&board, CycleSettings::default());
    let mut script = Script::new([60.0]);
    e.start(0, &mut script);
    assert!(e.stop(1000, &mut script));
    assert!(!e.stop(2000, &mut script));
    assert!(!e.stop(3000, &mut script));

    assert_eq!(e.state(), CycleState::SafetyCooling);
    assert_eq!(e.observer().count(RecordKind::Stop), 1);
}

#[test]
fn cooldown_releases_after_hold_below_threshold() {
    let board = Board::new();
    let mut e = engine(&board, CycleSettings::default());
    let mut script = Script::new([60.0]);
    e.start(0, &mut script);
    e.stop(0, &mut script);

    let mut script = Script::new([50.0, 40.0, 30.0]);
    let now = tick_each_second(&mut e, &mut script, 0, 3);
    assert_eq!(e.observer().count(RecordKind::SafetyCooling), 1);
    assert_eq!(e.state(), CycleState::SafetyCooling);

    tick_each_second(&mut e, &mut script, now, 120);
    assert_eq!(e.state(), CycleState::Off);
    assert_eq!(e.observer().kinds().last(), Some(&RecordKind::Off));
    assert!(!board.heater() && !board.cooler());
}

// ── Full pipeline on simulated time ───────────────────────────

#[test]
fn unplugged_thermocouple_yields_no_vote_and_no_transition() {
    let clock = SimClock::new();
    let thermocouple = Thermocouple::at(22.0);
    thermocouple.unplug();

    let mut acq = TemperatureAcquisition::new(thermocouple.clone(), clock.clone(), clock.clone(), SensorTiming::default());
    assert!(!acq.critical().valid);
    assert!(acq.fault_count() > 0);

    let board = Board::new();
    let mut svc = ControlService::new(
        &SystemConfig::default(),
        thermocouple,
        clock.clone(),
        clock.clone(),
        board.relays(),
        RecordLog::default(),
    );
    svc.handle_command(Command::Start, clock.now_ms());
    for _ in 0..10 {
        clock.advance_ms(1000);
        svc.poll(clock.now_ms());
    }
    assert_eq!(svc.state(), CycleState::Heating);
    assert_eq!(svc.engine().observer().kinds(), [RecordKind::Start]);
    assert!(svc.status(clock.now_ms()).median_c.is_none());
}

#[test]
fn thermal_model_runs_two_cycles_to_off() {
    let clock = SimClock::new();
    let thermocouple = Thermocouple::at(22.0);
    let board = Board::new();
    let config = SystemConfig { max_cycles: 2, ..Default::default() };
    let mut svc = ControlService::new(
        &config,
        thermocouple.clone(),
        clock.clone(),
        clock.clone(),
        board.relays(),
        RecordLog::default(),
    );
    assert_eq!(svc.handle_command(Command::Start, clock.now_ms()), CommandOutcome::Applied);

    let mut last = clock.now_ms();
    for _ in 0..20_000 {
        clock.advance_ms(100);
        let now = clock.now_ms();
        let dt = now.wrapping_sub(last) as f32 / 1000.0;
        last = now;
        let rate = if board.heater() {
            1.0
        } else if board.cooler() {
            -1.0
        } else {
            0.0
        };
        thermocouple.set(thermocouple.get().unwrap_or(22.0) + rate * dt);
        svc.poll(now);
        if svc.state() == CycleState::Off {
            break;
        }
    }

    let log = svc.engine().observer();
    assert_eq!(
        log.kinds(),
        [
            RecordKind::Start,
            RecordKind::HeatToCool,
            RecordKind::CoolToHeat,
            RecordKind::HeatToCool,
            RecordKind::CoolToHeat,
            RecordKind::Off,
        ]
    );
    let indices: Vec<u32> =
        log.0.iter().filter(|r| r.kind == RecordKind::CoolToHeat).map(|r| r.cycle_index).collect();
    assert_eq!(indices, [1, 2]);
    assert!(!board.overlap_seen());
    assert!(!board.heater() && !board.cooler());
    assert!(svc.engine().heating_average_ms().is_some());
}
