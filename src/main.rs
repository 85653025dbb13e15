//! Thermocycler Firmware: Main Entry Point
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                       Adapters (outer ring)                      │
//! │                                                                  │
//! │  Max6675 (SPI)   RelayPair (GPIO)   NvsConfigStore   MonotonicClock│
//! │  LogObserver     ConsoleRowSink     ConsoleNotifier               │
//! │                                                                  │
//! │  ──────────────── Port Trait Boundary ───────────────────        │
//! │                                                                  │
//! │  ┌─────────────────────────────┐     ┌───────────────────────┐   │
//! │  │ ControlService (main task)  │────▶│ DeliveryWorker        │   │
//! │  │ Acquisition · Engine        │queue│ (telemetry task)      │   │
//! │  └─────────────────────────────┘     └───────────────────────┘   │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::io::BufRead as _;
use std::sync::Arc;
use std::sync::mpsc;

use anyhow::Result;
use log::{info, warn};

use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::gpio::{AnyIOPin, AnyInputPin, AnyOutputPin, PinDriver};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::spi::{SpiConfig, SpiDeviceDriver, SpiDriver, SpiDriverConfig};
use esp_idf_hal::units::FromValueType as _;
use esp_idf_svc::nvs::EspDefaultNvsPartition;

use thermocycler::adapters::console::{ConsoleNotifier, ConsoleRowSink};
use thermocycler::adapters::log_sink::LogObserver;
use thermocycler::adapters::nvs::NvsConfigStore;
use thermocycler::adapters::time::MonotonicClock;
use thermocycler::app::commands::Command;
use thermocycler::app::ports::{Clock, ConfigPort};
use thermocycler::app::service::ControlService;
use thermocycler::config::SystemConfig;
use thermocycler::drivers::relay::RelayPair;
use thermocycler::pins;
use thermocycler::sensors::max6675::Max6675;
use thermocycler::telemetry::queue::RecordQueue;
use thermocycler::telemetry::worker::{DeliveryWorker, TelemetryProducer};

/// Main-loop period; the service rate-limits sampling and ticks itself.
const POLL_PERIOD_MS: u32 = 50;
/// How often the status snapshot is written to the log.
const STATUS_LOG_INTERVAL_MS: u32 = 10_000;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Thermocycler v{}                 ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let peripherals = Peripherals::take()?;

    // ── 2. Load config from NVS (or defaults) ─────────────────
    let store = NvsConfigStore::new(EspDefaultNvsPartition::take()?);
    let config = match store.as_ref().map(|s| s.load()) {
        Ok(Ok(cfg)) => cfg,
        Ok(Err(e)) => {
            warn!("Stored config unusable ({}), using defaults", e);
            SystemConfig::default()
        }
        Err(e) => {
            warn!("NVS unavailable ({}), running with defaults and no persistence", e);
            SystemConfig::default()
        }
    };
    config.validate()?;
    info!(
        "Setpoints {:.1}/{:.1} \u{00b0}C, max cycles {}",
        config.top_setpoint_c, config.bottom_setpoint_c, config.max_cycles
    );

    // ── 3. Relays (both released before anything else runs) ──
    // SAFETY: the pin numbers come from `pins` and are not used by any
    // other driver in this binary.
    let heater = PinDriver::output(unsafe { AnyOutputPin::new(pins::HEATER_RELAY_GPIO) })?;
    let cooler = PinDriver::output(unsafe { AnyOutputPin::new(pins::COOLER_RELAY_GPIO) })?;
    let relays = RelayPair::new(heater, cooler)
        .map_err(|e| anyhow::anyhow!("relay init failed: {e}"))?;

    // ── 4. MAX6675 on SPI2 (receive only) ─────────────────────
    // SAFETY: as above.
    let spi = SpiDriver::new_without_sdo(
        peripherals.spi2,
        unsafe { AnyOutputPin::new(pins::MAX6675_SCK_GPIO) },
        unsafe { AnyInputPin::new(pins::MAX6675_MISO_GPIO) },
        &SpiDriverConfig::new(),
    )?;
    let device = SpiDeviceDriver::new(
        spi,
        Some(unsafe { AnyIOPin::new(pins::MAX6675_CS_GPIO) }),
        &SpiConfig::new().baudrate(pins::MAX6675_SPI_HZ.Hz()),
    )?;
    let thermocouple = Max6675::new(device);

    // ── 5. Telemetry worker ───────────────────────────────────
    let queue = Arc::new(RecordQueue::new());
    let worker = DeliveryWorker::new(
        Arc::clone(&queue),
        ConsoleRowSink::new(),
        ConsoleNotifier,
        MonotonicClock::new(),
        FreeRtos,
        &config,
    );
    let _worker = worker.spawn()?;

    // ── 6. Control service ────────────────────────────────────
    let clock = MonotonicClock::new();
    let observer = (LogObserver::new(), TelemetryProducer::new(Arc::clone(&queue)));
    let mut service = ControlService::new(&config, thermocouple, FreeRtos, clock.clone(), relays, observer);
    service.attach_telemetry(queue);
    if let Ok(store) = store {
        service.attach_config_store(Box::new(store));
    }

    // ── 7. Bench console → command channel ────────────────────
    let (commands, inbox) = mpsc::channel::<Command>();
    std::thread::Builder::new().name("console".into()).stack_size(8192).spawn(move || {
        for line in std::io::stdin().lock().lines().map_while(std::result::Result::ok) {
            match Command::parse(&line) {
                Some(cmd) => {
                    if commands.send(cmd).is_err() {
                        break;
                    }
                }
                None => warn!("console: unknown command '{}'", line.trim()),
            }
        }
    })?;

    info!("System ready. Entering control loop.");

    // ── 8. Control loop ───────────────────────────────────────
    let mut last_status = clock.now_ms();
    loop {
        for cmd in inbox.try_iter() {
            service.handle_command(cmd, clock.now_ms());
        }

        let now = clock.now_ms();
        service.poll(now);

        if now.wrapping_sub(last_status) >= STATUS_LOG_INTERVAL_MS {
            last_status = now;
            match serde_json::to_string(&service.status(now)) {
                Ok(json) => info!("STATUS | {}", json),
                Err(e) => warn!("STATUS | encode failed: {}", e),
            }
        }

        FreeRtos::delay_ms(POLL_PERIOD_MS);
    }
}
