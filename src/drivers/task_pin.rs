//! Core-pinned thread spawning for the dual-core ESP32.
//!
//! On ESP-IDF `std::thread` sits on pthreads, which sit on FreeRTOS tasks.
//! `esp_pthread_set_cfg()` configures the *next* `pthread_create()` from
//! the calling thread, so the config and the spawn must not be interleaved
//! with another spawn on the same thread.
//!
//! Relay control runs on the main task; the telemetry worker is pinned to
//! the application core at a lower priority so a slow TLS handshake never
//! delays a control tick.

use std::io;
use std::thread::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Core {
    /// PRO_CPU, shared with WiFi and lwIP.
    Pro = 0,
    /// APP_CPU.
    App = 1,
}

/// Identity and resources of one background task.
#[derive(Debug, Clone, Copy)]
pub struct TaskSpec {
    /// NUL-terminated for FreeRTOS, e.g. `"telemetry\0"`.
    pub name: &'static str,
    pub core: Core,
    pub priority: u8,
    pub stack_bytes: usize,
}

impl TaskSpec {
    pub fn display_name(&self) -> &'static str {
        self.name.trim_end_matches('\0')
    }
}

#[cfg(target_os = "espidf")]
pub fn spawn_pinned(
    task: TaskSpec,
    f: impl FnOnce() + Send + 'static,
) -> io::Result<JoinHandle<()>> {
    // SAFETY: `task.name` is 'static and NUL-terminated; the config struct
    // is copied by esp_pthread_set_cfg before it returns.
    let ret = unsafe {
        let mut cfg = esp_idf_sys::esp_create_default_pthread_config();
        cfg.pin_to_core = task.core as i32;
        cfg.prio = i32::from(task.priority);
        cfg.stack_size = task.stack_bytes as _;
        cfg.thread_name = task.name.as_ptr().cast();
        esp_idf_sys::esp_pthread_set_cfg(&cfg)
    };
    if ret != esp_idf_sys::ESP_OK as i32 {
        return Err(io::Error::other(format!("esp_pthread_set_cfg failed: {ret}")));
    }

    log::info!(
        "Spawning '{}' on {:?} (pri={}, stack={}B)",
        task.display_name(),
        task.core,
        task.priority,
        task.stack_bytes
    );

    std::thread::Builder::new().name(task.display_name().into()).spawn(f)
}

/// Host fallback: no affinity or priority, stack size still honoured.
#[cfg(not(target_os = "espidf"))]
pub fn spawn_pinned(
    task: TaskSpec,
    f: impl FnOnce() + Send + 'static,
) -> io::Result<JoinHandle<()>> {
    log::info!(
        "Spawning '{}' (host, no core pinning, stack={}B)",
        task.display_name(),
        task.stack_bytes
    );

    std::thread::Builder::new()
        .name(task.display_name().into())
        .stack_size(task.stack_bytes)
        .spawn(f)
}
