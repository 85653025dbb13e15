//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements          | Connects to                   |
//! |------------|---------------------|-------------------------------|
//! | `console`  | RowSink, Notifier   | Serial log (bench stand-ins)  |
//! | `log_sink` | TransitionObserver  | Serial log output             |
//! | `nvs`      | ConfigPort          | NVS / in-memory store         |
//! | `time`     | Clock, DelayNs      | ESP32 system timer / SimClock |
//!
//! The thermocouple and relay adapters live in `sensors` and `drivers`.

pub mod console;
pub mod log_sink;
pub mod nvs;
pub mod time;
