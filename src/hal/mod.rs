//! Hardware Abstraction Layer for the DCC generator.
//!
//! Thin wrappers around ESP-IDF peripherals.
//! Packet and waveform logic stays in core modules, HAL is just I/O.
//!
//! - `pins`: channel/pin binding and per-chip limits (host-testable)
//! - `gpio`: booster enable line, an `embedded_hal` output pin (ESP-IDF only)
//! - `rmt`: RMT TX channel fed by the waveform engine (ESP-IDF only)

pub mod pins;

#[cfg(target_os = "espidf")]
pub mod gpio;
#[cfg(target_os = "espidf")]
pub mod rmt;

pub use pins::{Binding, MAX_GPIO, RMT_TX_CHANNELS};

/// Monotonic timestamp for log entries, in microseconds.
#[cfg(target_os = "espidf")]
#[inline]
pub fn timestamp_us() -> i64 {
    // SAFETY: esp_timer_get_time has no preconditions
    unsafe { esp_idf_svc::sys::esp_timer_get_time() }
}

/// Host builds have no clock source; entries are stamped 0.
#[cfg(not(target_os = "espidf"))]
#[inline]
pub fn timestamp_us() -> i64 {
    0
}
