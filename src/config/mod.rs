//! Module: config
//!
//! Purpose: Configuration for the DCC generator.
//!
//! Architecture:
//! - timing.rs: static waveform timing, validated once at bind time
//! - DccConfig: runtime parameters read by the scheduler on every tick
//! - All runtime config atomically accessible (lock-free)
//! - `generation` increments on every accepted change
//!
//! Safety: RT-safe. All access via atomics, no locks.

pub mod timing;

pub use timing::TimingConfig;

use core::sync::atomic::{AtomicBool, AtomicU16, AtomicU8, Ordering};

use crate::error::ConfigError;
use crate::logging::LogLevel;

/// NMRA S-9.2 §C: at most 30 ms between packet starts.
pub const MAX_PACKET_PERIOD_MS: u16 = 30;

/// Shortest scheduler period accepted.
pub const MIN_PACKET_PERIOD_MS: u16 = 5;

/// Default scheduler period.
pub const DEFAULT_PACKET_PERIOD_MS: u16 = 15;

/// Upper bound for priority repeats of a fresh command.
pub const MAX_COMMAND_REPEATS: u8 = 8;

/// Default priority repeats of a fresh command.
pub const DEFAULT_COMMAND_REPEATS: u8 = 2;

/// Runtime configuration.
pub struct DccConfig {
    /// Scheduler period in milliseconds.
    packet_period_ms: AtomicU16,

    /// Priority sends granted to a freshly changed packet.
    command_repeats: AtomicU8,

    /// Insert a padding run between back-to-back packets to one decoder.
    same_address_padding: AtomicBool,

    /// Most verbose level forwarded by the log drain.
    log_level: AtomicU8,

    /// Bumped on every accepted change.
    generation: AtomicU16,
}

impl DccConfig {
    /// Create a config holding the defaults.
    pub const fn new() -> Self {
        Self {
            packet_period_ms: AtomicU16::new(DEFAULT_PACKET_PERIOD_MS),
            command_repeats: AtomicU8::new(DEFAULT_COMMAND_REPEATS),
            same_address_padding: AtomicBool::new(true),
            log_level: AtomicU8::new(LogLevel::Info as u8),
            generation: AtomicU16::new(0),
        }
    }

    #[inline]
    pub fn packet_period_ms(&self) -> u16 {
        self.packet_period_ms.load(Ordering::Relaxed)
    }

    pub fn set_packet_period_ms(&self, ms: u16) -> Result<(), ConfigError> {
        if !(MIN_PACKET_PERIOD_MS..=MAX_PACKET_PERIOD_MS).contains(&ms) {
            return Err(ConfigError::OutOfRange);
        }
        self.packet_period_ms.store(ms, Ordering::Relaxed);
        self.bump();
        Ok(())
    }

    #[inline]
    pub fn command_repeats(&self) -> u8 {
        self.command_repeats.load(Ordering::Relaxed)
    }

    pub fn set_command_repeats(&self, repeats: u8) -> Result<(), ConfigError> {
        if repeats > MAX_COMMAND_REPEATS {
            return Err(ConfigError::OutOfRange);
        }
        self.command_repeats.store(repeats, Ordering::Relaxed);
        self.bump();
        Ok(())
    }

    #[inline]
    pub fn same_address_padding(&self) -> bool {
        self.same_address_padding.load(Ordering::Relaxed)
    }

    pub fn set_same_address_padding(&self, enabled: bool) {
        self.same_address_padding.store(enabled, Ordering::Relaxed);
        self.bump();
    }

    #[inline]
    pub fn log_level(&self) -> LogLevel {
        LogLevel::from_u8(self.log_level.load(Ordering::Relaxed))
    }

    pub fn set_log_level(&self, level: LogLevel) {
        self.log_level.store(level as u8, Ordering::Relaxed);
        self.bump();
    }

    /// Configuration generation (changes on every accepted update).
    #[inline]
    pub fn generation(&self) -> u16 {
        self.generation.load(Ordering::Acquire)
    }

    fn bump(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }
}

impl Default for DccConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Process-wide runtime configuration.
pub static CONFIG: DccConfig = DccConfig::new();
