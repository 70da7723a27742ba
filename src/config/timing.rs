//! Waveform timing constants.
//!
//! All durations are integer tick counts of the waveform clock. The default
//! clock is 500 kHz (2 µs tick), which gives:
//!
//! ```text
//!  "1" bit: 29 high + 29 low =  58 µs + 58 µs
//!  "0" bit: 50 high + 50 low = 100 µs + 100 µs
//! ```
//!
//! Bounds are the NMRA S-9.1 command station transmit limits.

use crate::error::ConfigError;

/// Default waveform clock: 2 µs per tick.
pub const DEFAULT_TICK_NS: u32 = 2_000;

/// APB clock feeding the ESP32 RMT peripheral.
pub const APB_CLOCK_HZ: u32 = 80_000_000;

/// S-9.1: "1" half-cycle lower bound (ns).
pub const ONE_HALF_MIN_NS: u32 = 55_000;
/// S-9.1: "1" half-cycle upper bound (ns).
pub const ONE_HALF_MAX_NS: u32 = 61_000;
/// S-9.1: "0" half-cycle lower bound (ns).
pub const ZERO_HALF_MIN_NS: u32 = 95_000;
/// S-9.1: "0" half-cycle upper bound (ns).
pub const ZERO_HALF_MAX_NS: u32 = 9_900_000;

/// Minimum long/short ratio, in hundredths.
pub const MIN_LONG_SHORT_RATIO_PCT: u32 = 172;

/// Half-cycle timing of the waveform engine.
///
/// High and low halves of a bit always have the same width, so a bit is
/// fully described by its half-cycle tick count.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimingConfig {
    /// Tick period in nanoseconds.
    pub tick_ns: u32,
    /// Half-cycle width of a "1" bit, in ticks.
    pub one_half_ticks: u16,
    /// Half-cycle width of a "0" bit, in ticks.
    pub zero_half_ticks: u16,
}

impl TimingConfig {
    /// Nominal NMRA timing on a 2 µs tick (58 µs / 100 µs).
    pub const NMRA: Self = Self {
        tick_ns: DEFAULT_TICK_NS,
        one_half_ticks: 29,
        zero_half_ticks: 50,
    };

    /// "1" half-cycle in nanoseconds.
    #[inline]
    pub const fn one_half_ns(&self) -> u32 {
        self.tick_ns.saturating_mul(self.one_half_ticks as u32)
    }

    /// "0" half-cycle in nanoseconds.
    #[inline]
    pub const fn zero_half_ns(&self) -> u32 {
        self.tick_ns.saturating_mul(self.zero_half_ticks as u32)
    }

    /// Tick frequency in Hz, 0 for a zero tick.
    #[inline]
    pub const fn tick_hz(&self) -> u32 {
        if self.tick_ns == 0 {
            return 0;
        }
        1_000_000_000 / self.tick_ns
    }

    /// Check the timing against S-9.1.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_ns == 0 || self.one_half_ticks == 0 || self.zero_half_ticks == 0 {
            return Err(ConfigError::InvalidTiming);
        }

        let one = self.tick_ns as u64 * self.one_half_ticks as u64;
        let zero = self.tick_ns as u64 * self.zero_half_ticks as u64;

        if one < ONE_HALF_MIN_NS as u64 || one > ONE_HALF_MAX_NS as u64 {
            return Err(ConfigError::InvalidTiming);
        }
        if zero < ZERO_HALF_MIN_NS as u64 || zero > ZERO_HALF_MAX_NS as u64 {
            return Err(ConfigError::InvalidTiming);
        }

        // Compare in ticks: long * 100 >= short * 172
        if (self.zero_half_ticks as u32) * 100 < (self.one_half_ticks as u32) * MIN_LONG_SHORT_RATIO_PCT {
            return Err(ConfigError::InvalidTiming);
        }

        Ok(())
    }

    /// RMT clock divider producing this tick from `source_hz`.
    ///
    /// Returns `None` if the tick is not an exact multiple of the source
    /// period or the divider does not fit the 8-bit register.
    pub fn clock_divider(&self, source_hz: u32) -> Option<u8> {
        let tick_hz = self.tick_hz();
        if tick_hz == 0 || source_hz % tick_hz != 0 {
            return None;
        }
        u8::try_from(source_hz / tick_hz).ok().filter(|d| *d > 0)
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self::NMRA
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nmra_defaults_valid() {
        let t = TimingConfig::NMRA;
        assert!(t.validate().is_ok());
        assert_eq!(t.one_half_ns(), 58_000);
        assert_eq!(t.zero_half_ns(), 100_000);
        assert_eq!(t.tick_hz(), 500_000);
    }

    #[test]
    fn test_rmt_divider() {
        assert_eq!(TimingConfig::NMRA.clock_divider(APB_CLOCK_HZ), Some(160));

        // 1 µs tick would need divider 80
        let t = TimingConfig { tick_ns: 1_000, one_half_ticks: 58, zero_half_ticks: 100 };
        assert_eq!(t.clock_divider(APB_CLOCK_HZ), Some(80));

        // 10 µs tick needs 800, does not fit
        let t = TimingConfig { tick_ns: 10_000, one_half_ticks: 6, zero_half_ticks: 10 };
        assert_eq!(t.clock_divider(APB_CLOCK_HZ), None);
    }
}
