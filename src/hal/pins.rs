//! Timing channel and pin binding.
//!
//! Limits and board defaults depend on the selected chip feature.

use crate::error::ConfigError;

/// Highest usable GPIO number.
#[cfg(not(feature = "esp32p4"))]
pub const MAX_GPIO: u8 = 48;
#[cfg(feature = "esp32p4")]
pub const MAX_GPIO: u8 = 54;

/// RMT channels able to transmit.
pub const RMT_TX_CHANNELS: u8 = 4;

/// Hardware resources claimed by the generator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Binding {
    /// RMT TX channel carrying the DCC waveform.
    pub channel: u8,
    /// GPIO driving the booster PHASE input.
    pub signal_pin: u8,
    /// GPIO driving the booster ENABLE input.
    pub enable_pin: u8,
}

impl Binding {
    /// Board default (ESP32-S3 DevKit: GPIO4 signal, GPIO5 enable).
    #[cfg(not(feature = "esp32p4"))]
    pub const BOARD_DEFAULT: Self = Self {
        channel: 0,
        signal_pin: 4,
        enable_pin: 5,
    };

    /// Board default (ESP32-P4: GPIO20 signal, GPIO19 enable).
    #[cfg(feature = "esp32p4")]
    pub const BOARD_DEFAULT: Self = Self {
        channel: 0,
        signal_pin: 20,
        enable_pin: 19,
    };

    /// Check channel and pins against the chip limits.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channel >= RMT_TX_CHANNELS {
            return Err(ConfigError::InvalidChannel(self.channel));
        }
        if self.signal_pin > MAX_GPIO {
            return Err(ConfigError::InvalidPin(self.signal_pin));
        }
        if self.enable_pin > MAX_GPIO {
            return Err(ConfigError::InvalidPin(self.enable_pin));
        }
        if self.signal_pin == self.enable_pin {
            return Err(ConfigError::PinConflict(self.signal_pin));
        }
        Ok(())
    }

    /// Pack into one word: channel | signal << 8 | enable << 16.
    #[inline]
    pub(crate) const fn pack(self) -> u32 {
        self.channel as u32 | (self.signal_pin as u32) << 8 | (self.enable_pin as u32) << 16
    }

    #[inline]
    pub(crate) const fn unpack(raw: u32) -> Self {
        Self {
            channel: raw as u8,
            signal_pin: (raw >> 8) as u8,
            enable_pin: (raw >> 16) as u8,
        }
    }
}

impl Default for Binding {
    fn default() -> Self {
        Self::BOARD_DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_board_default_valid() {
        assert!(Binding::BOARD_DEFAULT.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects() {
        let b = Binding { channel: RMT_TX_CHANNELS, ..Binding::BOARD_DEFAULT };
        assert_eq!(b.validate(), Err(ConfigError::InvalidChannel(RMT_TX_CHANNELS)));

        let b = Binding { signal_pin: MAX_GPIO + 1, ..Binding::BOARD_DEFAULT };
        assert_eq!(b.validate(), Err(ConfigError::InvalidPin(MAX_GPIO + 1)));

        let b = Binding { channel: 1, signal_pin: 7, enable_pin: 7 };
        assert_eq!(b.validate(), Err(ConfigError::PinConflict(7)));
    }

    #[test]
    fn test_pack_unpack() {
        let b = Binding { channel: 3, signal_pin: 20, enable_pin: 19 };
        assert_eq!(Binding::unpack(b.pack()), b);
    }
}
