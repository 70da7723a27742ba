//! Error types for the DCC generator.
//!
//! Three families, matching how failures are reported:
//! - [`PacketError`]: a command could not be encoded (bad address, speed, function)
//! - [`CommandError`]: a host command was rejected and nothing was changed
//! - [`ConfigError`]: binding, timing or runtime configuration is invalid
//!
//! Starvation of the waveform engine is not an error and has no type here.

use core::fmt;

/// Packet encoding error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketError {
    /// P01: Address outside 1..=127 (short) and 128..=10239 (long)
    InvalidAddress(u16),
    /// P02: Speed outside 0..=127
    InvalidSpeed(u8),
    /// P03: Function number outside group 1 (F0..F4)
    InvalidFunction(u8),
    /// P04: More bytes than a packet can carry
    TooLong,
    /// P05: Nothing to frame
    Empty,
}

impl PacketError {
    /// Get error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidAddress(_) => "P01",
            Self::InvalidSpeed(_) => "P02",
            Self::InvalidFunction(_) => "P03",
            Self::TooLong => "P04",
            Self::Empty => "P05",
        }
    }

    /// Get error message
    pub fn message(&self) -> &'static str {
        match self {
            Self::InvalidAddress(_) => "invalid decoder address",
            Self::InvalidSpeed(_) => "speed out of range",
            Self::InvalidFunction(_) => "function not in group 1",
            Self::TooLong => "packet too long",
            Self::Empty => "empty packet",
        }
    }
}

impl fmt::Display for PacketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::InvalidAddress(v) => write!(f, "{}: {} ({})", self.code(), self.message(), v),
            Self::InvalidSpeed(v) | Self::InvalidFunction(v) => {
                write!(f, "{}: {} ({})", self.code(), self.message(), v)
            }
            _ => write!(f, "{}: {}", self.code(), self.message()),
        }
    }
}

/// Host command rejection.
///
/// Every variant means the command table was left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    /// Command could not be encoded (reports the P-code)
    Packet(PacketError),
    /// C02: Every refresh slot is taken by another address
    QueueFull,
    /// C03: Generator has not been bound to hardware yet
    NotBound,
    /// C04: Binding failed, generator is unusable
    Faulted,
}

impl CommandError {
    /// Get error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::Packet(e) => e.code(),
            Self::QueueFull => "C02",
            Self::NotBound => "C03",
            Self::Faulted => "C04",
        }
    }

    /// Get error message
    pub fn message(&self) -> &'static str {
        match self {
            Self::Packet(e) => e.message(),
            Self::QueueFull => "refresh queue full",
            Self::NotBound => "generator not bound",
            Self::Faulted => "generator faulted",
        }
    }
}

impl From<PacketError> for CommandError {
    fn from(e: PacketError) -> Self {
        Self::Packet(e)
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Packet(e) => e.fmt(f),
            _ => write!(f, "{}: {}", self.code(), self.message()),
        }
    }
}

/// Configuration error.
///
/// Binding and timing errors are fatal for the generator instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// E01: Timing channel index not available on this chip
    InvalidChannel(u8),
    /// E02: GPIO number not available on this chip
    InvalidPin(u8),
    /// E03: Signal and enable bound to the same GPIO
    PinConflict(u8),
    /// E04: Half-cycle timing outside NMRA S-9.1 bounds
    InvalidTiming,
    /// E05: Runtime parameter out of allowed range
    OutOfRange,
    /// E06: Another context is binding right now
    BindInProgress,
}

impl ConfigError {
    /// Get error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidChannel(_) => "E01",
            Self::InvalidPin(_) => "E02",
            Self::PinConflict(_) => "E03",
            Self::InvalidTiming => "E04",
            Self::OutOfRange => "E05",
            Self::BindInProgress => "E06",
        }
    }

    /// Get error message
    pub fn message(&self) -> &'static str {
        match self {
            Self::InvalidChannel(_) => "invalid timing channel",
            Self::InvalidPin(_) => "invalid pin",
            Self::PinConflict(_) => "signal and enable share a pin",
            Self::InvalidTiming => "timing outside NMRA S-9.1",
            Self::OutOfRange => "out of range",
            Self::BindInProgress => "binding in progress",
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::InvalidChannel(v) | Self::InvalidPin(v) | Self::PinConflict(v) => {
                write!(f, "{}: {} ({})", self.code(), self.message(), v)
            }
            _ => write!(f, "{}: {}", self.code(), self.message()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_error_wraps_packet_code() {
        let err: CommandError = PacketError::InvalidSpeed(200).into();
        assert_eq!(err.code(), "P02");
        assert_eq!(err, CommandError::Packet(PacketError::InvalidSpeed(200)));
    }

    #[test]
    fn test_display_includes_value() {
        let text = format!("{}", PacketError::InvalidAddress(10240));
        assert_eq!(text, "P01: invalid decoder address (10240)");

        let text = format!("{}", ConfigError::PinConflict(19));
        assert!(text.starts_with("E03"));
        assert!(text.ends_with("(19)"));
    }
}
