//! Fault state for the DCC generator.
//!
//! > A wrong waveform on the rails is worse than no waveform.
//! > If in doubt, FAULT and keep the enable line low.
//!
//! A fault is latched by the generator (failed bind, bad timing) or by the
//! firmware (driver error). Once active, commands are refused and the
//! scheduler keeps track power off.

use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

/// Reason the generator stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum FaultCode {
    /// No fault (normal operation).
    None = 0,

    /// First bind rejected: bad channel or pins.
    /// Data carries the offending channel/pin number.
    InvalidBinding = 1,

    /// Timing outside NMRA S-9.1 bounds.
    InvalidTiming = 2,

    /// Pulse peripheral or GPIO driver failed at runtime.
    DriverFault = 3,
}

impl FaultCode {
    /// Convert from raw u8 value.
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => FaultCode::InvalidBinding,
            2 => FaultCode::InvalidTiming,
            3 => FaultCode::DriverFault,
            _ => FaultCode::None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FaultCode::None => "none",
            FaultCode::InvalidBinding => "invalid binding",
            FaultCode::InvalidTiming => "invalid timing",
            FaultCode::DriverFault => "driver fault",
        }
    }
}

/// Thread-safe latched fault.
///
/// # Usage
///
/// ```ignore
/// if let Err(e) = timing.validate() {
///     fault.set(FaultCode::InvalidTiming, 0);
///     return Err(e);
/// }
///
/// // Scheduler:
/// if fault.is_active() {
///     enable.set(false);
/// }
/// ```
pub struct FaultState {
    active: AtomicBool,
    code: AtomicU8,

    /// Extra detail (pin number, driver error code).
    data: AtomicU32,

    /// Total faults since boot (never cleared).
    count: AtomicU32,
}

impl FaultState {
    pub const fn new() -> Self {
        Self {
            active: AtomicBool::new(false),
            code: AtomicU8::new(0),
            data: AtomicU32::new(0),
            count: AtomicU32::new(0),
        }
    }

    /// Latch a fault. Data is published before the active flag.
    #[inline]
    pub fn set(&self, code: FaultCode, data: u32) {
        self.code.store(code as u8, Ordering::Release);
        self.data.store(data, Ordering::Release);
        self.count.fetch_add(1, Ordering::Relaxed);
        self.active.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Fault code (only meaningful if `is_active()` is true).
    #[inline]
    pub fn code(&self) -> FaultCode {
        FaultCode::from_u8(self.code.load(Ordering::Acquire))
    }

    #[inline]
    pub fn data(&self) -> u32 {
        self.data.load(Ordering::Acquire)
    }

    #[inline]
    pub fn count(&self) -> u32 {
        self.count.load(Ordering::Relaxed)
    }
}

impl Default for FaultState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_state_basic() {
        let fault = FaultState::new();

        assert!(!fault.is_active());
        assert_eq!(fault.code(), FaultCode::None);
        assert_eq!(fault.count(), 0);

        fault.set(FaultCode::InvalidBinding, 99);

        assert!(fault.is_active());
        assert_eq!(fault.code(), FaultCode::InvalidBinding);
        assert_eq!(fault.data(), 99);
        assert_eq!(fault.count(), 1);
    }

    #[test]
    fn test_fault_code_roundtrip_unknown_is_none() {
        for code in [
            FaultCode::None,
            FaultCode::InvalidBinding,
            FaultCode::InvalidTiming,
            FaultCode::DriverFault,
        ] {
            assert_eq!(FaultCode::from_u8(code as u8), code);
        }
        assert_eq!(FaultCode::from_u8(200), FaultCode::None);
    }

    #[test]
    fn test_latest_fault_wins() {
        let fault = FaultState::new();
        fault.set(FaultCode::InvalidTiming, 1);
        fault.set(FaultCode::DriverFault, 7);

        assert!(fault.is_active());
        assert_eq!(fault.code(), FaultCode::DriverFault);
        assert_eq!(fault.data(), 7);
        assert_eq!(fault.count(), 2);
    }
}
