//! DCC generator handle: binding, power and host commands.
//!
//! One instance per process ([`DCC_GENERATOR`]), bound once to a timing
//! channel and a signal/enable pin pair. Host commands are `&self` calls
//! backed by atomics and return immediately; the packet scheduler reads the
//! resulting state.
//!
//! ```text
//!  bind() ──▶ Unbound ──validate ok──▶ Ready ──▶ commands accepted
//!                  │
//!                  └──validate err──▶ Failed ──▶ CommandError::Faulted
//! ```
//!
//! Power is tri-state: `Unknown` until the first `power(Some(..))` call,
//! then `Off` or `On`. The scheduler is inert while `Unknown`.

use core::sync::atomic::{AtomicU16, AtomicU32, AtomicU8, Ordering};

use crate::config::TimingConfig;
use crate::error::{CommandError, ConfigError};
use crate::fault::{FaultCode, FaultState};
use crate::hal::{timestamp_us, Binding};
use crate::log_globals::BG_LOG_STREAM;
use crate::logging::LogSource;
use crate::packet::{Address, Direction, FunctionGroup1};
use crate::refresh::{RefreshQueue, DEFAULT_SLOTS};
use crate::{rt_error, rt_info};

/// Requested track power.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Power {
    Off,
    On,
}

/// Observed track power.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum PowerState {
    /// Not yet set since bind: enable low, no packets.
    Unknown = 0,
    /// Enable low, idle packets only.
    Off = 1,
    /// Enable high, refresh queue transmitted.
    On = 2,
}

impl PowerState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => PowerState::Off,
            2 => PowerState::On,
            _ => PowerState::Unknown,
        }
    }
}

// Bind states
const UNBOUND: u8 = 0;
const BINDING: u8 = 1;
const READY: u8 = 2;
const FAILED: u8 = 3;

/// Generator instance.
pub struct DccGenerator<const S: usize = DEFAULT_SLOTS> {
    state: AtomicU8,
    binding: AtomicU32,
    /// Divider from the APB clock to the engine tick.
    clock_divider: AtomicU8,
    /// Error of a failed first bind, see `encode_config_error`.
    bind_error: AtomicU16,
    power: AtomicU8,
    queue: RefreshQueue<S>,
    fault: FaultState,
}

impl<const S: usize> DccGenerator<S> {
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(UNBOUND),
            binding: AtomicU32::new(0),
            clock_divider: AtomicU8::new(0),
            bind_error: AtomicU16::new(0),
            power: AtomicU8::new(PowerState::Unknown as u8),
            queue: RefreshQueue::new(),
            fault: FaultState::new(),
        }
    }

    /// Bind to hardware.
    ///
    /// The first call validates `binding` and `timing` and stores them.
    /// Later calls ignore their arguments and return the same handle, or the
    /// first call's error if it failed. A failed bind latches a fault and
    /// leaves the instance unusable.
    pub fn bind(&self, binding: Binding, timing: &TimingConfig) -> Result<&Self, ConfigError> {
        match self
            .state
            .compare_exchange(UNBOUND, BINDING, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {}
            Err(READY) => return Ok(self),
            Err(FAILED) => {
                return Err(decode_config_error(self.bind_error.load(Ordering::Acquire)));
            }
            // Another context is binding right now
            Err(_) => return Err(ConfigError::BindInProgress),
        }

        let divider = binding
            .validate()
            .and_then(|_| timing.validate())
            .and_then(|_| {
                timing
                    .clock_divider(crate::config::timing::APB_CLOCK_HZ)
                    .ok_or(ConfigError::InvalidTiming)
            });

        match divider {
            Ok(divider) => {
                self.binding.store(binding.pack(), Ordering::Relaxed);
                self.clock_divider.store(divider, Ordering::Relaxed);
                self.state.store(READY, Ordering::Release);
                rt_info!(
                    BG_LOG_STREAM,
                    LogSource::System,
                    timestamp_us(),
                    "bound: channel {} signal GPIO{} enable GPIO{} div {}",
                    binding.channel,
                    binding.signal_pin,
                    binding.enable_pin,
                    divider
                );
                Ok(self)
            }
            Err(e) => {
                let (code, data) = match e {
                    ConfigError::InvalidTiming => (FaultCode::InvalidTiming, 0),
                    ConfigError::InvalidChannel(v)
                    | ConfigError::InvalidPin(v)
                    | ConfigError::PinConflict(v) => (FaultCode::InvalidBinding, v as u32),
                    _ => (FaultCode::InvalidBinding, 0),
                };
                self.fault.set(code, data);
                self.bind_error.store(encode_config_error(e), Ordering::Relaxed);
                self.state.store(FAILED, Ordering::Release);
                rt_error!(BG_LOG_STREAM, LogSource::System, timestamp_us(), "bind failed: {}", e);
                Err(e)
            }
        }
    }

    /// Binding in use, `None` before a successful bind.
    pub fn binding(&self) -> Option<Binding> {
        self.is_ready()
            .then(|| Binding::unpack(self.binding.load(Ordering::Relaxed)))
    }

    /// RMT clock divider for the bound timing, `None` before a successful bind.
    pub fn clock_divider(&self) -> Option<u8> {
        self.is_ready()
            .then(|| self.clock_divider.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.state.load(Ordering::Acquire) == READY
    }

    /// Set track power, or read it with `None`.
    ///
    /// Has no effect before a successful bind or while faulted. The refresh
    /// queue is kept across power cycles.
    pub fn power(&self, request: Option<Power>) -> PowerState {
        let Some(request) = request else {
            return self.power_state();
        };
        if !self.is_ready() || self.fault.is_active() {
            return self.power_state();
        }

        let next = match request {
            Power::Off => PowerState::Off,
            Power::On => PowerState::On,
        };
        let prev = PowerState::from_u8(self.power.swap(next as u8, Ordering::AcqRel));
        if prev != next {
            rt_info!(BG_LOG_STREAM, LogSource::Command, timestamp_us(), "power {:?} -> {:?}", prev, next);
        }
        next
    }

    #[inline]
    pub fn power_state(&self) -> PowerState {
        PowerState::from_u8(self.power.load(Ordering::Acquire))
    }

    /// Set speed and direction of decoder `address` (128 steps).
    pub fn set_speed(&self, address: u16, direction: Direction, speed: u8) -> Result<(), CommandError> {
        self.check_usable()?;
        let addr = Address::new(address)?;
        self.queue.set_speed(addr, direction, speed)?;
        rt_info!(
            BG_LOG_STREAM,
            LogSource::Command,
            timestamp_us(),
            "speed {} {:?} {}",
            address,
            direction,
            speed
        );
        Ok(())
    }

    /// Set (`on`) or clear function `function` (0..=4) of decoder `address`.
    pub fn set_fg1(&self, address: u16, function: u8, on: bool) -> Result<(), CommandError> {
        self.check_usable()?;
        let addr = Address::new(address)?;
        self.queue.set_function(addr, function, on)?;
        rt_info!(
            BG_LOG_STREAM,
            LogSource::Command,
            timestamp_us(),
            "F{} {} {}",
            function,
            address,
            if on { "on" } else { "off" }
        );
        Ok(())
    }

    /// Stop refreshing decoder `address`. Returns `false` if it had no slot.
    pub fn release(&self, address: u16) -> Result<bool, CommandError> {
        self.check_usable()?;
        let addr = Address::new(address)?;
        let released = self.queue.release(addr);
        if released {
            rt_info!(BG_LOG_STREAM, LogSource::Command, timestamp_us(), "release {}", address);
        }
        Ok(released)
    }

    /// Last speed command stored for `address`.
    pub fn speed(&self, address: u16) -> Option<(Direction, u8)> {
        self.queue.speed(Address::new(address).ok()?)
    }

    /// Function group 1 state stored for `address`.
    pub fn functions(&self, address: u16) -> Option<FunctionGroup1> {
        self.queue.functions(Address::new(address).ok()?)
    }

    /// Refresh queue (scheduler side).
    #[inline]
    pub fn queue(&self) -> &RefreshQueue<S> {
        &self.queue
    }

    #[inline]
    pub fn fault(&self) -> &FaultState {
        &self.fault
    }

    /// Latch a runtime fault (driver failure). Track power drops to `Off`.
    pub fn latch_fault(&self, code: FaultCode, data: u32) {
        self.fault.set(code, data);
        if self.power_state() == PowerState::On {
            self.power.store(PowerState::Off as u8, Ordering::Release);
        }
        rt_error!(
            BG_LOG_STREAM,
            LogSource::System,
            timestamp_us(),
            "fault: {} ({})",
            code.as_str(),
            data
        );
    }

    // --- Private methods ---

    fn check_usable(&self) -> Result<(), CommandError> {
        match self.state.load(Ordering::Acquire) {
            READY if !self.fault.is_active() => Ok(()),
            READY | FAILED => Err(CommandError::Faulted),
            _ => Err(CommandError::NotBound),
        }
    }
}

impl<const S: usize> Default for DccGenerator<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Process-wide generator.
pub static DCC_GENERATOR: DccGenerator = DccGenerator::new();

// Tag in the high byte, payload in the low byte.
fn encode_config_error(e: ConfigError) -> u16 {
    match e {
        ConfigError::InvalidChannel(v) => 0x100 | v as u16,
        ConfigError::InvalidPin(v) => 0x200 | v as u16,
        ConfigError::PinConflict(v) => 0x300 | v as u16,
        ConfigError::InvalidTiming => 0x400,
        ConfigError::OutOfRange => 0x500,
        ConfigError::BindInProgress => 0x600,
    }
}

fn decode_config_error(raw: u16) -> ConfigError {
    let v = raw as u8;
    match raw >> 8 {
        1 => ConfigError::InvalidChannel(v),
        2 => ConfigError::InvalidPin(v),
        3 => ConfigError::PinConflict(v),
        4 => ConfigError::InvalidTiming,
        5 => ConfigError::OutOfRange,
        _ => ConfigError::BindInProgress,
    }
}
