//! # RustDcc
//!
//! DCC (NMRA Digital Command Control) signal generator for ESP32.
//!
//! ## Architecture
//!
//! ```text
//! host commands ──▶ DccGenerator ──▶ RefreshQueue
//!                                        │
//!                     PacketScheduler ◀──┘  (one packet per period)
//!                            │ try_push
//!                            ▼
//!                        WordFifo  (lock-free SPSC, WouldBlock when full)
//!                            │ pop
//!                            ▼
//!                     WaveformEngine ──▶ RMT ──▶ booster PHASE
//! ```
//!
//! - The engine never stalls: an empty FIFO yields long "0" bits
//! - The scheduler never blocks: words that do not fit wait for the next call
//! - Commands never block: atomics only, no mutexes

#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod error;
pub mod fault;
pub mod fifo;
pub mod generator;
pub mod hal;
pub mod log_globals;
pub mod logging;
pub mod packet;
pub mod refresh;
pub mod scheduler;
pub mod uart_logger;
pub mod waveform;
pub mod word;

pub use config::{TimingConfig, CONFIG};
pub use error::{CommandError, ConfigError, PacketError};
pub use fault::{FaultCode, FaultState};
pub use fifo::{WordFifo, WouldBlock};
pub use generator::{DccGenerator, Power, PowerState, DCC_GENERATOR};
pub use hal::Binding;
pub use log_globals::{BG_LOG_STREAM, RT_LOG_STREAM};
pub use packet::{Address, Direction, FramedPacket, FunctionGroup1, Packet};
pub use refresh::RefreshQueue;
pub use scheduler::{Pacer, PacketScheduler, ServiceOutcome};
pub use waveform::{Bit, BitCycle, WaveformEngine};
pub use word::FramedWord;
