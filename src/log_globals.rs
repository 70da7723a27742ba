//! Global log stream instances.
//!
//! One stream per producing context, one consumer (UART drain) for both.

use crate::logging::LogStream;

/// Scheduler stream.
///
/// Written only by the packet scheduler loop, drained first.
pub static RT_LOG_STREAM: LogStream = LogStream::new();

/// Background stream: host commands, bind, firmware bring-up.
///
/// Multiple producers, single consumer (UART drain).
pub static BG_LOG_STREAM: LogStream = LogStream::new();
