//! UART log output.
//!
//! Drains both log streams to a TX-only UART. Requires an external USB-UART
//! adapter on the log pin.
//!
//! ```text
//! ESP32 log TX ──────▶ USB-UART RX
//!                       └─▶ PC Serial Monitor
//! ```
//!
//! Entries above the runtime log level (`CONFIG.log_level()`) are discarded
//! at drain time, so raising the level takes effect without touching the
//! producers.

use crate::logging::{LogEntry, LogLevel};

#[cfg(target_os = "espidf")]
use crate::config::CONFIG;
#[cfg(target_os = "espidf")]
use crate::log_globals::{BG_LOG_STREAM, RT_LOG_STREAM};

#[cfg(target_os = "espidf")]
use esp_idf_svc::hal::gpio;
#[cfg(target_os = "espidf")]
use esp_idf_svc::hal::peripheral::Peripheral;
#[cfg(target_os = "espidf")]
use esp_idf_svc::hal::uart::{self, UartTxDriver};

/// Dropped-count report period.
pub const DROPPED_REPORT_US: i64 = 10_000_000;

/// UART configuration for logging.
pub struct UartLoggerConfig {
    pub baud_rate: u32,
    pub tx_pin: u8,
}

impl Default for UartLoggerConfig {
    fn default() -> Self {
        Self {
            baud_rate: 115200,
            tx_pin: 17,
        }
    }
}

/// True if `entry` passes the level filter.
#[inline]
pub fn should_emit(entry: &LogEntry, max_level: LogLevel) -> bool {
    entry.level <= max_level
}

struct BufWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> core::fmt::Write for BufWriter<'a> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        let bytes = s.as_bytes();
        let remaining = self.buf.len() - self.pos;
        let to_write = bytes.len().min(remaining);
        self.buf[self.pos..self.pos + to_write].copy_from_slice(&bytes[..to_write]);
        self.pos += to_write;
        Ok(())
    }
}

/// Format a log entry.
///
/// Format: `[timestamp_us] LEVEL source: message\n`
pub fn format_log_entry(entry: &LogEntry, buf: &mut [u8]) -> usize {
    use core::fmt::Write;

    let mut writer = BufWriter { buf, pos: 0 };
    let _ = write!(
        writer,
        "[{:10}] {} {}: {}\n",
        entry.timestamp_us,
        entry.level.as_str(),
        entry.source.as_str(),
        core::str::from_utf8(entry.message()).unwrap_or("<invalid utf8>")
    );
    writer.pos
}

/// Format the dropped-messages report line.
pub fn format_dropped(rt_dropped: u32, bg_dropped: u32, buf: &mut [u8]) -> usize {
    use core::fmt::Write;

    let mut writer = BufWriter { buf, pos: 0 };
    let _ = write!(writer, "[WARN] Dropped: RT={}, BG={}\n", rt_dropped, bg_dropped);
    writer.pos
}

/// Initialize UART1 TX-only for logging output.
#[cfg(target_os = "espidf")]
pub fn init_uart_logger<'d>(
    uart: impl Peripheral<P = esp_idf_svc::hal::uart::UART1> + 'd,
    tx_pin: impl Peripheral<P = impl gpio::OutputPin> + 'd,
    config: &UartLoggerConfig,
) -> Result<UartTxDriver<'d>, esp_idf_svc::sys::EspError> {
    let uart_config =
        uart::config::Config::default().baudrate(esp_idf_svc::hal::units::Hertz(config.baud_rate));

    UartTxDriver::new(
        uart,
        tx_pin,
        Option::<gpio::AnyIOPin>::None, // CTS
        Option::<gpio::AnyIOPin>::None, // RTS
        &uart_config,
    )
}

/// UART log consumer task.
///
/// Drains RT_LOG_STREAM first, then BG_LOG_STREAM.
#[cfg(target_os = "espidf")]
pub fn uart_logger_task(uart: &mut UartTxDriver<'_>) -> ! {
    let mut format_buf = [0u8; 256];
    let mut last_dropped_report = 0i64;

    loop {
        let max_level = CONFIG.log_level();
        let mut work_done = false;

        for stream in [&RT_LOG_STREAM, &BG_LOG_STREAM] {
            while let Some(entry) = stream.drain() {
                work_done = true;
                if !should_emit(&entry, max_level) {
                    continue;
                }
                let len = format_log_entry(&entry, &mut format_buf);
                let _ = uart.write(&format_buf[..len]);
            }
        }

        // SAFETY: esp_timer_get_time has no preconditions
        let now = unsafe { esp_idf_svc::sys::esp_timer_get_time() };
        if now - last_dropped_report > DROPPED_REPORT_US {
            let rt_dropped = RT_LOG_STREAM.dropped();
            let bg_dropped = BG_LOG_STREAM.dropped();

            if rt_dropped > 0 || bg_dropped > 0 {
                let len = format_dropped(rt_dropped, bg_dropped, &mut format_buf);
                let _ = uart.write(&format_buf[..len]);
                RT_LOG_STREAM.reset_dropped();
                BG_LOG_STREAM.reset_dropped();
            }

            last_dropped_report = now;
        }

        if !work_done {
            // SAFETY: plain FreeRTOS delay from a task context
            unsafe {
                esp_idf_svc::sys::vTaskDelay(10);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{LogSource, MAX_MSG_LEN};

    fn entry(level: LogLevel, source: LogSource, text: &[u8]) -> LogEntry {
        let mut msg = [0u8; MAX_MSG_LEN];
        msg[..text.len()].copy_from_slice(text);
        LogEntry {
            timestamp_us: 1234567,
            level,
            source,
            len: text.len() as u8,
            msg,
        }
    }

    #[test]
    fn test_format_log_entry() {
        let e = entry(LogLevel::Info, LogSource::Command, b"speed 3 fwd 64");

        let mut buf = [0u8; 256];
        let len = format_log_entry(&e, &mut buf);

        let formatted = core::str::from_utf8(&buf[..len]).unwrap();
        assert_eq!(formatted, "[   1234567] INFO cmd: speed 3 fwd 64\n");
    }

    #[test]
    fn test_format_respects_len() {
        let mut e = entry(LogLevel::Error, LogSource::Scheduler, b"TEST12345X");
        e.len = 5;

        let mut buf = [0u8; 256];
        let len = format_log_entry(&e, &mut buf);

        let formatted = core::str::from_utf8(&buf[..len]).unwrap();
        assert!(formatted.contains("ERROR sched: TEST1"));
        assert!(!formatted.contains('X'));
    }

    #[test]
    fn test_level_filter() {
        let debug = entry(LogLevel::Debug, LogSource::Scheduler, b"x");
        assert!(!should_emit(&debug, LogLevel::Info));
        assert!(should_emit(&debug, LogLevel::Debug));
        assert!(should_emit(&entry(LogLevel::Error, LogSource::System, b"x"), LogLevel::Error));
    }

    #[test]
    fn test_format_dropped() {
        let mut buf = [0u8; 64];
        let len = format_dropped(3, 0, &mut buf);
        assert_eq!(&buf[..len], b"[WARN] Dropped: RT=3, BG=0\n");
    }
}
