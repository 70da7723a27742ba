//! RustDcc firmware entry point.
//!
//! 1. Bind the global generator to the board pins
//! 2. Start the RMT channel, fed by the waveform engine
//! 3. Start the UART log drain thread
//! 4. Run the packet scheduler at the configured period
//!
//! Track power stays `Unknown` (enable low) until a host sets it.

#[cfg(target_os = "espidf")]
mod firmware {
    use std::thread;
    use std::time::Duration;

    use esp_idf_svc::hal::peripherals::Peripherals;
    use esp_idf_svc::sys::EspError;

    use rust_dcc_generator::fault::FaultCode;
    use rust_dcc_generator::hal::gpio::enable_pin;
    use rust_dcc_generator::hal::rmt::start_waveform;
    use rust_dcc_generator::hal::timestamp_us;
    use rust_dcc_generator::logging::LogSource;
    use rust_dcc_generator::uart_logger::{init_uart_logger, uart_logger_task, UartLoggerConfig};
    use rust_dcc_generator::{
        rt_error, rt_info, Binding, PacketScheduler, Pacer, TimingConfig, WaveformEngine, WordFifo,
        BG_LOG_STREAM, CONFIG, DCC_GENERATOR, RT_LOG_STREAM,
    };

    /// Words between scheduler and engine.
    static WORD_FIFO: WordFifo = WordFifo::new();

    const LOG_THREAD_STACK: usize = 4096;

    pub fn run() -> Result<(), EspError> {
        esp_idf_svc::sys::link_patches();

        let peripherals = Peripherals::take()?;

        let log_config = UartLoggerConfig::default();
        // SAFETY: log pin is not used by the generator binding
        let log_pin = unsafe { esp_idf_svc::hal::gpio::AnyOutputPin::new(log_config.tx_pin as i32) };
        let mut uart = init_uart_logger(peripherals.uart1, log_pin, &log_config)?;
        let spawned = thread::Builder::new()
            .stack_size(LOG_THREAD_STACK)
            .spawn(move || {
                uart_logger_task(&mut uart);
            });
        if spawned.is_err() {
            // Keep going without a log drain; streams drop and count.
            rt_error!(BG_LOG_STREAM, LogSource::System, timestamp_us(), "log thread spawn failed");
        }

        rt_info!(BG_LOG_STREAM, LogSource::System, timestamp_us(), "{}", env!("VERSION_STRING"));

        let timing = TimingConfig::NMRA;
        let generator = match DCC_GENERATOR.bind(Binding::BOARD_DEFAULT, &timing) {
            Ok(generator) => generator,
            Err(e) => {
                // Fault latched; enable never asserted. Park so the log drains.
                rt_error!(BG_LOG_STREAM, LogSource::System, timestamp_us(), "halted: {}", e);
                loop {
                    thread::sleep(Duration::from_secs(1));
                }
            }
        };
        let binding = generator.binding().unwrap_or(Binding::BOARD_DEFAULT);
        let divider = generator.clock_divider().unwrap_or(160);

        let mut enable = enable_pin(binding.enable_pin)?;

        let engine = WaveformEngine::new(&WORD_FIFO, timing);
        let rmt = peripherals.rmt;
        let started = match binding.channel {
            0 => start_waveform(rmt.channel0, binding.signal_pin, divider, engine),
            1 => start_waveform(rmt.channel1, binding.signal_pin, divider, engine),
            2 => start_waveform(rmt.channel2, binding.signal_pin, divider, engine),
            _ => start_waveform(rmt.channel3, binding.signal_pin, divider, engine),
        };
        let _tx = match started {
            Ok(tx) => tx,
            Err(e) => {
                generator.latch_fault(FaultCode::DriverFault, e.code() as u32);
                return Err(e);
            }
        };

        let mut scheduler = PacketScheduler::new(generator, &WORD_FIFO, &CONFIG, &RT_LOG_STREAM);

        let mut pacer = Pacer::new();
        loop {
            let started = timestamp_us();
            scheduler.service(started, &mut enable);
            let wait = pacer.delay_us(started, timestamp_us(), CONFIG.packet_period_ms());
            thread::sleep(Duration::from_micros(wait));
        }
    }
}

#[cfg(target_os = "espidf")]
fn main() -> Result<(), esp_idf_svc::sys::EspError> {
    firmware::run()
}

#[cfg(not(target_os = "espidf"))]
fn main() {
    println!("{}: firmware targets ESP-IDF, nothing to run on this host", env!("VERSION_STRING"));
}
