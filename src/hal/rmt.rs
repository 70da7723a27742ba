//! RMT TX channel carrying the DCC waveform.
//!
//! The waveform engine is an endless iterator of bit cycles; each cycle maps
//! to one RMT symbol (high half, low half). The driver refills its memory
//! block from the iterator in its own interrupt context, so the bitstream
//! does not depend on scheduler jitter.

use esp_idf_svc::hal::gpio::AnyOutputPin;
use esp_idf_svc::hal::peripheral::Peripheral;
use esp_idf_svc::hal::rmt::config::TransmitConfig;
use esp_idf_svc::hal::rmt::{PinState, Pulse, PulseTicks, RmtChannel, Symbol, TxRmtDriver};
use esp_idf_svc::sys::EspError;

use crate::waveform::{BitCycle, WaveformEngine};

/// One RMT symbol per bit cycle.
#[inline]
fn symbol(cycle: BitCycle) -> Symbol {
    // Validated timing keeps both halves far below the 15-bit limit.
    let high = PulseTicks::new(cycle.high_ticks).unwrap_or_else(|_| PulseTicks::max());
    let low = PulseTicks::new(cycle.low_ticks).unwrap_or_else(|_| PulseTicks::max());
    Symbol::new(Pulse::new(PinState::High, high), Pulse::new(PinState::Low, low))
}

/// Start transmitting `engine` on `channel`, output on GPIO `signal_pin`.
///
/// `clock_divider` turns the 80 MHz APB clock into the engine tick (160 for
/// 2 µs). The returned driver must stay alive for the line to keep running.
pub fn start_waveform<C: RmtChannel>(
    channel: impl Peripheral<P = C> + 'static,
    signal_pin: u8,
    clock_divider: u8,
    engine: WaveformEngine<'static>,
) -> Result<TxRmtDriver<'static>, EspError> {
    // SAFETY: pin number validated at bind time and claimed only here
    let pin = unsafe { AnyOutputPin::new(signal_pin as i32) };
    let config = TransmitConfig::new().clock_divider(clock_divider);

    let mut tx = TxRmtDriver::new(channel, pin, &config)?;
    tx.start_iter(engine.map(symbol))?;
    Ok(tx)
}
