//! GPIO HAL for the booster enable output.
//!
//! The scheduler drives any `embedded_hal::digital::OutputPin`; on the
//! board that is the ESP-IDF pin driver itself.

use esp_idf_svc::hal::gpio::{AnyOutputPin, Output, PinDriver};
use esp_idf_svc::sys::EspError;

/// Booster ENABLE pin, active high.
pub type EnablePin = PinDriver<'static, AnyOutputPin, Output>;

/// Claim GPIO `pin` as the enable output, driven low.
///
/// The pin number must come from a validated [`Binding`](super::Binding).
pub fn enable_pin(pin: u8) -> Result<EnablePin, EspError> {
    // SAFETY: pin number validated at bind time and claimed only here
    let pin = unsafe { AnyOutputPin::new(pin as i32) };
    let mut driver = PinDriver::output(pin)?;
    driver.set_low()?;
    Ok(driver)
}
