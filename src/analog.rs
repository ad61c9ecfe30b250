//! Traits for the analog pins the board is built around.
//!
//! Pins work in raw codes. Conversion to volts lives in [crate::scaling], so a pin implementation
//! only has to move integers in and out of the hardware.

/// An analog output (DAC) pin.
pub trait AnalogOutput {
    /// Drive the pin to `code`.
    fn set_code(&mut self, code: u16);
}

/// An analog input (ADC) pin.
pub trait AnalogInput {
    /// Take one reading from the pin.
    fn read_code(&mut self) -> u16;
}

impl<T: AnalogOutput + ?Sized> AnalogOutput for &mut T {
    fn set_code(&mut self, code: u16) {
        T::set_code(self, code)
    }
}

impl<T: AnalogInput + ?Sized> AnalogInput for &mut T {
    fn read_code(&mut self) -> u16 {
        T::read_code(self)
    }
}
