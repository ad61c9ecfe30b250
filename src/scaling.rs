//! Conversion between voltages and raw analog codes.
//!
//! The analog hardware works in integer codes in the range `[0, bit_scale)`. A code maps onto a
//! voltage in `[0, v_max)` linearly: `voltage = code / bit_scale * v_max`.

use strum_macros::EnumIter;
use thiserror::Error;

/// Codes are 16 bit, so this is the largest usable bit scale.
pub const MAX_BIT_SCALE: u32 = 1 << 16;

/// Reasons a [Scale] cannot be used for conversion.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ScaleError {
    #[error("volt scale factor must be positive and finite")]
    InvalidVoltageRange,
    #[error("bit scale factor must be between 1 and 65536")]
    InvalidBitScale,
}

/// Scale constants for converting raw codes to and from volts.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Scale {
    /// Full scale voltage of the analog inputs and outputs.
    pub v_max: f32,
    /// Number of distinct codes. `65536` for a 16 bit interface.
    pub bit_scale: u32,
}

impl Default for Scale {
    fn default() -> Self {
        Board::ItsyBitsyM4.scale()
    }
}

impl Scale {
    /// Create a new `Scale`. Use [Self::validate] to check the values are usable.
    pub const fn new(v_max: f32, bit_scale: u32) -> Self {
        Self { v_max, bit_scale }
    }

    /// Check both scale factors are defined.
    pub fn validate(&self) -> Result<(), ScaleError> {
        // Written as a negated comparison so NaN is rejected too.
        if !(self.v_max > 0.0) || !self.v_max.is_finite() {
            return Err(ScaleError::InvalidVoltageRange);
        }
        if self.bit_scale == 0 || self.bit_scale > MAX_BIT_SCALE {
            return Err(ScaleError::InvalidBitScale);
        }
        Ok(())
    }

    /// Whether `volts` can be produced by an output, i.e. lies in `[0, v_max)`.
    ///
    /// NaN is never in range.
    pub fn contains(&self, volts: f32) -> bool {
        volts >= 0.0 && volts < self.v_max
    }

    /// The voltage represented by one code.
    pub fn step(&self) -> f32 {
        self.v_max / self.bit_scale as f32
    }

    /// Convert a voltage to the nearest code.
    ///
    /// Voltages below zero map to code `0` and voltages at or above `v_max` map to the highest
    /// code, so the conversion never decreases as `volts` increases.
    pub fn to_code(&self, volts: f32) -> Result<u16, ScaleError> {
        self.validate()?;
        let scaled = volts / self.v_max * self.bit_scale as f32;
        // Round half up. The comparison also sends NaN to zero.
        let code = if scaled > 0.0 {
            (scaled + 0.5) as u32
        } else {
            0
        };
        Ok(code.min(self.bit_scale - 1) as u16)
    }

    /// Convert a code back to volts, correcting by `offset`.
    ///
    /// The offset is only subtracted when it is strictly positive.
    pub fn to_voltage(&self, code: u16, offset: f32) -> Result<f32, ScaleError> {
        self.validate()?;
        let volts = code as f32 / self.bit_scale as f32 * self.v_max;
        if offset > 0.0 {
            Ok(volts - offset)
        } else {
            Ok(volts)
        }
    }
}

/// Boards with known scale constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Board {
    /// Adafruit ItsyBitsy M4 running CircuitPython. 3.3 V analog pins with 16 bit codes.
    ItsyBitsyM4,
    /// Arduino Micro. 5 V analog inputs with a 10 bit ADC.
    ///
    /// The Micro has no DAC, so outputs driven through this scale are PWM duty codes.
    ArduinoMicro,
}

impl Board {
    /// Get the scale constants for this board.
    pub const fn scale(&self) -> Scale {
        match self {
            Board::ItsyBitsyM4 => Scale::new(3.3, 64 * 1024),
            Board::ArduinoMicro => Scale::new(5.0, 1024),
        }
    }
}
