//! Quantities derived from a set of input readings on the current source test fixture.
//!
//! The fixture wires the inputs as follows, all but the first behind the input dividers:
//! * channel 0 - the set voltage, straight from output A
//! * channel 1 - the control voltage
//! * channel 2 - the high side of the sense resistor R3
//! * channel 3 - the low side of R3
//! * channel 4 - the high side of the load
//!
//! Resistances are in kilohms, so currents come out in milliamps.

/// Resistor values of the current source.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CurrentSource {
    pub r1_kohm: f32,
    pub r2_kohm: f32,
    /// Sense resistor.
    pub r3_kohm: f32,
    pub r_load_kohm: f32,
}

impl Default for CurrentSource {
    fn default() -> Self {
        Self {
            r1_kohm: 54.9 / 1000.0,
            r2_kohm: 10.3 / 1000.0,
            r3_kohm: 4.8 / 1000.0,
            r_load_kohm: 10.0 / 1000.0,
        }
    }
}

/// One evaluated set of current source readings.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CurrentSourceReading {
    pub v_set: f32,
    pub v_ctrl: f32,
    /// Drop across the sense resistor.
    pub v_r3: f32,
    /// Current through the sense resistor, from its measured drop.
    pub i_r3_ma: f32,
    /// Load current the design predicts for `v_set`.
    pub i_load_predicted_ma: f32,
    pub v_load_predicted: f32,
    pub v_load: f32,
}

impl CurrentSource {
    /// Load current per volt of set voltage, in mA/V.
    pub fn gain(&self) -> f32 {
        self.r2_kohm / (self.r1_kohm * self.r3_kohm)
    }

    /// Evaluate offset corrected readings taken across the fixture.
    ///
    /// `divider_ratio` undoes the input dividers on channels 1 to 4. Returns `None` if fewer than
    /// five channels were read.
    pub fn evaluate(&self, readings: &[f32], divider_ratio: f32) -> Option<CurrentSourceReading> {
        let &[v_set, v_ctrl, r3_high, r3_low, v_load, ..] = readings else {
            return None;
        };
        let v_r3 = (r3_high - r3_low) * divider_ratio;
        let i_load_predicted_ma = v_set * self.gain();
        Some(CurrentSourceReading {
            v_set,
            v_ctrl: v_ctrl * divider_ratio,
            v_r3,
            i_r3_ma: v_r3 / self.r3_kohm,
            i_load_predicted_ma,
            v_load_predicted: i_load_predicted_ma * self.r_load_kohm,
            v_load: v_load * divider_ratio,
        })
    }
}
