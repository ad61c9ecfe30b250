//! The board side device context: the analog pins plus the calibration state that goes with them.

use embedded_hal::delay::DelayNs;
use fugit::MillisDurationU32;
use strum::EnumCount;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    analog::{AnalogInput, AnalogOutput},
    command::{MAX_CHANNELS, Output},
    error::Error,
    scaling::{Scale, ScaleError},
};

/// Ratio of the 5 V to 3 V dividers fitted in front of the bench board's inputs.
pub const DEFAULT_DIVIDER_RATIO: f32 = 5.0 / 3.0;

/// Errors raised by the device context itself, before any transport is involved.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceError {
    #[error("{volts} V is out of range for output {output}")]
    OutOfRange { output: Output, volts: f32 },
    #[error("Output {0} is not fitted on this board")]
    NoSuchOutput(Output),
    #[error("Scaling error: {0}")]
    Scale(#[from] ScaleError),
}

impl<I: embedded_io::Error> From<DeviceError> for Error<I> {
    fn from(value: DeviceError) -> Self {
        match value {
            DeviceError::OutOfRange { output, volts } => Error::OutOfRange { output, volts },
            DeviceError::NoSuchOutput(output) => Error::NoSuchOutput(output),
            DeviceError::Scale(err) => Error::Scale(err),
        }
    }
}

/// Reasons a [DeviceConfig] can't be used with a given set of pins.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    #[error("Scaling error: {0}")]
    Scale(#[from] ScaleError),
    #[error("Board must have between 1 and 8 input channels, found {0}")]
    InvalidChannelCount(usize),
    #[error("Channel {channel} does not exist, board has {channels} inputs")]
    NoSuchChannel { channel: usize, channels: usize },
    #[error("Peak reads need at least one sample")]
    NoPeakSamples,
    #[error("Divider ratio must be a positive number")]
    InvalidDividerRatio,
}

/// Configuration of the device context and its command loop.
///
/// Build one with [DeviceConfig::default] and the `with_*` methods.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceConfig {
    /// Scale constants of the analog pins.
    pub scale: Scale,
    /// How long to let the circuit settle after forcing the output to zero for calibration.
    pub settle_time: MillisDurationU32,
    /// Input channel wired to measure the output's zero level.
    pub reference_channel: usize,
    /// Input channel sampled by peak reads.
    pub peak_channel: usize,
    /// Number of samples taken by a peak read.
    pub peak_samples: u32,
    /// Pause between peak read samples.
    pub peak_interval: MillisDurationU32,
    /// Measure the zero offset when the command loop starts.
    pub calibrate_on_start: bool,
    /// Attenuation of the voltage dividers in front of the inputs. Divided reads multiply by this
    /// to recover the voltage at the divider's input.
    pub divider_ratio: f32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            scale: Scale::default(),
            settle_time: MillisDurationU32::millis(500),
            reference_channel: 0,
            peak_channel: 1,
            peak_samples: 500,
            peak_interval: MillisDurationU32::millis(1),
            calibrate_on_start: true,
            divider_ratio: DEFAULT_DIVIDER_RATIO,
        }
    }
}

impl DeviceConfig {
    /// Set the scale constants.
    pub fn with_scale(mut self, scale: Scale) -> Self {
        self.scale = scale;
        self
    }

    /// Set the calibration settling time.
    pub fn with_settle_time(mut self, settle_time: MillisDurationU32) -> Self {
        self.settle_time = settle_time;
        self
    }

    /// Set which input channel measures the zero offset.
    pub fn with_reference_channel(mut self, channel: usize) -> Self {
        self.reference_channel = channel;
        self
    }

    /// Set which input channel is sampled by peak reads, and how.
    pub fn with_peak_read(
        mut self,
        channel: usize,
        samples: u32,
        interval: MillisDurationU32,
    ) -> Self {
        self.peak_channel = channel;
        self.peak_samples = samples;
        self.peak_interval = interval;
        self
    }

    /// Set whether the command loop calibrates before serving commands.
    pub fn with_calibrate_on_start(mut self, calibrate: bool) -> Self {
        self.calibrate_on_start = calibrate;
        self
    }

    /// Set the input divider ratio used by divided reads.
    pub fn with_divider_ratio(mut self, ratio: f32) -> Self {
        self.divider_ratio = ratio;
        self
    }

    /// Check this configuration against a board with `channels` inputs.
    pub fn validate(&self, channels: usize) -> Result<(), ConfigError> {
        self.scale.validate()?;
        if channels == 0 || channels > MAX_CHANNELS {
            return Err(ConfigError::InvalidChannelCount(channels));
        }
        for channel in [self.reference_channel, self.peak_channel] {
            if channel >= channels {
                return Err(ConfigError::NoSuchChannel { channel, channels });
            }
        }
        if self.peak_samples == 0 {
            return Err(ConfigError::NoPeakSamples);
        }
        if !(self.divider_ratio.is_finite() && self.divider_ratio > 0.0) {
            return Err(ConfigError::InvalidDividerRatio);
        }
        Ok(())
    }
}

/// Owns the analog pins of the board: one or two outputs and `N` inputs.
///
/// Also holds the measured zero offset, which is subtracted from every converted reading, and the
/// last voltage each output was set to.
pub struct Device<O: AnalogOutput, I: AnalogInput, const N: usize> {
    output_a: O,
    output_b: Option<O>,
    inputs: [I; N],
    config: DeviceConfig,
    offset: f32,
    setpoints: [f32; Output::COUNT],
}

impl<O: AnalogOutput, I: AnalogInput, const N: usize> Device<O, I, N> {
    /// Create a device context with a single output.
    ///
    /// Input channel `0` is the first entry of `inputs`.
    pub fn new(output_a: O, inputs: [I; N], config: DeviceConfig) -> Result<Self, ConfigError> {
        config.validate(N)?;
        Ok(Self {
            output_a,
            output_b: None,
            inputs,
            config,
            offset: 0.0,
            setpoints: [0.0; Output::COUNT],
        })
    }

    /// Fit a second output, driven by the `b` command.
    pub fn with_output_b(mut self, output_b: O) -> Self {
        self.output_b = Some(output_b);
        self
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// The zero offset measured by the last calibration, `0.0` before any calibration.
    pub fn offset(&self) -> f32 {
        self.offset
    }

    /// The voltage `output` was last driven to.
    pub fn setpoint(&self, output: Output) -> f32 {
        self.setpoints[output as usize]
    }

    fn output_pin(&mut self, output: Output) -> Result<&mut O, DeviceError> {
        match output {
            Output::A => Ok(&mut self.output_a),
            Output::B => self.output_b.as_mut().ok_or(DeviceError::NoSuchOutput(output)),
        }
    }

    /// Drive `output` to `volts` and return the code written.
    ///
    /// Voltages outside `[0, v_max)` force the output to 0 V and return
    /// [DeviceError::OutOfRange].
    pub fn set_output(&mut self, output: Output, volts: f32) -> Result<u16, DeviceError> {
        let scale = self.config.scale;
        if !scale.contains(volts) {
            warn!(%output, volts, "requested voltage out of range, forcing output to 0 V");
            self.force_zero(output)?;
            return Err(DeviceError::OutOfRange { output, volts });
        }
        let code = scale.to_code(volts)?;
        self.output_pin(output)?.set_code(code);
        self.setpoints[output as usize] = volts;
        debug!(%output, volts, code, "output set");
        Ok(code)
    }

    /// Drive `output` to the code for 0 V.
    pub fn force_zero(&mut self, output: Output) -> Result<(), DeviceError> {
        let code = self.config.scale.to_code(0.0)?;
        self.output_pin(output)?.set_code(code);
        self.setpoints[output as usize] = 0.0;
        Ok(())
    }

    /// Read `channel` in volts, without applying the zero offset.
    ///
    /// # Panics
    ///
    /// Panics if `channel >= N`.
    pub fn read_raw_voltage(&mut self, channel: usize) -> Result<f32, DeviceError> {
        let code = self.inputs[channel].read_code();
        Ok(self.config.scale.to_voltage(code, 0.0)?)
    }

    /// Read `channel` in volts, corrected by the zero offset.
    ///
    /// # Panics
    ///
    /// Panics if `channel >= N`.
    pub fn read_voltage(&mut self, channel: usize) -> Result<f32, DeviceError> {
        let code = self.inputs[channel].read_code();
        Ok(self.config.scale.to_voltage(code, self.offset)?)
    }

    /// Read every input channel in order, corrected by the zero offset.
    pub fn read_all(&mut self) -> Result<[f32; N], DeviceError> {
        let mut voltages = [0.0; N];
        for (volts, input) in voltages.iter_mut().zip(self.inputs.iter_mut()) {
            *volts = self.config.scale.to_voltage(input.read_code(), self.offset)?;
        }
        Ok(voltages)
    }

    /// Read `channel` corrected by the zero offset and scaled back up through the input divider.
    ///
    /// # Panics
    ///
    /// Panics if `channel >= N`.
    pub fn read_divided(&mut self, channel: usize) -> Result<f32, DeviceError> {
        Ok(self.read_voltage(channel)? * self.config.divider_ratio)
    }

    /// [Device::read_all], scaled back up through the input dividers.
    pub fn read_all_divided(&mut self) -> Result<[f32; N], DeviceError> {
        let ratio = self.config.divider_ratio;
        let mut voltages = self.read_all()?;
        for volts in voltages.iter_mut() {
            *volts *= ratio;
        }
        Ok(voltages)
    }

    /// Measure the zero offset.
    ///
    /// Output A is forced to 0 V, the circuit is given the configured settling time, and then the
    /// reference channel is read. Whatever it reads is systematic bias, which is stored and
    /// subtracted from later readings.
    pub fn calibrate_zero_offset<D: DelayNs>(&mut self, delay: &mut D) -> Result<f32, DeviceError> {
        self.force_zero(Output::A)?;
        delay.delay_ms(self.config.settle_time.to_millis());
        let offset = self.read_raw_voltage(self.config.reference_channel)?;
        self.offset = offset;
        info!(offset, channel = self.config.reference_channel, "zero offset measured");
        Ok(offset)
    }

    /// Sample the peak channel repeatedly and return the largest corrected voltage seen.
    pub fn read_peak<D: DelayNs>(&mut self, delay: &mut D) -> Result<f32, DeviceError> {
        let channel = self.config.peak_channel;
        let mut peak = self.read_voltage(channel)?;
        for _ in 1..self.config.peak_samples {
            delay.delay_ms(self.config.peak_interval.to_millis());
            peak = peak.max(self.read_voltage(channel)?);
        }
        debug!(peak, channel, "peak read");
        Ok(peak)
    }
}
