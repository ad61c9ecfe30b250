//! The command loop which runs on the board.
//!
//! The loop polls the serial stream for input, reads one command line at a time and answers it
//! through the [Device] context. It is strictly single threaded: while a command is being handled
//! nothing else is read.

use core::{convert::Infallible, fmt::Write as _};

use embedded_hal::delay::DelayNs;
use embedded_io::Error as _;
use tracing::{debug, error, warn};

use crate::{
    analog::{AnalogInput, AnalogOutput},
    command::{Command, MAX_LINE_LEN, ParseError, RESPONSE_TERMINATOR, write_voltages},
    device::Device,
    error::{Error, Result},
};

/// Capacity of a formatted response line.
pub const MAX_RESPONSE_LEN: usize = 128;

/// Serves commands read from `interface` using the pins owned by a [Device].
pub struct DeviceLoop<S, D, O, I, const N: usize>
where
    S: embedded_io::Read + embedded_io::Write + embedded_io::ReadReady,
    D: DelayNs,
    O: AnalogOutput,
    I: AnalogInput,
{
    interface: S,
    delay: D,
    device: Device<O, I, N>,
}

impl<S, D, O, I, const N: usize> DeviceLoop<S, D, O, I, N>
where
    S: embedded_io::Read + embedded_io::Write + embedded_io::ReadReady,
    D: DelayNs,
    O: AnalogOutput,
    I: AnalogInput,
{
    pub fn new(interface: S, delay: D, device: Device<O, I, N>) -> Self {
        Self {
            interface,
            delay,
            device,
        }
    }

    pub fn device(&self) -> &Device<O, I, N> {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut Device<O, I, N> {
        &mut self.device
    }

    /// Give back the parts this loop was built from.
    pub fn into_parts(self) -> (S, D, Device<O, I, N>) {
        (self.interface, self.delay, self.device)
    }

    /// Measure the zero offset, see [Device::calibrate_zero_offset].
    pub fn calibrate(&mut self) -> Result<f32, S::Error> {
        Ok(self.device.calibrate_zero_offset(&mut self.delay)?)
    }

    /// Serve commands forever.
    ///
    /// Calibrates first if the device is configured to. A set command the board can't satisfy has
    /// already forced its output to 0 V, so it is logged and the loop carries on. Any other error,
    /// including a malformed command, is logged and ends the loop; it is returned and never retried.
    pub fn run(&mut self) -> core::result::Result<Infallible, Error<S::Error>> {
        if self.device.config().calibrate_on_start {
            if let Err(err) = self.calibrate() {
                error!(error = %err, "calibration failed");
                return Err(err);
            }
        }

        loop {
            match self.poll() {
                Ok(_) => {}
                Err(err) if err.is_recoverable() => {
                    warn!(error = %err, "command rejected");
                }
                Err(err) => {
                    error!(error = %err, "command loop stopped");
                    return Err(err);
                }
            }
        }
    }

    /// Handle at most one command.
    ///
    /// Returns `Ok(false)` straight away if no input is waiting. Otherwise reads a full line,
    /// handles it and returns `Ok(true)`.
    pub fn poll(&mut self) -> Result<bool, S::Error> {
        if !self.interface.read_ready().map_err(Error::Transport)? {
            return Ok(false);
        }

        let mut line: heapless::Vec<u8, MAX_LINE_LEN> = heapless::Vec::new();
        let mut overflowed = false;
        loop {
            let mut byte = [0u8; 1];
            match self.interface.read(&mut byte) {
                Ok(0) => return Err(Error::Closed),
                Ok(_) => {}
                Err(e) if e.kind() == embedded_io::ErrorKind::TimedOut => {
                    return Err(Error::Timeout);
                }
                Err(e) => return Err(Error::Transport(e)),
            }
            if byte[0] == b'\n' {
                break;
            }
            // Keep consuming an overlong line so the next one starts in the right place.
            if line.push(byte[0]).is_err() {
                overflowed = true;
            }
        }
        if overflowed {
            return Err(ParseError::LineTooLong.into());
        }

        let line = core::str::from_utf8(&line).map_err(|_| ParseError::InvalidEncoding)?;
        self.handle_line(line)?;
        Ok(true)
    }

    /// Parse and act on one command line, writing the response if the command has one.
    ///
    /// A set command with an unparseable voltage forces that output to 0 V before the error is
    /// returned, the same as an out of range voltage.
    pub fn handle_line(&mut self, line: &str) -> Result<(), S::Error> {
        debug!(line, "command received");
        match Command::parse(line) {
            Ok(Command::SetOutput { output, volts }) => {
                self.device.set_output(output, volts)?;
                Ok(())
            }
            Ok(Command::ReadPeak) => {
                let peak = self.device.read_peak(&mut self.delay)?;
                self.respond(&[peak])
            }
            Ok(Command::ReadAll) | Ok(Command::Other) => {
                let voltages = self.device.read_all()?;
                self.respond(&voltages)
            }
            Err(err) => {
                if let ParseError::InvalidVoltage(output) = err {
                    self.device.force_zero(output)?;
                }
                Err(err.into())
            }
        }
    }

    fn respond(&mut self, voltages: &[f32]) -> Result<(), S::Error> {
        let mut response: heapless::String<MAX_RESPONSE_LEN> = heapless::String::new();
        write_voltages(&mut response, voltages).map_err(|_| Error::BufferError)?;
        response
            .write_str(RESPONSE_TERMINATOR)
            .map_err(|_| Error::BufferError)?;

        self.interface
            .write_all(response.as_bytes())
            .map_err(Error::Transport)?;
        self.interface.flush().map_err(Error::Transport)
    }
}
