use core::fmt::Write as _;

use embedded_hal::delay::DelayNs;
use embedded_io::Error as _;
use fugit::MillisDurationU32;
use tracing::{debug, info};

use crate::{
    command::{Command, MAX_LINE_LEN, Output, ParseError, Readings, parse_voltages},
    error::{Error, Result},
    measurement::{CurrentSource, CurrentSourceReading},
    scaling::Scale,
};

/// How a [MuCtrl::sweep] drives the board and reads it back at each step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepConfig {
    /// Output stepped through the sweep voltages.
    pub output: Output,
    /// Wait after setting each voltage before the first read.
    pub settle_time: MillisDurationU32,
    /// Number of reads taken at each voltage.
    pub reads_per_step: u32,
    /// Wait between consecutive reads.
    pub read_interval: MillisDurationU32,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            output: Output::A,
            settle_time: MillisDurationU32::millis(3000),
            reads_per_step: 3,
            read_interval: MillisDurationU32::millis(1000),
        }
    }
}

impl SweepConfig {
    pub fn with_output(mut self, output: Output) -> Self {
        self.output = output;
        self
    }

    pub fn with_settle_time(mut self, settle_time: MillisDurationU32) -> Self {
        self.settle_time = settle_time;
        self
    }

    pub fn with_reads(mut self, reads_per_step: u32, read_interval: MillisDurationU32) -> Self {
        self.reads_per_step = reads_per_step;
        self.read_interval = read_interval;
        self
    }
}

/// Voltages from `start` up to, but not including, `stop` in increments of `step`.
///
/// Empty unless `step` is positive.
pub fn voltage_steps(start: f32, stop: f32, step: f32) -> impl Iterator<Item = f32> {
    let ascending = step > 0.0;
    (0u32..)
        .map(move |index| start + index as f32 * step)
        .take_while(move |&volts| ascending && volts < stop)
}

/// You can create a MuCtrl using any interface which implements [embedded_io::Read] & [embedded_io::Write].
///
/// `L` is the longest line, in bytes, which can be sent or received.
///
/// For its methods, "set" means to drive an output and "read" means to get measured values back.
pub struct MuCtrl<S: embedded_io::Read + embedded_io::Write, const L: usize = 128> {
    interface: S,
    /// Scale constants of the board, used to range check voltages before sending them.
    scale: Scale,
}

impl<S: embedded_io::Read + embedded_io::Write, const L: usize> MuCtrl<S, L> {
    /// Create a new MuCtrl instance with the given interface and board scale
    pub fn new(interface: S, scale: Scale) -> Self {
        Self { interface, scale }
    }

    pub fn scale(&self) -> Scale {
        self.scale
    }

    /// Release the underlying interface.
    pub fn into_inner(self) -> S {
        self.interface
    }

    /// Drive an output of the board to `volts`.
    ///
    /// Voltages the board can't produce are rejected here without anything being sent.
    pub fn set_output_voltage(&mut self, output: Output, volts: f32) -> Result<(), S::Error> {
        self.scale.validate()?;
        if !self.scale.contains(volts) {
            return Err(Error::OutOfRange { output, volts });
        }
        self.send(&Command::SetOutput { output, volts })
    }

    /// Return the voltage on every input channel, in channel order.
    pub fn read_voltages(&mut self) -> Result<Readings, S::Error> {
        let line = self.query(&Command::ReadAll)?;
        parse_voltages(&line).ok_or(Error::InvalidResponse)
    }

    /// Return the peak voltage the board saw on its peak channel.
    pub fn read_peak_voltage(&mut self) -> Result<f32, S::Error> {
        let line = self.query(&Command::ReadPeak)?;
        match parse_voltages(&line).as_deref() {
            Some([peak]) => Ok(*peak),
            _ => Err(Error::InvalidResponse),
        }
    }

    /// Read every input channel `count` times, `interval` apart, handing each set of readings to
    /// `each` along with its index.
    pub fn read_repeated<D: DelayNs>(
        &mut self,
        count: u32,
        interval: MillisDurationU32,
        delay: &mut D,
        mut each: impl FnMut(u32, Readings),
    ) -> Result<(), S::Error> {
        for index in 0..count {
            if index > 0 {
                delay.delay_ms(interval.to_millis());
            }
            each(index, self.read_voltages()?);
        }
        Ok(())
    }

    /// Step an output through `voltages`, reading every input channel at each step.
    ///
    /// `each` gets the set voltage, the read index within the step and the readings. The sweep
    /// stops at the first error, which includes a voltage the board can't produce.
    pub fn sweep<D: DelayNs>(
        &mut self,
        config: &SweepConfig,
        voltages: impl IntoIterator<Item = f32>,
        delay: &mut D,
        mut each: impl FnMut(f32, u32, Readings),
    ) -> Result<(), S::Error> {
        for volts in voltages {
            info!(output = %config.output, volts, "sweep step");
            self.set_output_voltage(config.output, volts)?;
            delay.delay_ms(config.settle_time.to_millis());
            self.read_repeated(
                config.reads_per_step,
                config.read_interval,
                delay,
                |index, readings| each(volts, index, readings),
            )?;
        }
        Ok(())
    }

    /// Read the current source fixture and evaluate it.
    ///
    /// The board already subtracts its zero offset, so only the input dividers are undone here.
    pub fn read_current_source(
        &mut self,
        fixture: &CurrentSource,
        divider_ratio: f32,
    ) -> Result<CurrentSourceReading, S::Error> {
        let readings = self.read_voltages()?;
        fixture
            .evaluate(&readings, divider_ratio)
            .ok_or(Error::InvalidResponse)
    }

    /// Send a command and read back its response line.
    pub fn query(&mut self, command: &Command) -> Result<heapless::String<L>, S::Error> {
        self.send(command)?;
        self.read_line()
    }

    /// Send a line of text as is and read back one response line.
    pub fn query_raw(&mut self, line: &str) -> Result<heapless::String<L>, S::Error> {
        self.send_raw(line)?;
        self.read_line()
    }

    /// Send a command. Nothing is read back.
    pub fn send(&mut self, command: &Command) -> Result<(), S::Error> {
        let mut line: heapless::String<L> = heapless::String::new();
        write!(line, "{command}").map_err(|_| Error::BufferError)?;
        self.send_raw(&line)
    }

    /// Send a line of text as is, adding the line terminator.
    ///
    /// Lines the board would drop without answering, because they are too long or not ASCII, are
    /// rejected here with [Error::BadInput] and nothing is written.
    pub fn send_raw(&mut self, line: &str) -> Result<(), S::Error> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.len() > MAX_LINE_LEN {
            return Err(ParseError::LineTooLong.into());
        }
        if !line.is_ascii() {
            return Err(ParseError::InvalidEncoding.into());
        }
        if line.len() >= L {
            return Err(Error::BufferError);
        }
        debug!(line, "sending");
        self.interface
            .write_all(line.as_bytes())
            .map_err(Error::Transport)?;
        self.interface
            .write_all(b"\n")
            .map_err(Error::Transport)?;
        self.interface.flush().map_err(Error::Transport)
    }

    /// Read one line from the board, without its terminator.
    pub fn read_line(&mut self) -> Result<heapless::String<L>, S::Error> {
        let mut buff: heapless::Vec<u8, L> = heapless::Vec::new();

        // Read a byte at a time so nothing after the line terminator is consumed.
        let mut temp_buf = [0u8; 1];
        loop {
            match self.interface.read(&mut temp_buf) {
                Ok(0) => return Err(Error::Closed),
                Ok(_) => {}
                Err(e) if e.kind() == embedded_io::ErrorKind::TimedOut => {
                    return Err(Error::Timeout);
                }
                Err(e) => return Err(Error::Transport(e)),
            }
            if temp_buf[0] == b'\n' {
                break;
            }
            buff.push(temp_buf[0]).map_err(|_| Error::BufferError)?;
        }

        let mut line = heapless::String::from_utf8(buff).map_err(|_| Error::InvalidResponse)?;
        if line.ends_with('\r') {
            line.pop();
        }
        debug!(line = line.as_str(), "received");
        Ok(line)
    }
}
