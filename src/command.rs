//! The line protocol spoken between the host and the board.
//!
//! Every command is one line of ASCII text. The first character selects the command and anything
//! after it is the argument. The board only answers the read commands, with one line of voltages.

use core::{fmt, fmt::Write as _, str::FromStr};

use strum_macros::{EnumCount, EnumIter};
use thiserror::Error;

/// Longest command line accepted by the board, excluding the line terminator.
pub const MAX_LINE_LEN: usize = 64;

/// Most input channels a response line can carry.
pub const MAX_CHANNELS: usize = 8;

/// Digits after the decimal point used for voltages in response lines.
pub const VOLTAGE_DECIMALS: usize = 6;

/// Terminator written after every response line.
pub const RESPONSE_TERMINATOR: &str = "\r\n";

/// Voltages parsed from a response line, in channel order.
pub type Readings = heapless::Vec<f32, MAX_CHANNELS>;

/// The analog outputs which can be set by command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, EnumCount)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Output {
    A,
    B,
}

impl Output {
    /// The command prefix which sets this output.
    pub const fn prefix(&self) -> Prefix {
        match self {
            Output::A => Prefix::WriteA,
            Output::B => Prefix::WriteB,
        }
    }
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Output::A => f.write_str("A"),
            Output::B => f.write_str("B"),
        }
    }
}

/// Every command prefix the protocol reserves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, EnumCount)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Prefix {
    /// `a<volts>` - Set output A.
    WriteA = b'a',
    /// `b<volts>` - Set output B.
    WriteB = b'b',
    /// `l` - Read every input channel.
    ReadAll = b'l',
    /// `r` - Read the peak voltage on the peak channel.
    ReadPeak = b'r',
    /// `w` - Reserved for writing a frequency. Boards answer it like any unknown command.
    WriteFrequency = b'w',
}

impl From<Prefix> for char {
    fn from(value: Prefix) -> Self {
        value as u8 as char
    }
}

impl TryFrom<char> for Prefix {
    type Error = ();

    fn try_from(value: char) -> Result<Self, Self::Error> {
        match value {
            'a' => Ok(Prefix::WriteA),
            'b' => Ok(Prefix::WriteB),
            'l' => Ok(Prefix::ReadAll),
            'r' => Ok(Prefix::ReadPeak),
            'w' => Ok(Prefix::WriteFrequency),
            _ => Err(()),
        }
    }
}

/// Reasons a command line could not be understood.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseError {
    #[error("voltage for output {0} must be a number")]
    InvalidVoltage(Output),
    #[error("command line is too long")]
    LineTooLong,
    #[error("command line is not valid ASCII")]
    InvalidEncoding,
}

/// One parsed command line.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    /// Drive an output to the given voltage.
    SetOutput { output: Output, volts: f32 },
    /// Read every input channel.
    ReadAll,
    /// Sample the peak channel and report the largest voltage seen.
    ReadPeak,
    /// Anything else, including an empty line. The board answers it like [Command::ReadAll].
    Other,
}

impl Command {
    /// Parse one command line. Surrounding whitespace and line terminators are ignored.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let line = line.trim();
        let mut chars = line.chars();
        match chars.next().map(Prefix::try_from) {
            Some(Ok(Prefix::WriteA)) => Self::parse_set_output(Output::A, chars.as_str()),
            Some(Ok(Prefix::WriteB)) => Self::parse_set_output(Output::B, chars.as_str()),
            Some(Ok(Prefix::ReadAll)) => Ok(Command::ReadAll),
            Some(Ok(Prefix::ReadPeak)) => Ok(Command::ReadPeak),
            Some(Ok(Prefix::WriteFrequency)) | Some(Err(())) | None => Ok(Command::Other),
        }
    }

    fn parse_set_output(output: Output, argument: &str) -> Result<Self, ParseError> {
        let volts = argument
            .trim()
            .parse::<f32>()
            .map_err(|_| ParseError::InvalidVoltage(output))?;
        Ok(Command::SetOutput { output, volts })
    }

    /// Whether the board writes a response line for this command.
    pub fn expects_response(&self) -> bool {
        !matches!(self, Command::SetOutput { .. })
    }
}

impl FromStr for Command {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Command::parse(s)
    }
}

/// Formats the command as it is sent on the wire, without the line terminator.
///
/// [Command::Other] is written as an empty line.
impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::SetOutput { output, volts } => {
                write!(f, "{}{}", char::from(output.prefix()), volts)
            }
            Command::ReadAll => f.write_char(Prefix::ReadAll.into()),
            Command::ReadPeak => f.write_char(Prefix::ReadPeak.into()),
            Command::Other => Ok(()),
        }
    }
}

/// Write `voltages` as a response line body: space separated, fixed precision.
pub fn write_voltages<W: fmt::Write>(out: &mut W, voltages: &[f32]) -> fmt::Result {
    for (i, volts) in voltages.iter().enumerate() {
        if i > 0 {
            out.write_char(' ')?;
        }
        write!(out, "{:.*}", VOLTAGE_DECIMALS, volts)?;
    }
    Ok(())
}

/// Parse a response line body back into voltages.
///
/// Returns `None` if the line is empty, holds something other than numbers, or has more than
/// [MAX_CHANNELS] values.
pub fn parse_voltages(line: &str) -> Option<Readings> {
    let mut readings = Readings::new();
    for field in line.split_whitespace() {
        let volts = field.parse::<f32>().ok()?;
        readings.push(volts).ok()?;
    }
    if readings.is_empty() {
        None
    } else {
        Some(readings)
    }
}
