//! Our error types for the bench board and its host driver.

use thiserror::Error;

use crate::{
    command::{Output, ParseError},
    scaling::ScaleError,
};

pub type Result<T, I> = core::result::Result<T, Error<I>>;

/// Custom error type for board communications and control.
///
/// Generic over the error type of the underlying transport so the same error can be used on the
/// board (UART) and on the host (serial port).
#[derive(Error, Debug)]
pub enum Error<I: embedded_io::Error> {
    #[error("Serial communication error")]
    Transport(I),
    #[error("Communication timeout")]
    Timeout,
    #[error("Link closed by the other side")]
    Closed,
    #[error("Bad input: {0}")]
    BadInput(#[from] ParseError),
    #[error("{volts} V is out of range for output {output}")]
    OutOfRange { output: Output, volts: f32 },
    #[error("Output {0} is not fitted on this board")]
    NoSuchOutput(Output),
    #[error("Scaling error: {0}")]
    Scale(#[from] ScaleError),
    #[error("Buffer capacity exceeded")]
    BufferError,
    #[error("Invalid response received")]
    InvalidResponse,
}

/// Broad classification of an [Error].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ErrorKind {
    /// The command itself was malformed.
    BadInput,
    /// The command was well formed but asked for a voltage or an output the board doesn't have.
    OutOfRange,
    /// The scale constants are unusable.
    Configuration,
    /// The link to the other side failed or returned garbage.
    Transport,
}

impl<I: embedded_io::Error> Error<I> {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::BadInput(_) => ErrorKind::BadInput,
            Error::OutOfRange { .. } | Error::NoSuchOutput(_) => ErrorKind::OutOfRange,
            Error::Scale(_) => ErrorKind::Configuration,
            Error::Transport(_)
            | Error::Timeout
            | Error::Closed
            | Error::BufferError
            | Error::InvalidResponse => ErrorKind::Transport,
        }
    }

    /// Whether a command loop may carry on after this error.
    ///
    /// Only a well formed request the board can't satisfy is recoverable; the output has already
    /// been forced to 0 V by then. A malformed command ends the loop.
    pub fn is_recoverable(&self) -> bool {
        self.kind() == ErrorKind::OutOfRange
    }
}
