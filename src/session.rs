//! An interactive console session with a board.
//!
//! Lines typed at the console are sent to the board as they are. Responses to read commands are
//! printed back. Typing `exit` ends the session.

use std::io::{BufRead, Write};

use thiserror::Error;
use tracing::{error, info, warn};

use crate::{command::Command, error::Error, host::MuCtrl};

/// Typing this ends the session.
pub const EXIT_COMMAND: &str = "exit";

/// Printed before every console read.
pub const PROMPT: &str = "Enter a command to be sent to the device: ";

#[derive(Error, Debug)]
pub enum SessionError<I: embedded_io::Error> {
    #[error("Device error: {0}")]
    Device(#[from] Error<I>),
    #[error("Console error: {0}")]
    Console(#[from] std::io::Error),
}

/// Read-eval loop between a console and a board.
pub struct Session<S: embedded_io::Read + embedded_io::Write, const L: usize = 128> {
    device: MuCtrl<S, L>,
}

impl<S: embedded_io::Read + embedded_io::Write, const L: usize> Session<S, L> {
    pub fn new(device: MuCtrl<S, L>) -> Self {
        Self { device }
    }

    pub fn into_inner(self) -> MuCtrl<S, L> {
        self.device
    }

    /// Run the session until `exit` is typed or the console runs out of input.
    ///
    /// Lines the board can't accept are reported and skipped without being sent. Any failure
    /// talking to the board is logged and ends the session. There are no retries.
    pub fn interact<C: BufRead, W: Write>(
        &mut self,
        console_in: C,
        mut console_out: W,
    ) -> Result<(), SessionError<S::Error>> {
        let mut lines = console_in.lines();
        loop {
            writeln!(console_out, "{PROMPT}")?;
            console_out.flush()?;

            let Some(input) = lines.next() else {
                break;
            };
            let input = input?;
            let input = input.trim();
            if input == EXIT_COMMAND {
                break;
            }

            match self.execute(input) {
                Ok(Some(response)) => writeln!(console_out, "{response}")?,
                Ok(None) => {}
                // Rejected before anything was written, so the link is still in step.
                Err(Error::BadInput(err)) => {
                    warn!(error = %err, command = input, "command not sent");
                    writeln!(console_out, "Not sent: {err}")?;
                }
                Err(err) => {
                    error!(error = %err, command = input, "session aborted");
                    return Err(err.into());
                }
            }
        }
        info!("closing session");
        Ok(())
    }

    /// Send one command line and return the board's response, if it sends one.
    ///
    /// Read commands and unknown commands are answered by the board. Set commands, including
    /// malformed ones, are not.
    pub fn execute(&mut self, line: &str) -> Result<Option<heapless::String<L>>, Error<S::Error>> {
        let expects_response = Command::parse(line)
            .map(|command| command.expects_response())
            .unwrap_or(false);
        if expects_response {
            Ok(Some(self.device.query_raw(line)?))
        } else {
            self.device.send_raw(line)?;
            Ok(None)
        }
    }
}
