//! This crate drives a microcontroller bench-test board which sources a voltage on an analog output
//! and reads voltages back on up to five analog inputs.
//!
//! It contains both halves of the system:
//! * The device-side command loop ([device_loop::DeviceLoop]) which runs on the board, polls the serial
//!   stream for commands and drives the analog pins through a [device::Device] context.
//! * The host-side driver ([host::MuCtrl]) which talks to the board from a PC, plus an interactive
//!   console session ([session::Session]). The driver can also sweep an output through a range of
//!   voltages and evaluate readings from the current source fixture ([measurement]).
//!
//! Both halves share the [command] module, which defines the line protocol:
//! * `a<volts>` - Set output A.
//! * `b<volts>` - Set output B.
//! * `l` - Read all input channels. The board replies with one line of space separated voltages.
//! * `r` - Read the peak voltage seen on the peak channel over a short sampling window.
//! * Anything else is treated the same as `l`.
//!
//! It supports `no-std` environments by use of the `no_std` feature flag, which removes the
//! std-only console session and I/O adapters.
//!
//! The serial port used for board comms should be configured like so:
//! * Default baud rate: 9600
//! * Data bits: 8
//! * Stop bits: 1
//! * Parity: None

#![cfg_attr(feature = "no_std", no_std)]

pub mod analog;
pub mod command;
pub mod device;
pub mod device_loop;
pub mod error;
pub mod host;
pub mod measurement;
pub mod scaling;
#[cfg(not(feature = "no_std"))]
pub mod session;
#[cfg(not(feature = "no_std"))]
pub mod std_io;

#[cfg(test)]
mod mock_board;
#[cfg(test)]
mod mock_serial;
