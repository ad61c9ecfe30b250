//! Runs the board's command loop against stdin/stdout, with simulated analog pins.
//!
//! Input channels 0 and 4 are looped back from outputs A and B through a small bias. The others see fixed
//! fractions of full scale. Type `a1.5`, `l`, `r` etc. and press enter.

use std::{cell::Cell, rc::Rc};

use embedded_hal::delay::DelayNs;
use muctrl::{
    analog::{AnalogInput, AnalogOutput},
    device::{Device, DeviceConfig},
    device_loop::DeviceLoop,
    error::Error,
    std_io::StdIo,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

// Codes the loopback input reads above the output when it is driven to zero.
const LOOPBACK_BIAS: u16 = 120;

struct SimOutput(Rc<Cell<u16>>);

impl AnalogOutput for SimOutput {
    fn set_code(&mut self, code: u16) {
        self.0.set(code);
    }
}

enum SimInput {
    Loopback(Rc<Cell<u16>>),
    Fixed(u16),
}

impl AnalogInput for SimInput {
    fn read_code(&mut self) -> u16 {
        match self {
            SimInput::Loopback(level) => level.get().saturating_add(LOOPBACK_BIAS),
            SimInput::Fixed(code) => *code,
        }
    }
}

struct StdDelay;

impl DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(std::time::Duration::from_nanos(ns.into()));
    }
}

/// Board end of the serial link.
struct Console {
    stdin: std::io::Stdin,
    stdout: std::io::Stdout,
}

impl std::io::Read for Console {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        std::io::Read::read(&mut self.stdin, buf)
    }
}

impl std::io::Write for Console {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        std::io::Write::write(&mut self.stdout, buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        std::io::Write::flush(&mut self.stdout)
    }
}

fn main() {
    // The protocol owns stdout, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let level_a = Rc::new(Cell::new(0));
    let level_b = Rc::new(Cell::new(0));
    let inputs = [
        SimInput::Loopback(level_a.clone()),
        SimInput::Fixed(16384),
        SimInput::Fixed(32768),
        SimInput::Fixed(49152),
        SimInput::Loopback(level_b.clone()),
    ];

    let device = match Device::new(SimOutput(level_a), inputs, DeviceConfig::default()) {
        Ok(device) => device.with_output_b(SimOutput(level_b)),
        Err(err) => {
            error!(error = %err, "bad board configuration");
            std::process::exit(1);
        }
    };

    let console = Console {
        stdin: std::io::stdin(),
        stdout: std::io::stdout(),
    };
    let mut board = DeviceLoop::new(StdIo(console), StdDelay, device);

    match board.run() {
        Ok(never) => match never {},
        Err(Error::Closed) => info!("stdin closed, stopping"),
        Err(err) => {
            error!(error = %err, "board stopped");
            std::process::exit(1);
        }
    }
}
