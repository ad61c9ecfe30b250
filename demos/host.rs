use std::env;

use embedded_hal::delay::DelayNs;
use inquire::Select;
use muctrl::{
    command::Output,
    host::{MuCtrl, SweepConfig, voltage_steps},
    scaling::Board,
    session::Session,
    std_io::StdIo,
};
use serialport::SerialPort;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

// Configuration constants - adjust these for your setup
const BAUD_RATE: u32 = 9600;
// The peak read samples for about half a second before answering.
const SERIAL_TIMEOUT_MS: u64 = 2000;
// Give the board time to boot and calibrate after the port opens.
const STARTUP_DELAY_MS: u64 = 1000;

// Bench sweep, run instead of the console when `sweep` follows the port name.
const SWEEP_START_V: f32 = 1.0;
const SWEEP_STOP_V: f32 = 2.6;
const SWEEP_STEP_V: f32 = 0.5;

type Port = StdIo<Box<dyn SerialPort>>;

struct StdDelay;

impl DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(std::time::Duration::from_nanos(ns.into()));
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    // Get serial port from command line arg or interactive selection
    let port_name = env::args().nth(1).unwrap_or_else(|| {
        let ports = serialport::available_ports().expect("Failed to enumerate serial ports");

        if ports.is_empty() {
            eprintln!("No serial ports found!");
            std::process::exit(1);
        }

        let port_names: Vec<String> = ports.iter().map(|p| p.port_name.clone()).collect();

        Select::new("Select a serial port:", port_names)
            .prompt()
            .expect("Failed to select port")
    });

    info!(port = port_name.as_str(), "opening serial port");
    let port = serialport::new(&port_name, BAUD_RATE)
        .timeout(std::time::Duration::from_millis(SERIAL_TIMEOUT_MS))
        .open()
        .expect("Failed to open serial port");
    std::thread::sleep(std::time::Duration::from_millis(STARTUP_DELAY_MS));

    let mut muctrl: MuCtrl<Port, 128> = MuCtrl::new(StdIo(port), Board::ItsyBitsyM4.scale());

    // Quick self check before handing over to the console.
    match muctrl
        .set_output_voltage(Output::A, 0.0)
        .and_then(|_| muctrl.read_voltages())
    {
        Ok(readings) => println!("Inputs: {:?}", readings.as_slice()),
        Err(err) => {
            error!(error = %err, "board is not answering");
            std::process::exit(1);
        }
    }

    if env::args().nth(2).as_deref() == Some("sweep") {
        let result = muctrl.sweep(
            &SweepConfig::default(),
            voltage_steps(SWEEP_START_V, SWEEP_STOP_V, SWEEP_STEP_V),
            &mut StdDelay,
            |volts, index, readings| println!("{volts:.2} V #{index}: {:?}", readings.as_slice()),
        );
        if let Err(err) = result {
            error!(error = %err, "sweep failed");
            std::process::exit(1);
        }
        return;
    }

    let mut session = Session::new(muctrl);
    let stdin = std::io::stdin();
    if let Err(err) = session.interact(stdin.lock(), std::io::stdout()) {
        error!(error = %err, "session ended with an error");
        std::process::exit(1);
    }
}
