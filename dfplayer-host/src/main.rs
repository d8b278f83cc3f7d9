// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, you can obtain one at https://mozilla.org/MPL/2.0/.

//! A small host-side smoke-test program: open a real serial port, drive
//! `dfplayer::Coordinator` over it in a poll loop, and log what happens.

use std::io::{self, ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use clap::Parser;
use color_eyre::eyre::Result;
use dfplayer::{Coordinator, DeviceChange, DeviceSet, ErrorCode, Hooks, Parameter};
use mio_serial::SerialPort;
use tracing::{info, warn};

/// How often the poll loop ticks. The module's ack/response timeouts are
/// tens of milliseconds, so this needs to be comfortably finer than that.
const POLL_INTERVAL: Duration = Duration::from_millis(5);

#[derive(Parser, Debug)]
#[command(about = "Drive a DFPlayer-family module over a serial port")]
struct Args {
    /// Serial device, e.g. /dev/ttyUSB0 or COM3.
    port: String,

    /// Baud rate. The module family only really speaks 9600.
    #[arg(long, default_value_t = 9600)]
    baud: u32,

    /// Volume to set once the module finishes initializing (0-30).
    #[arg(long)]
    volume: Option<u8>,

    /// Track number to play once the module finishes initializing.
    #[arg(long)]
    track: Option<u16>,
}

/// [`dfplayer::Transport`] over a `mio-serial` port. The port's read
/// timeout is set short so `read_available` never blocks the poll loop for
/// longer than that.
struct SerialTransport {
    port: Box<dyn SerialPort>,
    start: Instant,
}

impl SerialTransport {
    fn open(path: &str, baud: u32) -> Result<Self> {
        let mut port = mio_serial::new(path, baud).open()?;
        port.set_timeout(Duration::from_millis(1))?;
        Ok(Self {
            port,
            start: Instant::now(),
        })
    }
}

impl dfplayer::Transport for SerialTransport {
    type Error = io::Error;

    fn write(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        self.port.write_all(bytes)
    }

    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                Ok(0)
            }
            Err(e) => Err(e),
        }
    }

    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

/// Logs every callback at an appropriate `tracing` level. Real applications
/// would act on `init_complete`/`device_change` here instead.
struct TracingHooks;

impl Hooks for TracingHooks {
    fn error(&mut self, code: ErrorCode, in_flight_id: u8) {
        warn!(?code, in_flight_id, "module reported an error");
    }

    fn query_response(&mut self, parameter: Parameter, value: u16) {
        info!(?parameter, value, "query response");
    }

    fn device_change(&mut self, device: DeviceSet, change: DeviceChange) {
        info!(?device, ?change, "storage device changed");
    }

    fn finished_file(&mut self, device: DeviceSet, index: u16) {
        info!(?device, index, "file finished playing");
    }

    fn init_complete(&mut self, devices: DeviceSet) {
        info!(?devices, "module finished initializing");
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let mut transport = SerialTransport::open(&args.port, args.baud)?;
    let mut hooks = TracingHooks;
    let mut coordinator: Coordinator<8> = Coordinator::new();

    info!(port = %args.port, baud = args.baud, "opened serial port");
    coordinator.reset();

    let mut queued_startup_commands = false;

    loop {
        coordinator.update(&mut transport, &mut hooks)?;

        if !queued_startup_commands && coordinator.has_capacity() {
            if let Some(volume) = args.volume {
                coordinator.set_volume(volume)?;
            }
            if let Some(track) = args.track {
                coordinator.play_file(track)?;
            }
            queued_startup_commands = true;
        }

        std::thread::sleep(POLL_INTERVAL);
    }
}
