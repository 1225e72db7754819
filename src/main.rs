use clap::Parser;
use fretbridge::device::{
    AckReader, AtomicDeviceStatus, DeviceDispatcher, DeviceStatus, SharedDevice,
};
use fretbridge::messaging::channels::{OutboundConsumer, drain};
use fretbridge::{ClientHub, ConnectionContext, EngineConfig, create_outbound_channel, logging};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

// How often the writer thread drains the outbox
const WRITER_POLL_INTERVAL: Duration = Duration::from_millis(2);

#[derive(Parser)]
#[command(name = "fretbridge")]
#[command(about = "Plays client note sequences on a serial fretboard device", long_about = None)]
struct Cli {
    /// Device node (already configured serial port); runs without a device if omitted
    #[arg(short, long)]
    device: Option<PathBuf>,

    /// Config file (RON); defaults to the user config directory
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Relay unrecognised JSON frames to other clients
    #[arg(long)]
    relay: bool,
}

fn main() -> ExitCode {
    logging::init_logger();
    let cli = Cli::parse();

    let mut config = match EngineConfig::load_or_default(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            log::error!("Could not load config: {}", e);
            return ExitCode::FAILURE;
        }
    };
    config.legacy_relay |= cli.relay;

    let (device, ack_reader) = match cli.device.as_deref() {
        Some(path) => match open_device(path, &config) {
            Ok((device, reader)) => (Some(device), Some(reader)),
            Err(e) => {
                log::error!("Could not open device {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => {
            log::warn!("No device given, play requests will be rejected");
            (None, None)
        }
    };

    let (outbox, consumer) = create_outbound_channel(config.outbox_capacity);
    let hub = Arc::new(ClientHub::new());
    let mut connection = match ConnectionContext::open(config, device, outbox, hub) {
        Ok(connection) => connection,
        Err(e) => {
            log::error!("Could not start playback engine: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let running = Arc::new(AtomicBool::new(true));
    let writer = spawn_writer(consumer, Arc::clone(&running));

    if let Err(e) = connection.serve_lines(io::stdin().lock()) {
        log::error!("stdin read failed: {}", e);
    }

    log::info!("Input closed, shutting down");
    connection.close();
    running.store(false, Ordering::Release);
    if writer.join().is_err() {
        log::error!("Writer thread panicked");
    }

    if let Some(reader) = ack_reader {
        log::debug!("Device sent {} lines", reader.lines_read());
    }
    ExitCode::SUCCESS
}

/// Open the device node for reading and writing and start draining its replies
fn open_device(
    path: &std::path::Path,
    config: &EngineConfig,
) -> io::Result<(SharedDevice, AckReader)> {
    let file = OpenOptions::new().read(true).write(true).open(path)?;
    let read_half: File = file.try_clone()?;

    let status = AtomicDeviceStatus::new(DeviceStatus::Connected);
    let reader = AckReader::spawn(read_half, status.clone());
    let device = DeviceDispatcher::new(Box::new(file), config.protocol)
        .with_line_delay(config.chord_line_delay())
        .with_status(status)
        .into_shared();

    log::info!("Device opened: {} ({:?} protocol)", path.display(), config.protocol);
    Ok((device, reader))
}

/// Write queued frames to stdout, one JSON object per line
fn spawn_writer(
    mut consumer: OutboundConsumer,
    running: Arc<AtomicBool>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let stdout = io::stdout();
        loop {
            // Read the flag first so the last drain sees everything queued before shutdown
            let keep_running = running.load(Ordering::Acquire);

            let frames = drain(&mut consumer);
            if !frames.is_empty() {
                let mut out = stdout.lock();
                for frame in frames {
                    match frame.to_json() {
                        Ok(text) => {
                            if let Err(e) = writeln!(out, "{}", text) {
                                log::error!("stdout write failed: {}", e);
                                return;
                            }
                        }
                        Err(e) => log::error!("Could not encode message: {}", e),
                    }
                }
                let _ = out.flush();
            }

            if !keep_running {
                return;
            }
            thread::sleep(WRITER_POLL_INTERVAL);
        }
    })
}
