use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use wallaby_drive::config::{DriveConfig, MOTOR_PORT};
use wallaby_drive::drive::DiffDrive;
use wallaby_drive::motor::{FeetechChannel, MotorEncoderChannel, SimChannel};

/// Zenoh motion-command runtime for the two-wheel drive
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// JSON drive config (geometry, tuning, ports); defaults when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Serial port of the Feetech motor bus
    #[arg(long, default_value = MOTOR_PORT)]
    port: String,

    /// Run against the simulated channel instead of hardware
    #[arg(long)]
    sim: bool,
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init(); // installs the subscriber globally

    let args = Args::parse();
    if let Err(e) = start(args).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}

async fn start(args: Args) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = match &args.config {
        Some(path) => DriveConfig::from_json_file(path)?,
        None => DriveConfig::default(),
    };

    let channel: Box<dyn MotorEncoderChannel + Send> = if args.sim {
        info!("Using simulated drive channel");
        Box::new(SimChannel::new(config.ports))
    } else {
        let mut channel = FeetechChannel::open(&args.port, &config)?;
        channel.initialize()?;
        Box::new(channel)
    };

    let drive = DiffDrive::new(channel, &config)?;
    wallaby_drive::runtime::run(drive).await
}
