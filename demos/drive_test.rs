// Drive test: step-by-step motion sequence with confirmation
//
// IMPORTANT: Run motor_diagnostic FIRST on real hardware.
//
// Usage: cargo run --example drive_test -- [--sim] [--port PORT] [--config FILE]
//
// Safety features:
// - Explicit confirmation before every motion
// - Short distances at reduced speed
// - Each motion is bounded by a timeout and brakes on expiry

use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use wallaby_drive::config::{DriveConfig, MOTOR_PORT};
use wallaby_drive::drive::{DiffDrive, WaitPolicy};
use wallaby_drive::messages::MotionCommand;
use wallaby_drive::motor::{FeetechChannel, MotorEncoderChannel, SimChannel};

const TEST_SPEED: i32 = 500;
const MOTION_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Parser)]
struct Args {
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, default_value = MOTOR_PORT)]
    port: String,
    /// Use the simulated channel, no confirmations
    #[arg(long)]
    sim: bool,
}

fn confirm(prompt: &str) -> bool {
    print!("{} [y/N]: ", prompt);
    io::stdout().flush().unwrap();
    let mut input = String::new();
    io::stdin().read_line(&mut input).unwrap();
    input.trim().eq_ignore_ascii_case("y")
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Setup logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("info".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => DriveConfig::from_json_file(path)?,
        None => DriveConfig::default(),
    };

    if args.sim {
        let drive = DiffDrive::new(SimChannel::new(config.ports), &config)?;
        return run_sequence(drive, false);
    }

    println!("⚠  This tool WILL drive the motors!");
    println!("Serial port: {}", args.port);
    if !confirm("Are the robot's wheels OFF THE GROUND (robot elevated/on blocks)?") {
        println!("Please elevate the robot so wheels can spin freely.");
        return Ok(());
    }

    let mut channel = FeetechChannel::open(&args.port, &config)?;
    channel.initialize()?;
    let drive = DiffDrive::new(channel, &config)?;
    run_sequence(drive, true)
}

fn run_sequence<C: MotorEncoderChannel>(
    mut drive: DiffDrive<C>,
    interactive: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let speed = Some(TEST_SPEED);
    let tests = [
        ("Forward 10 cm", MotionCommand::Forward { distance_cm: 10.0, speed }),
        ("Backward 10 cm", MotionCommand::Backward { distance_cm: 10.0, speed }),
        ("Pivot right 90°", MotionCommand::Right { degrees: 90.0, radius_cm: 0.0, speed }),
        ("Pivot left 90°", MotionCommand::Left { degrees: 90.0, radius_cm: 0.0, speed }),
        ("Left 45° on 20 cm", MotionCommand::Left { degrees: 45.0, radius_cm: 20.0, speed }),
        ("Reverse left 45° on 20 cm", MotionCommand::Left { degrees: -45.0, radius_cm: 20.0, speed }),
    ];

    for (name, command) in tests {
        if interactive && !confirm(&format!("Run: {}?", name)) {
            continue;
        }
        let wait = WaitPolicy::blocking().with_timeout(MOTION_TIMEOUT);
        match drive.execute_with(&command, &wait) {
            Ok(report) => println!(
                "  ✓ {}: left {}/{} ticks, right {}/{} ticks",
                name, report.left_ticks, report.left_target, report.right_ticks, report.right_target
            ),
            Err(e) => {
                println!("  ✗ {}: {}", name, e);
                break;
            }
        }
    }

    drive.drive_off()?;
    println!("Motors off.");
    Ok(())
}
