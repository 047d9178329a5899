// Drive diagnostic: READ-ONLY check of the two wheel servos
//
// Nothing is written to the motors. Turn the wheels by hand while it runs
// and watch the unwrapped encoder counts follow.
//
// Usage: cargo run --example motor_diagnostic -- [--port PORT] [--left ID] [--right ID]

use std::thread::sleep;
use std::time::Duration;

use clap::Parser;
use wallaby_drive::config::{DrivePorts, MOTOR_PORT};
use wallaby_drive::motor::feetech::{position_delta, FeetechBus, Register};
use wallaby_drive::motor::RobotGeometry;

#[derive(Debug, Parser)]
struct Args {
    #[arg(long, default_value = MOTOR_PORT)]
    port: String,
    #[arg(long, default_value_t = DrivePorts::default().left)]
    left: u8,
    #[arg(long, default_value_t = DrivePorts::default().right)]
    right: u8,
    /// Seconds to follow hand-turned wheels
    #[arg(long, default_value_t = 5)]
    watch: u64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Setup logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    let wheels = [("Left", args.left), ("Right", args.right)];

    println!("Drive diagnostic (READ-ONLY) on {}", args.port);
    println!();

    println!("Step 1: Opening serial port...");
    let mut bus = match FeetechBus::open(&args.port) {
        Ok(bus) => {
            println!("  ✓ Serial port opened");
            bus
        }
        Err(e) => {
            println!("  ✗ Failed to open serial port: {}", e);
            println!("  - Check the port path and the USB cable");
            return Err(e.into());
        }
    };
    println!();

    println!("Step 2: Pinging wheel servos...");
    for (name, id) in wheels {
        match bus.ping(id) {
            Ok(true) => println!("  {} (ID {}): ✓ RESPONDING", name, id),
            Ok(false) => println!("  {} (ID {}): ✗ NO RESPONSE", name, id),
            Err(e) => println!("  {} (ID {}): ✗ ERROR: {}", name, id, e),
        }
    }
    println!();

    println!("Step 3: Reading registers...");
    for (name, id) in wheels {
        println!("  === {} (ID {}) ===", name, id);
        match bus.read_u8(id, Register::OperatingMode) {
            Ok(1) => println!("    Operating Mode: 1 (Velocity)"),
            Ok(mode) => println!("    Operating Mode: {} (runtime will switch to velocity)", mode),
            Err(e) => println!("    Operating Mode: ERROR - {}", e),
        }
        match bus.read_u8(id, Register::TorqueEnable) {
            Ok(val) => println!("    Torque Enable:  {}", val),
            Err(e) => println!("    Torque Enable:  ERROR - {}", e),
        }
        match bus.get_velocity(id) {
            Ok(vel) => println!("    Present Velocity: {}", vel),
            Err(e) => println!("    Present Velocity: ERROR - {}", e),
        }
        match bus.get_position(id) {
            Ok(pos) => println!("    Present Position: {} ({:.1}°)", pos, pos as f32 * 360.0 / 4096.0),
            Err(e) => println!("    Present Position: ERROR - {}", e),
        }
    }
    println!();

    // Same unwrapping as the drive channel, done by hand to stay read-only
    println!("Step 4: Turn the wheels by hand for {}s...", args.watch);
    let geometry = RobotGeometry {
        ticks_per_rotation: 4096.0,
        ..RobotGeometry::default()
    };
    let mut last = [bus.get_position(args.left)?, bus.get_position(args.right)?];
    let mut ticks = [0i64; 2];
    for _ in 0..args.watch * 10 {
        sleep(Duration::from_millis(100));
        for (i, (_, id)) in wheels.iter().enumerate() {
            let raw = bus.get_position(*id)?;
            ticks[i] += position_delta(last[i], raw);
            last[i] = raw;
        }
        println!(
            "    left {:>6} ticks ({:>6.1} cm)   right {:>6} ticks ({:>6.1} cm)",
            ticks[0],
            geometry.ticks_to_distance(ticks[0]),
            ticks[1],
            geometry.ticks_to_distance(ticks[1])
        );
    }

    println!();
    println!("Next step: cargo run --example drive_test with wheels OFF THE GROUND");
    Ok(())
}
