// Real-hardware drive channel over a Feetech serial bus
//
// Each drive port is a servo ID in velocity mode. The servos only report a
// single-turn position, so this adapter unwraps consecutive readings into a
// continuous step count and keeps its own zero for `clear_position`.
// Steps (4096 per shaft turn) are reported in the configured ticks per
// rotation, so the drive geometry works unchanged on either channel.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::config::{DriveConfig, DrivePorts};
use crate::error::{DriveError, Result};

use super::channel::MotorEncoderChannel;
use super::feetech::{position_delta, FeetechBus, FeetechError, OperatingMode, POSITION_RESOLUTION};

#[derive(Debug, Clone, Copy)]
struct PositionTracker {
    last_raw: u16,
    steps: i64,
}

/// Convert unwrapped servo steps to drive ticks, truncating toward zero
pub(crate) fn steps_to_ticks(steps: i64, ticks_per_rotation: f64) -> i64 {
    (steps as f64 * ticks_per_rotation / POSITION_RESOLUTION as f64).trunc() as i64
}

/// `MotorEncoderChannel` backed by two Feetech servos
pub struct FeetechChannel {
    bus: FeetechBus,
    ports: DrivePorts,
    ticks_per_rotation: f64,
    torque_on: BTreeMap<u8, bool>,
    trackers: BTreeMap<u8, PositionTracker>,
}

fn unavailable(port: u8, err: FeetechError) -> DriveError {
    DriveError::HardwareUnavailable {
        port,
        reason: err.to_string(),
    }
}

impl FeetechChannel {
    /// Open the bus on `serial_port` for the wheel servo IDs in `config`
    pub fn open(serial_port: &str, config: &DriveConfig) -> Result<Self> {
        info!("Opening motor bus on {}", serial_port);
        let bus = FeetechBus::open(serial_port).map_err(|e| unavailable(config.ports.left, e))?;
        Ok(Self::with_bus(bus, config))
    }

    pub fn with_bus(bus: FeetechBus, config: &DriveConfig) -> Self {
        let ticks_per_rotation = config.geometry.ticks_per_rotation;
        debug!(
            "Reporting {} ticks per {} servo steps",
            ticks_per_rotation, POSITION_RESOLUTION
        );
        Self {
            bus,
            ports: config.ports,
            ticks_per_rotation,
            torque_on: BTreeMap::new(),
            trackers: BTreeMap::new(),
        }
    }

    /// Put both servos in velocity mode with torque on
    ///
    /// Must be called before driving. Torque has to be off while the
    /// operating mode changes.
    pub fn initialize(&mut self) -> Result<()> {
        let ids = [self.ports.left, self.ports.right];
        info!("Initializing servos {:?} for velocity control", ids);

        for id in ids {
            match self.bus.ping(id) {
                Ok(true) => debug!("Servo {} responding", id),
                Ok(false) => {
                    warn!("Servo {} not responding to ping", id);
                    return Err(unavailable(id, FeetechError::Timeout { id }));
                }
                Err(e) => return Err(unavailable(id, e)),
            }
        }

        for id in ids {
            self.bus.disable_torque(id).map_err(|e| unavailable(id, e))?;
            self.bus
                .set_operating_mode(id, OperatingMode::Velocity)
                .map_err(|e| unavailable(id, e))?;
            self.bus.enable_torque(id).map_err(|e| unavailable(id, e))?;
            self.torque_on.insert(id, true);
            self.clear_position(id)?;
        }

        info!("Servos initialized");
        Ok(())
    }

    fn ensure_torque(&mut self, port: u8) -> Result<()> {
        if !self.torque_on.get(&port).copied().unwrap_or(false) {
            self.bus.enable_torque(port).map_err(|e| unavailable(port, e))?;
            self.torque_on.insert(port, true);
        }
        Ok(())
    }
}

impl MotorEncoderChannel for FeetechChannel {
    fn set_motor_speed(&mut self, port: u8, speed: i32) -> Result<()> {
        self.ensure_torque(port)?;
        let velocity = speed.clamp(-i16::MAX as i32, i16::MAX as i32) as i16;
        debug!("Servo {} goal velocity {}", port, velocity);
        self.bus
            .set_velocity(port, velocity)
            .map_err(|e| unavailable(port, e))
    }

    fn stop(&mut self, port: u8) -> Result<()> {
        self.bus.set_velocity(port, 0).map_err(|e| unavailable(port, e))?;
        // Torque off lets the wheel spin freely
        self.bus.disable_torque(port).map_err(|e| unavailable(port, e))?;
        self.torque_on.insert(port, false);
        Ok(())
    }

    fn brake(&mut self, port: u8) -> Result<()> {
        // Zero velocity with torque held
        self.ensure_torque(port)?;
        self.bus.set_velocity(port, 0).map_err(|e| unavailable(port, e))
    }

    fn read_position(&mut self, port: u8) -> Result<i64> {
        let raw = self.bus.get_position(port).map_err(|e| unavailable(port, e))?;
        let tracker = self.trackers.entry(port).or_insert(PositionTracker {
            last_raw: raw,
            steps: 0,
        });
        tracker.steps += position_delta(tracker.last_raw, raw);
        tracker.last_raw = raw;
        Ok(steps_to_ticks(tracker.steps, self.ticks_per_rotation))
    }

    fn clear_position(&mut self, port: u8) -> Result<()> {
        let raw = self.bus.get_position(port).map_err(|e| unavailable(port, e))?;
        self.trackers.insert(
            port,
            PositionTracker {
                last_raw: raw,
                steps: 0,
            },
        );
        Ok(())
    }
}

impl Drop for FeetechChannel {
    fn drop(&mut self) {
        // Try to stop motors when the channel is dropped (safety measure)
        for port in [self.ports.left, self.ports.right] {
            if let Err(e) = self.stop(port) {
                warn!("Failed to stop servo {} on drop: {}", port, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TICKS_PER_ROTATION;
    use crate::motor::RobotGeometry;

    #[test]
    fn test_one_shaft_turn_is_one_rotation_of_ticks() {
        assert_eq!(steps_to_ticks(POSITION_RESOLUTION, TICKS_PER_ROTATION), 1500);
        assert_eq!(steps_to_ticks(-POSITION_RESOLUTION, TICKS_PER_ROTATION), -1500);
        assert_eq!(steps_to_ticks(POSITION_RESOLUTION, 4096.0), 4096);
    }

    #[test]
    fn test_partial_steps_truncate_toward_zero() {
        assert_eq!(steps_to_ticks(2, TICKS_PER_ROTATION), 0);
        assert_eq!(steps_to_ticks(-2, TICKS_PER_ROTATION), 0);
        // 3 steps = 1.0986 ticks
        assert_eq!(steps_to_ticks(3, TICKS_PER_ROTATION), 1);
        assert_eq!(steps_to_ticks(-3, TICKS_PER_ROTATION), -1);
    }

    #[test]
    fn test_default_geometry_covers_requested_distance() {
        let geometry = RobotGeometry::default();
        let target = geometry.distance_to_ticks(100.0);
        // Steps the shaft must turn for 100 cm of wheel travel
        let circumference = std::f64::consts::PI * geometry.wheel_diameter_cm;
        let steps = (100.0 / circumference * POSITION_RESOLUTION as f64).round() as i64;
        let reported = steps_to_ticks(steps, geometry.ticks_per_rotation);
        assert!((reported - target).abs() <= 1, "reported {} target {}", reported, target);
    }
}
