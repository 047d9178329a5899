// Robot constants, tuning, ports, runtime timing and topics
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{DriveError, Result};
use crate::motor::{Direction, RobotGeometry, Wheel};

// Hardware absolute max speed (ticks/s)
pub const MAX_SPEED: i32 = 1500;

// Robot geometry
pub const WHEEL_DIAMETER_CM: f64 = 5.5;
pub const TRACK_WIDTH_CM: f64 = 19.0; // wheel center to wheel center
pub const TICKS_PER_ROTATION: f64 = 1500.0; // BEMF ticks, ~1500 on the Wallaby

// Motor ports
pub const MOT_LEFT: u8 = 1;
pub const MOT_RIGHT: u8 = 0;

// Tuned speeds, the two motors are not identical
pub const SPD_L_F: i32 = 1500;
pub const SPD_R_F: i32 = 1450;
pub const SPD_L_B: i32 = 1500;
pub const SPD_R_B: i32 = 1410;

// Encoder poll period while waiting on a motion
pub const POLL_INTERVAL_MS: u64 = 5;

// Runtime loop frequency
pub const LOOP_HZ: u64 = 50;

// Zenoh topics
pub const TOPIC_CMD_MOTION: &str = "wallaby/cmd/motion"; // motion commands
pub const TOPIC_CMD_HALT: &str = "wallaby/cmd/halt"; // cancel in-flight motion
pub const TOPIC_STATE_MOTION: &str = "wallaby/state/motion"; // motion status

// Serial port for the Feetech bus
pub const MOTOR_PORT: &str = "/dev/ttyUSB0";

/// Per-wheel, per-direction maximum commanded speeds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TuningProfile {
    pub left_forward: i32,
    pub right_forward: i32,
    pub left_backward: i32,
    pub right_backward: i32,
    pub max_speed: i32,
}

impl Default for TuningProfile {
    fn default() -> Self {
        Self {
            left_forward: SPD_L_F,
            right_forward: SPD_R_F,
            left_backward: SPD_L_B,
            right_backward: SPD_R_B,
            max_speed: MAX_SPEED,
        }
    }
}

impl TuningProfile {
    pub fn validate(&self) -> Result<()> {
        if self.max_speed <= 0 {
            return Err(DriveError::invalid(format!(
                "max_speed must be positive, got {}",
                self.max_speed
            )));
        }
        for (name, speed) in [
            ("left_forward", self.left_forward),
            ("right_forward", self.right_forward),
            ("left_backward", self.left_backward),
            ("right_backward", self.right_backward),
        ] {
            if speed <= 0 || speed > self.max_speed {
                return Err(DriveError::invalid(format!(
                    "{} speed {} outside 1..={}",
                    name, speed, self.max_speed
                )));
            }
        }
        Ok(())
    }

    /// Tuned speed magnitude for one wheel in one direction
    pub fn speed(&self, wheel: Wheel, direction: Direction) -> i32 {
        match (wheel, direction) {
            (Wheel::Left, Direction::Forward) => self.left_forward,
            (Wheel::Right, Direction::Forward) => self.right_forward,
            (Wheel::Left, Direction::Backward) => self.left_backward,
            (Wheel::Right, Direction::Backward) => self.right_backward,
        }
    }

    /// Left-turn speed: average of the two wheels' pivot directions
    pub fn left_turn(&self) -> i32 {
        (self.left_backward + self.right_forward) / 2
    }

    /// Right-turn speed: average of the two wheels' pivot directions
    pub fn right_turn(&self) -> i32 {
        (self.right_backward + self.left_forward) / 2
    }

    /// Scale a requested magnitude by this wheel's share of the faster
    /// wheel's tuned speed, keeping the asymmetry compensation for overrides.
    pub fn scaled(&self, wheel: Wheel, direction: Direction, magnitude: f64) -> f64 {
        let faster = self
            .speed(Wheel::Left, direction)
            .max(self.speed(Wheel::Right, direction)) as f64;
        magnitude * self.speed(wheel, direction) as f64 / faster
    }

    /// Reject speed overrides outside 1..=max_speed
    pub fn check_override(&self, speed: i32) -> Result<()> {
        if speed <= 0 || speed > self.max_speed {
            return Err(DriveError::invalid(format!(
                "speed {} outside 1..={}",
                speed, self.max_speed
            )));
        }
        Ok(())
    }
}

/// Motor/encoder port assignment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DrivePorts {
    pub left: u8,
    pub right: u8,
}

impl Default for DrivePorts {
    fn default() -> Self {
        Self {
            left: MOT_LEFT,
            right: MOT_RIGHT,
        }
    }
}

impl DrivePorts {
    pub fn port(&self, wheel: Wheel) -> u8 {
        match wheel {
            Wheel::Left => self.left,
            Wheel::Right => self.right,
        }
    }
}

/// Everything a `DiffDrive` needs besides its channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    pub geometry: RobotGeometry,
    pub tuning: TuningProfile,
    pub ports: DrivePorts,
    pub poll_interval_ms: u64,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            geometry: RobotGeometry::default(),
            tuning: TuningProfile::default(),
            ports: DrivePorts::default(),
            poll_interval_ms: POLL_INTERVAL_MS,
        }
    }
}

impl DriveConfig {
    /// Load and validate a JSON config; missing fields take the defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading drive config from {}", path.display());
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: DriveConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.geometry.validate()?;
        self.tuning.validate()?;
        if self.ports.left == self.ports.right {
            return Err(DriveError::Config(format!(
                "left and right share port {}",
                self.ports.left
            )));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_turn_speeds() {
        let tuning = TuningProfile::default();
        assert_eq!(tuning.left_turn(), (1500 + 1450) / 2);
        assert_eq!(tuning.right_turn(), (1410 + 1500) / 2);
    }

    #[test]
    fn test_scaled_keeps_asymmetry() {
        let tuning = TuningProfile::default();
        let left = tuning.scaled(Wheel::Left, Direction::Forward, 1000.0);
        let right = tuning.scaled(Wheel::Right, Direction::Forward, 1000.0);
        assert_eq!(left, 1000.0);
        assert!((right - 1000.0 * 1450.0 / 1500.0).abs() < 1e-9);
    }

    #[test]
    fn test_tuning_rejects_speed_above_max() {
        let tuning = TuningProfile {
            right_backward: 1600,
            ..TuningProfile::default()
        };
        assert!(tuning.validate().unwrap_err().is_invalid_argument());
    }

    #[test]
    fn test_check_override() {
        let tuning = TuningProfile::default();
        assert!(tuning.check_override(1).is_ok());
        assert!(tuning.check_override(1500).is_ok());
        assert!(tuning.check_override(0).is_err());
        assert!(tuning.check_override(-200).is_err());
        assert!(tuning.check_override(1501).is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = DriveConfig::from_json_str(
            r#"{ "geometry": { "wheel_diameter_cm": 6.0, "track_width_cm": 20.0, "ticks_per_rotation": 4096.0 }, "poll_interval_ms": 0 }"#,
        )
        .unwrap();
        assert_eq!(config.geometry.ticks_per_rotation, 4096.0);
        assert_eq!(config.tuning, TuningProfile::default());
        assert_eq!(config.ports, DrivePorts::default());
        assert_eq!(config.poll_interval(), Duration::ZERO);
    }

    #[test]
    fn test_shared_port_rejected() {
        let config = DriveConfig {
            ports: DrivePorts { left: 3, right: 3 },
            ..DriveConfig::default()
        };
        assert!(matches!(config.validate(), Err(DriveError::Config(_))));
    }
}
