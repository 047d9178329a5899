// Differential-drive unit conversion
// Maps centimeters of travel to encoder ticks and turn requests to per-wheel arcs.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::config::{TICKS_PER_ROTATION, TRACK_WIDTH_CM, WHEEL_DIAMETER_CM};
use crate::error::{DriveError, Result};

/// Which way the robot turns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnSide {
    Left,
    Right,
}

/// Fixed robot dimensions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RobotGeometry {
    pub wheel_diameter_cm: f64,
    /// Wheel center to wheel center
    pub track_width_cm: f64,
    pub ticks_per_rotation: f64,
}

impl Default for RobotGeometry {
    fn default() -> Self {
        Self {
            wheel_diameter_cm: WHEEL_DIAMETER_CM,
            track_width_cm: TRACK_WIDTH_CM,
            ticks_per_rotation: TICKS_PER_ROTATION,
        }
    }
}

/// Arc lengths for one turn, signed: negative means that wheel drives backward
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TurnArcs {
    pub outer_cm: f64,
    pub inner_cm: f64,
}

impl TurnArcs {
    /// Inner wheel runs against the outer wheel (radius < track/2)
    pub fn reverses_inner(&self) -> bool {
        self.inner_cm != 0.0 && self.inner_cm.signum() != self.outer_cm.signum()
    }
}

impl RobotGeometry {
    pub fn new(wheel_diameter_cm: f64, track_width_cm: f64, ticks_per_rotation: f64) -> Result<Self> {
        let geometry = Self {
            wheel_diameter_cm,
            track_width_cm,
            ticks_per_rotation,
        };
        geometry.validate()?;
        Ok(geometry)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("wheel_diameter_cm", self.wheel_diameter_cm),
            ("track_width_cm", self.track_width_cm),
            ("ticks_per_rotation", self.ticks_per_rotation),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(DriveError::invalid(format!(
                    "{} must be positive and finite, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }

    /// Ticks per centimeter of linear wheel travel
    pub fn ticks_per_cm(&self) -> f64 {
        self.ticks_per_rotation / (PI * self.wheel_diameter_cm)
    }

    /// Exact (fractional) tick count for a distance
    pub fn cm_to_ticks_exact(&self, cm: f64) -> f64 {
        cm * self.ticks_per_cm()
    }

    /// Distance to whole ticks.
    ///
    /// Rounds half away from zero, so forward and backward targets are
    /// quantized symmetrically.
    pub fn distance_to_ticks(&self, cm: f64) -> i64 {
        self.cm_to_ticks_exact(cm).round() as i64
    }

    pub fn ticks_to_distance(&self, ticks: i64) -> f64 {
        ticks as f64 * (PI * self.wheel_diameter_cm / self.ticks_per_rotation)
    }

    /// Outer and inner wheel arcs for a turn of `degrees` about a point
    /// `radius_cm` from the robot center.
    ///
    /// Negative degrees negate both arcs. Radius 0 is a pivot turn.
    pub fn turn_wheel_arcs(&self, degrees: f64, radius_cm: f64) -> Result<TurnArcs> {
        if !degrees.is_finite() {
            return Err(DriveError::invalid(format!("degrees must be finite, got {}", degrees)));
        }
        if !radius_cm.is_finite() || radius_cm < 0.0 {
            return Err(DriveError::invalid(format!(
                "radius must be finite and >= 0, got {}",
                radius_cm
            )));
        }

        let sweep = degrees / 360.0 * 2.0 * PI;
        let half_track = self.track_width_cm / 2.0;
        Ok(TurnArcs {
            outer_cm: sweep * (radius_cm + half_track),
            inner_cm: sweep * (radius_cm - half_track),
        })
    }

    /// Per-wheel arcs as (left_cm, right_cm). A right turn puts the left
    /// wheel on the outside, a left turn the right wheel.
    pub fn wheel_arcs(&self, side: TurnSide, degrees: f64, radius_cm: f64) -> Result<(f64, f64)> {
        let arcs = self.turn_wheel_arcs(degrees, radius_cm)?;
        Ok(match side {
            TurnSide::Right => (arcs.outer_cm, arcs.inner_cm),
            TurnSide::Left => (arcs.inner_cm, arcs.outer_cm),
        })
    }
}
