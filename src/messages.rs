// Message types exchanged with the runtime

use serde::{Deserialize, Serialize};

use crate::drive::MotionReport;

// Motion request from teleop/scripts -> runtime
// Tagged by "motion": {"motion":"forward","distance_cm":20}
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "motion", rename_all = "snake_case")]
pub enum MotionCommand {
    Forward {
        distance_cm: f64,
        #[serde(default)]
        speed: Option<i32>,
    },
    Backward {
        distance_cm: f64,
        #[serde(default)]
        speed: Option<i32>,
    },
    Left {
        degrees: f64,
        #[serde(default)]
        radius_cm: f64,
        #[serde(default)]
        speed: Option<i32>,
    },
    Right {
        degrees: f64,
        #[serde(default)]
        radius_cm: f64,
        #[serde(default)]
        speed: Option<i32>,
    },
}

/// Motion status published by runtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MotionStatus {
    Idle,
    Running { command: MotionCommand },
    Done { command: MotionCommand, report: MotionReport },
    Rejected { reason: String },
    Cancelled { command: MotionCommand },
    Fault { reason: String },
}
