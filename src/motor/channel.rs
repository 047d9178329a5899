// Motor/encoder capability shared by real hardware and the simulator

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One of the two drive wheels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Wheel {
    Left,
    Right,
}

impl Wheel {
    pub const BOTH: [Wheel; 2] = [Wheel::Left, Wheel::Right];
}

/// Commanded direction of a single wheel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    /// Direction for a signed quantity, zero counts as forward
    pub fn of(value: f64) -> Self {
        if value < 0.0 {
            Direction::Backward
        } else {
            Direction::Forward
        }
    }

    pub fn sign(self) -> i32 {
        match self {
            Direction::Forward => 1,
            Direction::Backward => -1,
        }
    }
}

/// A pair of motor + encoder channels addressed by port.
///
/// Positions are signed tick counts. Implementations may count backward
/// travel as negative or positive; the drive controller only compares
/// magnitudes against its targets.
pub trait MotorEncoderChannel {
    /// Command a signed speed, positive drives the wheel forward
    fn set_motor_speed(&mut self, port: u8, speed: i32) -> Result<()>;

    /// Cut power and let the wheel coast
    fn stop(&mut self, port: u8) -> Result<()>;

    /// Actively hold the wheel still
    fn brake(&mut self, port: u8) -> Result<()>;

    fn read_position(&mut self, port: u8) -> Result<i64>;

    /// Reset the position counter to zero
    fn clear_position(&mut self, port: u8) -> Result<()>;
}

impl<C: MotorEncoderChannel + ?Sized> MotorEncoderChannel for Box<C> {
    fn set_motor_speed(&mut self, port: u8, speed: i32) -> Result<()> {
        (**self).set_motor_speed(port, speed)
    }

    fn stop(&mut self, port: u8) -> Result<()> {
        (**self).stop(port)
    }

    fn brake(&mut self, port: u8) -> Result<()> {
        (**self).brake(port)
    }

    fn read_position(&mut self, port: u8) -> Result<i64> {
        (**self).read_position(port)
    }

    fn clear_position(&mut self, port: u8) -> Result<()> {
        (**self).clear_position(port)
    }
}
