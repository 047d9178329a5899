// Motor side of the drive
//
// Provides:
// - Unit conversion between centimeters, turn arcs and encoder ticks
// - The motor/encoder channel capability
// - A simulated channel and a Feetech serial-bus channel

mod channel;
pub mod feetech;
mod hardware;
pub mod kinematics;
pub mod sim;

pub use channel::{Direction, MotorEncoderChannel, Wheel};
pub use feetech::{FeetechBus, FeetechError};
pub use hardware::FeetechChannel;
pub use kinematics::{RobotGeometry, TurnArcs, TurnSide};
pub use sim::SimChannel;
