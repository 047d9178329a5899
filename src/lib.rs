//! Differential-drive motion control for a two-motor wheeled robot.
//!
//! Converts distance and turn requests into per-wheel speed commands and
//! blocks on encoder feedback until each wheel has covered its share.
//!
//! ```no_run
//! use wallaby_drive::config::DriveConfig;
//! use wallaby_drive::drive::DiffDrive;
//! use wallaby_drive::motor::SimChannel;
//!
//! let config = DriveConfig::default();
//! let mut drive = DiffDrive::new(SimChannel::new(config.ports), &config)?;
//! drive.forward(30)?;
//! drive.right(90, 0.0)?;
//! drive.backward_speed(10, 800)?;
//! # Ok::<(), wallaby_drive::DriveError>(())
//! ```

pub mod config;
pub mod drive;
pub mod error;
pub mod messages;
pub mod motor;
pub mod runtime;

pub use error::{DriveError, Result};
