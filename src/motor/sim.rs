// Simulated motor/encoder pair for running the drive without hardware
//
// Each encoder read advances that wheel by `speed / speed_per_tick` fractional
// ticks, so motion progresses at the rate the controller polls.
// Backward travel counts negative, like the Wallaby BEMF counters.

use std::collections::BTreeMap;

use tracing::debug;

use crate::config::{DrivePorts, MAX_SPEED};
use crate::error::{DriveError, Result};

use super::channel::MotorEncoderChannel;

/// Power state of a simulated wheel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WheelState {
    #[default]
    Coasting,
    Braked,
    Driving,
}

/// One call made against the simulator, recorded in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelCall {
    SetSpeed { port: u8, speed: i32 },
    Stop { port: u8 },
    Brake { port: u8 },
    Read { port: u8 },
    Clear { port: u8 },
}

impl ChannelCall {
    /// True for calls that change motor power
    pub fn is_motor_command(&self) -> bool {
        matches!(
            self,
            ChannelCall::SetSpeed { .. } | ChannelCall::Stop { .. } | ChannelCall::Brake { .. }
        )
    }
}

#[derive(Debug, Default)]
struct SimWheel {
    speed: i32,
    state: WheelState,
    /// Counter the controller reads and clears
    position: f64,
    /// Total travel since creation, never cleared
    odometer: f64,
    stalled: bool,
    fault: Option<String>,
}

/// In-memory `MotorEncoderChannel`
#[derive(Debug)]
pub struct SimChannel {
    wheels: BTreeMap<u8, SimWheel>,
    speed_per_tick: f64,
    calls: Vec<ChannelCall>,
}

impl SimChannel {
    /// Simulator with the given two ports; full speed advances one tick per read
    pub fn new(ports: DrivePorts) -> Self {
        Self::with_speed_per_tick(ports, MAX_SPEED as f64)
    }

    /// `speed_per_tick` is the commanded speed that advances one tick per read
    pub fn with_speed_per_tick(ports: DrivePorts, speed_per_tick: f64) -> Self {
        let mut wheels = BTreeMap::new();
        wheels.insert(ports.left, SimWheel::default());
        wheels.insert(ports.right, SimWheel::default());
        Self {
            wheels,
            speed_per_tick,
            calls: Vec::new(),
        }
    }

    /// Wheel ignores speed commands, like a motor pushed against a wall
    pub fn stall(&mut self, port: u8) {
        if let Some(wheel) = self.wheels.get_mut(&port) {
            wheel.stalled = true;
        }
    }

    pub fn unstall(&mut self, port: u8) {
        if let Some(wheel) = self.wheels.get_mut(&port) {
            wheel.stalled = false;
        }
    }

    /// Every subsequent call on `port` fails
    pub fn fail(&mut self, port: u8, reason: impl Into<String>) {
        if let Some(wheel) = self.wheels.get_mut(&port) {
            wheel.fault = Some(reason.into());
        }
    }

    pub fn calls(&self) -> &[ChannelCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    pub fn motor_commands(&self) -> Vec<ChannelCall> {
        self.calls.iter().copied().filter(ChannelCall::is_motor_command).collect()
    }

    pub fn speed(&self, port: u8) -> i32 {
        self.wheels.get(&port).map_or(0, |w| w.speed)
    }

    pub fn state(&self, port: u8) -> WheelState {
        self.wheels.get(&port).map_or(WheelState::Coasting, |w| w.state)
    }

    pub fn odometer(&self, port: u8) -> f64 {
        self.wheels.get(&port).map_or(0.0, |w| w.odometer)
    }

    fn wheel(&mut self, port: u8) -> Result<&mut SimWheel> {
        let wheel = self
            .wheels
            .get_mut(&port)
            .ok_or_else(|| DriveError::HardwareUnavailable {
                port,
                reason: "no simulated motor on this port".to_string(),
            })?;
        if let Some(reason) = &wheel.fault {
            return Err(DriveError::HardwareUnavailable {
                port,
                reason: reason.clone(),
            });
        }
        Ok(wheel)
    }
}

impl MotorEncoderChannel for SimChannel {
    fn set_motor_speed(&mut self, port: u8, speed: i32) -> Result<()> {
        self.calls.push(ChannelCall::SetSpeed { port, speed });
        let wheel = self.wheel(port)?;
        wheel.speed = speed;
        wheel.state = WheelState::Driving;
        debug!("sim port {} speed {}", port, speed);
        Ok(())
    }

    fn stop(&mut self, port: u8) -> Result<()> {
        self.calls.push(ChannelCall::Stop { port });
        let wheel = self.wheel(port)?;
        wheel.speed = 0;
        wheel.state = WheelState::Coasting;
        Ok(())
    }

    fn brake(&mut self, port: u8) -> Result<()> {
        self.calls.push(ChannelCall::Brake { port });
        let wheel = self.wheel(port)?;
        wheel.speed = 0;
        wheel.state = WheelState::Braked;
        Ok(())
    }

    fn read_position(&mut self, port: u8) -> Result<i64> {
        self.calls.push(ChannelCall::Read { port });
        let speed_per_tick = self.speed_per_tick;
        let wheel = self.wheel(port)?;
        if wheel.state == WheelState::Driving && !wheel.stalled {
            let delta = wheel.speed as f64 / speed_per_tick;
            wheel.position += delta;
            wheel.odometer += delta;
        }
        // Truncate toward zero so a reported count never exceeds real travel
        Ok(wheel.position.trunc() as i64)
    }

    fn clear_position(&mut self, port: u8) -> Result<()> {
        self.calls.push(ChannelCall::Clear { port });
        self.wheel(port)?.position = 0.0;
        Ok(())
    }
}
