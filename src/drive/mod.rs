//! Blocking differential-drive motions.
//!
//! Every motion clears both encoders, commands both motors, then polls until
//! each wheel has covered its target tick count. A wheel that arrives first
//! is braked on its own while the other finishes, then both are frozen.
//! Nothing returns before the motors are stopped:
//!
//! `IDLE -> COMMANDED -> POLLING -> STOPPED -> IDLE`
//!
//! Arguments are validated before the first channel call, so a rejected
//! motion never touches the motors.

mod wait;

use std::thread::sleep;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::{DriveConfig, DrivePorts, TuningProfile};
use crate::error::{DriveError, Result};
use crate::messages::MotionCommand;
use crate::motor::{Direction, MotorEncoderChannel, RobotGeometry, TurnSide, Wheel};

pub use wait::{CancelToken, WaitLimit, WaitPolicy};

/// Outcome of a completed motion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MotionReport {
    /// Target tick magnitudes
    pub left_target: i64,
    pub right_target: i64,
    /// Encoder readings when each wheel was braked
    pub left_ticks: i64,
    pub right_ticks: i64,
    /// Number of polling rounds
    pub polls: u64,
}

impl MotionReport {
    /// True when the motion had nothing to do and never touched the motors
    pub fn is_noop(&self) -> bool {
        *self == MotionReport::default()
    }
}

#[derive(Debug, Clone, Copy)]
struct WheelPlan {
    wheel: Wheel,
    port: u8,
    /// Tick magnitude to cover
    target: i64,
    /// Signed motor command
    speed: i32,
}

/// Two-wheel drive controller
pub struct DiffDrive<C> {
    channel: C,
    geometry: RobotGeometry,
    tuning: TuningProfile,
    ports: DrivePorts,
    poll_interval: Duration,
}

impl<C: MotorEncoderChannel> DiffDrive<C> {
    pub fn new(channel: C, config: &DriveConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            channel,
            geometry: config.geometry,
            tuning: config.tuning,
            ports: config.ports,
            poll_interval: config.poll_interval(),
        })
    }

    pub fn geometry(&self) -> &RobotGeometry {
        &self.geometry
    }

    pub fn tuning(&self) -> &TuningProfile {
        &self.tuning
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    pub fn into_channel(self) -> C {
        self.channel
    }

    // === Low-level primitives ===

    /// Cut power to both motors and let them coast
    pub fn drive_off(&mut self) -> Result<()> {
        self.channel.stop(self.ports.left)?;
        self.channel.stop(self.ports.right)
    }

    /// Actively brake both motors
    pub fn drive_freeze(&mut self) -> Result<()> {
        self.channel.brake(self.ports.left)?;
        self.channel.brake(self.ports.right)
    }

    /// Zero both encoder counters
    pub fn drive_clear(&mut self) -> Result<()> {
        self.channel.clear_position(self.ports.left)?;
        self.channel.clear_position(self.ports.right)
    }

    /// Run both motors at raw signed speeds until told otherwise
    pub fn drive(&mut self, left_speed: i32, right_speed: i32) -> Result<()> {
        for speed in [left_speed, right_speed] {
            // unsigned_abs: i32::MIN has no positive counterpart
            if speed.unsigned_abs() > self.tuning.max_speed.unsigned_abs() {
                return Err(DriveError::invalid(format!(
                    "speed {} exceeds max {}",
                    speed, self.tuning.max_speed
                )));
            }
        }
        debug!("drive left={} right={}", left_speed, right_speed);
        self.channel.set_motor_speed(self.ports.left, left_speed)?;
        self.channel.set_motor_speed(self.ports.right, right_speed)
    }

    // === Straight-line motion ===

    pub fn forward(&mut self, distance_cm: i32) -> Result<MotionReport> {
        self.drive_distance(Direction::Forward, distance_cm as f64, None, &WaitPolicy::blocking())
    }

    pub fn forward_speed(&mut self, distance_cm: i32, speed: i32) -> Result<MotionReport> {
        self.drive_distance(
            Direction::Forward,
            distance_cm as f64,
            Some(speed),
            &WaitPolicy::blocking(),
        )
    }

    pub fn backward(&mut self, distance_cm: i32) -> Result<MotionReport> {
        self.drive_distance(Direction::Backward, distance_cm as f64, None, &WaitPolicy::blocking())
    }

    pub fn backward_speed(&mut self, distance_cm: i32, speed: i32) -> Result<MotionReport> {
        self.drive_distance(
            Direction::Backward,
            distance_cm as f64,
            Some(speed),
            &WaitPolicy::blocking(),
        )
    }

    /// Drive straight `distance_cm` in `direction`.
    ///
    /// Without an override each wheel runs at its tuned speed; an override is
    /// scaled per wheel by the same tuning ratio.
    pub fn drive_distance(
        &mut self,
        direction: Direction,
        distance_cm: f64,
        speed: Option<i32>,
        wait: &WaitPolicy,
    ) -> Result<MotionReport> {
        if !distance_cm.is_finite() || distance_cm < 0.0 {
            return Err(DriveError::invalid(format!(
                "distance must be finite and >= 0, got {}",
                distance_cm
            )));
        }
        if let Some(speed) = speed {
            self.tuning.check_override(speed)?;
        }
        if distance_cm == 0.0 {
            return Ok(MotionReport::default());
        }

        let target = self.geometry.distance_to_ticks(distance_cm);
        let base = speed.map_or_else(|| self.fastest(direction), |s| s as f64);
        let signed = direction.sign() as f64;
        let plans = [
            self.plan(Wheel::Left, target, signed * base),
            self.plan(Wheel::Right, target, signed * base),
        ];

        info!(
            "{:?} {} cm ({} ticks) left={} right={}",
            direction, distance_cm, target, plans[0].speed, plans[1].speed
        );
        self.run(plans, wait)
    }

    // === Turning motion ===

    pub fn left(&mut self, degrees: i32, radius_cm: f64) -> Result<MotionReport> {
        self.turn(TurnSide::Left, degrees as f64, radius_cm, None, &WaitPolicy::blocking())
    }

    pub fn left_speed(&mut self, degrees: i32, radius_cm: f64, speed: i32) -> Result<MotionReport> {
        self.turn(TurnSide::Left, degrees as f64, radius_cm, Some(speed), &WaitPolicy::blocking())
    }

    pub fn right(&mut self, degrees: i32, radius_cm: f64) -> Result<MotionReport> {
        self.turn(TurnSide::Right, degrees as f64, radius_cm, None, &WaitPolicy::blocking())
    }

    pub fn right_speed(&mut self, degrees: i32, radius_cm: f64, speed: i32) -> Result<MotionReport> {
        self.turn(TurnSide::Right, degrees as f64, radius_cm, Some(speed), &WaitPolicy::blocking())
    }

    /// Pivot left in place
    pub fn left_turn(&mut self, speed: i32, degrees: f64) -> Result<MotionReport> {
        self.turn(TurnSide::Left, degrees, 0.0, Some(speed), &WaitPolicy::blocking())
    }

    /// Pivot right in place
    pub fn right_turn(&mut self, speed: i32, degrees: f64) -> Result<MotionReport> {
        self.turn(TurnSide::Right, degrees, 0.0, Some(speed), &WaitPolicy::blocking())
    }

    /// Turn `degrees` about a point `radius_cm` to the `side` of the robot
    /// center. Negative degrees run the same wheels with directions swapped.
    ///
    /// The outer wheel runs at the base speed and the inner wheel at the arc
    /// ratio of it, so both arrive together. Below half the track width the
    /// inner wheel reverses; at exactly half it stays braked.
    pub fn turn(
        &mut self,
        side: TurnSide,
        degrees: f64,
        radius_cm: f64,
        speed: Option<i32>,
        wait: &WaitPolicy,
    ) -> Result<MotionReport> {
        let (left_cm, right_cm) = self.geometry.wheel_arcs(side, degrees, radius_cm)?;
        if let Some(speed) = speed {
            self.tuning.check_override(speed)?;
        }
        if degrees == 0.0 {
            return Ok(MotionReport::default());
        }

        let outer_cm = match side {
            TurnSide::Right => left_cm,
            TurnSide::Left => right_cm,
        };
        let base = match (speed, side) {
            (Some(s), _) => s as f64,
            (None, TurnSide::Left) => self.tuning.left_turn() as f64,
            (None, TurnSide::Right) => self.tuning.right_turn() as f64,
        };
        let plans = [
            self.plan(
                Wheel::Left,
                self.geometry.distance_to_ticks(left_cm).abs(),
                base * left_cm / outer_cm.abs(),
            ),
            self.plan(
                Wheel::Right,
                self.geometry.distance_to_ticks(right_cm).abs(),
                base * right_cm / outer_cm.abs(),
            ),
        ];

        info!(
            "turn {:?} {} deg r={} cm: left {:.2} cm @ {}, right {:.2} cm @ {}",
            side, degrees, radius_cm, left_cm, plans[0].speed, right_cm, plans[1].speed
        );
        self.run(plans, wait)
    }

    // === Commands ===

    pub fn execute(&mut self, command: &MotionCommand) -> Result<MotionReport> {
        self.execute_with(command, &WaitPolicy::blocking())
    }

    pub fn execute_with(&mut self, command: &MotionCommand, wait: &WaitPolicy) -> Result<MotionReport> {
        match *command {
            MotionCommand::Forward { distance_cm, speed } => {
                self.drive_distance(Direction::Forward, distance_cm, speed, wait)
            }
            MotionCommand::Backward { distance_cm, speed } => {
                self.drive_distance(Direction::Backward, distance_cm, speed, wait)
            }
            MotionCommand::Left {
                degrees,
                radius_cm,
                speed,
            } => self.turn(TurnSide::Left, degrees, radius_cm, speed, wait),
            MotionCommand::Right {
                degrees,
                radius_cm,
                speed,
            } => self.turn(TurnSide::Right, degrees, radius_cm, speed, wait),
        }
    }

    // === Internals ===

    fn fastest(&self, direction: Direction) -> f64 {
        self.tuning
            .speed(Wheel::Left, direction)
            .max(self.tuning.speed(Wheel::Right, direction)) as f64
    }

    /// Per-wheel command for a signed base speed, with tuning compensation
    fn plan(&self, wheel: Wheel, target: i64, signed_speed: f64) -> WheelPlan {
        let direction = Direction::of(signed_speed);
        let magnitude = self.tuning.scaled(wheel, direction, signed_speed.abs()).round() as i32;
        // A wheel that still has ticks to cover must not be commanded to 0
        let magnitude = if target > 0 { magnitude.max(1) } else { 0 };
        WheelPlan {
            wheel,
            port: self.ports.port(wheel),
            target,
            speed: direction.sign() * magnitude,
        }
    }

    fn run(&mut self, plans: [WheelPlan; 2], wait: &WaitPolicy) -> Result<MotionReport> {
        match self.command_and_poll(&plans, wait) {
            Ok(report) => {
                self.drive_freeze()?;
                debug!("motion stopped after {} polls", report.polls);
                Ok(report)
            }
            Err(e) => {
                // Leave nothing spinning, whatever went wrong
                for plan in &plans {
                    if let Err(brake_err) = self.channel.brake(plan.port) {
                        warn!("Failed to brake {:?} wheel: {}", plan.wheel, brake_err);
                    }
                }
                Err(e)
            }
        }
    }

    fn command_and_poll(&mut self, plans: &[WheelPlan; 2], wait: &WaitPolicy) -> Result<MotionReport> {
        // COMMANDED
        self.drive_clear()?;
        for plan in plans {
            if plan.target == 0 {
                self.channel.brake(plan.port)?;
            } else {
                self.channel.set_motor_speed(plan.port, plan.speed)?;
            }
        }

        // POLLING
        let started = Instant::now();
        let mut done = [plans[0].target == 0, plans[1].target == 0];
        let mut ticks = [0i64; 2];
        let mut polls = 0u64;
        while !done.iter().all(|&d| d) {
            if let Some(limit) = wait.check(Instant::now()) {
                let (left_ticks, right_ticks) = (ticks[0], ticks[1]);
                warn!("{:?} at left={} right={} ticks", limit, left_ticks, right_ticks);
                return Err(match limit {
                    WaitLimit::Cancelled => DriveError::Cancelled {
                        left_ticks,
                        right_ticks,
                    },
                    WaitLimit::DeadlinePassed => DriveError::TimedOut {
                        elapsed: started.elapsed(),
                        left_ticks,
                        right_ticks,
                    },
                });
            }

            polls += 1;
            for (i, plan) in plans.iter().enumerate() {
                if done[i] {
                    continue;
                }
                ticks[i] = self.channel.read_position(plan.port)?;
                // Compare magnitudes: hardware may count backward travel either way
                if ticks[i].abs() >= plan.target {
                    self.channel.brake(plan.port)?;
                    done[i] = true;
                    debug!(
                        "{:?} wheel arrived at {} ticks (target {})",
                        plan.wheel, ticks[i], plan.target
                    );
                }
            }

            if !self.poll_interval.is_zero() {
                sleep(self.poll_interval);
            }
        }

        // STOPPED
        Ok(MotionReport {
            left_target: plans[0].target,
            right_target: plans[1].target,
            left_ticks: ticks[0],
            right_ticks: ticks[1],
            polls,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motor::sim::{ChannelCall, SimChannel, WheelState};

    fn config() -> DriveConfig {
        DriveConfig {
            poll_interval_ms: 0,
            ..DriveConfig::default()
        }
    }

    fn drive() -> DiffDrive<SimChannel> {
        let config = config();
        DiffDrive::new(SimChannel::new(config.ports), &config).unwrap()
    }

    const L: u8 = crate::config::MOT_LEFT;
    const R: u8 = crate::config::MOT_RIGHT;

    fn first_speeds(sim: &SimChannel) -> (i32, i32) {
        let mut left = None;
        let mut right = None;
        for call in sim.calls() {
            if let ChannelCall::SetSpeed { port, speed } = *call {
                if port == L && left.is_none() {
                    left = Some(speed);
                }
                if port == R && right.is_none() {
                    right = Some(speed);
                }
            }
        }
        (left.unwrap_or(0), right.unwrap_or(0))
    }

    #[test]
    fn test_zero_distance_touches_nothing() {
        let mut d = drive();
        let report = d.forward(0).unwrap();
        assert!(report.is_noop());
        assert!(d.backward_speed(0, 800).unwrap().is_noop());
        assert!(d.channel().calls().is_empty());
    }

    #[test]
    fn test_forward_uses_tuned_speeds() {
        let mut d = drive();
        let report = d.forward(10).unwrap();
        assert_eq!(first_speeds(d.channel()), (1500, 1450));
        assert_eq!(report.left_target, d.geometry().distance_to_ticks(10.0));
        assert!(report.left_ticks >= report.left_target);
        assert!(report.right_ticks >= report.right_target);
        assert_eq!(d.channel().state(L), WheelState::Braked);
        assert_eq!(d.channel().state(R), WheelState::Braked);
    }

    #[test]
    fn test_backward_uses_backward_tuning() {
        let mut d = drive();
        let report = d.backward(10).unwrap();
        assert_eq!(first_speeds(d.channel()), (-1500, -1410));
        // Simulated encoders count down when reversing
        assert!(report.left_ticks <= -report.left_target);
        assert!(report.right_ticks <= -report.right_target);
    }

    #[test]
    fn test_speed_override_keeps_ratio() {
        let mut d = drive();
        d.forward_speed(5, 750).unwrap();
        assert_eq!(first_speeds(d.channel()), (750, 725));
    }

    #[test]
    fn test_first_wheel_braked_before_second_arrives() {
        let mut d = drive();
        d.forward(20).unwrap();
        let calls = d.channel().calls();
        let left_brake = calls
            .iter()
            .position(|c| *c == ChannelCall::Brake { port: L })
            .unwrap();
        // Right wheel is slower, so it is still being read after the left stops
        let right_reads_after = calls[left_brake..]
            .iter()
            .filter(|c| **c == ChannelCall::Read { port: R })
            .count();
        assert!(right_reads_after > 0);
        let left_reads_after = calls[left_brake..]
            .iter()
            .filter(|c| **c == ChannelCall::Read { port: L })
            .count();
        assert_eq!(left_reads_after, 0);
    }

    #[test]
    fn test_invalid_input_rejected_before_hardware() {
        let mut d = drive();
        assert!(d.forward(-5).unwrap_err().is_invalid_argument());
        assert!(d.backward(-1).unwrap_err().is_invalid_argument());
        assert!(d.forward_speed(10, 0).unwrap_err().is_invalid_argument());
        assert!(d.forward_speed(10, 1501).unwrap_err().is_invalid_argument());
        assert!(d.left(90, -2.0).unwrap_err().is_invalid_argument());
        assert!(d.right(90, -0.5).unwrap_err().is_invalid_argument());
        assert!(d.right_speed(90, 5.0, -100).unwrap_err().is_invalid_argument());
        assert!(d.left_turn(2000, 45.0).unwrap_err().is_invalid_argument());
        assert!(d.drive(1600, 0).unwrap_err().is_invalid_argument());
        assert!(d.drive(i32::MIN, 0).unwrap_err().is_invalid_argument());
        assert!(d.drive(0, i32::MIN).unwrap_err().is_invalid_argument());
        assert!(d.drive(-1501, 1500).unwrap_err().is_invalid_argument());
        assert!(d.channel().calls().is_empty());
    }

    #[test]
    fn test_pivot_right_counter_rotates() {
        let mut d = drive();
        let report = d.right(90, 0.0).unwrap();
        let (left, right) = first_speeds(d.channel());
        assert!(left > 0 && right < 0);

        let expected = d.geometry().distance_to_ticks(90.0 / 360.0 * 2.0 * std::f64::consts::PI * 9.5);
        assert_eq!(report.left_target, expected);
        assert_eq!(report.right_target, expected);
        assert!(report.left_ticks >= expected);
        assert!(report.right_ticks <= -expected);
    }

    #[test]
    fn test_negative_degrees_swap_directions() {
        let mut d = drive();
        d.right(-90, 0.0).unwrap();
        let (left, right) = first_speeds(d.channel());
        assert!(left < 0 && right > 0);
    }

    #[test]
    fn test_left_turn_is_mirror_of_right() {
        let mut right = drive();
        let r = right.right(45, 20.0).unwrap();
        let mut left = drive();
        let l = left.left(45, 20.0).unwrap();
        assert_eq!(r.left_target, l.right_target);
        assert_eq!(r.right_target, l.left_target);
    }

    #[test]
    fn test_inner_wheel_stationary_at_half_track() {
        let mut d = drive();
        let report = d.left(90, 9.5).unwrap();
        assert_eq!(report.left_target, 0);
        assert!(report.right_target > 0);
        // Inner (left) wheel is braked, never driven
        assert!(!d
            .channel()
            .calls()
            .iter()
            .any(|c| matches!(c, ChannelCall::SetSpeed { port, .. } if *port == L)));
    }

    #[test]
    fn test_wide_turn_inner_wheel_slower_same_direction() {
        let mut d = drive();
        d.right_speed(90, 30.0, 1000).unwrap();
        let (left, right) = first_speeds(d.channel());
        assert!(left > right && right > 0, "left={} right={}", left, right);
    }

    #[test]
    fn test_tight_turn_inner_wheel_reverses() {
        let mut d = drive();
        d.left(90, 3.0).unwrap();
        let (left, right) = first_speeds(d.channel());
        assert!(left < 0 && right > 0, "left={} right={}", left, right);
    }

    #[test]
    fn test_zero_degrees_touches_nothing() {
        let mut d = drive();
        assert!(d.left(0, 10.0).unwrap().is_noop());
        assert!(d.right_turn(500, 0.0).unwrap().is_noop());
        assert!(d.channel().calls().is_empty());
    }

    #[test]
    fn test_stalled_wheel_times_out_and_brakes() {
        let mut d = drive();
        d.channel_mut().stall(R);
        let wait = WaitPolicy::blocking().with_timeout(Duration::from_millis(20));
        let err = d
            .drive_distance(Direction::Forward, 10.0, None, &wait)
            .unwrap_err();
        match err {
            DriveError::TimedOut { right_ticks, .. } => assert_eq!(right_ticks, 0),
            other => panic!("expected TimedOut, got {:?}", other),
        }
        assert_eq!(d.channel().state(L), WheelState::Braked);
        assert_eq!(d.channel().state(R), WheelState::Braked);
    }

    #[test]
    fn test_cancelled_motion_brakes() {
        let mut d = drive();
        let token = CancelToken::new();
        token.cancel();
        let wait = WaitPolicy::blocking().with_cancel(token);
        let err = d.turn(TurnSide::Left, 90.0, 0.0, None, &wait).unwrap_err();
        assert!(matches!(err, DriveError::Cancelled { .. }));
        assert_eq!(d.channel().state(L), WheelState::Braked);
        assert_eq!(d.channel().state(R), WheelState::Braked);
    }

    #[test]
    fn test_hardware_fault_surfaces() {
        let mut d = drive();
        d.channel_mut().fail(L, "encoder unplugged");
        let err = d.forward(10).unwrap_err();
        assert!(matches!(err, DriveError::HardwareUnavailable { port, .. } if port == L));
    }

    #[test]
    fn test_primitives() {
        let mut d = drive();
        d.drive(300, -300).unwrap();
        assert_eq!(d.channel().speed(L), 300);
        assert_eq!(d.channel().speed(R), -300);

        d.drive_off().unwrap();
        assert_eq!(d.channel().state(L), WheelState::Coasting);
        assert_eq!(d.channel().state(R), WheelState::Coasting);

        d.drive(100, 100).unwrap();
        d.drive_freeze().unwrap();
        assert_eq!(d.channel().state(L), WheelState::Braked);

        d.drive_clear().unwrap();
        assert!(d.channel().calls().ends_with(&[
            ChannelCall::Clear { port: L },
            ChannelCall::Clear { port: R },
        ]));
    }

    #[test]
    fn test_drive_accepts_full_range() {
        let mut d = drive();
        d.drive(-1500, 1500).unwrap();
        assert_eq!(d.channel().speed(L), -1500);
        assert_eq!(d.channel().speed(R), 1500);
    }

    #[test]
    fn test_motion_touches_motors_only_through_plan() {
        let mut d = drive();
        d.drive(200, 200).unwrap();
        d.channel_mut().clear_calls();

        d.forward(2).unwrap();
        let commands = d.channel().motor_commands();
        assert_eq!(
            &commands[..2],
            &[
                ChannelCall::SetSpeed { port: L, speed: 1500 },
                ChannelCall::SetSpeed { port: R, speed: 1450 },
            ]
        );
        // Each wheel brakes on arrival, then both are frozen
        assert!(commands[2..].iter().all(|c| matches!(c, ChannelCall::Brake { .. })));
        assert_eq!(commands.len(), 6);

        let sim = d.into_channel();
        assert!(sim.odometer(L) >= 173.0);
        assert_eq!(sim.state(R), WheelState::Braked);
    }

    #[test]
    fn test_execute_dispatches() {
        let mut d = drive();
        let report = d
            .execute(&MotionCommand::Forward {
                distance_cm: 3.0,
                speed: None,
            })
            .unwrap();
        assert_eq!(report.left_target, d.geometry().distance_to_ticks(3.0));

        let report = d
            .execute(&MotionCommand::Left {
                degrees: 30.0,
                radius_cm: 0.0,
                speed: Some(600),
            })
            .unwrap();
        assert_eq!(report.left_target, report.right_target);
    }
}
