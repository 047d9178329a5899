// Feetech STS-series serial protocol
//
// Used as the real-hardware drive channel: velocity mode for the wheel
// commands, present position for encoder feedback.
//
// Protocol is similar to Dynamixel Protocol 1.0:
// Packet format: [0xFF, 0xFF, ID, Length, Instruction, Params..., Checksum]

use serialport::{self, SerialPort};
use std::io::{Read, Write};
use std::time::Duration;
use tracing::debug;

/// Default serial configuration for Feetech motors
pub const DEFAULT_BAUDRATE: u32 = 1_000_000;
pub const DEFAULT_TIMEOUT_MS: u64 = 100;

/// Present position is a 12-bit single-turn counter
pub const POSITION_RESOLUTION: i64 = 4096;

/// Packet header bytes
const HEADER: [u8; 2] = [0xFF, 0xFF];

/// Instructions used by the drive
#[repr(u8)]
#[derive(Debug, Clone, Copy)]
pub enum Instruction {
    Ping = 0x01,
    Read = 0x02,
    Write = 0x03,
}

/// RAM registers used by the drive
#[repr(u8)]
#[derive(Debug, Clone, Copy)]
pub enum Register {
    OperatingMode = 33,   // 1 byte: 0=position, 1=velocity, 2=PWM, 3=step
    TorqueEnable = 40,    // 1 byte: 0=off, 1=on
    GoalVelocity = 46,    // 2 bytes, sign-magnitude
    Lock = 55,            // 1 byte: 0=unlocked, 1=locked
    PresentPosition = 56, // 2 bytes, read-only
    PresentVelocity = 58, // 2 bytes, read-only, sign-magnitude
}

/// Operating modes
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OperatingMode {
    Position = 0,
    Velocity = 1,
    Pwm = 2,
    Step = 3,
}

/// Error types for Feetech communication
#[derive(Debug, thiserror::Error)]
pub enum FeetechError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid response from motor {id}: {reason}")]
    InvalidResponse { id: u8, reason: String },

    #[error("Checksum mismatch for motor {id}")]
    ChecksumMismatch { id: u8 },

    #[error("Motor {id} returned error status: 0x{status:02X}")]
    MotorError { id: u8, status: u8 },

    #[error("Timeout waiting for response from motor {id}")]
    Timeout { id: u8 },
}

pub type Result<T> = std::result::Result<T, FeetechError>;

/// Inverted byte sum, over everything after the header
fn checksum(data: &[u8]) -> u8 {
    let sum: u32 = data.iter().map(|&b| b as u32).sum();
    !(sum as u8)
}

fn build_packet(id: u8, instruction: Instruction, params: &[u8]) -> Vec<u8> {
    let mut packet = Vec::with_capacity(6 + params.len());
    packet.extend_from_slice(&HEADER);
    // Length counts instruction + params + checksum
    packet.extend_from_slice(&[id, (params.len() + 2) as u8, instruction as u8]);
    packet.extend_from_slice(params);
    packet.push(checksum(&packet[2..]));
    packet
}

/// Validate a status frame body (`[id, length, error, params.., checksum]`)
/// and return its params
fn parse_status(expected_id: u8, frame: &[u8]) -> Result<Vec<u8>> {
    let invalid = |reason: String| FeetechError::InvalidResponse {
        id: expected_id,
        reason,
    };
    if frame.len() < 4 {
        return Err(invalid(format!("Short frame: {} bytes", frame.len())));
    }
    let (id, length) = (frame[0], frame[1] as usize);
    if id != expected_id {
        return Err(invalid(format!("ID mismatch: expected {}, got {}", expected_id, id)));
    }
    if frame.len() != length + 2 {
        return Err(invalid(format!("Length {} does not match frame", length)));
    }

    let (body, received) = frame.split_at(frame.len() - 1);
    if checksum(body) != received[0] {
        return Err(FeetechError::ChecksumMismatch { id });
    }
    if body[2] != 0 {
        return Err(FeetechError::MotorError { id, status: body[2] });
    }
    Ok(body[3..].to_vec())
}

/// Feetech motor bus - handles serial communication with motors
pub struct FeetechBus {
    port: Box<dyn SerialPort>,
}

impl FeetechBus {
    /// Open a new connection to the motor bus
    pub fn open(port_name: &str) -> Result<Self> {
        Self::open_with_baudrate(port_name, DEFAULT_BAUDRATE)
    }

    /// Open with custom baudrate
    pub fn open_with_baudrate(port_name: &str, baudrate: u32) -> Result<Self> {
        let port = serialport::new(port_name, baudrate)
            .timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS))
            .open()?;

        Ok(Self { port })
    }

    /// Send one instruction and wait for its status frame
    fn transact(&mut self, id: u8, instruction: Instruction, params: &[u8]) -> Result<Vec<u8>> {
        let packet = build_packet(id, instruction, params);
        self.port.write_all(&packet)?;
        self.port.flush()?;

        let mut header = [0u8; 4];
        self.port.read_exact(&mut header).map_err(|e| {
            if e.kind() == std::io::ErrorKind::TimedOut {
                FeetechError::Timeout { id }
            } else {
                FeetechError::Io(e)
            }
        })?;
        if header[..2] != HEADER {
            return Err(FeetechError::InvalidResponse {
                id,
                reason: format!("Invalid header: {:02X?}", &header[..2]),
            });
        }

        let mut frame = vec![header[2], header[3]];
        frame.resize(2 + header[3] as usize, 0);
        self.port.read_exact(&mut frame[2..])?;
        parse_status(id, &frame)
    }

    /// Ping a motor to check if it's connected
    pub fn ping(&mut self, id: u8) -> Result<bool> {
        match self.transact(id, Instruction::Ping, &[]) {
            Ok(_) => Ok(true),
            Err(FeetechError::Timeout { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn write_register(&mut self, id: u8, register: Register, data: &[u8]) -> Result<()> {
        debug!("Write motor {}: reg={:?}, data={:02X?}", id, register, data);
        let mut params = Vec::with_capacity(1 + data.len());
        params.push(register as u8);
        params.extend_from_slice(data);
        self.transact(id, Instruction::Write, &params)?;
        Ok(())
    }

    fn read_register<const N: usize>(&mut self, id: u8, register: Register) -> Result<[u8; N]> {
        let response = self.transact(id, Instruction::Read, &[register as u8, N as u8])?;
        response
            .get(..N)
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or_else(|| FeetechError::InvalidResponse {
                id,
                reason: format!("Expected {} bytes, got {}", N, response.len()),
            })
    }

    pub fn write_u8(&mut self, id: u8, register: Register, value: u8) -> Result<()> {
        self.write_register(id, register, &[value])
    }

    pub fn read_u8(&mut self, id: u8, register: Register) -> Result<u8> {
        let [value] = self.read_register::<1>(id, register)?;
        Ok(value)
    }

    /// Read two bytes (little-endian) from a register
    pub fn read_u16(&mut self, id: u8, register: Register) -> Result<u16> {
        Ok(u16::from_le_bytes(self.read_register::<2>(id, register)?))
    }

    // === High-level convenience methods ===

    /// Enable torque on a motor
    pub fn enable_torque(&mut self, id: u8) -> Result<()> {
        self.write_u8(id, Register::TorqueEnable, 1)?;
        self.write_u8(id, Register::Lock, 1)
    }

    /// Disable torque on a motor, the wheel turns freely
    pub fn disable_torque(&mut self, id: u8) -> Result<()> {
        self.write_u8(id, Register::TorqueEnable, 0)?;
        self.write_u8(id, Register::Lock, 0)
    }

    /// Set operating mode (must disable torque first)
    pub fn set_operating_mode(&mut self, id: u8, mode: OperatingMode) -> Result<()> {
        self.write_u8(id, Register::OperatingMode, mode as u8)
    }

    /// Set goal velocity for a motor (must be in velocity mode)
    pub fn set_velocity(&mut self, id: u8, velocity: i16) -> Result<()> {
        let raw = encode_sign_magnitude(velocity);
        self.write_register(id, Register::GoalVelocity, &raw.to_le_bytes())
    }

    /// Read present velocity from a motor
    pub fn get_velocity(&mut self, id: u8) -> Result<i16> {
        let raw = self.read_u16(id, Register::PresentVelocity)?;
        Ok(decode_sign_magnitude(raw))
    }

    /// Read the single-turn shaft position, 0..4096
    pub fn get_position(&mut self, id: u8) -> Result<u16> {
        let raw = self.read_u16(id, Register::PresentPosition)?;
        Ok(raw & 0x0FFF)
    }
}

/// Shortest signed step between two single-turn readings
pub fn position_delta(previous: u16, current: u16) -> i64 {
    let half = POSITION_RESOLUTION / 2;
    let diff = current as i64 - previous as i64;
    (diff + half).rem_euclid(POSITION_RESOLUTION) - half
}

/// Bit 15 = sign (1 = negative), bits 0-14 = magnitude
fn encode_sign_magnitude(value: i16) -> u16 {
    let magnitude = value.unsigned_abs().min(0x7FFF);
    if value < 0 { 0x8000 | magnitude } else { magnitude }
}

fn decode_sign_magnitude(raw: u16) -> i16 {
    let magnitude = (raw & 0x7FFF) as i16;
    if raw & 0x8000 != 0 { -magnitude } else { magnitude }
}
