// Feetech STS3215 serial bus, the subset needed to spin two wheels
//
// Packet format: [0xFF, 0xFF, ID, Length, Instruction, Params..., Checksum]
// Status format: [0xFF, 0xFF, ID, Length, Error, Params..., Checksum]

use serialport::SerialPort;
use std::io::{Read, Write};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BAUDRATE: u32 = 1_000_000;

/// Bounded per-transfer latency on the wheel bus
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(20);

const HEADER: [u8; 2] = [0xFF, 0xFF];
const BROADCAST_ID: u8 = 0xFE;

#[repr(u8)]
#[derive(Debug, Clone, Copy)]
pub enum Instruction {
    Ping = 0x01,
    Write = 0x03,
    SyncWrite = 0x83,
}

/// RAM registers used for velocity control
#[repr(u8)]
#[derive(Debug, Clone, Copy)]
pub enum Register {
    OperatingMode = 33,
    TorqueEnable = 40,
    GoalVelocity = 46,
    Lock = 55,
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OperatingMode {
    Position = 0,
    Velocity = 1,
}

#[derive(Debug, thiserror::Error)]
pub enum FeetechError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid status from motor {id}: {reason}")]
    InvalidStatus { id: u8, reason: String },

    #[error("Checksum mismatch for motor {id}")]
    ChecksumMismatch { id: u8 },

    #[error("Motor {id} returned error status: 0x{status:02X}")]
    MotorError { id: u8, status: u8 },

    #[error("Timeout waiting for response from motor {id}")]
    Timeout { id: u8 },
}

pub type Result<T> = std::result::Result<T, FeetechError>;

fn checksum(body: &[u8]) -> u8 {
    let sum = body.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
    !sum
}

/// Encode an instruction packet
pub fn encode_packet(id: u8, instruction: Instruction, params: &[u8]) -> Vec<u8> {
    let mut packet = Vec::with_capacity(6 + params.len());
    packet.extend_from_slice(&HEADER);
    packet.push(id);
    packet.push((params.len() + 2) as u8);
    packet.push(instruction as u8);
    packet.extend_from_slice(params);
    packet.push(checksum(&packet[2..]));
    packet
}

/// Validate a status body (everything after the header) and return its params
pub fn decode_status(expected_id: u8, body: &[u8]) -> Result<Vec<u8>> {
    let invalid = |reason: String| FeetechError::InvalidStatus {
        id: expected_id,
        reason,
    };

    let [id, length, rest @ ..] = body else {
        return Err(invalid(format!("short status: {} bytes", body.len())));
    };
    if *id != expected_id {
        return Err(invalid(format!("ID mismatch: got {}", id)));
    }
    let length = usize::from(*length);
    if length < 2 || rest.len() != length {
        return Err(invalid(format!("length {} with {} bytes", length, rest.len())));
    }

    let (payload, received) = rest.split_at(length - 1);
    if checksum(&body[..body.len() - 1]) != received[0] {
        return Err(FeetechError::ChecksumMismatch { id: *id });
    }
    if payload[0] != 0 {
        return Err(FeetechError::MotorError {
            id: *id,
            status: payload[0],
        });
    }
    Ok(payload[1..].to_vec())
}

/// Bit 15 = sign (1 = negative), bits 0-14 = magnitude
pub fn encode_sign_magnitude(value: i16) -> u16 {
    let magnitude = value.unsigned_abs() & 0x7FFF;
    if value < 0 { 0x8000 | magnitude } else { magnitude }
}

pub struct FeetechBus {
    port: Box<dyn SerialPort>,
}

impl FeetechBus {
    pub fn open(port_name: &str) -> Result<Self> {
        let port = serialport::new(port_name, DEFAULT_BAUDRATE)
            .timeout(DEFAULT_TIMEOUT)
            .open()?;
        Ok(Self { port })
    }

    fn send(&mut self, packet: &[u8]) -> Result<()> {
        self.port.write_all(packet)?;
        self.port.flush()?;
        Ok(())
    }

    fn read_status(&mut self, id: u8) -> Result<Vec<u8>> {
        let timeout = |e: std::io::Error| {
            if e.kind() == std::io::ErrorKind::TimedOut {
                FeetechError::Timeout { id }
            } else {
                FeetechError::Io(e)
            }
        };

        let mut head = [0u8; 4];
        self.port.read_exact(&mut head).map_err(timeout)?;
        if head[..2] != HEADER {
            return Err(FeetechError::InvalidStatus {
                id,
                reason: format!("bad header {:02X?}", &head[..2]),
            });
        }

        let mut body = vec![head[2], head[3]];
        body.resize(2 + usize::from(head[3]), 0);
        self.port.read_exact(&mut body[2..]).map_err(timeout)?;
        decode_status(id, &body)
    }

    /// Returns false when the motor does not answer within the bus timeout
    pub fn ping(&mut self, id: u8) -> Result<bool> {
        self.send(&encode_packet(id, Instruction::Ping, &[]))?;
        match self.read_status(id) {
            Ok(_) => Ok(true),
            Err(FeetechError::Timeout { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn write_u8(&mut self, id: u8, register: Register, value: u8) -> Result<()> {
        debug!("Write u8 to motor {}: reg={:?}, value={}", id, register, value);
        self.send(&encode_packet(id, Instruction::Write, &[register as u8, value]))?;
        self.read_status(id).map(|_| ())
    }

    /// Broadcast signed 16-bit values to several motors; no status is returned
    pub fn sync_write_i16(&mut self, register: Register, data: &[(u8, i16)]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        let mut params = vec![register as u8, 2];
        for &(id, value) in data {
            params.push(id);
            params.extend_from_slice(&encode_sign_magnitude(value).to_le_bytes());
        }
        debug!("Sync write to {} motors: reg={:?}", data.len(), register);
        self.send(&encode_packet(BROADCAST_ID, Instruction::SyncWrite, &params))
    }

    pub fn set_torque(&mut self, id: u8, enabled: bool) -> Result<()> {
        self.write_u8(id, Register::TorqueEnable, u8::from(enabled))?;
        self.write_u8(id, Register::Lock, u8::from(enabled))
    }

    /// Torque must be off while the mode changes
    pub fn set_operating_mode(&mut self, id: u8, mode: OperatingMode) -> Result<()> {
        self.write_u8(id, Register::OperatingMode, mode as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum() {
        // ~(1+4+3+30+0+2) = ~40 = 215
        assert_eq!(checksum(&[1u8, 4, 0x03, 30, 0, 2]), 215);
    }

    #[test]
    fn test_sign_magnitude_encoding() {
        assert_eq!(encode_sign_magnitude(0), 0);
        assert_eq!(encode_sign_magnitude(900), 900);
        assert_eq!(encode_sign_magnitude(-100), 0x8064);
        assert_eq!(encode_sign_magnitude(-1), 0x8001);
    }

    #[test]
    fn test_ping_packet_layout() {
        let packet = encode_packet(1, Instruction::Ping, &[]);
        assert_eq!(packet, vec![0xFF, 0xFF, 1, 2, 0x01, !4u8]);
    }

    #[test]
    fn test_decode_ok_status() {
        // id=2, len=2, error=0, checksum=~(2+2+0)
        let body = [2u8, 2, 0, !4u8];
        assert_eq!(decode_status(2, &body).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_decode_rejects_bad_status() {
        assert!(matches!(
            decode_status(2, &[3u8, 2, 0, !5u8]),
            Err(FeetechError::InvalidStatus { id: 2, .. })
        ));
        assert!(matches!(
            decode_status(2, &[2u8, 2, 0, 0]),
            Err(FeetechError::ChecksumMismatch { id: 2 })
        ));
        assert!(matches!(
            decode_status(2, &[2u8, 2, 0x20, !0x24u8]),
            Err(FeetechError::MotorError { id: 2, status: 0x20 })
        ));
        assert!(decode_status(2, &[2u8]).is_err());
    }
}
