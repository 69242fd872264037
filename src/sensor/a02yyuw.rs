// UART ultrasonic range finder (A02YYUW family)
//
// The module streams 4-byte frames: [0xFF, Data_H, Data_L, SUM], distance in
// millimetres, SUM = low byte of (0xFF + Data_H + Data_L).

use serialport::SerialPort;
use std::io::Read;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::{ObstacleReading, RangeSensor};

pub const DEFAULT_BAUDRATE: u32 = 9600;

const FRAME_HEADER: u8 = 0xFF;

// Per-read timeout; the overall deadline is checked between reads
const READ_SLICE: Duration = Duration::from_millis(5);

#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No echo within {0:?}")]
    NoEcho(Duration),
}

#[derive(Debug, Default)]
struct FrameParser {
    buf: [u8; 4],
    len: usize,
}

impl FrameParser {
    /// Feed one byte; yields millimetres when a frame with a good checksum completes
    fn push(&mut self, byte: u8) -> Option<u16> {
        if self.len == 0 && byte != FRAME_HEADER {
            return None;
        }
        self.buf[self.len] = byte;
        self.len += 1;
        if self.len < self.buf.len() {
            return None;
        }

        self.len = 0;
        let [header, hi, lo, sum] = self.buf;
        if header.wrapping_add(hi).wrapping_add(lo) == sum {
            Some(u16::from_be_bytes([hi, lo]))
        } else {
            debug!("Dropping range frame with bad checksum");
            None
        }
    }
}

pub struct A02yyuw {
    port: Box<dyn SerialPort>,
    parser: FrameParser,
    timeout: Duration,
}

impl A02yyuw {
    pub fn open(port_name: &str, timeout: Duration) -> Result<Self, SensorError> {
        let port = serialport::new(port_name, DEFAULT_BAUDRATE)
            .timeout(READ_SLICE)
            .open()?;
        Ok(Self {
            port,
            parser: FrameParser::default(),
            timeout,
        })
    }

    /// Latest buffered frame, or the first one to arrive before the deadline
    fn read_mm(&mut self) -> Result<u16, SensorError> {
        let deadline = Instant::now() + self.timeout;
        let mut latest = None;
        let mut chunk = [0u8; 64];

        loop {
            let pending = self.port.bytes_to_read()? as usize;
            if (pending == 0 && latest.is_some()) || Instant::now() >= deadline {
                break;
            }

            let want = pending.clamp(1, chunk.len());
            match self.port.read(&mut chunk[..want]) {
                Ok(n) => {
                    for &byte in &chunk[..n] {
                        if let Some(mm) = self.parser.push(byte) {
                            latest = Some(mm);
                        }
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {}
                Err(e) => return Err(e.into()),
            }
        }

        latest.ok_or(SensorError::NoEcho(self.timeout))
    }
}

impl RangeSensor for A02yyuw {
    fn measure(&mut self) -> ObstacleReading {
        match self.read_mm() {
            Ok(mm) => ObstacleReading::at(f32::from(mm) / 10.0),
            Err(e) => {
                warn!("Range sensor reading failed: {}", e);
                ObstacleReading::unknown()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(mm: u16) -> [u8; 4] {
        let [hi, lo] = mm.to_be_bytes();
        [0xFF, hi, lo, 0xFFu8.wrapping_add(hi).wrapping_add(lo)]
    }

    #[test]
    fn test_parses_frame() {
        let mut parser = FrameParser::default();
        let bytes = frame(1200);
        let out: Vec<_> = bytes.iter().filter_map(|&b| parser.push(b)).collect();
        assert_eq!(out, vec![1200]);
    }

    #[test]
    fn test_resyncs_after_garbage() {
        let mut parser = FrameParser::default();
        let mut bytes = vec![0x12, 0x34];
        bytes.extend_from_slice(&frame(150));
        let out: Vec<_> = bytes.iter().filter_map(|&b| parser.push(b)).collect();
        assert_eq!(out, vec![150]);
    }

    #[test]
    fn test_drops_bad_checksum() {
        let mut parser = FrameParser::default();
        let mut bad = frame(800);
        bad[3] ^= 0x01;
        assert!(bad.iter().all(|&b| parser.push(b).is_none()));

        let out: Vec<_> = frame(800).iter().filter_map(|&b| parser.push(b)).collect();
        assert_eq!(out, vec![800]);
    }
}
