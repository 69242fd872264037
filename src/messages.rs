// Message types for the command surface

use serde::{Deserialize, Serialize};

use crate::engine::MotionMode;
use crate::motor::Direction;
use crate::speed::SpeedLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedAction {
    Increase,
    Decrease,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoAction {
    Start,
    Stop,
}

/// Command from teleop/voice clients -> runtime
///
/// JSON form: `{"cmd":"move","direction":"left","duration":1.5}`.
/// `duration` is in seconds; when omitted the move runs for the maximum bound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Command {
    Move {
        direction: Direction,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration: Option<f32>,
    },
    Stop,
    Speed {
        action: SpeedAction,
    },
    Distance,
    Auto {
        action: AutoAction,
    },
    Health,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommandError {
    #[error("empty command")]
    Empty,

    #[error("unknown command: {0}")]
    Unknown(String),

    #[error("malformed command: {0}")]
    Malformed(String),

    #[error("invalid duration: {0}s")]
    InvalidDuration(f32),
}

impl Command {
    /// Parse a request payload: a JSON object, or one of the plain text tokens
    /// (`forward_start`, `left_stop`, `speed+`, `auto_start`, ...)
    pub fn parse(payload: &[u8]) -> Result<Self, CommandError> {
        let text = std::str::from_utf8(payload)
            .map_err(|e| CommandError::Malformed(e.to_string()))?
            .trim();

        if text.is_empty() {
            return Err(CommandError::Empty);
        }
        if text.starts_with('{') {
            return serde_json::from_str(text).map_err(|e| CommandError::Malformed(e.to_string()));
        }
        Self::from_token(text)
    }

    fn from_token(token: &str) -> Result<Self, CommandError> {
        let cmd = match token {
            "stop" => Command::Stop,
            "distance" => Command::Distance,
            "health" => Command::Health,
            "speed+" => Command::Speed {
                action: SpeedAction::Increase,
            },
            "speed-" => Command::Speed {
                action: SpeedAction::Decrease,
            },
            "auto_start" => Command::Auto {
                action: AutoAction::Start,
            },
            "auto_stop" => Command::Auto {
                action: AutoAction::Stop,
            },
            other => {
                let (dir, edge) = other
                    .rsplit_once('_')
                    .ok_or_else(|| CommandError::Unknown(other.to_string()))?;
                let direction = Direction::ALL
                    .into_iter()
                    .find(|d| d.as_str() == dir)
                    .ok_or_else(|| CommandError::Unknown(other.to_string()))?;
                match edge {
                    "start" => Command::Move {
                        direction,
                        duration: None,
                    },
                    "stop" => Command::Stop,
                    _ => return Err(CommandError::Unknown(other.to_string())),
                }
            }
        };
        Ok(cmd)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Online,
    Offline,
}

/// Health status published by runtime
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub mode: MotionMode,
    pub speed: SpeedLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Hardware,
    /// A stop arrived after the command and cancelled it
    Superseded,
}

/// Reply from runtime -> caller; every command gets exactly one
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Reply {
    Ack {
        message: String,
    },
    Speed {
        speed: SpeedLevel,
    },
    /// `distance_cm` is null when the reading is unknown
    Distance {
        distance_cm: Option<f32>,
        valid: bool,
    },
    Health(HealthReport),
    Error {
        kind: ErrorKind,
        message: String,
    },
}

impl Reply {
    pub fn ack(message: impl Into<String>) -> Self {
        Reply::Ack {
            message: message.into(),
        }
    }

    pub fn error(kind: ErrorKind, message: impl ToString) -> Self {
        Reply::Error {
            kind,
            message: message.to_string(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_move() {
        let cmd = Command::parse(br#"{"cmd":"move","direction":"left","duration":1.5}"#).unwrap();
        assert_eq!(
            cmd,
            Command::Move {
                direction: Direction::Left,
                duration: Some(1.5)
            }
        );
    }

    #[test]
    fn test_parse_json_rejects_unknown_direction() {
        let err = Command::parse(br#"{"cmd":"move","direction":"up"}"#).unwrap_err();
        assert!(matches!(err, CommandError::Malformed(_)));
    }

    #[test]
    fn test_parse_tokens() {
        assert_eq!(
            Command::parse(b"forward_start\n").unwrap(),
            Command::Move {
                direction: Direction::Forward,
                duration: None
            }
        );
        assert_eq!(Command::parse(b"right_stop").unwrap(), Command::Stop);
        assert_eq!(
            Command::parse(b"speed-").unwrap(),
            Command::Speed {
                action: SpeedAction::Decrease
            }
        );
        assert_eq!(
            Command::parse(b"auto_start").unwrap(),
            Command::Auto {
                action: AutoAction::Start
            }
        );
        assert_eq!(Command::parse(b"distance").unwrap(), Command::Distance);
    }

    #[test]
    fn test_parse_rejects_unknown_tokens() {
        assert_eq!(Command::parse(b"   "), Err(CommandError::Empty));
        assert!(matches!(Command::parse(b"jump"), Err(CommandError::Unknown(_))));
        assert!(matches!(Command::parse(b"up_start"), Err(CommandError::Unknown(_))));
        assert!(matches!(Command::parse(b"forward_go"), Err(CommandError::Unknown(_))));
    }

    #[test]
    fn test_reply_wire_format() {
        let json = serde_json::to_value(Reply::Distance {
            distance_cm: None,
            valid: false,
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"result": "distance", "distance_cm": null, "valid": false})
        );

        let json = serde_json::to_value(Reply::Speed {
            speed: SpeedLevel::from_tenths(4),
        })
        .unwrap();
        assert_eq!(json["result"], "speed");
        assert!((json["speed"].as_f64().unwrap() - 0.4).abs() < 1e-6);
    }
}
