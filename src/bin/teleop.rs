// Keyboard teleop: WASD move, space stop, R/F speed, T/Y auto start/stop, G distance, H health, Q quit
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use std::time::Duration;
use tracing::{info, warn};

use autocar_runtime::config::KEY_CONTROL;
use autocar_runtime::messages::{AutoAction, Command, SpeedAction};
use autocar_runtime::motor::Direction;

// Each key press moves this long; holding the key keeps renewing it
const MOVE_SECS: f32 = 0.3;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    info!("Controls: WASD=move, space=stop, R/F=speed, T/Y=auto start/stop, G=distance, H=health, Q=quit");

    enable_raw_mode()?;
    let result = run_teleop(&session).await;
    disable_raw_mode()?;

    // Never leave the car moving on exit
    send(&session, &Command::Stop).await?;
    result
}

async fn run_teleop(session: &zenoh::Session) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    loop {
        if !event::poll(Duration::from_millis(20))? {
            continue;
        }
        let Event::Key(KeyEvent { code, kind, .. }) = event::read()? else {
            continue;
        };
        if kind != KeyEventKind::Press && kind != KeyEventKind::Repeat {
            continue;
        }

        if matches!(code, KeyCode::Char('q') | KeyCode::Esc) {
            break;
        }
        let Some(cmd) = key_command(code) else {
            continue;
        };
        send(session, &cmd).await?;
    }

    Ok(())
}

/// Each key maps to one fixed command; no client-side mode is tracked
fn key_command(code: KeyCode) -> Option<Command> {
    let cmd = match code {
        KeyCode::Char('w') => move_cmd(Direction::Forward),
        KeyCode::Char('s') => move_cmd(Direction::Backward),
        KeyCode::Char('a') => move_cmd(Direction::Left),
        KeyCode::Char('d') => move_cmd(Direction::Right),
        KeyCode::Char(' ') => Command::Stop,
        KeyCode::Char('r') => Command::Speed {
            action: SpeedAction::Increase,
        },
        KeyCode::Char('f') => Command::Speed {
            action: SpeedAction::Decrease,
        },
        // Separate keys: the engine may leave auto mode on its own
        KeyCode::Char('t') => Command::Auto {
            action: AutoAction::Start,
        },
        KeyCode::Char('y') => Command::Auto {
            action: AutoAction::Stop,
        },
        KeyCode::Char('g') => Command::Distance,
        KeyCode::Char('h') => Command::Health,
        _ => return None,
    };
    Some(cmd)
}

fn move_cmd(direction: Direction) -> Command {
    Command::Move {
        direction,
        duration: Some(MOVE_SECS),
    }
}

async fn send(session: &zenoh::Session, cmd: &Command) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let payload = serde_json::to_string(cmd)?;
    let replies = session.get(KEY_CONTROL).payload(payload).await?;

    while let Ok(reply) = replies.recv_async().await {
        match reply.result() {
            Ok(sample) => {
                let text = String::from_utf8_lossy(&sample.payload().to_bytes()).into_owned();
                print!("{}\r\n", text);
            }
            Err(err) => {
                let text = String::from_utf8_lossy(&err.payload().to_bytes()).into_owned();
                warn!("Error reply: {}", text);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_keys_are_not_toggles() {
        let start = Some(Command::Auto {
            action: AutoAction::Start,
        });
        let stop = Some(Command::Auto {
            action: AutoAction::Stop,
        });
        // Pressing the same key twice sends the same request both times
        assert_eq!(key_command(KeyCode::Char('t')), start);
        assert_eq!(key_command(KeyCode::Char('t')), start);
        assert_eq!(key_command(KeyCode::Char('y')), stop);
        assert_eq!(key_command(KeyCode::Char('y')), stop);
    }

    #[test]
    fn test_unmapped_keys_send_nothing() {
        assert_eq!(key_command(KeyCode::Char('z')), None);
        assert_eq!(key_command(KeyCode::Char('q')), None);
        assert_eq!(key_command(KeyCode::Char(' ')), Some(Command::Stop));
    }
}
