// Differential-drive kinematics for the two-wheel base
// Converts a logical direction + speed into per-side wheel commands, and
// per-side commands into raw goal velocities for the wheel servos.

use serde::{Deserialize, Serialize};

use crate::speed::SpeedLevel;

/// Manual motion direction. Left/Right spin in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Forward,
    Backward,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Forward,
        Direction::Backward,
        Direction::Left,
        Direction::Right,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Forward => "forward",
            Direction::Backward => "backward",
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }
}

/// Rotation sense of one wheel side, as seen from the robot frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rotation {
    Forward,
    Reverse,
}

/// Command for one side of the base
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SideCommand {
    pub rotation: Rotation,
    pub speed: SpeedLevel,
}

impl SideCommand {
    pub fn forward(speed: SpeedLevel) -> Self {
        Self {
            rotation: Rotation::Forward,
            speed,
        }
    }

    pub fn reverse(speed: SpeedLevel) -> Self {
        Self {
            rotation: Rotation::Reverse,
            speed,
        }
    }

    pub fn stopped() -> Self {
        Self::forward(SpeedLevel::ZERO)
    }

    pub fn is_stopped(&self) -> bool {
        self.speed.is_zero()
    }

    /// Signed fraction of full speed, positive = forward
    pub fn signed(&self) -> f32 {
        match self.rotation {
            Rotation::Forward => self.speed.as_f32(),
            Rotation::Reverse => -self.speed.as_f32(),
        }
    }
}

/// The pair of side commands written to hardware in one go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DriveCommand {
    pub left: SideCommand,
    pub right: SideCommand,
}

impl DriveCommand {
    pub fn stop() -> Self {
        Self {
            left: SideCommand::stopped(),
            right: SideCommand::stopped(),
        }
    }

    /// Same speed magnitude on both sides; turns run the sides oppositely
    pub fn for_direction(direction: Direction, speed: SpeedLevel) -> Self {
        let (left, right) = match direction {
            Direction::Forward => (SideCommand::forward(speed), SideCommand::forward(speed)),
            Direction::Backward => (SideCommand::reverse(speed), SideCommand::reverse(speed)),
            Direction::Left => (SideCommand::reverse(speed), SideCommand::forward(speed)),
            Direction::Right => (SideCommand::forward(speed), SideCommand::reverse(speed)),
        };
        Self { left, right }
    }

    pub fn is_stop(&self) -> bool {
        self.left.is_stopped() && self.right.is_stopped()
    }
}

/// Raw goal velocities for the two wheel servos
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WheelVelocities {
    pub left: i16,
    pub right: i16,
}

impl WheelVelocities {
    pub fn zero() -> Self {
        Self::default()
    }
}

/// Wheel geometry and limits used to map side commands onto raw velocities
#[derive(Debug, Clone, Copy)]
pub struct WheelLayout {
    pub max_raw: i16,
    pub invert_left: bool,
    pub invert_right: bool,
}

impl WheelLayout {
    pub fn to_raw(&self, cmd: &DriveCommand) -> WheelVelocities {
        WheelVelocities {
            left: side_to_raw(&cmd.left, self.max_raw, self.invert_left),
            right: side_to_raw(&cmd.right, self.max_raw, self.invert_right),
        }
    }
}

fn side_to_raw(side: &SideCommand, max_raw: i16, inverted: bool) -> i16 {
    let max = f32::from(max_raw.max(0));
    let raw = (side.signed() * max).round().clamp(-max, max) as i16;
    if inverted { -raw } else { raw }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LAYOUT: WheelLayout = WheelLayout {
        max_raw: 3000,
        invert_left: false,
        invert_right: true,
    };

    #[test]
    fn test_forward_backward_drive_sides_together() {
        let speed = SpeedLevel::from_tenths(3);
        let fwd = DriveCommand::for_direction(Direction::Forward, speed);
        assert_eq!(fwd.left, fwd.right);
        assert_eq!(fwd.left.rotation, Rotation::Forward);

        let back = DriveCommand::for_direction(Direction::Backward, speed);
        assert_eq!(back.left, back.right);
        assert_eq!(back.left.rotation, Rotation::Reverse);
    }

    #[test]
    fn test_turns_drive_sides_oppositely() {
        let speed = SpeedLevel::from_tenths(5);
        let left = DriveCommand::for_direction(Direction::Left, speed);
        assert_eq!(left.left.signed(), -left.right.signed());
        assert!(left.right.signed() > 0.0);

        let right = DriveCommand::for_direction(Direction::Right, speed);
        assert!(right.left.signed() > 0.0);
        assert!(right.right.signed() < 0.0);
    }

    #[test]
    fn test_zero_speed_motion_is_a_stop() {
        let cmd = DriveCommand::for_direction(Direction::Forward, SpeedLevel::ZERO);
        assert!(cmd.is_stop());
        assert!(DriveCommand::stop().is_stop());
    }

    #[test]
    fn test_raw_mapping_respects_mirrored_wheel() {
        let cmd = DriveCommand::for_direction(Direction::Forward, SpeedLevel::from_tenths(3));
        let raw = LAYOUT.to_raw(&cmd);
        assert_eq!(raw.left, 900);
        assert_eq!(raw.right, -900);
    }

    #[test]
    fn test_raw_mapping_never_exceeds_max() {
        let cmd = DriveCommand::for_direction(Direction::Right, SpeedLevel::FULL);
        let raw = LAYOUT.to_raw(&cmd);
        assert_eq!(raw.left, 3000);
        assert_eq!(raw.right, 3000);
        assert_eq!(LAYOUT.to_raw(&DriveCommand::stop()), WheelVelocities::zero());
    }
}
