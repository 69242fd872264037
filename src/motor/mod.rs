// Motor control for the two-wheel differential base
//
// Provides:
// - Differential kinematics (direction + speed -> per-side commands -> raw wheel velocities)
// - Feetech STS3215 serial protocol subset
// - The `Actuator` seam the engine drives, with hardware and simulated implementations

mod driver;
pub mod feetech;
pub mod kinematics;
mod sim;

pub use driver::FeetechDriver;
pub use feetech::FeetechError;
pub use kinematics::{Direction, DriveCommand, Rotation, SideCommand, WheelLayout, WheelVelocities};
pub use sim::{ActuationLog, SimActuator};

#[derive(Debug, thiserror::Error)]
pub enum ActuatorError {
    #[error("motor bus error: {0}")]
    Bus(#[from] FeetechError),

    #[error("motor driver disconnected")]
    Disconnected,
}

/// Writes per-side commands to the drive hardware.
///
/// Implementations must return within a small bounded latency; the stop path
/// calls `actuate` from the emergency context.
pub trait Actuator: Send {
    fn actuate(&mut self, left: SideCommand, right: SideCommand) -> Result<(), ActuatorError>;

    /// Check hardware connectivity without changing the output
    fn ping(&mut self) -> Result<(), ActuatorError>;

    fn apply(&mut self, cmd: &DriveCommand) -> Result<(), ActuatorError> {
        self.actuate(cmd.left, cmd.right)
    }
}
