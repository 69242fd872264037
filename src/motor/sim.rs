// Simulated actuator for --sim runs and tests

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

use super::kinematics::{DriveCommand, SideCommand};
use super::{Actuator, ActuatorError};

#[derive(Debug, Default)]
struct Shared {
    history: Vec<DriveCommand>,
    disconnected: bool,
}

/// Handle for inspecting what a `SimActuator` was told to do
#[derive(Debug, Clone, Default)]
pub struct ActuationLog {
    shared: Arc<Mutex<Shared>>,
}

impl ActuationLog {
    pub fn history(&self) -> Vec<DriveCommand> {
        self.shared.lock().history.clone()
    }

    pub fn last(&self) -> Option<DriveCommand> {
        self.shared.lock().history.last().copied()
    }

    pub fn len(&self) -> usize {
        self.shared.lock().history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make the next writes fail as if the driver were unplugged
    pub fn set_disconnected(&self, disconnected: bool) {
        self.shared.lock().disconnected = disconnected;
    }
}

/// Records every accepted command instead of moving wheels
#[derive(Debug, Default)]
pub struct SimActuator {
    log: ActuationLog,
}

impl SimActuator {
    pub fn new() -> (Self, ActuationLog) {
        let log = ActuationLog::default();
        (Self { log: log.clone() }, log)
    }
}

impl Actuator for SimActuator {
    fn actuate(&mut self, left: SideCommand, right: SideCommand) -> Result<(), ActuatorError> {
        let mut shared = self.log.shared.lock();
        if shared.disconnected {
            return Err(ActuatorError::Disconnected);
        }
        let cmd = DriveCommand { left, right };
        if cmd.is_stop() {
            info!("[sim] stop");
        } else {
            info!("[sim] left={:+.1} right={:+.1}", left.signed(), right.signed());
        }
        shared.history.push(cmd);
        Ok(())
    }

    fn ping(&mut self) -> Result<(), ActuatorError> {
        if self.log.shared.lock().disconnected {
            Err(ActuatorError::Disconnected)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speed::SpeedLevel;

    #[test]
    fn test_records_commands_in_order() {
        let (mut sim, log) = SimActuator::new();
        let speed = SpeedLevel::from_tenths(5);
        sim.actuate(SideCommand::forward(speed), SideCommand::reverse(speed)).unwrap();
        sim.actuate(SideCommand::stopped(), SideCommand::stopped()).unwrap();

        assert_eq!(log.len(), 2);
        assert!(!log.history()[0].is_stop());
        assert_eq!(log.last(), Some(DriveCommand::stop()));
    }

    #[test]
    fn test_disconnected_rejects_writes_and_ping() {
        let (mut sim, log) = SimActuator::new();
        log.set_disconnected(true);
        assert!(sim.actuate(SideCommand::stopped(), SideCommand::stopped()).is_err());
        assert!(sim.ping().is_err());
        assert!(log.is_empty());

        log.set_disconnected(false);
        assert!(sim.ping().is_ok());
    }
}
