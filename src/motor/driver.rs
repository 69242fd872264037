// Wheel driver for the differential base
//
// Two STS3215 servos in velocity mode, one per side. Side commands go out
// as a single sync write so both wheels change together.

use tracing::{debug, info, warn};

use super::feetech::{FeetechBus, FeetechError, OperatingMode, Register};
use super::kinematics::{DriveCommand, SideCommand, WheelLayout, WheelVelocities};
use super::{Actuator, ActuatorError};

pub struct FeetechDriver {
    bus: FeetechBus,
    motor_ids: [u8; 2], // [left, right]
    layout: WheelLayout,
}

impl FeetechDriver {
    /// Open the bus and bring both wheels up in velocity mode
    pub fn open(port: &str, motor_ids: [u8; 2], layout: WheelLayout) -> Result<Self, ActuatorError> {
        info!("Opening motor bus on {}", port);
        let bus = FeetechBus::open(port)?;
        let mut driver = Self {
            bus,
            motor_ids,
            layout,
        };
        driver.initialize()?;
        Ok(driver)
    }

    fn initialize(&mut self) -> Result<(), ActuatorError> {
        info!("Initializing wheels {:?} for velocity control", self.motor_ids);
        self.ping()?;

        for &id in &self.motor_ids {
            self.bus.set_torque(id, false)?;
            self.bus.set_operating_mode(id, OperatingMode::Velocity)?;
            self.bus.set_torque(id, true)?;
        }

        self.write_wheels(WheelVelocities::zero())?;
        info!("Wheels initialized");
        Ok(())
    }

    fn write_wheels(&mut self, wheels: WheelVelocities) -> Result<(), FeetechError> {
        debug!("Setting wheel velocities: left={}, right={}", wheels.left, wheels.right);
        let data = [
            (self.motor_ids[0], wheels.left),
            (self.motor_ids[1], wheels.right),
        ];
        self.bus.sync_write_i16(Register::GoalVelocity, &data)
    }
}

impl Actuator for FeetechDriver {
    fn actuate(&mut self, left: SideCommand, right: SideCommand) -> Result<(), ActuatorError> {
        let wheels = self.layout.to_raw(&DriveCommand { left, right });
        self.write_wheels(wheels)?;
        Ok(())
    }

    fn ping(&mut self) -> Result<(), ActuatorError> {
        for &id in &self.motor_ids {
            if !self.bus.ping(id)? {
                warn!("Motor {} not responding to ping", id);
                return Err(ActuatorError::Disconnected);
            }
        }
        Ok(())
    }
}

impl Drop for FeetechDriver {
    fn drop(&mut self) {
        if let Err(e) = self.write_wheels(WheelVelocities::zero()) {
            warn!("Failed to stop wheels on drop: {}", e);
        }
    }
}
