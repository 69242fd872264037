// Timeouts, topics, motor and sensor configuration
use std::time::Duration;

// Autonomous loop polling interval
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

// Autonomous mode stops below this distance
pub const CLEARANCE_CM: f32 = 20.0;

// Hardware safety ceiling for a single manual move
pub const MAX_MOVE_DURATION: Duration = Duration::from_secs(5);

// Auto-stop is armed this much before the move bound, covering the longest
// time another holder can keep the engine lock (one bus write plus a queued one)
pub const STOP_GUARD: Duration = Duration::from_millis(50);

// Speed register, in tenths (0.3 default, 0.1 step)
pub const DEFAULT_SPEED_TENTHS: u8 = 3;

// Health publish period
pub const HEALTH_PERIOD: Duration = Duration::from_millis(500);

// Zenoh keys
pub const KEY_CONTROL: &str = "autocar/control"; // request/reply command surface
pub const TOPIC_HEALTH: &str = "autocar/state/health"; // health status

// Motor configuration
// Serial port for the Feetech wheel bus
pub const MOTOR_PORT: &str = "/dev/ttyACM0";

// Wheel motor IDs as configured in the servos
pub const MOTOR_ID_LEFT: u8 = 1;
pub const MOTOR_ID_RIGHT: u8 = 2;

// The right wheel is mounted mirrored, so its positive velocity drives backward
pub const INVERT_RIGHT: bool = true;

// Raw goal velocity at SpeedLevel 1.0 (steps/s, STS3215)
pub const MAX_RAW_VELOCITY: i16 = 3000;

// Serial port for the UART ultrasonic sensor
pub const SENSOR_PORT: &str = "/dev/ttyUSB0";

// Upper bound on one sensor measurement
pub const SENSOR_TIMEOUT: Duration = Duration::from_millis(40);

// Enable hardware (set to false for simulation/testing)
pub const MOTOR_ENABLED: bool = true;

/// Engine-facing settings, defaulting to the constants above
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub poll_interval: Duration,
    pub clearance_cm: f32,
    pub max_move_duration: Duration,
    pub stop_guard: Duration,
    pub default_speed_tenths: u8,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval: POLL_INTERVAL,
            clearance_cm: CLEARANCE_CM,
            max_move_duration: MAX_MOVE_DURATION,
            stop_guard: STOP_GUARD,
            default_speed_tenths: DEFAULT_SPEED_TENTHS,
        }
    }
}
