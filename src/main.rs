use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use autocar_runtime::config::{EngineConfig, MOTOR_ENABLED, MOTOR_PORT, SENSOR_PORT};
use autocar_runtime::runtime::{self, RuntimeOptions};

/// Motion-control runtime for the differential-drive car
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Serial port of the wheel servo bus
    #[arg(long, default_value = MOTOR_PORT)]
    motor_port: String,

    /// Serial port of the ultrasonic range sensor
    #[arg(long, default_value = SENSOR_PORT)]
    sensor_port: String,

    /// Run without hardware (simulated wheels and sensor)
    #[arg(long)]
    sim: bool,

    /// Autonomous mode stops below this distance
    #[arg(long)]
    clearance_cm: Option<f32>,

    /// Autonomous polling interval in milliseconds
    #[arg(long)]
    poll_ms: Option<u64>,

    /// Ceiling for a single manual move, in seconds
    #[arg(long)]
    max_move_secs: Option<f32>,
}

impl Args {
    fn into_options(self) -> Result<RuntimeOptions, String> {
        let mut engine = EngineConfig::default();
        if let Some(cm) = self.clearance_cm {
            engine.clearance_cm = cm;
        }
        if let Some(ms) = self.poll_ms.filter(|&ms| ms > 0) {
            engine.poll_interval = Duration::from_millis(ms);
        }
        if let Some(secs) = self.max_move_secs {
            engine.max_move_duration = Duration::try_from_secs_f32(secs)
                .map_err(|e| format!("invalid --max-move-secs {}: {}", secs, e))?;
        }

        Ok(RuntimeOptions {
            motor_port: self.motor_port,
            sensor_port: self.sensor_port,
            hardware: MOTOR_ENABLED && !self.sim,
            engine,
        })
    }
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    let opts = match Args::parse().into_options() {
        Ok(opts) => opts,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(2);
        }
    };

    if let Err(e) = runtime::run(opts).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}
