// Zenoh command gateway
//
// Commands arrive as queries on KEY_CONTROL and each gets one JSON reply.
// Health is published on a fixed period from cached engine status, so the
// publisher never adds traffic to the motor bus.

use std::error::Error;
use std::time::Duration;

use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::config::{
    EngineConfig, HEALTH_PERIOD, INVERT_RIGHT, KEY_CONTROL, MAX_RAW_VELOCITY, MOTOR_ID_LEFT,
    MOTOR_ID_RIGHT, SENSOR_TIMEOUT, TOPIC_HEALTH,
};
use crate::engine::MotionEngine;
use crate::gateway::Gateway;
use crate::motor::{Actuator, FeetechDriver, SimActuator, WheelLayout};
use crate::sensor::{A02yyuw, ObstacleReading, RangeSensor, ScriptedSensor};

pub type BoxError = Box<dyn Error + Send + Sync>;

// What the simulated sensor reports: far enough that autonomous mode drives
const SIM_RANGE_CM: f32 = 150.0;

#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    pub motor_port: String,
    pub sensor_port: String,
    pub hardware: bool,
    pub engine: EngineConfig,
}

/// Open the hardware (or simulated stand-ins) and hand it to a new engine
pub fn build_engine(opts: &RuntimeOptions) -> Result<MotionEngine, BoxError> {
    let (actuator, sensor): (Box<dyn Actuator>, Box<dyn RangeSensor>) = if opts.hardware {
        let layout = WheelLayout {
            max_raw: MAX_RAW_VELOCITY,
            invert_left: false,
            invert_right: INVERT_RIGHT,
        };
        let driver = FeetechDriver::open(&opts.motor_port, [MOTOR_ID_LEFT, MOTOR_ID_RIGHT], layout)?;
        info!("Opening range sensor on {}", opts.sensor_port);
        let sensor = A02yyuw::open(&opts.sensor_port, SENSOR_TIMEOUT)?;
        (Box::new(driver), Box::new(sensor))
    } else {
        warn!("Hardware disabled, running with simulated wheels and sensor");
        let (actuator, _log) = SimActuator::new();
        let sensor = ScriptedSensor::new(ObstacleReading::at(SIM_RANGE_CM));
        (Box::new(actuator), Box::new(sensor))
    };

    Ok(MotionEngine::new(opts.engine.clone(), actuator, sensor))
}

pub async fn run(opts: RuntimeOptions) -> Result<(), BoxError> {
    let engine = build_engine(&opts)?;
    let gateway = Gateway::spawn(engine.clone());

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    info!("Setting up queryable and publishers...");
    let queryable = session.declare_queryable(KEY_CONTROL).await?;
    let pub_health = session.declare_publisher(TOPIC_HEALTH).await?;

    let mut tick = interval(HEALTH_PERIOD);
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    info!("Serving commands on: {}", KEY_CONTROL);
    info!(
        "Publishing health to: {} every {}ms",
        TOPIC_HEALTH,
        HEALTH_PERIOD.as_millis()
    );

    let result = loop {
        tokio::select! {
            query = queryable.recv_async() => {
                let query = match query {
                    Ok(query) => query,
                    Err(e) => break Err(BoxError::from(e.to_string())),
                };
                let payload = query
                    .payload()
                    .map(|p| p.to_bytes().into_owned())
                    .unwrap_or_default();
                // Submitted here, in arrival order; only the reply is sent from a task
                let reply = gateway.submit(&payload);
                tokio::spawn(async move {
                    let reply = reply.await;
                    match serde_json::to_string(&reply) {
                        Ok(json) => {
                            if let Err(e) = query.reply(query.key_expr().clone(), json).await {
                                warn!("Failed to send reply: {}", e);
                            }
                        }
                        Err(e) => warn!("Failed to encode reply: {}", e),
                    }
                });
            }
            _ = tick.tick() => {
                let report = engine.status().await;
                match serde_json::to_string(&report) {
                    Ok(json) => {
                        if let Err(e) = pub_health.put(json).await {
                            warn!("Failed to publish health: {}", e);
                        }
                    }
                    Err(e) => warn!("Failed to encode health: {}", e),
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown requested");
                break Ok(());
            }
        }
    };

    engine.shutdown().await;
    // Give in-flight replies a moment before the session closes
    tokio::time::sleep(Duration::from_millis(50)).await;
    debug!("Runtime exited");
    result
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                warn!("Cannot listen for SIGTERM: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
