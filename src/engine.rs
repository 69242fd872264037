// Motion arbitration engine
//
// Owns the actuator, the range sensor and the authoritative motion mode.
// Manual commands, the manual auto-stop timer and the autonomous loop all
// actuate through one lock; each of them re-checks the mode and the schedule
// epoch inside the critical section that writes to hardware, so a stop can
// never be undone by a decision made before it.
//
// Stops are also counted outside the lock the moment they are issued. A
// command carries the count it saw when it was received (`StopTicket`) and
// refuses to actuate if a stop was issued since.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval, sleep_until};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::messages::{ErrorKind, HealthReport, HealthStatus, SpeedAction};
use crate::motor::{Actuator, ActuatorError, Direction, DriveCommand};
use crate::sensor::{ObstacleReading, RangeSensor};
use crate::speed::{SpeedLevel, SpeedRegister};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotionMode {
    Idle,
    Manual,
    Autonomous,
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("move duration {requested:?} must be positive and at most {max:?}")]
    InvalidDuration { requested: Duration, max: Duration },

    #[error("hardware unreachable: {0}")]
    Hardware(#[from] ActuatorError),

    #[error("superseded by a later stop")]
    Superseded,
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::InvalidDuration { .. } => ErrorKind::Validation,
            EngineError::Hardware(_) => ErrorKind::Hardware,
            EngineError::Superseded => ErrorKind::Superseded,
        }
    }
}

/// Number of stops issued when a command was received
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopTicket(u64);

struct State {
    mode: MotionMode,
    // Bumped whenever a scheduled task is cancelled; a task only acts while
    // the epoch it was spawned with is still current.
    epoch: u64,
    task: Option<JoinHandle<()>>,
    // Last output the actuator accepted, None after a failed write
    output: Option<DriveCommand>,
    actuator: Box<dyn Actuator>,
}

impl State {
    fn cancel_task(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

struct Inner {
    config: EngineConfig,
    speed: SpeedRegister,
    state: Mutex<State>,
    sensor: parking_lot::Mutex<Box<dyn RangeSensor>>,
    hardware_online: AtomicBool,
    stops: AtomicU64,
}

impl Inner {
    fn check_ticket(&self, ticket: StopTicket) -> Result<(), EngineError> {
        if self.stops.load(Ordering::Acquire) == ticket.0 {
            Ok(())
        } else {
            Err(EngineError::Superseded)
        }
    }

    fn write(&self, state: &mut State, cmd: DriveCommand) -> Result<(), ActuatorError> {
        debug!("Actuate: {:?}", cmd);
        match state.actuator.apply(&cmd) {
            Ok(()) => {
                state.output = Some(cmd);
                self.hardware_online.store(true, Ordering::Release);
                Ok(())
            }
            Err(e) => {
                state.output = None;
                self.hardware_online.store(false, Ordering::Release);
                Err(e)
            }
        }
    }

    /// Cancel pending work, zero both sides, then flip to Idle.
    /// The mode ends Idle even when the stop write fails.
    fn force_idle(&self, state: &mut State) -> Result<(), ActuatorError> {
        state.cancel_task();
        let result = self.write(state, DriveCommand::stop());
        if state.mode != MotionMode::Idle {
            info!("Mode {:?} -> Idle", state.mode);
        }
        state.mode = MotionMode::Idle;
        if let Err(e) = &result {
            warn!("Stop actuation failed: {}", e);
        }
        result
    }

    fn measure(&self) -> ObstacleReading {
        self.sensor.lock().measure()
    }
}

/// Cheaply cloneable handle to the engine
#[derive(Clone)]
pub struct MotionEngine {
    inner: Arc<Inner>,
}

impl MotionEngine {
    pub fn new(config: EngineConfig, actuator: Box<dyn Actuator>, sensor: Box<dyn RangeSensor>) -> Self {
        let speed = SpeedRegister::new(SpeedLevel::from_tenths(config.default_speed_tenths));
        info!(
            "Engine ready: speed {}, clearance {}cm, poll {}ms, max move {:?}",
            speed.get(),
            config.clearance_cm,
            config.poll_interval.as_millis(),
            config.max_move_duration
        );
        Self {
            inner: Arc::new(Inner {
                config,
                speed,
                state: Mutex::new(State {
                    mode: MotionMode::Idle,
                    epoch: 0,
                    task: None,
                    output: None,
                    actuator,
                }),
                sensor: parking_lot::Mutex::new(sensor),
                hardware_online: AtomicBool::new(true),
                stops: AtomicU64::new(0),
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub async fn mode(&self) -> MotionMode {
        self.inner.state.lock().await.mode
    }

    pub fn speed(&self) -> SpeedLevel {
        self.inner.speed.get()
    }

    pub fn stop_ticket(&self) -> StopTicket {
        StopTicket(self.inner.stops.load(Ordering::Acquire))
    }

    /// Drive in `direction` at the current speed until `bound` elapses or a
    /// stop arrives. Leaves autonomous mode first if it is active.
    pub async fn begin_manual(&self, direction: Direction, bound: Duration) -> Result<(), EngineError> {
        self.begin_manual_with(self.stop_ticket(), direction, bound).await
    }

    /// As `begin_manual`, but fails with `Superseded` if any stop was issued
    /// after `ticket` was taken
    pub async fn begin_manual_with(
        &self,
        ticket: StopTicket,
        direction: Direction,
        bound: Duration,
    ) -> Result<(), EngineError> {
        let max = self.inner.config.max_move_duration;
        if bound.is_zero() || bound > max {
            return Err(EngineError::InvalidDuration { requested: bound, max });
        }

        let inner = &self.inner;
        let mut state = inner.state.lock().await;
        inner.check_ticket(ticket)?;
        if state.mode == MotionMode::Autonomous {
            info!("Leaving autonomous mode for manual {}", direction.as_str());
            inner.force_idle(&mut state)?;
        }
        state.cancel_task();

        let cmd = DriveCommand::for_direction(direction, inner.speed.get());
        if let Err(e) = inner.write(&mut state, cmd) {
            warn!("Manual {} failed: {}", direction.as_str(), e);
            let _ = inner.force_idle(&mut state);
            return Err(e.into());
        }
        // Fire early enough that waiting on the lock cannot push the stop past the bound
        let fire_at = Instant::now() + bound - inner.config.stop_guard.min(bound / 2);

        if state.mode != MotionMode::Manual {
            info!("Mode {:?} -> Manual", state.mode);
            state.mode = MotionMode::Manual;
        }
        let epoch = state.epoch;
        state.task = Some(tokio::spawn(auto_stop(Arc::clone(inner), epoch, fire_at)));
        info!(
            "Moving {} at {} for at most {:?}",
            direction.as_str(),
            inner.speed.get(),
            bound
        );
        Ok(())
    }

    /// Emergency stop from any mode. Always leaves the engine Idle; the error
    /// only reports that the zero write did not reach the hardware.
    ///
    /// The stop counts as issued when this is called, before the returned
    /// future is polled, so commands received earlier can no longer actuate.
    pub fn stop(&self) -> impl Future<Output = Result<(), EngineError>> + Send + use<> {
        self.inner.stops.fetch_add(1, Ordering::AcqRel);
        let inner = Arc::clone(&self.inner);
        async move {
            let mut state = inner.state.lock().await;
            inner.force_idle(&mut state)?;
            Ok(())
        }
    }

    /// Takes effect on the next actuation
    pub fn adjust_speed(&self, action: SpeedAction) -> SpeedLevel {
        let level = match action {
            SpeedAction::Increase => self.inner.speed.increase(),
            SpeedAction::Decrease => self.inner.speed.decrease(),
        };
        info!("Speed {:?} -> {}", action, level);
        level
    }

    pub fn read_obstacle_distance(&self) -> ObstacleReading {
        self.inner.measure()
    }

    /// Returns whether the mode changed; redundant requests are no-op successes
    pub async fn set_autonomous(&self, enabled: bool) -> Result<bool, EngineError> {
        self.set_autonomous_with(self.stop_ticket(), enabled).await
    }

    /// As `set_autonomous`; enabling fails with `Superseded` if a stop was
    /// issued after `ticket` was taken
    pub async fn set_autonomous_with(&self, ticket: StopTicket, enabled: bool) -> Result<bool, EngineError> {
        let inner = &self.inner;
        let mut state = inner.state.lock().await;

        if !enabled {
            if state.mode != MotionMode::Autonomous {
                return Ok(false);
            }
            inner.force_idle(&mut state)?;
            return Ok(true);
        }

        inner.check_ticket(ticket)?;
        match state.mode {
            MotionMode::Autonomous => return Ok(false),
            MotionMode::Manual => {
                info!("Stopping manual move before autonomous mode");
                inner.force_idle(&mut state)?;
            }
            MotionMode::Idle => {}
        }

        state.cancel_task();
        state.mode = MotionMode::Autonomous;
        info!("Mode Idle -> Autonomous");
        let epoch = state.epoch;
        state.task = Some(tokio::spawn(autonomous_loop(Arc::clone(inner), epoch)));
        Ok(true)
    }

    /// Pings the wheels while idle and refreshes the cached status. While
    /// moving, the result of the latest actuation is reported instead so the
    /// bus is never held away from a pending stop.
    pub async fn health(&self) -> HealthReport {
        let mut state = self.inner.state.lock().await;
        if state.mode != MotionMode::Idle {
            let online = self.inner.hardware_online.load(Ordering::Acquire);
            return self.report(state.mode, online);
        }
        let online = match state.actuator.ping() {
            Ok(()) => true,
            Err(e) => {
                warn!("Health ping failed: {}", e);
                false
            }
        };
        self.inner.hardware_online.store(online, Ordering::Release);
        self.report(state.mode, online)
    }

    /// Snapshot from cached status, no hardware traffic
    pub async fn status(&self) -> HealthReport {
        let mode = self.mode().await;
        self.report(mode, self.inner.hardware_online.load(Ordering::Acquire))
    }

    fn report(&self, mode: MotionMode, online: bool) -> HealthReport {
        HealthReport {
            status: if online {
                HealthStatus::Online
            } else {
                HealthStatus::Offline
            },
            mode,
            speed: self.inner.speed.get(),
        }
    }

    /// Terminal stop on process exit
    pub async fn shutdown(&self) {
        info!("Engine shutting down");
        if let Err(e) = self.stop().await {
            warn!("Shutdown stop did not reach hardware: {}", e);
        }
    }
}

async fn auto_stop(inner: Arc<Inner>, epoch: u64, fire_at: Instant) {
    sleep_until(fire_at).await;

    let mut state = inner.state.lock().await;
    if state.epoch != epoch || state.mode != MotionMode::Manual {
        debug!("Stale auto-stop ignored");
        return;
    }
    info!("Manual move bound reached");
    // Detach our own handle so force_idle does not abort this task
    state.task = None;
    let _ = inner.force_idle(&mut state);
}

async fn autonomous_loop(inner: Arc<Inner>, epoch: u64) {
    let clearance = inner.config.clearance_cm;
    let mut tick = interval(inner.config.poll_interval);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tick.tick().await;
        let reading = inner.measure();

        let mut state = inner.state.lock().await;
        if state.epoch != epoch || state.mode != MotionMode::Autonomous {
            break;
        }

        let clear = reading.is_clear(clearance);
        let target = if clear {
            DriveCommand::for_direction(Direction::Forward, inner.speed.get())
        } else {
            DriveCommand::stop()
        };
        if state.output == Some(target) {
            continue;
        }

        match reading.distance_cm() {
            Some(d) if !clear => info!("Obstacle at {:.1}cm, holding", d),
            None => warn!("Range unknown, holding"),
            Some(d) => info!("Path clear at {:.1}cm, driving forward", d),
        }
        if let Err(e) = inner.write(&mut state, target) {
            warn!("Autonomous actuation failed: {}", e);
            state.task = None;
            let _ = inner.force_idle(&mut state);
            break;
        }
    }
    debug!("Autonomous loop exited");
}
