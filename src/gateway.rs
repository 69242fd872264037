// Command dispatch: validated commands in, exactly one reply out
//
// Commands run one at a time on a worker task, in the order they were
// submitted. Stops skip the queue: they are issued to the engine at submit
// time, which also cancels every command still waiting behind them.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::engine::{MotionEngine, StopTicket};
use crate::messages::{AutoAction, Command, CommandError, ErrorKind, Reply};

type ReplyFuture = Pin<Box<dyn Future<Output = Reply> + Send>>;

struct Job {
    cmd: Command,
    ticket: StopTicket,
    reply: oneshot::Sender<Reply>,
}

#[derive(Clone)]
pub struct Gateway {
    engine: MotionEngine,
    queue: mpsc::UnboundedSender<Job>,
}

impl Gateway {
    /// Start the dispatch worker. Must be called inside a tokio runtime.
    pub fn spawn(engine: MotionEngine) -> Self {
        let (queue, mut jobs) = mpsc::unbounded_channel::<Job>();
        let worker = engine.clone();
        tokio::spawn(async move {
            while let Some(job) = jobs.recv().await {
                let reply = dispatch(&worker, job.cmd, job.ticket).await;
                if job.reply.send(reply).is_err() {
                    debug!("Caller went away before its reply");
                }
            }
            debug!("Dispatch worker exited");
        });
        Self { engine, queue }
    }

    pub fn engine(&self) -> &MotionEngine {
        &self.engine
    }

    /// Accept a raw request payload. Ordering is fixed by the call, not by
    /// when the returned future is polled.
    pub fn submit(&self, payload: &[u8]) -> impl Future<Output = Reply> + Send + use<> {
        let fut: ReplyFuture = match Command::parse(payload) {
            Err(e) => {
                warn!("Rejected command: {}", e);
                Box::pin(std::future::ready(Reply::error(ErrorKind::Validation, e)))
            }
            Ok(Command::Stop) => {
                info!("Received command: Stop");
                let stop = self.engine.stop();
                Box::pin(async move {
                    match stop.await {
                        Ok(()) => Reply::ack("stopped"),
                        Err(e) => Reply::ack(format!("stopped; {}", e)),
                    }
                })
            }
            Ok(cmd) => {
                let (tx, rx) = oneshot::channel();
                let job = Job {
                    cmd,
                    ticket: self.engine.stop_ticket(),
                    reply: tx,
                };
                let queued = self.queue.send(job).is_ok();
                Box::pin(async move {
                    if !queued {
                        return Reply::error(ErrorKind::Hardware, "dispatcher is not running");
                    }
                    rx.await
                        .unwrap_or_else(|_| Reply::error(ErrorKind::Hardware, "dispatcher dropped the command"))
                })
            }
        };
        fut
    }
}

/// Run one command against the engine. Actuating commands fail with
/// `Superseded` if a stop was issued after `ticket` was taken.
pub async fn dispatch(engine: &MotionEngine, cmd: Command, ticket: StopTicket) -> Reply {
    info!("Received command: {:?}", &cmd);
    match cmd {
        Command::Move {
            direction,
            duration,
        } => {
            let bound = match duration {
                None => engine.config().max_move_duration,
                Some(secs) => match Duration::try_from_secs_f32(secs) {
                    Ok(bound) => bound,
                    Err(_) => {
                        return Reply::error(ErrorKind::Validation, CommandError::InvalidDuration(secs));
                    }
                },
            };
            match engine.begin_manual_with(ticket, direction, bound).await {
                Ok(()) => Reply::ack(format!("{}_start executed", direction.as_str())),
                Err(e) => Reply::error(e.kind(), e),
            }
        }
        Command::Stop => match engine.stop().await {
            Ok(()) => Reply::ack("stopped"),
            Err(e) => Reply::ack(format!("stopped; {}", e)),
        },
        Command::Speed { action } => Reply::Speed {
            speed: engine.adjust_speed(action),
        },
        Command::Distance => {
            let reading = engine.read_obstacle_distance();
            Reply::Distance {
                distance_cm: reading.distance_cm(),
                valid: reading.is_valid(),
            }
        }
        Command::Auto { action } => {
            let enable = action == AutoAction::Start;
            match engine.set_autonomous_with(ticket, enable).await {
                Ok(true) if enable => Reply::ack("Auto mode started"),
                Ok(true) => Reply::ack("Auto mode stopped"),
                Ok(false) if enable => Reply::ack("Already in auto mode"),
                Ok(false) => Reply::ack("Auto mode not active"),
                Err(e) => Reply::error(e.kind(), e),
            }
        }
        Command::Health => Reply::Health(engine.health().await),
    }
}
