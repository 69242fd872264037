// Scripted range sensor for --sim runs and tests

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{ObstacleReading, RangeSensor};

/// Plays back queued readings, then repeats the last one forever.
///
/// Clones share the same script so a test can keep feeding readings after the
/// sensor has been handed to the engine.
#[derive(Debug, Clone)]
pub struct ScriptedSensor {
    inner: Arc<Mutex<Script>>,
}

#[derive(Debug)]
struct Script {
    queue: VecDeque<ObstacleReading>,
    last: ObstacleReading,
    polls: usize,
}

impl ScriptedSensor {
    pub fn new(fallback: ObstacleReading) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Script {
                queue: VecDeque::new(),
                last: fallback,
                polls: 0,
            })),
        }
    }

    pub fn with_script(readings: impl IntoIterator<Item = ObstacleReading>) -> Self {
        let sensor = Self::new(ObstacleReading::unknown());
        sensor.push_all(readings);
        sensor
    }

    pub fn push_all(&self, readings: impl IntoIterator<Item = ObstacleReading>) {
        self.inner.lock().queue.extend(readings);
    }

    /// Number of measurements taken so far
    pub fn polls(&self) -> usize {
        self.inner.lock().polls
    }
}

impl RangeSensor for ScriptedSensor {
    fn measure(&mut self) -> ObstacleReading {
        let mut script = self.inner.lock();
        script.polls += 1;
        if let Some(next) = script.queue.pop_front() {
            script.last = next;
        }
        script.last
    }
}
