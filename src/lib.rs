pub mod config;
pub mod engine;
pub mod gateway;
pub mod messages;
pub mod motor;
pub mod runtime;
pub mod sensor;
pub mod speed;

pub use engine::{EngineError, MotionEngine, MotionMode};
