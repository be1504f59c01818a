use thiserror::Error;

use crate::Section;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Arrival probability for section {section} must be within [0, 1], got {value}")]
    InvalidArrivalProbability { section: Section, value: f64 },
    #[error("{name} must be within [0, 1], got {value}")]
    InvalidProbability { name: &'static str, value: f64 },
    #[error("Simulation duration must be greater than zero")]
    ZeroDuration,
    #[error("Tick duration must be greater than zero")]
    ZeroTick,
    #[error("Maximum number of trains in the system must be greater than zero")]
    ZeroCapacity,
}

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    IO(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),
    #[error("Too many trains in the system (limit {limit})")]
    CapacityExceeded { limit: usize },
}
