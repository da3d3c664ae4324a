use pelican_core::mission::MissionError;

/// Errors that can occur while preparing or running a flight.
#[derive(Debug, thiserror::Error)]
pub enum PelicanError {
    #[error("Plan file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Plan parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid plan: {0}")]
    InvalidPlan(String),

    #[error("Mission error: {0}")]
    Mission(#[from] MissionError),
}
