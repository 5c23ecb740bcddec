use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum GeneratorError {
    #[error("Empty choice set: {0}")]
    EmptyChoiceSet(String),

    #[error("No event names configured for event type: {0}")]
    MissingEventNames(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("Search failed: {0}")]
    Search(String),

    #[error("Search timed out after {0:?}")]
    SearchTimeout(Duration),

    #[error("Insights error: {0}")]
    Insights(String),

    #[error("Event delivery failed after {delivered} events: {message}")]
    Delivery { delivered: usize, message: String },

    #[error("Statistics error: {0}")]
    Statistics(String),

    #[error("Worker failed: {0}")]
    Worker(String),
}

pub type Result<T> = std::result::Result<T, GeneratorError>;

impl From<std::io::Error> for GeneratorError {
    fn from(e: std::io::Error) -> Self {
        GeneratorError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for GeneratorError {
    fn from(e: serde_json::Error) -> Self {
        GeneratorError::Json(e.to_string())
    }
}

impl GeneratorError {
    /// Per-turn failures a worker logs and recovers from. Everything else
    /// aborts the run.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GeneratorError::Search(_) | GeneratorError::SearchTimeout(_)
        )
    }

    /// Short label used as a structured log field.
    pub fn category(&self) -> &'static str {
        match self {
            GeneratorError::EmptyChoiceSet(_)
            | GeneratorError::MissingEventNames(_)
            | GeneratorError::Config(_)
            | GeneratorError::Io(_)
            | GeneratorError::Json(_) => "configuration",
            GeneratorError::Search(_) | GeneratorError::SearchTimeout(_) => "search",
            GeneratorError::Insights(_) | GeneratorError::Delivery { .. } => "delivery",
            GeneratorError::Statistics(_) => "statistics",
            GeneratorError::Worker(_) => "worker",
        }
    }
}
