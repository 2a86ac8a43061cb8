//! Error types for the glimpse pipeline.

/// Top-level error type for the journaling system.
#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    /// Screen capture error.
    #[error("capture error: {0}")]
    Capture(String),

    /// Model inference error while describing a capture.
    #[error("inference error: {0}")]
    Inference(String),

    /// Journal persistence error.
    #[error("persist error: {0}")]
    Persist(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Scheduler error (construction, control surface).
    #[error("scheduler error: {0}")]
    Scheduler(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, JournalError>;
