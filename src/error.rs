use thiserror::Error;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors that can occur during pipeline execution
#[derive(Error, Debug)]
pub enum PipelineError {
    /// An acquired line exceeds the configured maximum length
    #[error("Line of {len} bytes exceeds maximum of {max}")]
    LineTooLong { len: usize, max: usize },

    /// A non-blocking enqueue found the queue full
    #[error("Queue is at capacity")]
    CapacityExceeded,

    /// The queue was closed while a stage was blocked on it
    #[error("Queue closed")]
    QueueClosed,

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// I/O error on the external input or output stream
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Thread join error
    #[error("Thread join error: {0}")]
    ThreadError(String),
}
