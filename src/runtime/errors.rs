//! Error types for the runtime system

use thiserror::Error;

/// Error raised when constructing a stream signature.
#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("min_streams {min} exceeds max_streams {max}")]
    InvalidBounds { min: usize, max: usize },

    #[error("item size must be positive")]
    ZeroItemSize,
}

/// Error type for graph construction and connection operations
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("block '{0}' not found")]
    BlockNotFound(String),

    #[error("block name '{0}' already in use")]
    DuplicateBlock(String),

    #[error(
        "item size mismatch: {src}:{src_port} carries {src_size}-byte items \
         but {dst}:{dst_port} expects {dst_size}-byte items"
    )]
    SignatureMismatch {
        src: String,
        src_port: usize,
        src_size: usize,
        dst: String,
        dst_port: usize,
        dst_size: usize,
    },

    #[error("input port {port} on block '{block}' is already connected")]
    DuplicateConnection { block: String, port: usize },

    #[error("{dir} port {port} out of range for block '{block}': signature allows at most {max}")]
    PortOutOfRange {
        block: String,
        dir: &'static str,
        port: usize,
        max: usize,
    },

    #[error("block '{block}' has {actual} {dir} streams connected, outside the allowed {expected}")]
    StreamCount {
        block: String,
        dir: &'static str,
        actual: usize,
        expected: String,
    },

    #[error("input port {port} on block '{block}' is not connected")]
    UnconnectedInput { block: String, port: usize },
}

/// Error type for block work functions and lifecycle hooks
#[derive(Debug, Error)]
pub enum WorkError {
    #[error("block error: {0}")]
    Block(String),

    #[error("stream carries {got}-byte items, block expected {expected}-byte items")]
    ItemSize { expected: usize, got: usize },
}

impl WorkError {
    /// Shorthand for a block-specific error message.
    pub fn msg(message: impl Into<String>) -> Self {
        WorkError::Block(message.into())
    }
}

/// Result type for work functions
pub type WorkResult<T = ()> = Result<T, WorkError>;

/// Fatal errors surfaced by the scheduler driver.
///
/// Any of these terminates the run; the offending block is named in the
/// message. End-of-stream is not an error and never appears here.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("block '{block}' failed to start: {source}")]
    StartFailure { block: String, source: WorkError },

    #[error("block '{block}' violated the scheduler contract: {reason}")]
    ContractViolation { block: String, reason: String },

    #[error("block '{block}' failed during work: {source}")]
    WorkFailed { block: String, source: WorkError },

    #[error(transparent)]
    Connection(#[from] ConnectionError),
}
