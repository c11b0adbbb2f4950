//! Crate-wide error type.

use thiserror::Error;

/// Common result type for planner operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error across the planner library. Module-specific errors keep
/// their own display text; the orchestrator decides which of them become the
/// single user-visible message.
#[derive(Error, Debug)]
pub enum Error {
    /// Optimizer request/response failure
    #[error(transparent)]
    Client(#[from] crate::client::ClientError),

    /// Login, restore, or logout failure
    #[error(transparent)]
    Session(#[from] crate::session::SessionError),

    /// History listing, fetch, or delete failure
    #[error(transparent)]
    History(#[from] crate::history::HistoryError),

    /// Solution failed the report builder's consistency checks
    #[error(transparent)]
    Report(#[from] crate::report::ReportError),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed persisted state (draft or credential file)
    #[error("Invalid stored data: {0}")]
    Store(#[from] serde_json::Error),
}
