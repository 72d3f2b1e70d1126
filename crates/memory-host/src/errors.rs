//! Host-level errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HostError {
    /// The cancellation token fired before or during a generation pass.
    #[error("generation pass was cancelled")]
    Cancelled,

    #[error("invalid compilation JSON: {0}")]
    Json(#[from] serde_json::Error),
}
