//! Error types for photo-critic operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for photo-critic operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while evaluating photos and persisting verdicts.
///
/// Sidecar decoding never produces an error: an unreadable sidecar decodes to
/// `None` and missing fields fall back to defaults.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The scoring gateway failed to produce a result.
    #[error("Gateway error ({gateway}): {message}")]
    Gateway {
        /// Gateway identifier.
        gateway: String,
        /// Error message from the gateway.
        message: String,
    },

    /// The scoring gateway answered, but the answer was unusable.
    #[error("Malformed gateway response: {0}")]
    GatewayResponse(String),

    /// No credential was configured for a gateway that needs one.
    #[error("Missing credential for {0}")]
    MissingCredential(String),

    /// HTTP transport error.
    #[cfg(feature = "gemini")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Access to a directory was denied by the user or the OS.
    #[error("Permission denied: {}", path.display())]
    PermissionDenied {
        /// Directory the permission was requested for.
        path: PathBuf,
    },

    /// A newer evaluation of the same photo replaced this one.
    #[error("Evaluation of {0} was superseded")]
    Superseded(String),

    /// A file name that does not stay inside its directory.
    #[error("Invalid file name: {0}")]
    InvalidName(String),

    /// The requested photo does not exist in the folder.
    #[error("Photo not found: {0}")]
    PhotoNotFound(String),

    /// A move would overwrite a file already in the destination.
    #[error("Destination already has {0}")]
    AlreadyExists(String),

    /// Source and destination of a move are the same folder.
    #[error("Source and destination are the same folder: {}", .0.display())]
    SameFolder(PathBuf),

    /// Unsupported image format.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The worker pool for a batch could not be started.
    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// I/O error wrapper.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl Error {
    /// Whether the error came from the scoring side rather than local storage.
    #[must_use]
    pub fn is_gateway_failure(&self) -> bool {
        match self {
            Self::Gateway { .. } | Self::GatewayResponse(_) | Self::MissingCredential(_) => true,
            #[cfg(feature = "gemini")]
            Self::Http(_) => true,
            _ => false,
        }
    }

    /// Whether the operation can be retried after user action
    /// (granting access, re-running the evaluation).
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::PermissionDenied { .. } | Self::Superseded(_))
    }
}
