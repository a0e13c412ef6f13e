use std::path::PathBuf;

use thiserror::Error;

/// Result type for the CLI.
pub type Result<T> = std::result::Result<T, Error>;

/// CLI-specific error type
#[derive(Debug, Error)]
pub enum Error {
    /// The HTTP client could not be built.
    #[error("client error: {0}")]
    Client(#[from] dps_provisioning_http::Error),

    /// A file could not be read or written.
    #[error("failed to access {}: {source}", .path.display())]
    Io {
        /// File involved.
        path: PathBuf,

        /// Underlying error.
        source: std::io::Error,
    },

    /// The manifest is not valid TOML or does not match the expected shape.
    #[error("invalid manifest {}: {source}", .path.display())]
    Manifest {
        /// Manifest path.
        path: PathBuf,

        /// Parse error.
        source: toml::de::Error,
    },

    /// The manifest parsed but is inconsistent.
    #[error("invalid manifest: {0}")]
    ManifestRule(String),

    /// A looked-up resource does not exist.
    #[error("{kind} {id} not found")]
    NotFound {
        /// Resource kind, e.g. "service".
        kind: &'static str,

        /// Requested id.
        id: String,
    },

    /// Reconciliation failed.
    #[error(transparent)]
    Reconcile(#[from] dps_reconciler::Error),

    /// A result could not be rendered as JSON.
    #[error("failed to render output: {0}")]
    Render(serde_json::Error),

    /// The state file is not valid JSON or does not match the expected shape.
    #[error("invalid state file {}: {source}", .path.display())]
    State {
        /// State file path.
        path: PathBuf,

        /// Parse or encode error.
        source: serde_json::Error,
    },
}
