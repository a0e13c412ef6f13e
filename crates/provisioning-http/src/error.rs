use dps_provisioning::{ProvisioningError, ProvisioningErrorKind};
use thiserror::Error;

/// Result type for HTTP provisioning operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the HTTP provisioning client.
#[derive(Debug, Error)]
pub enum Error {
    /// The configured base URL cannot carry path segments.
    #[error("base url cannot be used for API requests: {0}")]
    BaseUrl(String),

    /// Transport-level failure, or failure to build the client.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// A header value could not be encoded.
    #[error("invalid value for header {0}")]
    InvalidHeader(&'static str),

    /// The response body was not the expected JSON.
    #[error("failed to decode response from {method} {path}: {source}")]
    Json {
        /// Request method.
        method: String,

        /// Request path.
        path: String,

        /// Underlying decode error.
        #[source]
        source: serde_json::Error,
    },

    /// The remote system reported the resource as absent.
    #[error("{method} {path}: not found")]
    NotFound {
        /// Request method.
        method: String,

        /// Request path.
        path: String,
    },

    /// The remote system returned a non-success status.
    #[error("{method} {path} returned {status}: {body}")]
    Status {
        /// Request method.
        method: String,

        /// Request path.
        path: String,

        /// HTTP status code.
        status: u16,

        /// Response body, as text.
        body: String,
    },
}

impl ProvisioningError for Error {
    fn kind(&self) -> ProvisioningErrorKind {
        match self {
            Self::NotFound { .. } => ProvisioningErrorKind::NotFound,
            Self::Status { status, .. } => ProvisioningErrorKind::Rejected { status: *status },
            Self::Json { .. } => ProvisioningErrorKind::Decode,
            Self::Http(e) if e.is_decode() => ProvisioningErrorKind::Decode,
            Self::Http(e) if e.is_connect() || e.is_timeout() || e.is_request() => {
                ProvisioningErrorKind::Unreachable
            }
            Self::Http(_) | Self::BaseUrl(_) | Self::InvalidHeader(_) => {
                ProvisioningErrorKind::Other
            }
        }
    }
}
