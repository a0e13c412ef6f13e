//! Error types for the mock provisioning client.

use dps_provisioning::{ProvisioningError, ProvisioningErrorKind};
use thiserror::Error;

/// Error type for the mock provisioning client.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum Error {
    /// The addressed resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The mock was told to reject the call.
    #[error("rejected with status {status}: {message}")]
    Rejected {
        /// HTTP status the rejection stands in for.
        status: u16,

        /// Rejection message.
        message: String,
    },

    /// The mock was told to behave as if the remote system were unreachable.
    #[error("unreachable: {0}")]
    Unreachable(String),
}

impl Error {
    /// A rejection with the given status.
    #[must_use]
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            message: message.into(),
        }
    }

    /// A transport failure.
    #[must_use]
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::Unreachable(message.into())
    }
}

impl ProvisioningError for Error {
    fn kind(&self) -> ProvisioningErrorKind {
        match self {
            Self::NotFound(_) => ProvisioningErrorKind::NotFound,
            Self::Rejected { status, .. } => ProvisioningErrorKind::Rejected { status: *status },
            Self::Unreachable(_) => ProvisioningErrorKind::Unreachable,
        }
    }
}
