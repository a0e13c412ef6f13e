//! Error types for reconciliation.

use std::fmt;
use std::time::Duration;

use dps_provisioning::{ProvisioningError, ProvisioningErrorKind, ServiceStatus};
use thiserror::Error;

/// Result type for reconciliation.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of reconciliation failures.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ErrorKind {
    /// Rejected client-side; nothing was sent to the remote system.
    Validation,

    /// The remote system returned a definitive error.
    RemoteRejected,

    /// The remote system could not be reached.
    RemoteUnreachable,

    /// A poll ran out of time before reaching a terminal state.
    ConvergenceTimeout,

    /// A multi-step apply stopped partway.
    PartialApply,

    /// The caller cancelled a poll wait.
    Cancelled,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Which phase of a value apply a failure happened in.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ApplyPhase {
    /// Removing variables that are no longer desired.
    Unset,

    /// Setting new or changed variables.
    Set,
}

impl fmt::Display for ApplyPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unset => f.write_str("unset"),
            Self::Set => f.write_str("set"),
        }
    }
}

/// Errors that can occur during reconciliation.
#[derive(Debug, Error)]
pub enum Error {
    /// The caller's cancellation token fired during a poll wait.
    #[error("cancelled while waiting for {operation} of {resource}")]
    Cancelled {
        /// What was being waited for.
        operation: String,

        /// Resource being waited on.
        resource: String,
    },

    /// The configuration parameter catalog could not be fetched, so restart
    /// safety could not be checked.
    #[error("unable to fetch config keys for topology {topology:?} version {version:?}: {reason}")]
    CatalogUnavailable {
        /// Topology name.
        topology: String,

        /// Server version.
        version: String,

        /// Underlying failure.
        reason: String,

        /// Whether the underlying failure was a transport failure.
        transient: bool,
    },

    /// A poll ran out of time. The remote resource is left as-is and may still
    /// converge later.
    #[error(
        "{operation} of {resource} did not converge within {waited:?}; last observed: {last_observed}"
    )]
    ConvergenceTimeout {
        /// What was being waited for.
        operation: String,

        /// Resource being waited on.
        resource: String,

        /// How long the poll ran.
        waited: Duration,

        /// Last observation before giving up.
        last_observed: String,
    },

    /// Required fields are unset.
    #[error("missing required fields: {}", .fields.join(", "))]
    MissingFields {
        /// Names of the missing fields.
        fields: Vec<&'static str>,
    },

    /// A value set/unset failed partway through an apply. Variables already
    /// applied are not rolled back.
    #[error(
        "failed to {phase} variable {variable} on {resource}: {cause}; applied: [{}]; not attempted: [{}]",
        .applied.join(", "),
        .not_attempted.join(", ")
    )]
    PartialApply {
        /// Configuration object being changed.
        resource: String,

        /// Phase the failure happened in.
        phase: ApplyPhase,

        /// Variable whose call failed.
        variable: String,

        /// Why the call failed.
        cause: Box<Error>,

        /// Variables changed before the failure, in call order.
        applied: Vec<String>,

        /// Variables never attempted, in the order they would have been.
        not_attempted: Vec<String>,
    },

    /// A field's current state does not allow the requested change.
    #[error("{field} {reason}")]
    PreconditionFailed {
        /// Offending field.
        field: String,

        /// The violated condition.
        reason: String,
    },

    /// The service reached a terminal failure status while being provisioned.
    #[error("service {service_id} reported status {status}")]
    ProvisioningFailed {
        /// Service id.
        service_id: String,

        /// Reported status.
        status: ServiceStatus,
    },

    /// The remote system returned a definitive error.
    #[error("{operation} rejected by remote system{}: {message}", status_suffix(.status))]
    RemoteRejected {
        /// Failed operation.
        operation: String,

        /// HTTP status, when there was one.
        status: Option<u16>,

        /// Error message.
        message: String,
    },

    /// The remote system could not be reached.
    #[error("{operation} failed, remote system unreachable: {message}")]
    RemoteUnreachable {
        /// Failed operation.
        operation: String,

        /// Error message.
        message: String,
    },

    /// Immutable fields changed; the resource must be replaced.
    #[error("changing {} requires replacing the resource", .fields.join(", "))]
    ReplacementRequired {
        /// Names of the changed immutable fields.
        fields: Vec<&'static str>,
    },

    /// Changed variables need a service restart but restarts are not allowed.
    #[error("{} a service restart; set allow_restart to permit", restart_subject(.variables))]
    RestartRequired {
        /// Offending variable names, sorted.
        variables: Vec<String>,
    },
}

fn restart_subject(variables: &[String]) -> String {
    match variables {
        [variable] => format!("variable {variable} requires"),
        variables => format!("variables {} require", variables.join(", ")),
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map_or_else(String::new, |status| format!(" with status {status}"))
}

impl Error {
    /// Classify a failed remote call.
    pub fn remote<E: ProvisioningError>(operation: impl Into<String>, error: &E) -> Self {
        let operation = operation.into();
        let message = error.to_string();

        match error.kind() {
            ProvisioningErrorKind::Unreachable => Self::RemoteUnreachable { operation, message },
            ProvisioningErrorKind::NotFound => Self::RemoteRejected {
                operation,
                status: Some(404),
                message,
            },
            ProvisioningErrorKind::Rejected { status } => Self::RemoteRejected {
                operation,
                status: Some(status),
                message,
            },
            ProvisioningErrorKind::Decode | ProvisioningErrorKind::Other => Self::RemoteRejected {
                operation,
                status: None,
                message,
            },
        }
    }

    /// Create a precondition failure.
    pub fn precondition(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PreconditionFailed {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// The taxonomy kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingFields { .. }
            | Self::PreconditionFailed { .. }
            | Self::ReplacementRequired { .. }
            | Self::RestartRequired { .. } => ErrorKind::Validation,
            Self::CatalogUnavailable { transient, .. } => {
                if *transient {
                    ErrorKind::RemoteUnreachable
                } else {
                    ErrorKind::RemoteRejected
                }
            }
            Self::ProvisioningFailed { .. } | Self::RemoteRejected { .. } => {
                ErrorKind::RemoteRejected
            }
            Self::RemoteUnreachable { .. } => ErrorKind::RemoteUnreachable,
            Self::ConvergenceTimeout { .. } => ErrorKind::ConvergenceTimeout,
            Self::PartialApply { .. } => ErrorKind::PartialApply,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_restart_required_names_variables_and_remedy() {
        let error = Error::RestartRequired {
            variables: vec!["innodb_buffer_pool_size".to_string(), "thread_handling".to_string()],
        };

        assert_eq!(
            error.to_string(),
            "variables innodb_buffer_pool_size, thread_handling require a service restart; set allow_restart to permit"
        );
        assert_eq!(error.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_restart_required_singular_for_one_variable() {
        let error = Error::RestartRequired {
            variables: vec!["innodb_buffer_pool_size".to_string()],
        };

        assert_eq!(
            error.to_string(),
            "variable innodb_buffer_pool_size requires a service restart; set allow_restart to permit"
        );
    }

    #[test]
    fn test_partial_apply_lists_progress() {
        let error = Error::PartialApply {
            resource: "cfg-1".to_string(),
            phase: ApplyPhase::Set,
            variable: "b".to_string(),
            cause: Box::new(Error::RemoteRejected {
                operation: "set config value".to_string(),
                status: Some(422),
                message: "invalid".to_string(),
            }),
            applied: vec!["a".to_string()],
            not_attempted: vec!["c".to_string()],
        };

        let message = error.to_string();
        assert!(message.starts_with("failed to set variable b on cfg-1"));
        assert!(message.contains("with status 422"));
        assert!(message.ends_with("applied: [a]; not attempted: [c]"));
        assert_eq!(error.kind(), ErrorKind::PartialApply);
    }

    #[test]
    fn test_catalog_kind_follows_underlying_failure() {
        let unavailable = |transient| Error::CatalogUnavailable {
            topology: "es-single".to_string(),
            version: "10.6".to_string(),
            reason: "boom".to_string(),
            transient,
        };

        assert_eq!(unavailable(true).kind(), ErrorKind::RemoteUnreachable);
        assert_eq!(unavailable(false).kind(), ErrorKind::RemoteRejected);
    }
}
