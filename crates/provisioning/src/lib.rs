//! Abstract interface for the database provisioning control plane: services,
//! their allowlists and credentials, configuration objects, and the
//! configurable-parameter catalog.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod allowlist;
mod config;
mod credentials;
mod serde_null;
mod service;

pub use allowlist::{AddAllowedAddressRequest, AllowlistEntry, AllowlistStatus};
pub use config::{Config, ConfigKey, ConfigValueRequest, CreateConfigRequest, UpdateConfigRequest};
pub use credentials::DefaultCredentials;
pub use service::{
    CreateServiceRequest, Endpoint, Port, Service, ServiceConfigState, ServiceStatus,
    StorageVolume, UpdateServiceRequest,
};

use std::error::Error;
use std::fmt::{self, Debug, Display};

use async_trait::async_trait;

/// The kind of provisioning error.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ProvisioningErrorKind {
    /// The remote system reports the resource as absent.
    NotFound,

    /// The remote system answered with a definitive error status.
    Rejected {
        /// HTTP status code returned by the remote system.
        status: u16,
    },

    /// The remote system could not be reached (connect failure, timeout).
    Unreachable,

    /// The response could not be decoded.
    Decode,

    /// Other/unknown error
    Other,
}

impl ProvisioningErrorKind {
    /// Whether a failure of this kind may succeed if the same call is retried.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Unreachable)
    }
}

impl Display for ProvisioningErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected { status } => write!(f, "Rejected({status})"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// Marker trait for `ProvisioningClient` errors
pub trait ProvisioningError: Debug + Error + Send + Sync + 'static {
    /// Returns the kind of this error
    fn kind(&self) -> ProvisioningErrorKind;

    /// Shorthand for `kind() == NotFound`.
    fn is_not_found(&self) -> bool {
        self.kind() == ProvisioningErrorKind::NotFound
    }
}

/// Abstract interface over the remote provisioning API.
///
/// Implementations must be safe to share between many concurrently reconciled
/// resources; cloning is expected to be cheap and to share the underlying
/// connection pool.
#[async_trait]
pub trait ProvisioningClient
where
    Self: Send + Sync + Clone + 'static,
{
    /// The error type for this client.
    type Error: ProvisioningError;

    /// Submit a service creation request.
    async fn create_service(&self, request: &CreateServiceRequest)
    -> Result<Service, Self::Error>;

    /// Fetch the current state of a service.
    async fn get_service(&self, service_id: &str) -> Result<Service, Self::Error>;

    /// Update the mutable fields of a service in place.
    async fn update_service(
        &self,
        service_id: &str,
        request: &UpdateServiceRequest,
    ) -> Result<Service, Self::Error>;

    /// Request deletion of a service.
    async fn delete_service(&self, service_id: &str) -> Result<(), Self::Error>;

    /// Attach (or swap) the configuration object applied to a service.
    async fn apply_service_config(
        &self,
        service_id: &str,
        config_id: &str,
    ) -> Result<(), Self::Error>;

    /// Detach whatever configuration object is applied to a service.
    async fn remove_service_config(&self, service_id: &str) -> Result<(), Self::Error>;

    /// Fetch the default database credentials of a service.
    async fn get_default_credentials(
        &self,
        service_id: &str,
    ) -> Result<DefaultCredentials, Self::Error>;

    /// List the addresses allowed to connect to a service.
    async fn list_allowed_addresses(
        &self,
        service_id: &str,
    ) -> Result<Vec<AllowlistEntry>, Self::Error>;

    /// Allow an address to connect to a service.
    async fn add_allowed_address(
        &self,
        service_id: &str,
        request: &AddAllowedAddressRequest,
    ) -> Result<AllowlistEntry, Self::Error>;

    /// Stop allowing an address to connect to a service.
    async fn remove_allowed_address(
        &self,
        service_id: &str,
        ip_address: &str,
    ) -> Result<(), Self::Error>;

    /// Create a configuration object.
    async fn create_config(&self, request: &CreateConfigRequest) -> Result<Config, Self::Error>;

    /// Fetch a configuration object.
    async fn get_config(&self, config_id: &str) -> Result<Config, Self::Error>;

    /// Rename a configuration object.
    async fn update_config(
        &self,
        config_id: &str,
        request: &UpdateConfigRequest,
    ) -> Result<Config, Self::Error>;

    /// Delete a configuration object.
    async fn delete_config(&self, config_id: &str) -> Result<(), Self::Error>;

    /// Set one server variable on a configuration object.
    async fn set_config_value(
        &self,
        config_id: &str,
        variable: &str,
        value: &str,
        allow_restart: bool,
    ) -> Result<(), Self::Error>;

    /// Remove one server variable override from a configuration object.
    async fn unset_config_value(
        &self,
        config_id: &str,
        variable: &str,
        allow_restart: bool,
    ) -> Result<(), Self::Error>;

    /// Fetch the full catalog of configurable parameters for a topology and
    /// server version.
    async fn get_config_keys(
        &self,
        topology: &str,
        version: &str,
    ) -> Result<Vec<ConfigKey>, Self::Error>;
}
