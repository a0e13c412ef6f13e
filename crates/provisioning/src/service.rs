use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle status reported for a service.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    /// Provisioning has been accepted but is not finished.
    PendingCreate,

    /// The service is up and accepts changes.
    Ready,

    /// An in-place change is being rolled out.
    PendingUpdate,

    /// Deletion has been accepted but is not finished.
    PendingDelete,

    /// The service is stopped.
    Stopped,

    /// Provisioning or an update failed.
    Error,

    /// Provisioning failed permanently.
    Failed,

    /// The remote system reports the service as absent. Never sent by the
    /// remote system; synthesized from a not-found response.
    NotFound,

    /// A status string this client does not know about.
    #[default]
    #[serde(other)]
    Unknown,
}

impl ServiceStatus {
    /// Whether this status is a terminal failure for a provisioning poll.
    #[must_use]
    pub const fn is_failure(self) -> bool {
        matches!(self, Self::Error | Self::Failed)
    }

    /// Whether the remote system is still working on a previous request.
    #[must_use]
    pub const fn is_pending(self) -> bool {
        matches!(
            self,
            Self::PendingCreate | Self::PendingUpdate | Self::PendingDelete
        )
    }

    /// The wire representation of this status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PendingCreate => "pending_create",
            Self::Ready => "ready",
            Self::PendingUpdate => "pending_update",
            Self::PendingDelete => "pending_delete",
            Self::Stopped => "stopped",
            Self::Error => "error",
            Self::Failed => "failed",
            Self::NotFound => "not_found",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage volume attached to every node of a service.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct StorageVolume {
    /// Volume size in GiB.
    #[serde(default)]
    pub size: u32,

    /// Provider-specific volume type (e.g. `gp3`, `pd-ssd`).
    #[serde(default)]
    pub volume_type: String,

    /// Provisioned IOPS, where the volume type supports it.
    #[serde(default)]
    pub iops: u32,

    /// Provisioned throughput in MiB/s, where the volume type supports it.
    #[serde(default)]
    pub throughput: u32,
}

/// A named port on an endpoint.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Port {
    /// Port name.
    pub name: String,

    /// TCP port number.
    pub port: u16,

    /// What the port is for (e.g. `readwrite`).
    #[serde(default)]
    pub purpose: String,
}

/// A connection endpoint exposed by a service.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Endpoint name.
    pub name: String,

    /// Ports exposed on the endpoint.
    #[serde(default, deserialize_with = "crate::serde_null::deserialize")]
    pub ports: Vec<Port>,
}

/// A database deployment as reported by the remote system.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Service {
    /// Identifier assigned by the remote system.
    pub id: String,

    /// Service name.
    pub name: String,

    /// Owning project.
    #[serde(default)]
    pub project_id: String,

    /// `transactional` or `analytical`.
    #[serde(default)]
    pub service_type: String,

    /// Cloud provider (`aws`, `gcp`, `azure`).
    #[serde(default)]
    pub provider: String,

    /// Cloud region.
    #[serde(default)]
    pub region: String,

    /// CPU architecture.
    #[serde(default)]
    pub architecture: String,

    /// Replication / clustering shape (e.g. `es-single`).
    #[serde(default)]
    pub topology: String,

    /// Server version.
    #[serde(default)]
    pub version: String,

    /// Instance size.
    #[serde(default)]
    pub size: String,

    /// Number of nodes.
    #[serde(default)]
    pub nodes: u32,

    /// Service tier.
    #[serde(default)]
    pub tier: String,

    /// Whether TLS is required for client connections.
    #[serde(default)]
    pub ssl_enabled: bool,

    /// Current lifecycle status.
    #[serde(default)]
    pub status: ServiceStatus,

    /// Storage volume parameters.
    #[serde(default)]
    pub storage_volume: StorageVolume,

    /// Configuration object currently applied, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_id: Option<String>,

    /// Fully qualified domain name, once assigned.
    #[serde(default)]
    pub fqdn: String,

    /// Connection endpoints.
    #[serde(default, deserialize_with = "crate::serde_null::deserialize")]
    pub endpoints: Vec<Endpoint>,

    /// Whether the service is active.
    #[serde(default)]
    pub is_active: bool,

    /// Creation time (unix seconds).
    #[serde(default)]
    pub created_on: i64,

    /// Last update time (unix seconds).
    #[serde(default)]
    pub updated_on: i64,
}

impl Service {
    /// The applied configuration id, with the empty string treated as none.
    #[must_use]
    pub fn attached_config_id(&self) -> Option<&str> {
        self.config_id.as_deref().filter(|id| !id.is_empty())
    }
}

/// Request body for `POST /services`. Immutable fields only, plus the initial
/// values of the mutable storage parameters.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct CreateServiceRequest {
    /// Service name.
    pub name: String,

    /// Owning project.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,

    /// `transactional` or `analytical`.
    pub service_type: String,

    /// Cloud provider.
    pub provider: String,

    /// Cloud region.
    pub region: String,

    /// CPU architecture.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architecture: Option<String>,

    /// Replication / clustering shape.
    pub topology: String,

    /// Server version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Instance size.
    pub size: String,

    /// Number of nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodes: Option<u32>,

    /// Storage volume size in GiB.
    pub storage: u32,

    /// Volume type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_type: Option<String>,

    /// Provisioned IOPS.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_iops: Option<u32>,

    /// Provisioned throughput.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_throughput: Option<u32>,

    /// Whether TLS is required.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_enabled: Option<bool>,
}

/// Request body for `PATCH /services/{id}`. Only update-eligible fields; a
/// `None` leaves the remote value untouched.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct UpdateServiceRequest {
    /// Number of nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodes: Option<u32>,

    /// Storage volume size in GiB.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<u32>,

    /// Volume type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_type: Option<String>,

    /// Provisioned IOPS.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_iops: Option<u32>,

    /// Provisioned throughput.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_throughput: Option<u32>,
}

impl UpdateServiceRequest {
    /// Whether the request would change nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.nodes.is_none()
            && self.storage.is_none()
            && self.volume_type.is_none()
            && self.volume_iops.is_none()
            && self.volume_throughput.is_none()
    }
}

/// Request body for `POST /services/{id}/config`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfigState {
    /// Configuration object to apply.
    pub config_id: String,
}
