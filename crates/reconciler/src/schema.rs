//! Hand-declared schema for managed services.
//!
//! Every field of [`ServiceSpec`] appears exactly once in [`ServiceField::ALL`]
//! together with whether it is required and how a change to it is applied.
//! Diffing and validation are driven from that table.

use std::fmt;

use dps_provisioning::{CreateServiceRequest, UpdateServiceRequest};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Whether a field must be set.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Presence {
    /// Must be set when creating the resource.
    Required,

    /// May be left unset; the remote system picks a default.
    Optional,
}

/// How a change to a field is applied.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Mutability {
    /// Changing it means deleting and recreating the service.
    Immutable,

    /// Changed in place with an update request.
    Mutable,

    /// Changed through the attach/detach sub-protocol.
    Attachment,

    /// Only affects local behavior; never sent to the remote system.
    Local,
}

/// Desired state of a managed service.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct ServiceSpec {
    /// Service name.
    pub name: String,

    /// Project to create the service in.
    pub project_id: Option<String>,

    /// Service type, e.g. "transactional".
    pub service_type: String,

    /// Cloud provider.
    pub provider: String,

    /// Provider region.
    pub region: String,

    /// CPU architecture.
    pub architecture: Option<String>,

    /// Database topology.
    pub topology: String,

    /// Server version.
    pub version: Option<String>,

    /// Instance size.
    pub size: String,

    /// Whether SSL is enabled.
    pub ssl_enabled: Option<bool>,

    /// Number of nodes.
    pub nodes: Option<u32>,

    /// Storage volume size in GB.
    pub storage: Option<u32>,

    /// Storage volume type.
    pub volume_type: Option<String>,

    /// Provisioned IOPS.
    pub volume_iops: Option<u32>,

    /// Provisioned throughput.
    pub volume_throughput: Option<u32>,

    /// Configuration object to attach; `None` means nothing attached.
    pub config_id: Option<String>,

    /// Block until a newly created service is ready.
    pub wait_for_creation: bool,

    /// Block until a deleted service is gone.
    pub wait_for_deletion: bool,

    /// Refuse to delete the service.
    pub deletion_protection: bool,
}

impl Default for ServiceSpec {
    fn default() -> Self {
        Self {
            name: String::new(),
            project_id: None,
            service_type: String::new(),
            provider: String::new(),
            region: String::new(),
            architecture: None,
            topology: String::new(),
            version: None,
            size: String::new(),
            ssl_enabled: None,
            nodes: None,
            storage: None,
            volume_type: None,
            volume_iops: None,
            volume_throughput: None,
            config_id: None,
            wait_for_creation: true,
            wait_for_deletion: true,
            deletion_protection: true,
        }
    }
}

/// A field of [`ServiceSpec`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ServiceField {
    /// `name`
    Name,
    /// `project_id`
    ProjectId,
    /// `service_type`
    ServiceType,
    /// `provider`
    Provider,
    /// `region`
    Region,
    /// `architecture`
    Architecture,
    /// `topology`
    Topology,
    /// `version`
    Version,
    /// `size`
    Size,
    /// `ssl_enabled`
    SslEnabled,
    /// `nodes`
    Nodes,
    /// `storage`
    Storage,
    /// `volume_type`
    VolumeType,
    /// `volume_iops`
    VolumeIops,
    /// `volume_throughput`
    VolumeThroughput,
    /// `config_id`
    ConfigId,
    /// `wait_for_creation`
    WaitForCreation,
    /// `wait_for_deletion`
    WaitForDeletion,
    /// `deletion_protection`
    DeletionProtection,
}

impl ServiceField {
    /// Every field, in declaration order.
    pub const ALL: [Self; 19] = [
        Self::Name,
        Self::ProjectId,
        Self::ServiceType,
        Self::Provider,
        Self::Region,
        Self::Architecture,
        Self::Topology,
        Self::Version,
        Self::Size,
        Self::SslEnabled,
        Self::Nodes,
        Self::Storage,
        Self::VolumeType,
        Self::VolumeIops,
        Self::VolumeThroughput,
        Self::ConfigId,
        Self::WaitForCreation,
        Self::WaitForDeletion,
        Self::DeletionProtection,
    ];

    /// Field name as it appears in manifests and errors.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::ProjectId => "project_id",
            Self::ServiceType => "service_type",
            Self::Provider => "provider",
            Self::Region => "region",
            Self::Architecture => "architecture",
            Self::Topology => "topology",
            Self::Version => "version",
            Self::Size => "size",
            Self::SslEnabled => "ssl_enabled",
            Self::Nodes => "nodes",
            Self::Storage => "storage",
            Self::VolumeType => "volume_type",
            Self::VolumeIops => "volume_iops",
            Self::VolumeThroughput => "volume_throughput",
            Self::ConfigId => "config_id",
            Self::WaitForCreation => "wait_for_creation",
            Self::WaitForDeletion => "wait_for_deletion",
            Self::DeletionProtection => "deletion_protection",
        }
    }

    /// Whether the field must be set.
    #[must_use]
    pub const fn presence(self) -> Presence {
        match self {
            Self::Name
            | Self::ServiceType
            | Self::Provider
            | Self::Region
            | Self::Topology
            | Self::Size
            | Self::Storage => Presence::Required,
            _ => Presence::Optional,
        }
    }

    /// How a change to the field is applied.
    #[must_use]
    pub const fn mutability(self) -> Mutability {
        match self {
            Self::Name
            | Self::ProjectId
            | Self::ServiceType
            | Self::Provider
            | Self::Region
            | Self::Architecture
            | Self::Topology
            | Self::Version
            | Self::Size
            | Self::SslEnabled => Mutability::Immutable,
            Self::Nodes
            | Self::Storage
            | Self::VolumeType
            | Self::VolumeIops
            | Self::VolumeThroughput => Mutability::Mutable,
            Self::ConfigId => Mutability::Attachment,
            Self::WaitForCreation | Self::WaitForDeletion | Self::DeletionProtection => {
                Mutability::Local
            }
        }
    }

    /// The field's value in `spec`, rendered for comparison. `None` when
    /// unset; empty strings count as unset.
    #[must_use]
    pub fn value(self, spec: &ServiceSpec) -> Option<String> {
        fn text(value: &str) -> Option<String> {
            (!value.is_empty()).then(|| value.to_string())
        }
        fn opt_text(value: Option<&String>) -> Option<String> {
            value.and_then(|value| text(value))
        }
        fn shown<T: ToString>(value: Option<T>) -> Option<String> {
            value.map(|value| value.to_string())
        }

        match self {
            Self::Name => text(&spec.name),
            Self::ProjectId => opt_text(spec.project_id.as_ref()),
            Self::ServiceType => text(&spec.service_type),
            Self::Provider => text(&spec.provider),
            Self::Region => text(&spec.region),
            Self::Architecture => opt_text(spec.architecture.as_ref()),
            Self::Topology => text(&spec.topology),
            Self::Version => opt_text(spec.version.as_ref()),
            Self::Size => text(&spec.size),
            Self::SslEnabled => shown(spec.ssl_enabled),
            Self::Nodes => shown(spec.nodes),
            Self::Storage => shown(spec.storage),
            Self::VolumeType => opt_text(spec.volume_type.as_ref()),
            Self::VolumeIops => shown(spec.volume_iops),
            Self::VolumeThroughput => shown(spec.volume_throughput),
            Self::ConfigId => opt_text(spec.config_id.as_ref()),
            Self::WaitForCreation => shown(Some(spec.wait_for_creation)),
            Self::WaitForDeletion => shown(Some(spec.wait_for_deletion)),
            Self::DeletionProtection => shown(Some(spec.deletion_protection)),
        }
    }
}

impl fmt::Display for ServiceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What it takes to move a service from one spec to another.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ServicePlan {
    /// Nothing the remote system knows about changed.
    NoChange,

    /// Only mutable fields changed.
    UpdateInPlace(Vec<ServiceField>),

    /// At least one immutable field changed. Lists only the immutable ones.
    Replace(Vec<ServiceField>),
}

impl ServicePlan {
    /// Names of the fields driving this plan.
    #[must_use]
    pub fn field_names(&self) -> Vec<&'static str> {
        match self {
            Self::NoChange => Vec::new(),
            Self::UpdateInPlace(fields) | Self::Replace(fields) => {
                fields.iter().map(|field| field.name()).collect()
            }
        }
    }
}

/// Fields whose value differs between `prior` and `desired`.
#[must_use]
pub fn changed_fields(prior: &ServiceSpec, desired: &ServiceSpec) -> Vec<ServiceField> {
    ServiceField::ALL
        .into_iter()
        .filter(|field| field.value(prior) != field.value(desired))
        .collect()
}

/// Plan the remote changes needed to go from `prior` to `desired`.
///
/// Attachment and local fields never appear in the plan; the config
/// attachment is reconciled separately.
#[must_use]
pub fn plan(prior: &ServiceSpec, desired: &ServiceSpec) -> ServicePlan {
    let changed = changed_fields(prior, desired);

    let immutable: Vec<_> = changed
        .iter()
        .copied()
        .filter(|field| field.mutability() == Mutability::Immutable)
        .collect();
    if !immutable.is_empty() {
        return ServicePlan::Replace(immutable);
    }

    let mutable: Vec<_> = changed
        .into_iter()
        .filter(|field| field.mutability() == Mutability::Mutable)
        .collect();
    if mutable.is_empty() {
        ServicePlan::NoChange
    } else {
        ServicePlan::UpdateInPlace(mutable)
    }
}

impl ServiceSpec {
    /// Names of required fields that are unset.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<&'static str> {
        ServiceField::ALL
            .into_iter()
            .filter(|field| field.presence() == Presence::Required && field.value(self).is_none())
            .map(ServiceField::name)
            .collect()
    }

    /// Reject specs that can never be applied, before anything is sent.
    ///
    /// # Errors
    ///
    /// [`Error::MissingFields`] when required fields are unset, and
    /// [`Error::PreconditionFailed`] when a config is requested without
    /// waiting for creation.
    pub fn validate(&self) -> Result<()> {
        let missing = self.missing_fields();
        if !missing.is_empty() {
            return Err(Error::MissingFields { fields: missing });
        }

        if self.desired_config_id().is_some() && !self.wait_for_creation {
            return Err(Error::precondition(
                ServiceField::ConfigId.name(),
                "requires wait_for_creation = true",
            ));
        }

        Ok(())
    }

    /// The config to attach, treating an empty id as none.
    #[must_use]
    pub fn desired_config_id(&self) -> Option<&str> {
        self.config_id.as_deref().filter(|id| !id.is_empty())
    }

    /// Build the creation request. Call [`Self::validate`] first.
    #[must_use]
    pub fn create_request(&self) -> CreateServiceRequest {
        CreateServiceRequest {
            name: self.name.clone(),
            project_id: self.project_id.clone(),
            service_type: self.service_type.clone(),
            provider: self.provider.clone(),
            region: self.region.clone(),
            architecture: self.architecture.clone(),
            topology: self.topology.clone(),
            version: self.version.clone(),
            size: self.size.clone(),
            nodes: self.nodes,
            storage: self.storage.unwrap_or_default(),
            volume_type: self.volume_type.clone(),
            volume_iops: self.volume_iops,
            volume_throughput: self.volume_throughput,
            ssl_enabled: self.ssl_enabled,
        }
    }

    /// Build an update request carrying only the given mutable fields.
    /// Fields left unset here are untouched remotely.
    #[must_use]
    pub fn update_request(&self, fields: &[ServiceField]) -> UpdateServiceRequest {
        let mut request = UpdateServiceRequest::default();
        for field in fields {
            match field {
                ServiceField::Nodes => request.nodes = self.nodes,
                ServiceField::Storage => request.storage = self.storage,
                ServiceField::VolumeType => request.volume_type.clone_from(&self.volume_type),
                ServiceField::VolumeIops => request.volume_iops = self.volume_iops,
                ServiceField::VolumeThroughput => {
                    request.volume_throughput = self.volume_throughput;
                }
                _ => {}
            }
        }
        request
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn spec() -> ServiceSpec {
        ServiceSpec {
            name: "orders".to_string(),
            service_type: "transactional".to_string(),
            provider: "gcp".to_string(),
            region: "us-central1".to_string(),
            topology: "es-single".to_string(),
            size: "sky-2x8".to_string(),
            storage: Some(100),
            deletion_protection: false,
            ..ServiceSpec::default()
        }
    }

    #[test]
    fn test_every_field_declared_once() {
        let mut names: Vec<_> = ServiceField::ALL.iter().map(|field| field.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), ServiceField::ALL.len());
    }

    #[test]
    fn test_manifest_defaults() {
        let spec: ServiceSpec = serde_json::from_str(r#"{"name":"orders"}"#).unwrap();

        assert!(spec.wait_for_creation);
        assert!(spec.wait_for_deletion);
        assert!(spec.deletion_protection);
        assert_eq!(spec.config_id, None);
    }

    #[test]
    fn test_missing_required_fields_are_named() {
        let spec = ServiceSpec {
            region: String::new(),
            storage: None,
            ..spec()
        };

        assert_eq!(spec.missing_fields(), vec!["region", "storage"]);
        match spec.validate().unwrap_err() {
            Error::MissingFields { fields } => assert_eq!(fields, vec!["region", "storage"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_config_without_waiting_is_rejected() {
        let spec = ServiceSpec {
            config_id: Some("cfg-1".to_string()),
            wait_for_creation: false,
            ..spec()
        };

        let error = spec.validate().unwrap_err();
        assert_eq!(error.to_string(), "config_id requires wait_for_creation = true");
    }

    #[test]
    fn test_empty_config_id_is_no_config() {
        let spec = ServiceSpec {
            config_id: Some(String::new()),
            wait_for_creation: false,
            ..spec()
        };

        assert_eq!(spec.desired_config_id(), None);
        spec.validate().unwrap();
    }

    #[test]
    fn test_immutable_change_plans_replacement() {
        let desired = ServiceSpec {
            region: "europe-west1".to_string(),
            storage: Some(200),
            ..spec()
        };

        assert_eq!(
            plan(&spec(), &desired),
            ServicePlan::Replace(vec![ServiceField::Region])
        );
    }

    #[test]
    fn test_mutable_change_plans_update_with_only_changed_fields() {
        let desired = ServiceSpec {
            storage: Some(200),
            volume_iops: Some(3000),
            ..spec()
        };

        let plan = plan(&spec(), &desired);
        assert_eq!(
            plan,
            ServicePlan::UpdateInPlace(vec![ServiceField::Storage, ServiceField::VolumeIops])
        );

        let ServicePlan::UpdateInPlace(fields) = plan else {
            unreachable!()
        };
        let request = desired.update_request(&fields);
        assert_eq!(request.storage, Some(200));
        assert_eq!(request.volume_iops, Some(3000));
        assert_eq!(request.nodes, None);
        assert_eq!(request.volume_type, None);
    }

    #[test]
    fn test_attachment_and_local_changes_plan_nothing() {
        let desired = ServiceSpec {
            config_id: Some("cfg-1".to_string()),
            deletion_protection: true,
            wait_for_deletion: false,
            ..spec()
        };

        assert_eq!(plan(&spec(), &desired), ServicePlan::NoChange);
    }

    fn arb_spec() -> impl Strategy<Value = ServiceSpec> {
        (
            prop::sample::select(vec!["orders", "billing"]),
            prop::sample::select(vec!["us-central1", "europe-west1"]),
            prop::option::of(1u32..4),
            prop::option::of(prop::sample::select(vec![100u32, 200])),
            prop::option::of(prop::sample::select(vec!["pd-ssd", "io2"])),
            any::<bool>(),
        )
            .prop_map(|(name, region, nodes, storage, volume_type, protection)| ServiceSpec {
                name: name.to_string(),
                region: region.to_string(),
                nodes,
                storage,
                volume_type: volume_type.map(ToString::to_string),
                deletion_protection: protection,
                ..spec()
            })
    }

    proptest! {
        #[test]
        fn plan_of_identical_specs_is_no_change(spec in arb_spec()) {
            prop_assert_eq!(plan(&spec, &spec.clone()), ServicePlan::NoChange);
        }

        #[test]
        fn plan_only_lists_fields_of_its_kind(prior in arb_spec(), desired in arb_spec()) {
            match plan(&prior, &desired) {
                ServicePlan::NoChange => {
                    prop_assert!(changed_fields(&prior, &desired)
                        .iter()
                        .all(|field| matches!(field.mutability(), Mutability::Local | Mutability::Attachment)));
                }
                ServicePlan::Replace(fields) => {
                    prop_assert!(!fields.is_empty());
                    prop_assert!(fields.iter().all(|field| field.mutability() == Mutability::Immutable));
                }
                ServicePlan::UpdateInPlace(fields) => {
                    prop_assert!(!fields.is_empty());
                    prop_assert!(fields.iter().all(|field| field.mutability() == Mutability::Mutable));
                    prop_assert!(!desired.update_request(&fields).is_empty()
                        || fields.iter().all(|field| field.value(&desired).is_none()));
                }
            }
        }
    }
}
