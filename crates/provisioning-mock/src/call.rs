use dps_provisioning::UpdateServiceRequest;

/// A call received by the mock, in the order it arrived.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Call {
    /// `POST /services`
    CreateService {
        /// Requested service name.
        name: String,
    },

    /// `GET /services/{id}`
    GetService {
        /// Service id.
        service_id: String,
    },

    /// `PATCH /services/{id}`
    UpdateService {
        /// Service id.
        service_id: String,

        /// Request body.
        request: UpdateServiceRequest,
    },

    /// `DELETE /services/{id}`
    DeleteService {
        /// Service id.
        service_id: String,
    },

    /// `POST /services/{id}/config`
    ApplyServiceConfig {
        /// Service id.
        service_id: String,

        /// Configuration to apply.
        config_id: String,
    },

    /// `DELETE /services/{id}/config`
    RemoveServiceConfig {
        /// Service id.
        service_id: String,
    },

    /// `GET /services/{id}/security/credentials`
    GetDefaultCredentials {
        /// Service id.
        service_id: String,
    },

    /// `GET /services/{id}/security/allowlist`
    ListAllowedAddresses {
        /// Service id.
        service_id: String,
    },

    /// `POST /services/{id}/security/allowlist`
    AddAllowedAddress {
        /// Service id.
        service_id: String,

        /// Address being allowed.
        ip_address: String,
    },

    /// `DELETE /services/{id}/security/allowlist/{ip}`
    RemoveAllowedAddress {
        /// Service id.
        service_id: String,

        /// Address being removed.
        ip_address: String,
    },

    /// `POST /configs`
    CreateConfig {
        /// Requested configuration name.
        name: String,
    },

    /// `GET /configs/{id}`
    GetConfig {
        /// Configuration id.
        config_id: String,
    },

    /// `PATCH /configs/{id}`
    UpdateConfig {
        /// Configuration id.
        config_id: String,

        /// New name.
        name: String,
    },

    /// `DELETE /configs/{id}`
    DeleteConfig {
        /// Configuration id.
        config_id: String,
    },

    /// `POST /configs/{id}/values/{name}`
    SetConfigValue {
        /// Configuration id.
        config_id: String,

        /// Variable name.
        variable: String,

        /// Value.
        value: String,

        /// `allow_restart` query parameter.
        allow_restart: bool,
    },

    /// `DELETE /configs/{id}/values/{name}`
    UnsetConfigValue {
        /// Configuration id.
        config_id: String,

        /// Variable name.
        variable: String,

        /// `allow_restart` query parameter.
        allow_restart: bool,
    },

    /// `GET /topologies/{topology}/configs`
    GetConfigKeys {
        /// Topology name.
        topology: String,

        /// Server version.
        version: String,
    },
}

impl Call {
    /// Whether this call changes remote state.
    #[must_use]
    pub const fn is_mutation(&self) -> bool {
        !matches!(
            self,
            Self::GetService { .. }
                | Self::GetDefaultCredentials { .. }
                | Self::ListAllowedAddresses { .. }
                | Self::GetConfig { .. }
                | Self::GetConfigKeys { .. }
        )
    }

    /// Whether this call sets or unsets a configuration value.
    #[must_use]
    pub const fn is_value_mutation(&self) -> bool {
        matches!(
            self,
            Self::SetConfigValue { .. } | Self::UnsetConfigValue { .. }
        )
    }

    /// The point at which a failure for this call can be injected.
    pub(crate) fn failure_point(&self) -> FailurePoint {
        match self {
            Self::CreateService { .. } => FailurePoint::CreateService,
            Self::GetService { .. } => FailurePoint::GetService,
            Self::UpdateService { .. } => FailurePoint::UpdateService,
            Self::DeleteService { .. } => FailurePoint::DeleteService,
            Self::ApplyServiceConfig { .. } => FailurePoint::ApplyServiceConfig,
            Self::RemoveServiceConfig { .. } => FailurePoint::RemoveServiceConfig,
            Self::GetDefaultCredentials { .. } => FailurePoint::GetDefaultCredentials,
            Self::ListAllowedAddresses { .. } => FailurePoint::ListAllowedAddresses,
            Self::AddAllowedAddress { .. } => FailurePoint::AddAllowedAddress,
            Self::RemoveAllowedAddress { .. } => FailurePoint::RemoveAllowedAddress,
            Self::CreateConfig { .. } => FailurePoint::CreateConfig,
            Self::GetConfig { .. } => FailurePoint::GetConfig,
            Self::UpdateConfig { .. } => FailurePoint::UpdateConfig,
            Self::DeleteConfig { .. } => FailurePoint::DeleteConfig,
            Self::SetConfigValue { variable, .. } => FailurePoint::SetConfigValue(variable.clone()),
            Self::UnsetConfigValue { variable, .. } => {
                FailurePoint::UnsetConfigValue(variable.clone())
            }
            Self::GetConfigKeys { .. } => FailurePoint::GetConfigKeys,
        }
    }
}

/// Where a one-shot failure is injected.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum FailurePoint {
    /// Next service creation.
    CreateService,

    /// Next service read.
    GetService,

    /// Next service update.
    UpdateService,

    /// Next service deletion.
    DeleteService,

    /// Next config attach.
    ApplyServiceConfig,

    /// Next config detach.
    RemoveServiceConfig,

    /// Next credentials fetch.
    GetDefaultCredentials,

    /// Next allowlist listing.
    ListAllowedAddresses,

    /// Next allowlist addition.
    AddAllowedAddress,

    /// Next allowlist removal.
    RemoveAllowedAddress,

    /// Next configuration creation.
    CreateConfig,

    /// Next configuration read.
    GetConfig,

    /// Next configuration rename.
    UpdateConfig,

    /// Next configuration deletion.
    DeleteConfig,

    /// Next set of the named variable.
    SetConfigValue(String),

    /// Next unset of the named variable.
    UnsetConfigValue(String),

    /// Next catalog fetch.
    GetConfigKeys,
}
