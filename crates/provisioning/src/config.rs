use serde::{Deserialize, Serialize};

/// A named, reusable set of server-variable overrides scoped to a topology
/// and server version.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Identifier assigned by the remote system.
    pub id: String,

    /// Configuration name, unique within the organization.
    pub name: String,

    /// Resolved topology id.
    #[serde(default)]
    pub topology_id: String,

    /// Resolved server version id.
    #[serde(default)]
    pub version_id: String,

    /// Whether the configuration is shared publicly.
    #[serde(default)]
    pub public: bool,

    /// Services the configuration is applied to.
    #[serde(default, deserialize_with = "crate::serde_null::deserialize")]
    pub services: Vec<String>,

    /// Creation time (unix seconds).
    #[serde(default)]
    pub created_date: i64,

    /// Last update time (unix seconds).
    #[serde(default)]
    pub updated_date: i64,
}

/// Request body for `POST /configs`. Topology and version are given by name and
/// resolved to ids by the remote system.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct CreateConfigRequest {
    /// Configuration name.
    pub name: String,

    /// Topology name (e.g. `es-single`).
    pub topology: String,

    /// Server version (e.g. `10.6.11-6-1`).
    pub version: String,
}

/// Request body for `PATCH /configs/{id}`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct UpdateConfigRequest {
    /// New configuration name.
    pub name: String,
}

/// Request body for `POST /configs/{id}/values/{name}`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ConfigValueRequest {
    /// Value to set.
    pub value: String,
}

/// One configurable server variable in the catalog for a topology/version.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ConfigKey {
    /// Catalog entry id.
    #[serde(default)]
    pub id: String,

    /// Variable name.
    pub name: String,

    /// Component the variable belongs to (e.g. `mariadb`, `maxscale`).
    #[serde(default)]
    pub component: String,

    /// Raw flag bits.
    #[serde(default)]
    pub flags: u32,

    /// Configuration file section.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_section: Option<String>,

    /// Free-form tags.
    #[serde(default, deserialize_with = "crate::serde_null::deserialize")]
    pub tags: Vec<String>,

    /// Allowed values, when the variable is an enumeration.
    #[serde(default, deserialize_with = "crate::serde_null::deserialize")]
    pub allowed_values: Vec<String>,

    /// Default values.
    #[serde(
        default,
        rename = "default_value",
        deserialize_with = "crate::serde_null::deserialize"
    )]
    pub default_values: Vec<String>,

    /// Link to the variable's documentation.
    #[serde(default, rename = "documentation_url", skip_serializing_if = "Option::is_none")]
    pub doc_url: Option<String>,

    /// Whether the variable cannot be changed.
    #[serde(default)]
    pub readonly: bool,

    /// Whether several allowed values may be combined.
    #[serde(default)]
    pub multiselect: bool,

    /// Whether changing the variable requires a service restart.
    #[serde(default)]
    pub requires_restart: bool,

    /// Lower bound, for numeric variables.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_value: Option<String>,

    /// Upper bound, for numeric variables.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum_value: Option<String>,
}

impl ConfigKey {
    /// Convenience constructor for a catalog entry with only the restart flag set.
    #[must_use]
    pub fn new(name: impl Into<String>, requires_restart: bool) -> Self {
        Self {
            name: name.into(),
            requires_restart,
            ..Self::default()
        }
    }
}
