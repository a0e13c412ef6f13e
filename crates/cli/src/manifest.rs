//! The declarative manifest: at most one configuration object and at most one
//! service.

use std::path::Path;

use dps_reconciler::{ConfigSpec, ServiceField, ServiceSpec};
use serde::Deserialize;

use crate::error::{Error, Result};

/// Desired state read from a TOML manifest.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Configuration object to manage.
    pub config: Option<ConfigSpec>,

    /// Service to manage.
    pub service: Option<ServiceManifest>,
}

const USE_MANAGED_CONFIG: &str = "use_managed_config";

/// The `[service]` table.
#[derive(Clone, Debug, Deserialize)]
#[serde(try_from = "toml::Table")]
pub struct ServiceManifest {
    /// Attach the manifest's own `[config]` object to the service.
    pub use_managed_config: bool,

    /// Service fields.
    pub spec: ServiceSpec,
}

impl TryFrom<toml::Table> for ServiceManifest {
    type Error = String;

    fn try_from(mut table: toml::Table) -> std::result::Result<Self, String> {
        let unknown: Vec<_> = table
            .keys()
            .map(String::as_str)
            .filter(|key| {
                *key != USE_MANAGED_CONFIG
                    && !ServiceField::ALL.iter().any(|field| field.name() == *key)
            })
            .collect();
        if !unknown.is_empty() {
            return Err(format!("unknown [service] field(s): {}", unknown.join(", ")));
        }

        let use_managed_config = match table.remove(USE_MANAGED_CONFIG) {
            None => false,
            Some(toml::Value::Boolean(value)) => value,
            Some(other) => {
                return Err(format!(
                    "{USE_MANAGED_CONFIG} must be a boolean, found {}",
                    other.type_str()
                ));
            }
        };

        let spec = toml::Value::Table(table)
            .try_into::<ServiceSpec>()
            .map_err(|e| e.to_string())?;

        Ok(Self {
            use_managed_config,
            spec,
        })
    }
}

impl Manifest {
    /// Read and check a manifest file.
    ///
    /// # Errors
    ///
    /// I/O and parse errors, and [`Error::ManifestRule`] for inconsistent
    /// manifests.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let manifest = Self::parse(&contents).map_err(|source| Error::Manifest {
            path: path.to_path_buf(),
            source,
        })?;
        manifest.check()?;

        Ok(manifest)
    }

    /// Parse manifest text without checking it.
    ///
    /// # Errors
    ///
    /// The TOML parse error.
    pub fn parse(contents: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Reject manifests whose sections contradict each other.
    ///
    /// # Errors
    ///
    /// [`Error::ManifestRule`] describing the contradiction.
    pub fn check(&self) -> Result<()> {
        let Some(service) = &self.service else {
            return Ok(());
        };

        if service.use_managed_config {
            if self.config.is_none() {
                return Err(Error::ManifestRule(
                    "use_managed_config requires a [config] table".to_string(),
                ));
            }
            if service.spec.desired_config_id().is_some() {
                return Err(Error::ManifestRule(
                    "set either config_id or use_managed_config, not both".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// The desired service spec, with the managed config's id filled in when
    /// `use_managed_config` is set.
    #[must_use]
    pub fn service_spec(&self, managed_config_id: Option<&str>) -> Option<ServiceSpec> {
        self.service.as_ref().map(|service| {
            let mut spec = service.spec.clone();
            if service.use_managed_config {
                spec.config_id = managed_config_id.map(ToString::to_string);
            }
            spec
        })
    }
}
