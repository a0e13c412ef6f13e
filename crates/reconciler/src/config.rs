//! Lifecycle of configuration objects.

use dps_provisioning::{
    Config, CreateConfigRequest, ProvisioningClient, ProvisioningError, UpdateConfigRequest,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::values::{ApplyReport, ConfigTarget, ConfigValueReconciler, ConfigValues, ValueDiff};

/// Desired state of a configuration object.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct ConfigSpec {
    /// Display name.
    pub name: String,

    /// Topology the configuration applies to.
    pub topology: String,

    /// Server version the configuration applies to.
    pub version: String,

    /// Permit variables that need a service restart.
    #[serde(default)]
    pub allow_restart: bool,

    /// Server variables to set.
    #[serde(default)]
    pub values: ConfigValues,
}

impl ConfigSpec {
    /// Catalog target for an existing object with the given id.
    #[must_use]
    pub fn target<'a>(&'a self, config_id: &'a str) -> ConfigTarget<'a> {
        ConfigTarget {
            config_id,
            topology: &self.topology,
            version: &self.version,
        }
    }
}

/// Creates, renames, updates and deletes configuration objects.
#[derive(Clone, Debug)]
pub struct ConfigObjectController<C>
where
    C: ProvisioningClient,
{
    client: C,
    values: ConfigValueReconciler<C>,
}

impl<C> ConfigObjectController<C>
where
    C: ProvisioningClient,
{
    /// Create a controller.
    pub fn new(client: C) -> Self {
        Self {
            values: ConfigValueReconciler::new(client.clone()),
            client,
        }
    }

    /// Create a configuration object and set its values.
    ///
    /// The restart gate runs before anything is created, so a rejected spec
    /// leaves nothing behind.
    ///
    /// # Errors
    ///
    /// [`Error::MissingFields`], the restart gate's errors, remote errors from
    /// creation, or [`Error::PartialApply`] naming the new object when a value
    /// fails to set.
    pub async fn create(&self, spec: &ConfigSpec) -> Result<Config> {
        let missing: Vec<_> = [
            ("name", &spec.name),
            ("topology", &spec.topology),
            ("version", &spec.version),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(name, _)| name)
        .collect();
        if !missing.is_empty() {
            return Err(Error::MissingFields { fields: missing });
        }

        let diff = ValueDiff::between(&ConfigValues::new(), &spec.values);
        if !spec.allow_restart {
            self.values
                .validator()
                .ensure_restart_safe(&spec.topology, &spec.version, &diff.changed_names())
                .await?;
        }

        let config = self
            .client
            .create_config(&CreateConfigRequest {
                name: spec.name.clone(),
                topology: spec.topology.clone(),
                version: spec.version.clone(),
            })
            .await
            .map_err(|e| Error::remote("create config", &e))?;
        info!("created config {} ({})", config.id, config.name);

        self.values
            .apply(&config.id, &diff, spec.allow_restart)
            .await?;

        Ok(config)
    }

    /// Fetch a configuration object; `None` if it no longer exists.
    ///
    /// # Errors
    ///
    /// Remote errors other than not-found.
    pub async fn read(&self, config_id: &str) -> Result<Option<Config>> {
        match self.client.get_config(config_id).await {
            Ok(config) => Ok(Some(config)),
            Err(e) if e.is_not_found() => {
                warn!("config {} not found", config_id);
                Ok(None)
            }
            Err(e) => Err(Error::remote("get config", &e)),
        }
    }

    /// Move an existing object from `prior` to `desired`: rename it if needed,
    /// then reconcile its values.
    ///
    /// # Errors
    ///
    /// [`Error::ReplacementRequired`] when topology or version changed, with
    /// nothing sent. Otherwise remote errors or the value reconciler's errors.
    pub async fn update(
        &self,
        config_id: &str,
        prior: &ConfigSpec,
        desired: &ConfigSpec,
    ) -> Result<ApplyReport> {
        let mut replaced = Vec::new();
        if prior.topology != desired.topology {
            replaced.push("topology");
        }
        if prior.version != desired.version {
            replaced.push("version");
        }
        if !replaced.is_empty() {
            return Err(Error::ReplacementRequired { fields: replaced });
        }

        if prior.name != desired.name {
            self.client
                .update_config(
                    config_id,
                    &UpdateConfigRequest {
                        name: desired.name.clone(),
                    },
                )
                .await
                .map_err(|e| Error::remote("update config", &e))?;
            info!("renamed config {} to {}", config_id, desired.name);
        }

        self.values
            .reconcile(
                &desired.target(config_id),
                &prior.values,
                &desired.values,
                desired.allow_restart,
            )
            .await
    }

    /// Delete a configuration object. Already gone counts as deleted.
    ///
    /// # Errors
    ///
    /// Remote errors other than not-found.
    pub async fn delete(&self, config_id: &str) -> Result<()> {
        match self.client.delete_config(config_id).await {
            Ok(()) => {
                info!("deleted config {}", config_id);
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                warn!("config {} already deleted", config_id);
                Ok(())
            }
            Err(e) => Err(Error::remote("delete config", &e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use dps_provisioning::ConfigKey;
    use dps_provisioning_mock::{Call, MockProvisioningClient};

    use super::*;
    use crate::error::ErrorKind;

    fn spec(values: &[(&str, &str)]) -> ConfigSpec {
        ConfigSpec {
            name: "tuned".to_string(),
            topology: "es-single".to_string(),
            version: "10.6".to_string(),
            allow_restart: false,
            values: values
                .iter()
                .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
                .collect(),
        }
    }

    fn mock() -> MockProvisioningClient {
        let mock = MockProvisioningClient::new();
        mock.set_catalog(
            "es-single",
            "10.6",
            vec![
                ConfigKey::new("max_connections", false),
                ConfigKey::new("innodb_buffer_pool_size", true),
            ],
        );
        mock
    }

    #[tokio::test]
    async fn test_create_gates_before_creating() {
        let mock = mock();
        let controller = ConfigObjectController::new(mock.clone());

        let error = controller
            .create(&spec(&[("innodb_buffer_pool_size", "4G")]))
            .await
            .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::Validation);
        assert!(mock.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_create_sets_values_in_order() {
        let mock = mock();
        let controller = ConfigObjectController::new(mock.clone());

        let config = controller
            .create(&spec(&[("wait_timeout", "600"), ("max_connections", "500")]))
            .await
            .unwrap();

        let set: Vec<_> = mock
            .mutations()
            .into_iter()
            .filter_map(|call| match call {
                Call::SetConfigValue { variable, .. } => Some(variable),
                _ => None,
            })
            .collect();
        assert_eq!(set, vec!["max_connections", "wait_timeout"]);
        assert_eq!(mock.config_values(&config.id).len(), 2);
    }

    #[tokio::test]
    async fn test_create_requires_topology_and_version() {
        let controller = ConfigObjectController::new(mock());
        let spec = ConfigSpec {
            version: String::new(),
            ..spec(&[])
        };

        match controller.create(&spec).await.unwrap_err() {
            Error::MissingFields { fields } => assert_eq!(fields, vec!["version"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_update_topology_requires_replacement() {
        let mock = mock();
        let controller = ConfigObjectController::new(mock.clone());
        let desired = ConfigSpec {
            topology: "es-replica".to_string(),
            ..spec(&[])
        };

        let error = controller
            .update("cfg-1", &spec(&[]), &desired)
            .await
            .unwrap_err();

        assert!(matches!(error, Error::ReplacementRequired { .. }));
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_update_renames_and_reconciles() {
        let mock = mock();
        let controller = ConfigObjectController::new(mock.clone());
        let prior = spec(&[("max_connections", "500")]);
        let config = controller.create(&prior).await.unwrap();
        mock.clear_calls();

        let desired = ConfigSpec {
            name: "renamed".to_string(),
            ..spec(&[])
        };
        let report = controller.update(&config.id, &prior, &desired).await.unwrap();

        assert_eq!(report.unset, vec!["max_connections"]);
        assert_eq!(mock.config(&config.id).unwrap().name, "renamed");
        assert!(mock.config_values(&config.id).is_empty());
    }

    #[tokio::test]
    async fn test_read_and_delete_treat_absent_as_gone() {
        let controller = ConfigObjectController::new(mock());

        assert!(controller.read("cfg-404").await.unwrap().is_none());
        controller.delete("cfg-404").await.unwrap();
    }
}
