//! Restart-safety checks against the configurable-parameter catalog.

use std::collections::HashMap;

use dps_provisioning::{ProvisioningClient, ProvisioningError};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Decides whether setting a group of variables would force a service
/// restart.
#[derive(Clone, Debug)]
pub struct RestartSafetyValidator<C>
where
    C: ProvisioningClient,
{
    client: C,
}

impl<C> RestartSafetyValidator<C>
where
    C: ProvisioningClient,
{
    /// Create a validator.
    pub const fn new(client: C) -> Self {
        Self { client }
    }

    /// Names from `names` that the catalog flags as requiring a restart,
    /// sorted and without duplicates.
    ///
    /// Fetches the catalog once per call. Names missing from the catalog are
    /// treated as safe; the remote system has the final say when they are set.
    ///
    /// # Errors
    ///
    /// [`Error::CatalogUnavailable`] when the catalog cannot be fetched.
    pub async fn check_restart_variables<S>(
        &self,
        topology: &str,
        version: &str,
        names: &[S],
    ) -> Result<Vec<String>>
    where
        S: AsRef<str> + Sync,
    {
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let keys = self
            .client
            .get_config_keys(topology, version)
            .await
            .map_err(|e| {
                warn!(
                    "failed to fetch config keys for {} {}: {}",
                    topology, version, e
                );
                Error::CatalogUnavailable {
                    topology: topology.to_string(),
                    version: version.to_string(),
                    reason: e.to_string(),
                    transient: e.kind().is_transient(),
                }
            })?;

        let requires_restart: HashMap<&str, bool> = keys
            .iter()
            .map(|key| (key.name.as_str(), key.requires_restart))
            .collect();

        let mut flagged: Vec<String> = names
            .iter()
            .map(AsRef::as_ref)
            .filter(|name| {
                let known = requires_restart.get(name);
                if known.is_none() {
                    debug!("variable {} not in catalog for {} {}", name, topology, version);
                }
                known.copied().unwrap_or(false)
            })
            .map(ToString::to_string)
            .collect();
        flagged.sort();
        flagged.dedup();

        Ok(flagged)
    }

    /// Fail with [`Error::RestartRequired`] if any of `names` requires a
    /// restart.
    ///
    /// # Errors
    ///
    /// [`Error::RestartRequired`] naming the offending variables, or
    /// [`Error::CatalogUnavailable`].
    pub async fn ensure_restart_safe<S>(
        &self,
        topology: &str,
        version: &str,
        names: &[S],
    ) -> Result<()>
    where
        S: AsRef<str> + Sync,
    {
        let variables = self
            .check_restart_variables(topology, version, names)
            .await?;

        if variables.is_empty() {
            Ok(())
        } else {
            Err(Error::RestartRequired { variables })
        }
    }
}
