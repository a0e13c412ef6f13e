//! Addresses allowed to connect to a service.

use dps_provisioning::{
    AddAllowedAddressRequest, AllowlistEntry, AllowlistStatus, ProvisioningClient,
    ProvisioningError,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::poll::{Poll, PollTarget, poll_until};
use crate::service::ControllerConfig;

/// Desired allowlist entry on a service.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct AllowlistSpec {
    /// Service the address is allowed on.
    pub service_id: String,

    /// Address in CIDR notation, e.g. `203.0.113.7/32`.
    pub ip_address: String,

    /// Free-form note.
    pub comment: Option<String>,

    /// Block until the remote system enforces the entry.
    pub wait_for_install: bool,
}

impl Default for AllowlistSpec {
    fn default() -> Self {
        Self {
            service_id: String::new(),
            ip_address: String::new(),
            comment: None,
            wait_for_install: true,
        }
    }
}

impl AllowlistSpec {
    /// Check the entry can be submitted.
    ///
    /// # Errors
    ///
    /// [`Error::MissingFields`] when the service or address is unset, and
    /// [`Error::PreconditionFailed`] when the address has no subnet mask.
    pub fn validate(&self) -> Result<()> {
        let missing: Vec<_> = [
            ("service_id", &self.service_id),
            ("ip_address", &self.ip_address),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(name, _)| name)
        .collect();
        if !missing.is_empty() {
            return Err(Error::MissingFields { fields: missing });
        }

        if !self.ip_address.contains('/') {
            return Err(Error::precondition(
                "ip_address",
                format!("must include a subnet mask, e.g. {}/32", self.ip_address),
            ));
        }

        Ok(())
    }

    fn add_request(&self) -> AddAllowedAddressRequest {
        AddAllowedAddressRequest {
            ip_address: self.ip_address.clone(),
            comment: self.comment.clone().filter(|comment| !comment.is_empty()),
        }
    }
}

/// Adds, reads and removes allowlist entries.
#[derive(Clone, Debug)]
pub struct AllowlistController<C>
where
    C: ProvisioningClient,
{
    client: C,
    config: ControllerConfig,
}

impl<C> AllowlistController<C>
where
    C: ProvisioningClient,
{
    /// Create a controller.
    pub const fn new(client: C, config: ControllerConfig) -> Self {
        Self { client, config }
    }

    /// Allow an address and, if `wait_for_install` is set, wait until the
    /// remote system enforces it.
    ///
    /// # Errors
    ///
    /// Validation errors before anything is sent, remote errors, and the
    /// poll's timeout/cancellation errors.
    pub async fn add(
        &self,
        spec: &AllowlistSpec,
        cancel: &CancellationToken,
    ) -> Result<AllowlistEntry> {
        spec.validate()?;

        let entry = self
            .client
            .add_allowed_address(&spec.service_id, &spec.add_request())
            .await
            .map_err(|e| Error::remote("add allowed address", &e))?;
        info!("allowing {} on service {}", spec.ip_address, spec.service_id);

        if !spec.wait_for_install || entry.status == AllowlistStatus::Enforcing {
            return Ok(entry);
        }

        let resource = format!(
            "allowlist entry {} on service {}",
            spec.ip_address, spec.service_id
        );
        let client = &self.client;
        let service_id = spec.service_id.as_str();
        let ip_address = spec.ip_address.as_str();
        poll_until(
            PollTarget {
                operation: "installation",
                resource: &resource,
            },
            &self.config.options(self.config.allowlist_timeout),
            cancel,
            move || client.list_allowed_addresses(service_id),
            |observed| classify_installation(service_id, ip_address, observed),
        )
        .await
    }

    /// Every address allowed on a service.
    ///
    /// # Errors
    ///
    /// Remote errors.
    pub async fn list(&self, service_id: &str) -> Result<Vec<AllowlistEntry>> {
        self.client
            .list_allowed_addresses(service_id)
            .await
            .map_err(|e| Error::remote("list allowed addresses", &e))
    }

    /// Find one entry by listing the service's allowlist; `None` if either the
    /// entry or the service is gone.
    ///
    /// # Errors
    ///
    /// Remote errors other than not-found.
    pub async fn read(
        &self,
        service_id: &str,
        ip_address: &str,
    ) -> Result<Option<AllowlistEntry>> {
        let entries = match self.client.list_allowed_addresses(service_id).await {
            Ok(entries) => entries,
            Err(e) if e.is_not_found() => {
                warn!("service {} not found", service_id);
                return Ok(None);
            }
            Err(e) => return Err(Error::remote("list allowed addresses", &e)),
        };

        let entry = entries
            .into_iter()
            .find(|entry| entry.ip_address == ip_address);
        if entry.is_none() {
            debug!("{} is not allowed on service {}", ip_address, service_id);
        }
        Ok(entry)
    }

    /// Stop allowing an address. Already gone counts as removed.
    ///
    /// # Errors
    ///
    /// Remote errors other than not-found.
    pub async fn remove(&self, service_id: &str, ip_address: &str) -> Result<()> {
        match self
            .client
            .remove_allowed_address(service_id, ip_address)
            .await
        {
            Ok(()) => {
                info!("removed {} from service {}", ip_address, service_id);
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                warn!("{} already absent from service {}", ip_address, service_id);
                Ok(())
            }
            Err(e) => Err(Error::remote("remove allowed address", &e)),
        }
    }
}

fn classify_installation<E: ProvisioningError>(
    service_id: &str,
    ip_address: &str,
    observed: std::result::Result<Vec<AllowlistEntry>, E>,
) -> Poll<AllowlistEntry> {
    let entries = match observed {
        Ok(entries) => entries,
        Err(e) if e.kind().is_transient() => {
            warn!(
                "transient error listing allowlist of service {}: {}",
                service_id, e
            );
            return Poll::Pending(format!("transient error: {e}"));
        }
        Err(e) => return Poll::Failed(Error::remote("list allowed addresses", &e)),
    };

    match entries
        .into_iter()
        .find(|entry| entry.ip_address == ip_address)
    {
        Some(entry) if entry.status == AllowlistStatus::Enforcing => Poll::Ready(entry),
        Some(entry) => Poll::Pending(format!("status {}", entry.status)),
        None => Poll::Pending("not yet listed".to_string()),
    }
}
