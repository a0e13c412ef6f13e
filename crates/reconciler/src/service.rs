//! Lifecycle of managed database services.
//!
//! [`ServiceLifecycleController`] drives a service through creation, in-place
//! update, replacement, config attachment and deletion. Each remote mutation is
//! followed by a poll that waits for the service to report the expected state.

use std::time::Duration;

use dps_provisioning::{
    DefaultCredentials, ProvisioningClient, ProvisioningError, Service, ServiceStatus,
    UpdateServiceRequest,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::poll::{Poll, PollOptions, PollTarget, poll_until};
use crate::schema::{ServiceField, ServicePlan, ServiceSpec, plan};

/// Poll cadence and per-operation deadlines.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ControllerConfig {
    /// Delay between status checks.
    pub poll_interval: Duration,

    /// How long to wait for a new service to become ready.
    pub create_timeout: Duration,

    /// How long to wait for an in-place update to roll out.
    pub update_timeout: Duration,

    /// How long to wait for a deleted service to disappear.
    pub delete_timeout: Duration,

    /// How long to wait for a config attach/detach to take effect.
    pub config_timeout: Duration,

    /// How long to wait for an allowlist entry to be enforced.
    pub allowlist_timeout: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            create_timeout: Duration::from_secs(60 * 60),
            update_timeout: Duration::from_secs(60 * 60),
            delete_timeout: Duration::from_secs(60 * 60),
            config_timeout: Duration::from_secs(30 * 60),
            allowlist_timeout: Duration::from_secs(60 * 60),
        }
    }
}

impl ControllerConfig {
    /// Use the same interval and timeout for every operation.
    #[must_use]
    pub const fn uniform(poll_interval: Duration, timeout: Duration) -> Self {
        Self {
            poll_interval,
            create_timeout: timeout,
            update_timeout: timeout,
            delete_timeout: timeout,
            config_timeout: timeout,
            allowlist_timeout: timeout,
        }
    }

    /// Poll options for a wait bounded by `timeout`.
    #[must_use]
    pub const fn options(&self, timeout: Duration) -> PollOptions {
        PollOptions::new(self.poll_interval, timeout)
    }
}

/// A service previously created from `spec`.
#[derive(Clone, Copy, Debug)]
pub struct ExistingService<'a> {
    /// Remote id.
    pub service_id: &'a str,

    /// Spec the service was last reconciled to.
    pub spec: &'a ServiceSpec,
}

/// What a status poll is waiting for.
#[derive(Clone, Copy, Debug)]
enum Awaiting<'a> {
    Creation,
    Update(&'a UpdateServiceRequest),
    Config(Option<&'a str>),
}

impl Awaiting<'_> {
    const fn operation(&self) -> &'static str {
        match self {
            Self::Creation => "creation",
            Self::Update(_) => "update",
            Self::Config(_) => "config change",
        }
    }
}

/// Drives services towards their desired spec.
#[derive(Clone, Debug)]
pub struct ServiceLifecycleController<C>
where
    C: ProvisioningClient,
{
    client: C,
    config: ControllerConfig,
}

impl<C> ServiceLifecycleController<C>
where
    C: ProvisioningClient,
{
    /// Create a controller.
    pub const fn new(client: C, config: ControllerConfig) -> Self {
        Self { client, config }
    }

    /// Create a service and, if `wait_for_creation` is set, wait for it to be
    /// ready and attach the desired config.
    ///
    /// # Errors
    ///
    /// Validation errors before anything is sent, remote errors,
    /// [`Error::ProvisioningFailed`] when the service lands in a failure
    /// status, and the poll's timeout/cancellation errors.
    pub async fn create(&self, spec: &ServiceSpec, cancel: &CancellationToken) -> Result<Service> {
        let service = self.submit(spec).await?;

        if !spec.wait_for_creation {
            return Ok(service);
        }

        let service = self.await_creation(&service.id, cancel).await?;

        if spec.desired_config_id().is_some() {
            self.ensure_config(&service.id, spec.desired_config_id(), cancel)
                .await
        } else {
            Ok(service)
        }
    }

    /// Validate `spec` and submit the creation request without waiting.
    ///
    /// # Errors
    ///
    /// Validation errors before anything is sent, then remote errors.
    pub async fn submit(&self, spec: &ServiceSpec) -> Result<Service> {
        spec.validate()?;

        let service = self
            .client
            .create_service(&spec.create_request())
            .await
            .map_err(|e| Error::remote("create service", &e))?;
        info!("submitted creation of service {} ({})", service.id, service.name);

        Ok(service)
    }

    /// Wait for a submitted service to become ready.
    ///
    /// # Errors
    ///
    /// [`Error::ProvisioningFailed`] on a failure status, and the poll's
    /// timeout/cancellation errors.
    pub async fn await_creation(
        &self,
        service_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Service> {
        self.wait_for(
            service_id,
            Awaiting::Creation,
            self.config.create_timeout,
            cancel,
        )
        .await
    }

    /// Fetch a service; `None` if it no longer exists.
    ///
    /// # Errors
    ///
    /// Remote errors other than not-found.
    pub async fn read(&self, service_id: &str) -> Result<Option<Service>> {
        match self.client.get_service(service_id).await {
            Ok(service) => Ok(Some(service)),
            Err(e) if e.is_not_found() => {
                warn!("service {} not found", service_id);
                Ok(None)
            }
            Err(e) => Err(Error::remote("get service", &e)),
        }
    }

    /// Fetch the default database credentials generated for a service.
    ///
    /// # Errors
    ///
    /// Remote errors, and [`Error::RemoteRejected`] when the response carries
    /// no username or password.
    pub async fn default_credentials(&self, service_id: &str) -> Result<DefaultCredentials> {
        let credentials = self
            .client
            .get_default_credentials(service_id)
            .await
            .map_err(|e| Error::remote("get default credentials", &e))?;

        if credentials.username.is_empty() || credentials.password.is_empty() {
            return Err(Error::RemoteRejected {
                operation: "get default credentials".to_string(),
                status: None,
                message: format!("no username or password returned for service {service_id}"),
            });
        }

        Ok(credentials)
    }

    /// Apply in-place changes between `prior` and `desired` and wait for them
    /// to roll out. Does not touch the config attachment.
    ///
    /// # Errors
    ///
    /// [`Error::ReplacementRequired`] when an immutable field changed, with
    /// nothing sent. Otherwise remote and poll errors.
    pub async fn update(
        &self,
        service_id: &str,
        prior: &ServiceSpec,
        desired: &ServiceSpec,
        cancel: &CancellationToken,
    ) -> Result<Service> {
        let fields = match plan(prior, desired) {
            ServicePlan::Replace(fields) => {
                return Err(Error::ReplacementRequired {
                    fields: fields.iter().map(|field| field.name()).collect(),
                });
            }
            ServicePlan::UpdateInPlace(fields) => fields,
            ServicePlan::NoChange => Vec::new(),
        };

        let request = desired.update_request(&fields);
        if request.is_empty() {
            debug!("service {} needs no in-place update", service_id);
            return self.get(service_id).await;
        }

        self.client
            .update_service(service_id, &request)
            .await
            .map_err(|e| Error::remote("update service", &e))?;
        info!(
            "submitted update of {} on service {}",
            field_list(&fields),
            service_id
        );

        self.wait_for(
            service_id,
            Awaiting::Update(&request),
            self.config.update_timeout,
            cancel,
        )
        .await
    }

    /// Bring a service to `desired`: create it if there is none, replace it if
    /// an immutable field changed, update it in place otherwise, then
    /// reconcile its config attachment.
    ///
    /// A replacement deletes the old service, waits for it to disappear, and
    /// creates a new one; `deletion_protection` on `desired` blocks it.
    ///
    /// # Errors
    ///
    /// Any error from the steps involved.
    pub async fn reconcile(
        &self,
        existing: Option<ExistingService<'_>>,
        desired: &ServiceSpec,
        cancel: &CancellationToken,
    ) -> Result<Service> {
        desired.validate()?;

        let Some(existing) = existing else {
            return self.create(desired, cancel).await;
        };

        if self.read(existing.service_id).await?.is_none() {
            info!(
                "service {} disappeared; creating a new one",
                existing.service_id
            );
            return self.create(desired, cancel).await;
        }

        match plan(existing.spec, desired) {
            ServicePlan::Replace(_) => {
                self.retire(existing, desired, cancel).await?;
                return self.create(desired, cancel).await;
            }
            ServicePlan::UpdateInPlace(_) => {
                self.update(existing.service_id, existing.spec, desired, cancel)
                    .await?;
            }
            ServicePlan::NoChange => {
                debug!("service {} needs no in-place update", existing.service_id);
            }
        }

        self.ensure_config(existing.service_id, desired.desired_config_id(), cancel)
            .await
    }

    /// Delete a service that must be replaced to reach `desired` and wait for
    /// it to disappear. `deletion_protection` on `desired` blocks it.
    ///
    /// # Errors
    ///
    /// [`Error::PreconditionFailed`] when protected, then remote and poll
    /// errors.
    pub async fn retire(
        &self,
        existing: ExistingService<'_>,
        desired: &ServiceSpec,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let fields = plan(existing.spec, desired).field_names().join(", ");

        if desired.deletion_protection {
            return Err(Error::precondition(
                ServiceField::DeletionProtection.name(),
                format!(
                    "is enabled; disable it to replace service {} (changed: {fields})",
                    existing.service_id
                ),
            ));
        }

        info!(
            "replacing service {} (changed: {})",
            existing.service_id, fields
        );
        self.delete_and_wait(existing.service_id, true, cancel)
            .await
    }

    /// Make `desired` the config attached to a service, detaching when `None`.
    ///
    /// No-op when the service already reports the desired config. Otherwise
    /// the service must be ready.
    ///
    /// # Errors
    ///
    /// [`Error::PreconditionFailed`] when a change is needed but the service is
    /// not ready, then remote and poll errors.
    pub async fn ensure_config(
        &self,
        service_id: &str,
        desired: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Service> {
        let desired = desired.filter(|id| !id.is_empty());
        let service = self.get(service_id).await?;

        if service.attached_config_id() == desired {
            debug!("service {} already has the desired config", service_id);
            return Ok(service);
        }

        if service.status != ServiceStatus::Ready {
            return Err(Error::precondition(
                ServiceField::ConfigId.name(),
                format!(
                    "requires prior convergence; service {service_id} is {}",
                    service.status
                ),
            ));
        }

        match desired {
            Some(config_id) => {
                self.client
                    .apply_service_config(service_id, config_id)
                    .await
                    .map_err(|e| Error::remote("apply service config", &e))?;
                info!("attaching config {} to service {}", config_id, service_id);
            }
            None => {
                self.client
                    .remove_service_config(service_id)
                    .await
                    .map_err(|e| Error::remote("remove service config", &e))?;
                info!("detaching config from service {}", service_id);
            }
        }

        self.wait_for(
            service_id,
            Awaiting::Config(desired),
            self.config.config_timeout,
            cancel,
        )
        .await
    }

    /// Delete a service. Already gone counts as deleted. Waits for it to
    /// disappear when `wait_for_deletion` is set.
    ///
    /// # Errors
    ///
    /// [`Error::PreconditionFailed`] when `deletion_protection` is set, then
    /// remote and poll errors.
    pub async fn delete(
        &self,
        service_id: &str,
        spec: &ServiceSpec,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if spec.deletion_protection {
            return Err(Error::precondition(
                ServiceField::DeletionProtection.name(),
                format!("is enabled; disable it to delete service {service_id}"),
            ));
        }

        self.delete_and_wait(service_id, spec.wait_for_deletion, cancel)
            .await
    }

    async fn delete_and_wait(
        &self,
        service_id: &str,
        wait: bool,
        cancel: &CancellationToken,
    ) -> Result<()> {
        match self.client.delete_service(service_id).await {
            Ok(()) => info!("submitted deletion of service {}", service_id),
            Err(e) if e.is_not_found() => {
                warn!("service {} already deleted", service_id);
                return Ok(());
            }
            Err(e) => return Err(Error::remote("delete service", &e)),
        }

        if !wait {
            return Ok(());
        }

        let resource = format!("service {service_id}");
        let client = &self.client;
        poll_until(
            PollTarget {
                operation: "deletion",
                resource: &resource,
            },
            &self.config.options(self.config.delete_timeout),
            cancel,
            move || client.get_service(service_id),
            |observed| classify_deletion(service_id, observed),
        )
        .await
    }

    async fn get(&self, service_id: &str) -> Result<Service> {
        self.client
            .get_service(service_id)
            .await
            .map_err(|e| Error::remote("get service", &e))
    }

    async fn wait_for(
        &self,
        service_id: &str,
        awaiting: Awaiting<'_>,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Service> {
        let resource = format!("service {service_id}");
        let client = &self.client;
        poll_until(
            PollTarget {
                operation: awaiting.operation(),
                resource: &resource,
            },
            &self.config.options(timeout),
            cancel,
            move || client.get_service(service_id),
            |observed| classify(service_id, awaiting, observed),
        )
        .await
    }
}

fn field_list(fields: &[ServiceField]) -> String {
    fields
        .iter()
        .map(|field| field.name())
        .collect::<Vec<_>>()
        .join(", ")
}

fn classify<E: ProvisioningError>(
    service_id: &str,
    awaiting: Awaiting<'_>,
    observed: std::result::Result<Service, E>,
) -> Poll<Service> {
    let service = match observed {
        Ok(service) => service,
        Err(e) if e.kind().is_transient() => {
            warn!("transient error reading service {}: {}", service_id, e);
            return Poll::Pending(format!("transient error: {e}"));
        }
        // A new service may not be visible to reads right away.
        Err(e) if e.is_not_found() && matches!(awaiting, Awaiting::Creation) => {
            return Poll::Pending("not yet visible".to_string());
        }
        Err(e) => return Poll::Failed(Error::remote("get service", &e)),
    };

    if service.status.is_failure() {
        return Poll::Failed(Error::ProvisioningFailed {
            service_id: service_id.to_string(),
            status: service.status,
        });
    }

    if service.status != ServiceStatus::Ready {
        return Poll::Pending(format!("status {}", service.status));
    }

    match awaiting {
        Awaiting::Creation => Poll::Ready(service),
        Awaiting::Update(request) => match update_mismatch(request, &service) {
            Some(mismatch) => Poll::Pending(mismatch),
            None => Poll::Ready(service),
        },
        Awaiting::Config(desired) => {
            let attached = service.attached_config_id();
            if attached == desired {
                Poll::Ready(service)
            } else {
                Poll::Pending(format!(
                    "config {} attached, want {}",
                    attached.unwrap_or("none"),
                    desired.unwrap_or("none")
                ))
            }
        }
    }
}

fn classify_deletion<E: ProvisioningError>(
    service_id: &str,
    observed: std::result::Result<Service, E>,
) -> Poll<()> {
    match observed {
        Err(e) if e.is_not_found() => Poll::Ready(()),
        Err(e) if e.kind().is_transient() => {
            warn!("transient error reading service {}: {}", service_id, e);
            Poll::Pending(format!("transient error: {e}"))
        }
        Err(e) => Poll::Failed(Error::remote("get service", &e)),
        Ok(service) if service.status.is_failure() => Poll::Failed(Error::ProvisioningFailed {
            service_id: service_id.to_string(),
            status: service.status,
        }),
        Ok(service) => Poll::Pending(format!("status {}", service.status)),
    }
}

/// Describes the first requested field the service does not report yet.
fn update_mismatch(request: &UpdateServiceRequest, service: &Service) -> Option<String> {
    let volume = &service.storage_volume;
    let checks = [
        ("nodes", request.nodes, service.nodes),
        ("storage", request.storage, volume.size),
        ("volume_iops", request.volume_iops, volume.iops),
        ("volume_throughput", request.volume_throughput, volume.throughput),
    ];

    for (name, wanted, reported) in checks {
        match wanted {
            Some(wanted) if wanted != reported => {
                return Some(format!("{name} is {reported}, want {wanted}"));
            }
            _ => {}
        }
    }

    match &request.volume_type {
        Some(wanted) if *wanted != volume.volume_type => Some(format!(
            "volume_type is {}, want {wanted}",
            volume.volume_type
        )),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use dps_provisioning_mock::Error as MockError;

    use super::*;
    use crate::error::ErrorKind;

    fn ready() -> Service {
        Service {
            id: "svc-1".to_string(),
            status: ServiceStatus::Ready,
            nodes: 1,
            ..Service::default()
        }
    }

    #[test]
    fn test_creation_tolerates_not_found_and_transient_errors() {
        let absent = classify::<MockError>(
            "svc-1",
            Awaiting::Creation,
            Err(MockError::NotFound("svc-1".to_string())),
        );
        assert!(matches!(absent, Poll::Pending(_)));

        let transient = classify::<MockError>(
            "svc-1",
            Awaiting::Creation,
            Err(MockError::unreachable("reset")),
        );
        assert!(matches!(transient, Poll::Pending(_)));
    }

    #[test]
    fn test_update_treats_not_found_as_failure() {
        let request = UpdateServiceRequest::default();
        let observed = classify::<MockError>(
            "svc-1",
            Awaiting::Update(&request),
            Err(MockError::NotFound("svc-1".to_string())),
        );

        match observed {
            Poll::Failed(error) => assert_eq!(error.kind(), ErrorKind::RemoteRejected),
            other => panic!("unexpected poll: {other:?}"),
        }
    }

    #[test]
    fn test_failure_status_is_terminal() {
        let failed = Service {
            status: ServiceStatus::Failed,
            ..ready()
        };

        let observed = classify::<MockError>("svc-1", Awaiting::Creation, Ok(failed));

        assert!(matches!(
            observed,
            Poll::Failed(Error::ProvisioningFailed {
                status: ServiceStatus::Failed,
                ..
            })
        ));
    }

    #[test]
    fn test_unknown_status_keeps_polling() {
        let unknown = Service {
            status: ServiceStatus::Unknown,
            ..ready()
        };

        let observed = classify::<MockError>("svc-1", Awaiting::Creation, Ok(unknown));

        match observed {
            Poll::Pending(observed) => assert_eq!(observed, "status unknown"),
            other => panic!("unexpected poll: {other:?}"),
        }
    }

    #[test]
    fn test_update_waits_for_requested_values() {
        let request = UpdateServiceRequest {
            nodes: Some(3),
            ..UpdateServiceRequest::default()
        };

        let stale = classify::<MockError>("svc-1", Awaiting::Update(&request), Ok(ready()));
        match stale {
            Poll::Pending(observed) => assert_eq!(observed, "nodes is 1, want 3"),
            other => panic!("unexpected poll: {other:?}"),
        }

        let rolled_out = Service { nodes: 3, ..ready() };
        assert!(matches!(
            classify::<MockError>("svc-1", Awaiting::Update(&request), Ok(rolled_out)),
            Poll::Ready(_)
        ));
    }

    #[test]
    fn test_config_wait_requires_matching_attachment() {
        let observed = classify::<MockError>("svc-1", Awaiting::Config(Some("cfg-2")), Ok(ready()));

        match observed {
            Poll::Pending(observed) => assert_eq!(observed, "config none attached, want cfg-2"),
            other => panic!("unexpected poll: {other:?}"),
        }
    }

    #[test]
    fn test_deletion_completes_on_not_found() {
        assert!(matches!(
            classify_deletion::<MockError>("svc-1", Err(MockError::NotFound("svc-1".to_string()))),
            Poll::Ready(())
        ));

        let pending = Service {
            status: ServiceStatus::PendingDelete,
            ..ready()
        };
        assert!(matches!(
            classify_deletion::<MockError>("svc-1", Ok(pending)),
            Poll::Pending(_)
        ));
    }
}
