//! `dps apply`: bring remote resources in line with the manifest.

use std::path::{Path, PathBuf};

use clap::Args;
use dps_provisioning::ProvisioningClient;
use dps_reconciler::{
    ConfigObjectController, ConfigSpec, ConfigValues, ControllerConfig, Error as ReconcileError,
    ExistingService, ServiceLifecycleController, ServicePlan, ServiceSpec, plan,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::delete_retired_configs;
use crate::error::Result;
use crate::manifest::Manifest;
use crate::state::{ConfigState, ServiceState, State, partially_applied};

/// Arguments for `dps apply`.
#[derive(Args, Clone, Debug)]
pub struct ApplyArgs {
    /// Manifest describing the desired resources
    #[arg(long, short, default_value = "dps.toml")]
    pub manifest: PathBuf,

    /// File recording what was last applied
    #[arg(long, short, default_value = "dps-state.json")]
    pub state: PathBuf,
}

/// Run `dps apply`.
///
/// # Errors
///
/// Manifest/state errors and the first reconciliation error.
pub async fn run<C>(
    client: C,
    config: ControllerConfig,
    args: &ApplyArgs,
    cancel: &CancellationToken,
) -> Result<()>
where
    C: ProvisioningClient,
{
    let manifest = Manifest::load(&args.manifest)?;
    let mut state = State::load(&args.state)?;

    apply(client, config, &manifest, &mut state, &args.state, cancel).await
}

/// Apply `manifest`, recording progress in `state` and saving it to
/// `state_path` after every completed step.
///
/// Order: the configuration object first, then the service (so it can attach
/// the new config), then deletion of configs no longer needed.
///
/// # Errors
///
/// The first error; `state` reflects everything that succeeded before it.
pub async fn apply<C>(
    client: C,
    config: ControllerConfig,
    manifest: &Manifest,
    state: &mut State,
    state_path: &Path,
    cancel: &CancellationToken,
) -> Result<()>
where
    C: ProvisioningClient,
{
    let configs = ConfigObjectController::new(client.clone());
    let services = ServiceLifecycleController::new(client, config);

    apply_config(&configs, manifest.config.as_ref(), state, state_path).await?;

    let managed_config_id = state.config.as_ref().map(|config| config.id.clone());
    match manifest.service_spec(managed_config_id.as_deref()) {
        Some(desired) => apply_service(&services, &desired, state, state_path, cancel).await?,
        None => {
            if let Some(existing) = state.service.clone() {
                info!("service {} removed from manifest; deleting", existing.id);
                services
                    .delete(&existing.id, &existing.spec, cancel)
                    .await?;
                state.service = None;
                state.save(state_path)?;
            }
        }
    }

    delete_retired_configs(&configs, state, state_path).await
}

async fn apply_config<C>(
    configs: &ConfigObjectController<C>,
    desired: Option<&ConfigSpec>,
    state: &mut State,
    state_path: &Path,
) -> Result<()>
where
    C: ProvisioningClient,
{
    let Some(desired) = desired else {
        if let Some(retired) = state.config.take() {
            info!("config {} removed from manifest; retiring", retired.id);
            state.retired_configs.push(retired.id);
            state.save(state_path)?;
        }
        return Ok(());
    };

    let Some(existing) = state.config.clone() else {
        return create_config(configs, desired, state, state_path).await;
    };

    if configs.read(&existing.id).await?.is_none() {
        warn!("config {} no longer exists; creating a new one", existing.id);
        state.config = None;
        state.save(state_path)?;
        return create_config(configs, desired, state, state_path).await;
    }

    match configs.update(&existing.id, &existing.spec, desired).await {
        Ok(report) => {
            if !report.is_empty() {
                info!(
                    "config {}: unset {} and set {} variable(s)",
                    existing.id,
                    report.unset.len(),
                    report.set.len()
                );
            }
            state.config = Some(ConfigState {
                id: existing.id,
                spec: desired.clone(),
            });
            state.save(state_path)
        }
        Err(ReconcileError::ReplacementRequired { fields }) => {
            info!(
                "replacing config {} (changed: {})",
                existing.id,
                fields.join(", ")
            );
            state.config = None;
            state.retired_configs.push(existing.id);
            state.save(state_path)?;
            create_config(configs, desired, state, state_path).await
        }
        Err(error) => {
            if let ReconcileError::PartialApply { applied, .. } = &error {
                let mut spec = desired.clone();
                spec.values = partially_applied(&existing.spec.values, &desired.values, applied);
                state.config = Some(ConfigState {
                    id: existing.id,
                    spec,
                });
                state.save(state_path)?;
            }
            Err(error.into())
        }
    }
}

async fn create_config<C>(
    configs: &ConfigObjectController<C>,
    desired: &ConfigSpec,
    state: &mut State,
    state_path: &Path,
) -> Result<()>
where
    C: ProvisioningClient,
{
    match configs.create(desired).await {
        Ok(config) => {
            state.config = Some(ConfigState {
                id: config.id,
                spec: desired.clone(),
            });
            state.save(state_path)
        }
        Err(error) => {
            if let ReconcileError::PartialApply {
                resource, applied, ..
            } = &error
            {
                let mut spec = desired.clone();
                spec.values = partially_applied(&ConfigValues::new(), &desired.values, applied);
                state.config = Some(ConfigState {
                    id: resource.clone(),
                    spec,
                });
                state.save(state_path)?;
            }
            Err(error.into())
        }
    }
}

async fn apply_service<C>(
    services: &ServiceLifecycleController<C>,
    desired: &ServiceSpec,
    state: &mut State,
    state_path: &Path,
    cancel: &CancellationToken,
) -> Result<()>
where
    C: ProvisioningClient,
{
    let mut existing = state.service.clone();

    let discard = match &existing {
        Some(current) => {
            if services.read(&current.id).await?.is_none() {
                warn!("service {} no longer exists; creating a new one", current.id);
                true
            } else if matches!(plan(&current.spec, desired), ServicePlan::Replace(_)) {
                services
                    .retire(
                        ExistingService {
                            service_id: &current.id,
                            spec: &current.spec,
                        },
                        desired,
                        cancel,
                    )
                    .await?;
                true
            } else {
                false
            }
        }
        None => false,
    };

    if discard {
        existing = None;
        state.service = None;
        state.save(state_path)?;
    }

    match existing {
        Some(current) => {
            services
                .reconcile(
                    Some(ExistingService {
                        service_id: &current.id,
                        spec: &current.spec,
                    }),
                    desired,
                    cancel,
                )
                .await?;
            state.service = Some(ServiceState {
                id: current.id,
                spec: desired.clone(),
            });
            state.save(state_path)
        }
        None => {
            // Record the id before waiting so an interrupted wait is resumable.
            let service = services.submit(desired).await?;
            state.service = Some(ServiceState {
                id: service.id.clone(),
                spec: desired.clone(),
            });
            state.save(state_path)?;

            if desired.wait_for_creation {
                services.await_creation(&service.id, cancel).await?;
                if desired.desired_config_id().is_some() {
                    services
                        .ensure_config(&service.id, desired.desired_config_id(), cancel)
                        .await?;
                }
            }

            Ok(())
        }
    }
}
