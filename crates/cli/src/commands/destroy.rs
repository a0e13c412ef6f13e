//! `dps destroy`: delete everything recorded in the state file.

use std::path::{Path, PathBuf};

use clap::Args;
use dps_provisioning::ProvisioningClient;
use dps_reconciler::{ConfigObjectController, ControllerConfig, ServiceLifecycleController};
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::delete_retired_configs;
use crate::error::Result;
use crate::manifest::Manifest;
use crate::state::State;

/// Arguments for `dps destroy`.
#[derive(Args, Clone, Debug)]
pub struct DestroyArgs {
    /// Manifest whose `deletion_protection` and `wait_for_deletion` take
    /// precedence over the recorded ones
    #[arg(long, short)]
    pub manifest: Option<PathBuf>,

    /// File recording what was last applied
    #[arg(long, short, default_value = "dps-state.json")]
    pub state: PathBuf,
}

/// Run `dps destroy`.
///
/// # Errors
///
/// Manifest/state errors and the first deletion error.
pub async fn run<C>(
    client: C,
    config: ControllerConfig,
    args: &DestroyArgs,
    cancel: &CancellationToken,
) -> Result<()>
where
    C: ProvisioningClient,
{
    let manifest = args.manifest.as_deref().map(Manifest::load).transpose()?;
    let mut state = State::load(&args.state)?;

    destroy(client, config, manifest.as_ref(), &mut state, &args.state, cancel).await
}

/// Delete the recorded service, then every recorded configuration object.
///
/// # Errors
///
/// The first error; `state` keeps whatever was not deleted.
pub async fn destroy<C>(
    client: C,
    config: ControllerConfig,
    manifest: Option<&Manifest>,
    state: &mut State,
    state_path: &Path,
    cancel: &CancellationToken,
) -> Result<()>
where
    C: ProvisioningClient,
{
    let configs = ConfigObjectController::new(client.clone());
    let services = ServiceLifecycleController::new(client, config);

    if let Some(service) = state.service.clone() {
        let mut spec = service.spec;
        if let Some(declared) = manifest.and_then(|manifest| manifest.service.as_ref()) {
            spec.deletion_protection = declared.spec.deletion_protection;
            spec.wait_for_deletion = declared.spec.wait_for_deletion;
        }

        services.delete(&service.id, &spec, cancel).await?;
        info!("service {} deleted", service.id);
        state.service = None;
        state.save(state_path)?;
    }

    if let Some(config) = state.config.take() {
        state.retired_configs.push(config.id);
        state.save(state_path)?;
    }

    delete_retired_configs(&configs, state, state_path).await
}
