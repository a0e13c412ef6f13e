//! Subcommand implementations.

pub mod allowlist;
pub mod apply;
pub mod catalog;
pub mod credentials;
pub mod destroy;
pub mod lookup;

use std::path::Path;

use dps_provisioning::ProvisioningClient;
use dps_reconciler::ConfigObjectController;

use crate::error::Result;
use crate::state::State;

/// Delete every retired configuration object, dropping each from `state` as
/// soon as it is gone.
async fn delete_retired_configs<C>(
    configs: &ConfigObjectController<C>,
    state: &mut State,
    state_path: &Path,
) -> Result<()>
where
    C: ProvisioningClient,
{
    while let Some(config_id) = state.retired_configs.first().cloned() {
        configs.delete(&config_id).await?;
        state.retired_configs.remove(0);
        state.save(state_path)?;
    }

    Ok(())
}
