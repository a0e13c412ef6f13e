//! `dps catalog`: list the configurable parameters of a topology and version.

use std::fmt::Write as _;

use clap::Args;
use dps_provisioning::{ConfigKey, ProvisioningClient};
use dps_reconciler::Error as ReconcileError;

use crate::error::Result;

/// Arguments for `dps catalog`.
#[derive(Args, Clone, Debug)]
pub struct CatalogArgs {
    /// Topology name, e.g. es-single
    #[arg(long, short)]
    pub topology: String,

    /// Server version
    #[arg(long, short)]
    pub version: String,

    /// Only list parameters whose change requires a service restart
    #[arg(long)]
    pub restart_only: bool,
}

/// Run `dps catalog`, printing one line per parameter.
///
/// # Errors
///
/// Remote errors from the catalog fetch.
pub async fn run<C>(client: C, args: &CatalogArgs) -> Result<()>
where
    C: ProvisioningClient,
{
    let keys = client
        .get_config_keys(&args.topology, &args.version)
        .await
        .map_err(|e| ReconcileError::remote("get config keys", &e))?;

    print!("{}", render(&keys, args.restart_only));
    Ok(())
}

/// Render `keys` as an aligned table, sorted by name.
#[must_use]
pub fn render(keys: &[ConfigKey], restart_only: bool) -> String {
    let mut keys: Vec<_> = keys
        .iter()
        .filter(|key| !restart_only || key.requires_restart)
        .collect();
    keys.sort_by(|a, b| a.name.cmp(&b.name));

    let width = keys
        .iter()
        .map(|key| key.name.len())
        .max()
        .unwrap_or(0)
        .max("NAME".len());

    let mut out = format!("{:<width$}  RESTART  READONLY\n", "NAME");
    for key in keys {
        let _ = writeln!(
            out,
            "{:<width$}  {:<7}  {}",
            key.name,
            if key.requires_restart { "yes" } else { "no" },
            if key.readonly { "yes" } else { "no" },
        );
    }
    out
}
