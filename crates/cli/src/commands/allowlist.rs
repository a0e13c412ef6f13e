//! `dps allowlist`: manage the addresses allowed to connect to a service.

use std::fmt::Write as _;

use clap::{Args, Subcommand};
use dps_provisioning::{AllowlistEntry, ProvisioningClient};
use dps_reconciler::{AllowlistController, AllowlistSpec, ControllerConfig};
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// Arguments for `dps allowlist`.
#[derive(Args, Clone, Debug)]
pub struct AllowlistArgs {
    /// Allowlist operation
    #[command(subcommand)]
    pub command: AllowlistCommand,
}

/// Allowlist operations.
#[derive(Clone, Debug, Subcommand)]
pub enum AllowlistCommand {
    /// Allow an address and wait until it is enforced
    Add(AddArgs),

    /// List the allowed addresses
    List(ListArgs),

    /// Stop allowing an address
    Remove(RemoveArgs),
}

/// Arguments for `dps allowlist add`.
#[derive(Args, Clone, Debug)]
pub struct AddArgs {
    /// Service id
    #[arg(long, short)]
    pub service: String,

    /// Address in CIDR notation, e.g. 203.0.113.7/32
    #[arg(long)]
    pub ip: String,

    /// Free-form note
    #[arg(long)]
    pub comment: Option<String>,

    /// Return as soon as the address is submitted
    #[arg(long)]
    pub no_wait: bool,
}

/// Arguments for `dps allowlist list`.
#[derive(Args, Clone, Debug)]
pub struct ListArgs {
    /// Service id
    #[arg(long, short)]
    pub service: String,
}

/// Arguments for `dps allowlist remove`.
#[derive(Args, Clone, Debug)]
pub struct RemoveArgs {
    /// Service id
    #[arg(long, short)]
    pub service: String,

    /// Address to remove, as listed
    #[arg(long)]
    pub ip: String,
}

/// Run `dps allowlist`.
///
/// # Errors
///
/// Whatever [`execute`] fails with.
pub async fn run<C>(
    client: C,
    config: ControllerConfig,
    args: &AllowlistArgs,
    cancel: &CancellationToken,
) -> Result<()>
where
    C: ProvisioningClient,
{
    print!("{}", execute(client, config, &args.command, cancel).await?);
    Ok(())
}

/// Perform an allowlist operation and return what to print.
///
/// # Errors
///
/// Validation, remote and poll errors from the allowlist controller.
pub async fn execute<C>(
    client: C,
    config: ControllerConfig,
    command: &AllowlistCommand,
    cancel: &CancellationToken,
) -> Result<String>
where
    C: ProvisioningClient,
{
    let allowlist = AllowlistController::new(client, config);

    match command {
        AllowlistCommand::Add(args) => {
            let spec = AllowlistSpec {
                service_id: args.service.clone(),
                ip_address: args.ip.clone(),
                comment: args.comment.clone(),
                wait_for_install: !args.no_wait,
            };
            let entry = allowlist.add(&spec, cancel).await?;
            Ok(render(std::slice::from_ref(&entry)))
        }
        AllowlistCommand::List(args) => Ok(render(&allowlist.list(&args.service).await?)),
        AllowlistCommand::Remove(args) => {
            allowlist.remove(&args.service, &args.ip).await?;
            Ok(format!("removed {} from service {}\n", args.ip, args.service))
        }
    }
}

/// Render entries as an aligned table.
#[must_use]
pub fn render(entries: &[AllowlistEntry]) -> String {
    let width = entries
        .iter()
        .map(|entry| entry.ip_address.len())
        .max()
        .unwrap_or(0)
        .max("IP_ADDRESS".len());

    let mut out = format!("{:<width$}  {:<9}  COMMENT\n", "IP_ADDRESS", "STATUS");
    for entry in entries {
        let status = entry.status.to_string();
        let _ = writeln!(
            out,
            "{:<width$}  {:<9}  {}",
            entry.ip_address,
            status,
            entry.comment.as_deref().unwrap_or("")
        );
    }
    out
}
