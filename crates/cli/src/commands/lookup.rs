//! `dps service` and `dps config`: print the remote state of one resource.

use clap::Args;
use dps_provisioning::{Config, ProvisioningClient, Service};
use dps_reconciler::{ConfigObjectController, ControllerConfig, ServiceLifecycleController};
use serde::Serialize;

use crate::error::{Error, Result};

/// Arguments for `dps service`.
#[derive(Args, Clone, Debug)]
pub struct ServiceArgs {
    /// Service id
    pub id: String,
}

/// Arguments for `dps config`.
#[derive(Args, Clone, Debug)]
pub struct ConfigArgs {
    /// Configuration object id
    pub id: String,
}

/// Fetch a service.
///
/// # Errors
///
/// [`Error::NotFound`] when there is no such service, and remote errors.
pub async fn service<C>(client: C, config: ControllerConfig, id: &str) -> Result<Service>
where
    C: ProvisioningClient,
{
    ServiceLifecycleController::new(client, config)
        .read(id)
        .await?
        .ok_or_else(|| Error::NotFound {
            kind: "service",
            id: id.to_string(),
        })
}

/// Fetch a configuration object.
///
/// # Errors
///
/// [`Error::NotFound`] when there is no such object, and remote errors.
pub async fn config<C>(client: C, id: &str) -> Result<Config>
where
    C: ProvisioningClient,
{
    ConfigObjectController::new(client)
        .read(id)
        .await?
        .ok_or_else(|| Error::NotFound {
            kind: "config",
            id: id.to_string(),
        })
}

/// Run `dps service`, printing the service as JSON.
///
/// # Errors
///
/// See [`service`].
pub async fn run_service<C>(client: C, config: ControllerConfig, args: &ServiceArgs) -> Result<()>
where
    C: ProvisioningClient,
{
    println!("{}", to_json(&service(client, config, &args.id).await?)?);
    Ok(())
}

/// Run `dps config`, printing the configuration object as JSON.
///
/// # Errors
///
/// See [`config`].
pub async fn run_config<C>(client: C, args: &ConfigArgs) -> Result<()>
where
    C: ProvisioningClient,
{
    println!("{}", to_json(&config(client, &args.id).await?)?);
    Ok(())
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(Error::Render)
}
