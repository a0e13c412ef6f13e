//! Command-line front end that reconciles a declarative manifest against the
//! remote database provisioning API.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod commands;
mod error;
pub mod manifest;
pub mod state;

pub use error::{Error, Result};

use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use dps_provisioning_http::{ClientOptions, HttpProvisioningClient};
use dps_reconciler::ControllerConfig;
use tokio_util::sync::CancellationToken;
use url::Url;

use commands::allowlist::AllowlistArgs;
use commands::apply::ApplyArgs;
use commands::catalog::CatalogArgs;
use commands::credentials::CredentialsArgs;
use commands::destroy::DestroyArgs;
use commands::lookup::{ConfigArgs, ServiceArgs};

/// Top-level arguments.
#[derive(Clone, Debug, Parser)]
#[command(name = "dps", version, about, long_about = None)]
pub struct Cli {
    /// Remote API settings
    #[command(flatten)]
    pub remote: RemoteArgs,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Settings for reaching the remote API.
#[derive(Args, Clone, Debug)]
pub struct RemoteArgs {
    /// API key
    #[arg(long, env = "SKYSQL_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Origin of the API
    #[arg(
        long,
        default_value = "https://api.skysql.com",
        env = "SKYSQL_API_BASE_URL"
    )]
    pub base_url: Url,

    /// Organization to scope requests to
    #[arg(long, env = "SKYSQL_ORG_ID")]
    pub org_id: Option<String>,

    /// Seconds between status checks while waiting
    #[arg(long, default_value_t = 10, env = "DPS_POLL_INTERVAL_SECS")]
    pub poll_interval_secs: u64,

    /// Seconds to wait for any single operation to converge
    #[arg(long, env = "DPS_TIMEOUT_SECS")]
    pub timeout_secs: Option<u64>,
}

impl RemoteArgs {
    /// Wait settings derived from the arguments.
    #[must_use]
    pub fn controller_config(&self) -> ControllerConfig {
        let poll_interval = Duration::from_secs(self.poll_interval_secs.max(1));
        match self.timeout_secs {
            Some(timeout) => ControllerConfig::uniform(poll_interval, Duration::from_secs(timeout)),
            None => ControllerConfig {
                poll_interval,
                ..ControllerConfig::default()
            },
        }
    }

    fn client(&self) -> Result<HttpProvisioningClient> {
        let mut options = ClientOptions::new(self.base_url.clone(), self.api_key.clone());
        if let Some(org_id) = &self.org_id {
            options = options.with_org_id(org_id.clone());
        }

        Ok(HttpProvisioningClient::new(options)?)
    }
}

/// Available subcommands.
#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    /// Create or update the resources in a manifest
    Apply(ApplyArgs),

    /// Delete every resource recorded in the state file
    Destroy(DestroyArgs),

    /// List the configuration parameters of a topology and version
    Catalog(CatalogArgs),

    /// Show the remote state of a service
    Service(ServiceArgs),

    /// Show the remote state of a configuration object
    Config(ConfigArgs),

    /// Show the default database credentials of a service
    Credentials(CredentialsArgs),

    /// Manage the addresses allowed to connect to a service
    Allowlist(AllowlistArgs),
}

impl Cli {
    /// Run the selected subcommand.
    ///
    /// # Errors
    ///
    /// Whatever the subcommand fails with.
    pub async fn run(self, cancel: &CancellationToken) -> Result<()> {
        let client = self.remote.client()?;
        let config = self.remote.controller_config();

        match &self.command {
            Commands::Apply(args) => commands::apply::run(client, config, args, cancel).await,
            Commands::Destroy(args) => commands::destroy::run(client, config, args, cancel).await,
            Commands::Catalog(args) => commands::catalog::run(client, args).await,
            Commands::Service(args) => commands::lookup::run_service(client, config, args).await,
            Commands::Config(args) => commands::lookup::run_config(client, args).await,
            Commands::Credentials(args) => {
                commands::credentials::run(client, config, args).await
            }
            Commands::Allowlist(args) => {
                commands::allowlist::run(client, config, args, cancel).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_applies_to_every_wait() {
        let cli = Cli::parse_from([
            "dps",
            "--api-key",
            "k",
            "--poll-interval-secs",
            "5",
            "--timeout-secs",
            "120",
            "catalog",
            "--topology",
            "es-single",
            "--version",
            "10.6",
        ]);

        let config = cli.remote.controller_config();
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.create_timeout, Duration::from_secs(120));
        assert_eq!(config.delete_timeout, Duration::from_secs(120));
        assert!(matches!(cli.command, Commands::Catalog(ref args) if !args.restart_only));
    }

    #[test]
    fn test_allowlist_add_waits_unless_told_not_to() {
        let cli = Cli::parse_from([
            "dps",
            "--api-key",
            "k",
            "--timeout-secs",
            "300",
            "allowlist",
            "add",
            "--service",
            "svc-1",
            "--ip",
            "203.0.113.7/32",
        ]);

        assert_eq!(
            cli.remote.controller_config().allowlist_timeout,
            Duration::from_secs(300)
        );
        match cli.command {
            Commands::Allowlist(AllowlistArgs {
                command: commands::allowlist::AllowlistCommand::Add(ref args),
            }) => {
                assert_eq!(args.service, "svc-1");
                assert!(!args.no_wait);
                assert_eq!(args.comment, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_lookup_commands_take_positional_ids() {
        let cli = Cli::parse_from(["dps", "--api-key", "k", "credentials", "svc-1"]);
        assert!(
            matches!(cli.command, Commands::Credentials(ref args) if args.service_id == "svc-1" && !args.show_password)
        );

        let cli = Cli::parse_from(["dps", "--api-key", "k", "config", "cfg-2"]);
        assert!(matches!(cli.command, Commands::Config(ref args) if args.id == "cfg-2"));
    }

    #[test]
    fn test_defaults_without_timeout() {
        let cli = Cli::parse_from(["dps", "--api-key", "k", "apply"]);

        let config = cli.remote.controller_config();
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert_eq!(config.create_timeout, ControllerConfig::default().create_timeout);
        assert_eq!(cli.remote.base_url.as_str(), "https://api.skysql.com/");
        assert!(
            matches!(cli.command, Commands::Apply(ref args) if args.manifest.as_os_str() == "dps.toml")
        );
    }
}
