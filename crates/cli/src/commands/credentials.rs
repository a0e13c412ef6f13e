//! `dps credentials`: print the default database credentials of a service.

use std::fmt::Write as _;

use clap::Args;
use dps_provisioning::{DefaultCredentials, ProvisioningClient};
use dps_reconciler::{ControllerConfig, ServiceLifecycleController};

use crate::error::Result;

/// Arguments for `dps credentials`.
#[derive(Args, Clone, Debug)]
pub struct CredentialsArgs {
    /// Service id
    pub service_id: String,

    /// Print the password instead of masking it
    #[arg(long)]
    pub show_password: bool,
}

/// Run `dps credentials`.
///
/// # Errors
///
/// Remote errors, including a response without a username or password.
pub async fn run<C>(client: C, config: ControllerConfig, args: &CredentialsArgs) -> Result<()>
where
    C: ProvisioningClient,
{
    let credentials = ServiceLifecycleController::new(client, config)
        .default_credentials(&args.service_id)
        .await?;

    print!("{}", render(&credentials, args.show_password));
    Ok(())
}

/// Render credentials as `key: value` lines.
#[must_use]
pub fn render(credentials: &DefaultCredentials, show_password: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "username: {}", credentials.username);
    let _ = writeln!(
        out,
        "password: {}",
        if show_password {
            credentials.password.as_str()
        } else {
            "********"
        }
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_masked_unless_requested() {
        let credentials = DefaultCredentials {
            username: "dbpgf00001".to_string(),
            password: "s3cret".to_string(),
        };

        let masked = render(&credentials, false);
        assert_eq!(masked, "username: dbpgf00001\npassword: ********\n");

        let shown = render(&credentials, true);
        assert!(shown.ends_with("password: s3cret\n"));
    }
}
