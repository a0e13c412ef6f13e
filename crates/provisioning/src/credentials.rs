use std::fmt;

use serde::{Deserialize, Serialize};

/// Default database credentials generated for a service.
#[derive(Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct DefaultCredentials {
    /// Database user name.
    #[serde(default)]
    pub username: String,

    /// Database password.
    #[serde(default)]
    pub password: String,
}

impl fmt::Debug for DefaultCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
