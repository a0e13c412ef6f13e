use std::fmt;

use serde::{Deserialize, Serialize};

/// Enforcement status of an allowlist entry.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum AllowlistStatus {
    /// The address is being added to the service's firewall.
    Pending,

    /// The address is allowed through the service's firewall.
    Enforcing,

    /// A status string this client does not know about.
    #[default]
    #[serde(other)]
    Unknown,
}

impl fmt::Display for AllowlistStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// An address allowed to connect to a service.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct AllowlistEntry {
    /// Address in CIDR notation (e.g. `203.0.113.7/32`).
    pub ip_address: String,

    /// Free-form note.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    /// Enforcement status.
    #[serde(default)]
    pub status: AllowlistStatus,
}

/// Request body for `POST /services/{id}/security/allowlist`.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct AddAllowedAddressRequest {
    /// Address in CIDR notation.
    pub ip_address: String,

    /// Free-form note.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_status_wire_names() {
        let entries: Vec<AllowlistEntry> = serde_json::from_str(
            r#"[
                {"ip_address": "203.0.113.7/32", "comment": null, "status": "Enforcing"},
                {"ip_address": "198.51.100.0/24", "status": "Deploying"}
            ]"#,
        )
        .unwrap();

        assert_eq!(entries[0].status, AllowlistStatus::Enforcing);
        assert_eq!(entries[0].comment, None);
        assert_eq!(entries[1].status, AllowlistStatus::Unknown);
    }
}
