//! Last-applied state, persisted as JSON between runs.
//!
//! Remote configuration objects cannot be enumerated by variable, so the
//! values recorded here are the baseline every value diff is computed from.

use std::path::Path;

use dps_reconciler::{ConfigSpec, ConfigValues, ServiceSpec};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Everything known about previously applied resources.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct State {
    /// Managed configuration object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<ConfigState>,

    /// Managed service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<ServiceState>,

    /// Configuration objects replaced or dropped from the manifest, deleted
    /// once no managed service needs them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub retired_configs: Vec<String>,
}

/// A configuration object as last applied.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ConfigState {
    /// Remote id.
    pub id: String,

    /// Spec last applied; `values` holds exactly what was set.
    pub spec: ConfigSpec,
}

/// A service as last applied.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ServiceState {
    /// Remote id.
    pub id: String,

    /// Spec last applied.
    pub spec: ServiceSpec,
}

impl State {
    /// Read state from `path`; a missing file is an empty state.
    ///
    /// # Errors
    ///
    /// I/O errors other than not-found, and parse errors.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(Error::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        serde_json::from_str(&contents).map_err(|source| Error::State {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write state to `path`, replacing the previous file atomically.
    ///
    /// # Errors
    ///
    /// I/O and encode errors.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self).map_err(|source| Error::State {
            path: path.to_path_buf(),
            source,
        })?;

        let staging = path.with_extension("json.tmp");
        std::fs::write(&staging, contents)
            .and_then(|()| std::fs::rename(&staging, path))
            .map_err(|source| Error::Io {
                path: path.to_path_buf(),
                source,
            })
    }
}

/// Values actually in effect after `applied` variables were moved from
/// `prior` towards `desired`.
#[must_use]
pub fn partially_applied(
    prior: &ConfigValues,
    desired: &ConfigValues,
    applied: &[String],
) -> ConfigValues {
    let mut values = prior.clone();
    for name in applied {
        match desired.get(name) {
            Some(value) => values.insert(name.clone(), value.clone()),
            None => values.remove(name),
        };
    }
    values
}
