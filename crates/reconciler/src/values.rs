//! Reconciling the variables set on a configuration object.

use std::collections::BTreeMap;

use dps_provisioning::ProvisioningClient;
use tracing::{debug, info, warn};

use crate::error::{ApplyPhase, Error, Result};
use crate::restart::RestartSafetyValidator;

/// Variable name to value.
pub type ConfigValues = BTreeMap<String, String>;

/// The configuration object whose values are being reconciled.
#[derive(Clone, Copy, Debug)]
pub struct ConfigTarget<'a> {
    /// Configuration object id.
    pub config_id: &'a str,

    /// Topology, for catalog lookups.
    pub topology: &'a str,

    /// Server version, for catalog lookups.
    pub version: &'a str,
}

/// Difference between two value maps, each list in lexicographic order.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ValueDiff {
    /// Variables present before but not after.
    pub removed: Vec<String>,

    /// Variables that are new or whose value changed, with the new value.
    pub changed: Vec<(String, String)>,
}

impl ValueDiff {
    /// Compute the difference between `old` and `new`.
    #[must_use]
    pub fn between(old: &ConfigValues, new: &ConfigValues) -> Self {
        // BTreeMap iteration is already sorted by name.
        let removed = old
            .keys()
            .filter(|name| !new.contains_key(*name))
            .cloned()
            .collect();

        let changed = new
            .iter()
            .filter(|(name, value)| old.get(*name) != Some(*value))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        Self { removed, changed }
    }

    /// Whether there is nothing to do.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.changed.is_empty()
    }

    /// Names of the changed variables.
    #[must_use]
    pub fn changed_names(&self) -> Vec<&str> {
        self.changed.iter().map(|(name, _)| name.as_str()).collect()
    }
}

/// What a successful reconcile did.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ApplyReport {
    /// Variables unset, in call order.
    pub unset: Vec<String>,

    /// Variables set, in call order.
    pub set: Vec<String>,
}

impl ApplyReport {
    /// Whether any call was made.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.unset.is_empty() && self.set.is_empty()
    }
}

/// Applies the minimal set of set/unset calls that turns one value map into
/// another.
#[derive(Clone, Debug)]
pub struct ConfigValueReconciler<C>
where
    C: ProvisioningClient,
{
    client: C,
    validator: RestartSafetyValidator<C>,
}

impl<C> ConfigValueReconciler<C>
where
    C: ProvisioningClient,
{
    /// Create a reconciler.
    pub fn new(client: C) -> Self {
        Self {
            validator: RestartSafetyValidator::new(client.clone()),
            client,
        }
    }

    /// The restart validator this reconciler gates on.
    pub const fn validator(&self) -> &RestartSafetyValidator<C> {
        &self.validator
    }

    /// Move the values of `target` from `old` to `new`.
    ///
    /// Unless `allow_restart` is set, the changed variables are checked
    /// against the catalog first and nothing is sent if any needs a restart.
    /// Removed variables are then unset and changed ones set, each phase in
    /// lexicographic order. Stops at the first failed call.
    ///
    /// # Errors
    ///
    /// [`Error::RestartRequired`] or [`Error::CatalogUnavailable`] from the
    /// gate, with no calls made. [`Error::PartialApply`] when a call fails.
    pub async fn reconcile(
        &self,
        target: &ConfigTarget<'_>,
        old: &ConfigValues,
        new: &ConfigValues,
        allow_restart: bool,
    ) -> Result<ApplyReport> {
        let diff = ValueDiff::between(old, new);
        if diff.is_empty() {
            debug!("values of config {} already up to date", target.config_id);
            return Ok(ApplyReport::default());
        }

        if !allow_restart {
            self.validator
                .ensure_restart_safe(target.topology, target.version, &diff.changed_names())
                .await?;
        }

        self.apply(target.config_id, &diff, allow_restart).await
    }

    /// Apply `diff` without the restart gate.
    pub(crate) async fn apply(
        &self,
        config_id: &str,
        diff: &ValueDiff,
        allow_restart: bool,
    ) -> Result<ApplyReport> {
        let mut report = ApplyReport::default();

        for (index, name) in diff.removed.iter().enumerate() {
            if let Err(e) = self
                .client
                .unset_config_value(config_id, name, allow_restart)
                .await
            {
                let not_attempted = diff.removed[index + 1..]
                    .iter()
                    .chain(diff.changed.iter().map(|(name, _)| name))
                    .cloned()
                    .collect();
                return Err(partial(
                    config_id,
                    ApplyPhase::Unset,
                    name,
                    Error::remote("unset config value", &e),
                    &report,
                    not_attempted,
                ));
            }
            info!("unset {} on config {}", name, config_id);
            report.unset.push(name.clone());
        }

        for (index, (name, value)) in diff.changed.iter().enumerate() {
            if let Err(e) = self
                .client
                .set_config_value(config_id, name, value, allow_restart)
                .await
            {
                let not_attempted = diff.changed[index + 1..]
                    .iter()
                    .map(|(name, _)| name.clone())
                    .collect();
                return Err(partial(
                    config_id,
                    ApplyPhase::Set,
                    name,
                    Error::remote("set config value", &e),
                    &report,
                    not_attempted,
                ));
            }
            info!("set {} on config {}", name, config_id);
            report.set.push(name.clone());
        }

        Ok(report)
    }
}

fn partial(
    config_id: &str,
    phase: ApplyPhase,
    variable: &str,
    cause: Error,
    report: &ApplyReport,
    not_attempted: Vec<String>,
) -> Error {
    warn!("failed to {} {} on config {}: {}", phase, variable, config_id, cause);

    Error::PartialApply {
        resource: config_id.to_string(),
        phase,
        variable: variable.to_string(),
        cause: Box::new(cause),
        applied: report.unset.iter().chain(&report.set).cloned().collect(),
        not_attempted,
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn values(pairs: &[(&str, &str)]) -> ConfigValues {
        pairs
            .iter()
            .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
            .collect()
    }

    #[test]
    fn test_diff_of_added_and_removed() {
        let old = values(&[("a", "1"), ("b", "2"), ("c", "3")]);
        let new = values(&[("a", "1"), ("c", "4"), ("d", "5")]);

        let diff = ValueDiff::between(&old, &new);

        assert_eq!(diff.removed, vec!["b"]);
        assert_eq!(
            diff.changed,
            vec![
                ("c".to_string(), "4".to_string()),
                ("d".to_string(), "5".to_string())
            ]
        );
    }

    #[test]
    fn test_changed_value_is_not_removed() {
        let diff = ValueDiff::between(&values(&[("a", "1")]), &values(&[("a", "2")]));

        assert!(diff.removed.is_empty());
        assert_eq!(diff.changed_names(), vec!["a"]);
    }

    fn arb_values() -> impl Strategy<Value = ConfigValues> {
        prop::collection::btree_map("[a-e]", "[0-2]", 0..5)
    }

    proptest! {
        #[test]
        fn diff_of_equal_maps_is_empty(map in arb_values()) {
            prop_assert!(ValueDiff::between(&map, &map.clone()).is_empty());
        }

        #[test]
        fn diff_applied_to_old_yields_new(old in arb_values(), new in arb_values()) {
            let diff = ValueDiff::between(&old, &new);

            let mut applied = old.clone();
            for name in &diff.removed {
                applied.remove(name);
            }
            for (name, value) in &diff.changed {
                applied.insert(name.clone(), value.clone());
            }

            prop_assert_eq!(applied, new.clone());
            prop_assert!(diff.removed.iter().all(|name| old.contains_key(name) && !new.contains_key(name)));
            prop_assert!(diff.changed.windows(2).all(|pair| pair[0].0 < pair[1].0));
            prop_assert!(diff.removed.windows(2).all(|pair| pair[0] < pair[1]));
        }
    }
}
