//! Deployment-fixed configuration.
//!
//! Column bounds and the defaults below are configuration, not data: they
//! must never be inferred from the dataset (spec.md section 3), so this
//! module is the one place they're allowed to come from.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

/// Hard `[lower, upper]` range for one numeric column, used to bound
/// mechanism sensitivity. Fixed by the deployment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub lower: f64,
    pub upper: f64,
}

impl ColumnDescriptor {
    pub fn new(lower: f64, upper: f64) -> Result<Self, String> {
        if !(lower < upper) {
            return Err(format!(
                "column bounds must satisfy lower < upper, got [{lower}, {upper}]"
            ));
        }
        Ok(Self { lower, upper })
    }

    /// Clip a raw value into `[lower, upper]`. This is what makes the
    /// declared sensitivity of every mechanism correct: the true statistic
    /// must be computed over clipped values.
    pub fn clip(&self, value: f64) -> f64 {
        value.clamp(self.lower, self.upper)
    }

    pub fn range(&self) -> f64 {
        self.upper - self.lower
    }
}

/// Deployment-wide configuration consumed by [`crate::gate::service::PrivacyGateway`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Hard bounds for each numeric column known to the deployment.
    pub columns: HashMap<String, ColumnDescriptor>,

    /// Non-numeric row attributes a filter predicate may reference (e.g.
    /// `ward`, `gender`). Numeric columns are already known via `columns`;
    /// this is the rest of the schema a `FilterSet` is allowed to touch.
    /// A filter referencing anything outside `columns` or this set is a
    /// `BadRequest` (spec.md section 4.2: "filter referencing unknown
    /// attribute").
    pub categorical_attributes: HashSet<String>,

    /// Default total epsilon budget granted to a principal on first use.
    pub default_total_budget: f64,

    /// Default warning threshold: `remaining <= warning_threshold` flags
    /// `warning` on a [`crate::budget::entry::BudgetEntry`] snapshot.
    pub default_warning_threshold: f64,

    /// Admissible epsilon range for a single query, inclusive of the
    /// ceiling. Requests outside this range are rejected as `BadRequest`
    /// before the planner is ever called.
    pub epsilon_min: f64,
    pub epsilon_max: f64,

    /// Number of equally-spaced candidates used by the exponential
    /// mechanism's grid over `[lower, upper]`. spec.md notes 100 is the
    /// default but wide ranges may want more (500) at the cost of compute.
    pub exponential_candidates: usize,

    /// Seconds before an uncommitted budget reservation is auto-released.
    pub reservation_timeout_secs: u64,

    /// Whether to include `noise_added` (`noisy - true`) in query
    /// responses. Debated in spec.md section 6/9: its presence degrades
    /// the guarantee across repeated queries, so production deployments
    /// should leave this `false`.
    pub publish_noise_added: bool,

    /// Minimum and maximum number of histogram bins a request may ask for.
    pub histogram_bins_min: u32,
    pub histogram_bins_max: u32,
}

impl GatewayConfig {
    pub fn new(columns: HashMap<String, ColumnDescriptor>) -> Self {
        Self {
            columns,
            categorical_attributes: HashSet::new(),
            default_total_budget: 10.0,
            default_warning_threshold: 2.0,
            epsilon_min: 0.0,
            epsilon_max: 5.0,
            exponential_candidates: 100,
            reservation_timeout_secs: 30,
            publish_noise_added: false,
            histogram_bins_min: 2,
            histogram_bins_max: 50,
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.get(name)
    }

    /// Registers a non-numeric attribute a filter predicate may reference.
    pub fn with_categorical_attribute(mut self, name: impl Into<String>) -> Self {
        self.categorical_attributes.insert(name.into());
        self
    }

    /// Whether `epsilon` is in the admissible `(0, epsilon_max]` range.
    pub fn epsilon_in_range(&self, epsilon: f64) -> bool {
        epsilon > self.epsilon_min && epsilon <= self.epsilon_max
    }

    /// Whether `attribute` is a known part of the row schema: either a
    /// numeric column with a hard bound, or a registered categorical
    /// attribute. A filter referencing anything else is a `BadRequest`.
    pub fn is_known_attribute(&self, attribute: &str) -> bool {
        self.columns.contains_key(attribute) || self.categorical_attributes.contains(attribute)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> GatewayConfig {
        let mut columns = HashMap::new();
        columns.insert("age".to_string(), ColumnDescriptor::new(0.0, 120.0).unwrap());
        GatewayConfig::new(columns)
    }

    #[test]
    fn clip_projects_into_bounds() {
        let col = ColumnDescriptor::new(0.0, 120.0).unwrap();
        assert_eq!(col.clip(-5.0), 0.0);
        assert_eq!(col.clip(500.0), 120.0);
        assert_eq!(col.clip(40.0), 40.0);
    }

    #[test]
    fn epsilon_range_is_half_open_at_zero() {
        let cfg = sample_config();
        assert!(!cfg.epsilon_in_range(0.0));
        assert!(cfg.epsilon_in_range(0.001));
        assert!(cfg.epsilon_in_range(5.0));
        assert!(!cfg.epsilon_in_range(5.0001));
    }

    #[test]
    fn rejects_inverted_bounds() {
        assert!(ColumnDescriptor::new(10.0, 10.0).is_err());
        assert!(ColumnDescriptor::new(10.0, 5.0).is_err());
    }

    #[test]
    fn known_attribute_covers_numeric_columns_and_registered_categoricals() {
        let cfg = sample_config().with_categorical_attribute("ward");
        assert!(cfg.is_known_attribute("age"));
        assert!(cfg.is_known_attribute("ward"));
        assert!(!cfg.is_known_attribute("not_a_real_attribute"));
    }
}
