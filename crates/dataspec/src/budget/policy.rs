//! Heuristic policy for sizing total budgets.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{DataSpecError, Result};

const BASE_EPSILON: &str = "base_epsilon";
const EPSILON_PER_ATTRIBUTE: &str = "epsilon_per_attribute";
const MAX_EPSILON: &str = "max_epsilon";
const DELTA: &str = "delta";
const SIZE_SCALE: &str = "size_scale";

/// Parameters of the automatic budget heuristic.
///
/// The total epsilon is
/// `min(max_epsilon, base_epsilon + epsilon_per_attribute * n * (1 + log10(1 + rows) / size_scale))`
/// where `n` counts protected attributes and `rows` the rows of protected
/// tables. The policy is stored in the `automatic_budget` transform, so it
/// is part of the identity of every budget it produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetPolicy {
    pub base_epsilon: f64,
    pub epsilon_per_attribute: f64,
    pub max_epsilon: f64,
    pub delta: f64,
    pub size_scale: f64,
}

impl Default for BudgetPolicy {
    fn default() -> Self {
        Self {
            base_epsilon: 1.0,
            epsilon_per_attribute: 0.1,
            max_epsilon: 10.0,
            delta: 1e-6,
            size_scale: 10.0,
        }
    }
}

impl BudgetPolicy {
    /// Names of the transform properties the policy occupies.
    pub const PROPERTIES: [&'static str; 5] =
        [BASE_EPSILON, EPSILON_PER_ATTRIBUTE, MAX_EPSILON, DELTA, SIZE_SCALE];

    /// Encode as transform properties.
    pub fn to_properties(&self) -> BTreeMap<String, String> {
        [
            (BASE_EPSILON, self.base_epsilon),
            (EPSILON_PER_ATTRIBUTE, self.epsilon_per_attribute),
            (MAX_EPSILON, self.max_epsilon),
            (DELTA, self.delta),
            (SIZE_SCALE, self.size_scale),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    /// Decode from transform properties and validate.
    pub fn from_properties(properties: &BTreeMap<String, String>) -> Result<Self> {
        let get = |name: &str| -> Result<f64> {
            let raw = properties.get(name).ok_or_else(|| {
                DataSpecError::parameter("automatic_budget", name, "missing policy property")
            })?;
            raw.parse::<f64>().map_err(|e| {
                DataSpecError::parameter("automatic_budget", name, format!("'{}': {}", raw, e))
            })
        };
        let policy = Self {
            base_epsilon: get(BASE_EPSILON)?,
            epsilon_per_attribute: get(EPSILON_PER_ATTRIBUTE)?,
            max_epsilon: get(MAX_EPSILON)?,
            delta: get(DELTA)?,
            size_scale: get(SIZE_SCALE)?,
        };
        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> Result<()> {
        let fail = |name: &str, message: String| {
            Err(DataSpecError::parameter("automatic_budget", name, message))
        };
        if !self.base_epsilon.is_normal() || self.base_epsilon < 0.0 {
            return fail(BASE_EPSILON, format!("must be a positive number, got {}", self.base_epsilon));
        }
        if !self.epsilon_per_attribute.is_finite() || self.epsilon_per_attribute < 0.0 {
            return fail(
                EPSILON_PER_ATTRIBUTE,
                format!("must be finite and >= 0, got {}", self.epsilon_per_attribute),
            );
        }
        if !self.max_epsilon.is_finite() || self.max_epsilon < self.base_epsilon {
            return fail(
                MAX_EPSILON,
                format!("must be finite and >= base_epsilon, got {}", self.max_epsilon),
            );
        }
        if !self.delta.is_finite() || !(0.0..1.0).contains(&self.delta) {
            return fail(DELTA, format!("must be in [0, 1), got {}", self.delta));
        }
        if !self.size_scale.is_finite() || self.size_scale <= 0.0 {
            return fail(SIZE_SCALE, format!("must be > 0, got {}", self.size_scale));
        }
        Ok(())
    }

    /// Total epsilon for `attributes` protected columns over `rows` rows.
    pub fn epsilon(&self, attributes: usize, rows: u64) -> f64 {
        let size_factor = 1.0 + (1.0 + rows as f64).log10() / self.size_scale;
        let epsilon =
            self.base_epsilon + self.epsilon_per_attribute * attributes as f64 * size_factor;
        epsilon.min(self.max_epsilon)
    }
}
