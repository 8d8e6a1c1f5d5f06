//! Differential-privacy budgets and their propagation across the graph.
//!
//! A [`Budget`] is a dataset-level total sized for a set of protected
//! attributes. [`attributes_budget`] splits it into an
//! [`AttributeAllocation`], and [`assign_budget`] binds an allocation to a
//! protected dataset.

mod engine;
mod policy;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use engine::{assign_budget, attributes_budget, automatic_budget, protected_attributes};
pub use policy::BudgetPolicy;

/// An (epsilon, delta) privacy allowance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PrivacyBudget {
    pub epsilon: f64,
    pub delta: f64,
}

impl PrivacyBudget {
    pub fn new(epsilon: f64, delta: f64) -> Self {
        Self { epsilon, delta }
    }

    pub fn zero() -> Self {
        Self::new(0.0, 0.0)
    }

    /// Check the budget is finite and non-negative, with delta below one.
    pub fn validate(&self) -> Result<(), String> {
        if !self.epsilon.is_finite() || self.epsilon < 0.0 {
            return Err(format!("epsilon must be finite and >= 0, got {}", self.epsilon));
        }
        if !self.delta.is_finite() || !(0.0..1.0).contains(&self.delta) {
            return Err(format!("delta must be in [0, 1), got {}", self.delta));
        }
        Ok(())
    }

    /// The first dimension in which `self` exceeds `available`, as
    /// `(dimension, requested, available)`.
    pub fn excess_over(&self, available: &PrivacyBudget) -> Option<(&'static str, f64, f64)> {
        if self.epsilon > available.epsilon {
            Some(("epsilon", self.epsilon, available.epsilon))
        } else if self.delta > available.delta {
            Some(("delta", self.delta, available.delta))
        } else {
            None
        }
    }
}

impl std::ops::Add for PrivacyBudget {
    type Output = PrivacyBudget;

    fn add(self, other: PrivacyBudget) -> PrivacyBudget {
        PrivacyBudget::new(self.epsilon + other.epsilon, self.delta + other.delta)
    }
}

/// A protected column: table path followed by the column name, relative
/// to the data part of a protected dataset.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributePath(pub Vec<String>);

impl AttributePath {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AttributePath(segments.into_iter().map(Into::into).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

/// Total budget of a dataset, with the attributes it was sized for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Budget {
    pub total: PrivacyBudget,
    /// Sorted, without duplicates.
    pub attributes: Vec<AttributePath>,
}

/// Sub-budget of one protected attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttributeBudget {
    pub path: AttributePath,
    pub budget: PrivacyBudget,
}

/// Per-attribute split of a total budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttributeAllocation {
    /// The total the allocation was split from.
    pub total: PrivacyBudget,
    /// Sorted by path.
    pub allocations: Vec<AttributeBudget>,
}

impl AttributeAllocation {
    /// Build an allocation, sorting entries by path.
    pub fn new(total: PrivacyBudget, mut allocations: Vec<AttributeBudget>) -> Self {
        allocations.sort_by(|a, b| a.path.cmp(&b.path));
        Self { total, allocations }
    }

    /// Sum of all sub-budgets, accumulated in path order.
    pub fn sum(&self) -> PrivacyBudget {
        self.allocations
            .iter()
            .fold(PrivacyBudget::zero(), |acc, a| acc + a.budget)
    }

    pub fn get(&self, path: &AttributePath) -> Option<&PrivacyBudget> {
        self.allocations
            .iter()
            .find(|a| &a.path == path)
            .map(|a| &a.budget)
    }

    pub fn paths(&self) -> impl Iterator<Item = &AttributePath> {
        self.allocations.iter().map(|a| &a.path)
    }

    /// Check every entry and the total are valid and paths are unique.
    pub fn validate(&self) -> Result<(), String> {
        self.total.validate()?;
        for (i, entry) in self.allocations.iter().enumerate() {
            entry
                .budget
                .validate()
                .map_err(|e| format!("{}: {}", entry.path, e))?;
            if i > 0 && self.allocations[i - 1].path >= entry.path {
                return Err(format!("attribute {} is duplicated or out of order", entry.path));
            }
        }
        Ok(())
    }
}
