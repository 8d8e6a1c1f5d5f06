//! Transforms: named, versioned, pure operations producing nodes.
//!
//! A [`Transform`] is the literal value stored in a node definition. Its
//! contract lives in the [`TransformRegistry`], and its semantics in
//! [`evaluate`].

mod eval;
mod parameters;
mod protection;
mod registry;
mod user_settings;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::budget::BudgetPolicy;
use crate::error::{DataSpecError, Result};

pub use eval::evaluate;
pub use parameters::Parameters;
pub use protection::{automatic_protected_paths, automatic_public_paths, protect};
pub use registry::{
    registry, ParameterSpec, PropertySpec, PropertyType, TransformRegistry, TransformSpec,
};
pub use user_settings::{automatic_user_settings, user_settings, UserSettingsPolicy};

/// The closed set of built-in transforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TransformKind {
    AutomaticProtectedPaths,
    AutomaticPublicPaths,
    Protect,
    AutomaticUserSettings,
    UserSettings,
    AutomaticBudget,
    AttributesBudget,
    AssignBudget,
}

impl TransformKind {
    pub const ALL: [TransformKind; 8] = [
        TransformKind::AutomaticProtectedPaths,
        TransformKind::AutomaticPublicPaths,
        TransformKind::Protect,
        TransformKind::AutomaticUserSettings,
        TransformKind::UserSettings,
        TransformKind::AutomaticBudget,
        TransformKind::AttributesBudget,
        TransformKind::AssignBudget,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransformKind::AutomaticProtectedPaths => "automatic_protected_paths",
            TransformKind::AutomaticPublicPaths => "automatic_public_paths",
            TransformKind::Protect => "protect",
            TransformKind::AutomaticUserSettings => "automatic_user_settings",
            TransformKind::UserSettings => "user_settings",
            TransformKind::AutomaticBudget => "automatic_budget",
            TransformKind::AttributesBudget => "attributes_budget",
            TransformKind::AssignBudget => "assign_budget",
        }
    }
}

impl fmt::Display for TransformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransformKind {
    type Err = DataSpecError;

    fn from_str(s: &str) -> Result<Self> {
        TransformKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| DataSpecError::TransformNotFound(s.to_string()))
    }
}

/// A transform as recorded in a node definition: name, version and the
/// literal properties (policies) it was configured with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Transform {
    pub name: String,
    pub version: u32,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl Transform {
    /// The current version of a built-in transform, without properties.
    pub fn new(kind: TransformKind) -> Self {
        Self {
            name: kind.as_str().to_string(),
            version: registry().spec(kind).version,
            properties: BTreeMap::new(),
        }
    }

    /// `automatic_budget` configured with `policy`.
    pub fn automatic_budget(policy: &BudgetPolicy) -> Self {
        Self {
            properties: policy.to_properties(),
            ..Self::new(TransformKind::AutomaticBudget)
        }
    }

    /// `automatic_user_settings` configured with `policy`.
    pub fn automatic_user_settings(policy: &UserSettingsPolicy) -> Self {
        Self {
            properties: policy.to_properties(),
            ..Self::new(TransformKind::AutomaticUserSettings)
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Resolve the built-in this transform names.
    pub fn kind(&self) -> Result<TransformKind> {
        self.name.parse()
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}
