//! Transform contracts and the built-in registry.

use indexmap::IndexMap;
use once_cell::sync::Lazy;

use crate::budget::BudgetPolicy;
use crate::constants::{ATTRIBUTES_BUDGET, PROTECTED_PATHS, PUBLIC_PATHS, USER_TYPE};
use crate::error::{DataSpecError, Result};
use crate::node::NodeKind;

use super::{Transform, TransformKind, UserSettingsPolicy};

const PROTECTED_KINDS: &[NodeKind] =
    &[NodeKind::Protected, NodeKind::UserAdjusted, NodeKind::Budgeted];

/// A named node argument of a transform.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpec {
    pub name: &'static str,
    pub kind: NodeKind,
    pub required: bool,
    /// Inference transform applied to the first input when the parameter
    /// is omitted.
    pub default: Option<TransformKind>,
}

/// Scalar type of a transform property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyType {
    Float,
    Integer,
}

/// A literal property a transform must carry.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertySpec {
    pub name: &'static str,
    pub ty: PropertyType,
}

/// The typed contract of a transform.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformSpec {
    pub kind: TransformKind,
    pub version: u32,
    /// Kinds accepted for every positional input.
    pub accepts: &'static [NodeKind],
    pub arity: usize,
    pub parameters: &'static [ParameterSpec],
    pub properties: &'static [PropertySpec],
    pub output: NodeKind,
    pub description: &'static str,
}

impl TransformSpec {
    pub fn name(&self) -> &'static str {
        self.kind.as_str()
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Whether the transform derives its output from its input alone.
    pub fn is_inference(&self) -> bool {
        self.parameters.is_empty()
    }

    /// Check a transform value against this contract.
    pub fn check_transform(&self, transform: &Transform) -> Result<()> {
        if transform.version != self.version {
            return Err(DataSpecError::contract(
                self.name(),
                format!(
                    "version {} is not supported (registered version {})",
                    transform.version, self.version
                ),
            ));
        }
        for property in self.properties {
            let raw = transform.properties.get(property.name).ok_or_else(|| {
                DataSpecError::parameter(self.name(), property.name, "missing property")
            })?;
            let parsed = match property.ty {
                PropertyType::Float => raw.parse::<f64>().map(|_| ()).map_err(|e| e.to_string()),
                PropertyType::Integer => raw.parse::<u64>().map(|_| ()).map_err(|e| e.to_string()),
            };
            parsed.map_err(|e| {
                DataSpecError::parameter(self.name(), property.name, format!("'{}': {}", raw, e))
            })?;
        }
        if let Some(unknown) = transform
            .properties
            .keys()
            .find(|key| !self.properties.iter().any(|p| p.name == key.as_str()))
        {
            return Err(DataSpecError::parameter(
                self.name(),
                unknown.as_str(),
                "unknown property",
            ));
        }
        match self.kind {
            TransformKind::AutomaticBudget => {
                BudgetPolicy::from_properties(&transform.properties)?;
            }
            TransformKind::AutomaticUserSettings => {
                UserSettingsPolicy::from_properties(&transform.properties)?;
            }
            _ => {}
        }
        Ok(())
    }

    /// Check input kinds and arity.
    pub fn check_inputs(&self, inputs: &[NodeKind]) -> Result<()> {
        if inputs.len() != self.arity {
            return Err(DataSpecError::contract(
                self.name(),
                format!("expected {} input(s), got {}", self.arity, inputs.len()),
            ));
        }
        for (position, kind) in inputs.iter().enumerate() {
            if !self.accepts.contains(kind) {
                return Err(DataSpecError::contract(
                    self.name(),
                    format!(
                        "input {} is a {} node; accepted kinds: {}",
                        position,
                        kind,
                        join_kinds(self.accepts)
                    ),
                ));
            }
        }
        Ok(())
    }

    /// Check bound parameter names and kinds. Every declared parameter must
    /// be bound: optional ones by applying their default transform first.
    pub fn check_parameters<'a>(
        &self,
        parameters: impl IntoIterator<Item = (&'a str, NodeKind)>,
    ) -> Result<()> {
        let mut bound = Vec::new();
        for (name, kind) in parameters {
            let spec = self
                .parameter(name)
                .ok_or_else(|| DataSpecError::parameter(self.name(), name, "unknown parameter"))?;
            if spec.kind != kind {
                return Err(DataSpecError::parameter(
                    self.name(),
                    name,
                    format!("expected a {} node, got {}", spec.kind, kind),
                ));
            }
            bound.push(name);
        }
        for spec in self.parameters {
            if bound.contains(&spec.name) {
                continue;
            }
            let message = match spec.default {
                Some(default) => format!("parameter is unbound (default: {})", default),
                None => "required parameter is missing".to_string(),
            };
            return Err(DataSpecError::parameter(self.name(), spec.name, message));
        }
        Ok(())
    }
}

fn join_kinds(kinds: &[NodeKind]) -> String {
    kinds
        .iter()
        .map(NodeKind::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

static BUILTINS: [TransformSpec; 8] = [
    TransformSpec {
        kind: TransformKind::AutomaticProtectedPaths,
        version: 1,
        accepts: &[NodeKind::Source],
        arity: 1,
        parameters: &[],
        properties: &[],
        output: NodeKind::ProtectedPaths,
        description: "Tables not marked public hold privacy units",
    },
    TransformSpec {
        kind: TransformKind::AutomaticPublicPaths,
        version: 1,
        accepts: &[NodeKind::Source],
        arity: 1,
        parameters: &[],
        properties: &[],
        output: NodeKind::PublicPaths,
        description: "Tables marked public may be read without protection",
    },
    TransformSpec {
        kind: TransformKind::Protect,
        version: 1,
        accepts: &[NodeKind::Source],
        arity: 1,
        parameters: &[
            ParameterSpec {
                name: PROTECTED_PATHS,
                kind: NodeKind::ProtectedPaths,
                required: false,
                default: Some(TransformKind::AutomaticProtectedPaths),
            },
            ParameterSpec {
                name: PUBLIC_PATHS,
                kind: NodeKind::PublicPaths,
                required: false,
                default: Some(TransformKind::AutomaticPublicPaths),
            },
        ],
        properties: &[],
        output: NodeKind::Protected,
        description: "Declare privacy units and public tables of a source",
    },
    TransformSpec {
        kind: TransformKind::AutomaticUserSettings,
        version: 1,
        accepts: &[NodeKind::Protected, NodeKind::UserAdjusted],
        arity: 1,
        parameters: &[],
        properties: &[PropertySpec {
            name: "max_categories",
            ty: PropertyType::Integer,
        }],
        output: NodeKind::UserSettings,
        description: "Data type with wide text categories relaxed to free text",
    },
    TransformSpec {
        kind: TransformKind::UserSettings,
        version: 1,
        accepts: &[NodeKind::Protected, NodeKind::UserAdjusted],
        arity: 1,
        parameters: &[ParameterSpec {
            name: USER_TYPE,
            kind: NodeKind::UserSettings,
            required: false,
            default: Some(TransformKind::AutomaticUserSettings),
        }],
        properties: &[],
        output: NodeKind::UserAdjusted,
        description: "Replace the data type of a protected dataset",
    },
    TransformSpec {
        kind: TransformKind::AutomaticBudget,
        version: 1,
        accepts: PROTECTED_KINDS,
        arity: 1,
        parameters: &[],
        properties: &[
            PropertySpec {
                name: "base_epsilon",
                ty: PropertyType::Float,
            },
            PropertySpec {
                name: "delta",
                ty: PropertyType::Float,
            },
            PropertySpec {
                name: "epsilon_per_attribute",
                ty: PropertyType::Float,
            },
            PropertySpec {
                name: "max_epsilon",
                ty: PropertyType::Float,
            },
            PropertySpec {
                name: "size_scale",
                ty: PropertyType::Float,
            },
        ],
        output: NodeKind::Budget,
        description: "Total privacy budget sized from protected attributes and rows",
    },
    TransformSpec {
        kind: TransformKind::AttributesBudget,
        version: 1,
        accepts: &[NodeKind::Budget],
        arity: 1,
        parameters: &[],
        properties: &[],
        output: NodeKind::AttributesBudget,
        description: "Split a total budget equally across protected attributes",
    },
    TransformSpec {
        kind: TransformKind::AssignBudget,
        version: 1,
        accepts: PROTECTED_KINDS,
        arity: 1,
        parameters: &[ParameterSpec {
            name: ATTRIBUTES_BUDGET,
            kind: NodeKind::AttributesBudget,
            required: true,
            default: None,
        }],
        properties: &[],
        output: NodeKind::Budgeted,
        description: "Bind an attribute allocation to a protected dataset",
    },
];

static REGISTRY: Lazy<TransformRegistry> = Lazy::new(TransformRegistry::builtin);

/// The process-wide registry of built-in transforms.
pub fn registry() -> &'static TransformRegistry {
    &REGISTRY
}

/// Catalogue of transform contracts, by name.
#[derive(Debug)]
pub struct TransformRegistry {
    specs: IndexMap<&'static str, &'static TransformSpec>,
}

impl TransformRegistry {
    fn builtin() -> Self {
        Self {
            specs: BUILTINS.iter().map(|spec| (spec.name(), spec)).collect(),
        }
    }

    /// Look up a contract by transform name.
    pub fn resolve(&self, name: &str) -> Result<&'static TransformSpec> {
        self.specs
            .get(name)
            .copied()
            .ok_or_else(|| DataSpecError::TransformNotFound(name.to_string()))
    }

    /// The contract of a built-in.
    pub fn spec(&self, kind: TransformKind) -> &'static TransformSpec {
        // BUILTINS is declared in TransformKind order.
        &BUILTINS[kind as usize]
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static TransformSpec> + '_ {
        self.specs.values().copied()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}
