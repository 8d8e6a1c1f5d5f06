//! Immutable, content-addressed nodes of the lineage graph.
//!
//! A node is either a source (materialized by a connector), a scalar
//! literal, or the output of one transform applied to parent nodes. Its
//! identity is the hash of its canonical definition, so building the same
//! node twice, in any process, yields the same [`NodeId`].

mod id;
mod kind;
mod value;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DataSpecError, Result};
use crate::schema::{Statistics, Type};
use crate::source::TableName;
use crate::transform::{registry, Parameters, Transform};

pub use id::NodeId;
pub use kind::NodeKind;
pub use value::{Dataset, Scalar, Value};

/// A dataset as materialized by a source connector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceSpec {
    pub uri: String,
    pub tables: Vec<TableName>,
    #[serde(rename = "type")]
    pub type_: Type,
    pub statistics: Statistics,
}

/// A transform applied to parent nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Transformed {
    pub transform: Transform,
    pub arguments: Vec<NodeId>,
    #[serde(default)]
    pub named_arguments: BTreeMap<String, NodeId>,
}

/// How a node is defined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum NodeSpec {
    Source(SourceSpec),
    Scalar(Scalar),
    Transformed(Transformed),
}

/// The hashed part of a node.
#[derive(Serialize)]
struct Definition<'a> {
    kind: NodeKind,
    spec: &'a NodeSpec,
}

/// A node of the lineage graph.
///
/// Nodes are built once and never mutated. Unknown top-level fields read
/// from a newer writer are kept in `extra` and written back unchanged; they
/// do not take part in the identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    uuid: NodeId,
    kind: NodeKind,
    spec: NodeSpec,
    #[serde(flatten)]
    extra: BTreeMap<String, serde_json::Value>,
}

impl Node {
    fn new(kind: NodeKind, spec: NodeSpec) -> Result<Self> {
        let uuid = identity(kind, &spec)?;
        Ok(Self {
            uuid,
            kind,
            spec,
            extra: BTreeMap::new(),
        })
    }

    /// A source node. The type must be a union of tables (possibly nested
    /// under further unions) and must validate.
    pub fn source(spec: SourceSpec) -> Result<Self> {
        if !matches!(spec.type_, Type::Union { .. }) {
            return Err(DataSpecError::Source(format!(
                "type of '{}' must be a union of tables, got {}",
                spec.uri,
                spec.type_.name()
            )));
        }
        spec.type_
            .validate()
            .map_err(|e| DataSpecError::Source(format!("invalid type for '{}': {}", spec.uri, e)))?;
        spec.statistics.validate().map_err(|e| {
            DataSpecError::Source(format!("invalid statistics for '{}': {}", spec.uri, e))
        })?;
        Self::new(NodeKind::Source, NodeSpec::Source(spec))
    }

    /// A literal scalar node.
    pub fn scalar(scalar: Scalar) -> Result<Self> {
        let kind = scalar.kind();
        let checked = match &scalar {
            Scalar::ProtectedPaths(_) | Scalar::PublicPaths(_) => Ok(()),
            Scalar::UserSettings(ty) => ty.validate(),
            Scalar::Budget(budget) => budget.total.validate(),
            Scalar::AttributesBudget(allocation) => allocation.validate(),
        };
        checked.map_err(|e| DataSpecError::parameter("scalar", kind.as_str(), e))?;
        Self::new(kind, NodeSpec::Scalar(scalar))
    }

    /// Apply `transform` to `inputs` with named `parameters`.
    ///
    /// Checks the transform against its registered contract: version and
    /// properties, arity and kinds of the inputs, names and kinds of the
    /// parameters. No node is produced when any check fails.
    pub fn build(transform: &Transform, inputs: &[&Node], parameters: &Parameters) -> Result<Self> {
        let spec = registry().resolve(&transform.name)?;
        spec.check_transform(transform)?;
        let kinds: Vec<NodeKind> = inputs.iter().map(|node| node.kind).collect();
        spec.check_inputs(&kinds)?;
        spec.check_parameters(parameters.kinds())?;

        let node = Self::new(
            spec.output,
            NodeSpec::Transformed(Transformed {
                transform: transform.clone(),
                arguments: inputs.iter().map(|node| node.uuid.clone()).collect(),
                named_arguments: parameters.ids(),
            }),
        )?;
        debug!(node = %node.uuid, transform = %transform, "built node");
        Ok(node)
    }

    pub fn uuid(&self) -> &NodeId {
        &self.uuid
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn spec(&self) -> &NodeSpec {
        &self.spec
    }

    /// Fields preserved from a newer wire version.
    pub fn extra(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.extra
    }

    pub fn transform(&self) -> Option<&Transform> {
        match &self.spec {
            NodeSpec::Transformed(transformed) => Some(&transformed.transform),
            _ => None,
        }
    }

    pub fn is_source(&self) -> bool {
        matches!(self.spec, NodeSpec::Source(_))
    }

    /// Positional parents, then named parents in name order.
    pub fn parents(&self) -> Vec<&NodeId> {
        match &self.spec {
            NodeSpec::Transformed(transformed) => transformed
                .arguments
                .iter()
                .chain(transformed.named_arguments.values())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Recompute the identity from the definition and compare.
    pub fn verify(&self) -> Result<()> {
        let expected = identity(self.kind, &self.spec)?;
        if expected != self.uuid {
            return Err(DataSpecError::decode(format!(
                "node identity {} does not match its definition (expected {})",
                self.uuid, expected
            )));
        }
        if self.kind != expected_kind(&self.spec)? {
            return Err(DataSpecError::decode(format!(
                "node {} has kind {} inconsistent with its definition",
                self.uuid, self.kind
            )));
        }
        Ok(())
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.transform() {
            Some(transform) => write!(f, "{}({}) {}", self.kind, transform.name, self.uuid),
            None => write!(f, "{} {}", self.kind, self.uuid),
        }
    }
}

/// Hash of the canonical JSON of `(kind, spec)`. Going through
/// `serde_json::Value` sorts object keys at every level.
fn identity(kind: NodeKind, spec: &NodeSpec) -> Result<NodeId> {
    let canonical = serde_json::to_value(Definition { kind, spec })?;
    let bytes = serde_json::to_vec(&canonical)?;
    Ok(NodeId::from_digest(&bytes))
}

fn expected_kind(spec: &NodeSpec) -> Result<NodeKind> {
    Ok(match spec {
        NodeSpec::Source(_) => NodeKind::Source,
        NodeSpec::Scalar(scalar) => scalar.kind(),
        NodeSpec::Transformed(transformed) => registry().resolve(&transformed.transform.name)?.output,
    })
}
