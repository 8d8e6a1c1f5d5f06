//! Versioned wire encoding of nodes and their facets.
//!
//! Every artifact is a JSON object tagged with `"@type"` and `"version"`.
//! Object keys are sorted at every level, so equal values encode to equal
//! bytes. Decoding follows one compatibility policy:
//!
//! - unknown top-level keys are preserved and written back on re-encode;
//! - unknown keys inside nested structures are rejected;
//! - a wrong `@type`, or a version newer than [`WIRE_VERSION`], is rejected.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{DataSpecError, Result};
use crate::node::Node;
use crate::schema::{Schema, Size};

/// The newest envelope version this build reads and the one it writes.
pub const WIRE_VERSION: u32 = 1;

const TYPE_KEY: &str = "@type";
const VERSION_KEY: &str = "version";

/// A value with its own stable, versioned encoding.
pub trait Artifact: Serialize + DeserializeOwned {
    /// The `@type` tag of the envelope.
    const TYPE_URL: &'static str;

    /// Checks run on every decoded value.
    fn verify(&self) -> Result<()>;

    fn encode(&self) -> Result<Vec<u8>> {
        let Value::Object(mut fields) = serde_json::to_value(self)? else {
            return Err(DataSpecError::decode(format!(
                "{} does not encode to an object",
                Self::TYPE_URL
            )));
        };
        fields.insert(TYPE_KEY.to_string(), Value::from(Self::TYPE_URL));
        fields.insert(VERSION_KEY.to_string(), Value::from(WIRE_VERSION));
        Ok(serde_json::to_vec(&Value::Object(fields))?)
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let (fields, version) = open_envelope(bytes, Some(Self::TYPE_URL))?;
        let value: Self = serde_json::from_value(Value::Object(fields)).map_err(|e| {
            DataSpecError::Decode {
                message: format!("{}: {}", Self::TYPE_URL, e),
                offset: None,
                version: Some(version),
            }
        })?;
        value.verify()?;
        Ok(value)
    }
}

impl Artifact for Node {
    const TYPE_URL: &'static str = "dataspec/Dataset";

    fn verify(&self) -> Result<()> {
        Node::verify(self)
    }
}

impl Artifact for Schema {
    const TYPE_URL: &'static str = "dataspec/Schema";

    fn verify(&self) -> Result<()> {
        Schema::verify(self)
    }
}

impl Artifact for Size {
    const TYPE_URL: &'static str = "dataspec/Size";

    fn verify(&self) -> Result<()> {
        Size::verify(self)
    }
}

/// Any artifact, dispatched on its `@type`.
#[derive(Debug, Clone, PartialEq)]
pub enum AnyArtifact {
    Dataset(Node),
    Schema(Schema),
    Size(Size),
}

impl AnyArtifact {
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let (fields, _) = open_envelope(bytes, None)?;
        let type_url = fields.get(TYPE_KEY).and_then(Value::as_str).unwrap_or_default();
        if type_url == Node::TYPE_URL {
            Node::decode(bytes).map(AnyArtifact::Dataset)
        } else if type_url == Schema::TYPE_URL {
            Schema::decode(bytes).map(AnyArtifact::Schema)
        } else if type_url == Size::TYPE_URL {
            Size::decode(bytes).map(AnyArtifact::Size)
        } else {
            Err(DataSpecError::decode(format!("unknown artifact type '{}'", type_url)))
        }
    }

    pub fn type_url(&self) -> &'static str {
        match self {
            AnyArtifact::Dataset(_) => Node::TYPE_URL,
            AnyArtifact::Schema(_) => Schema::TYPE_URL,
            AnyArtifact::Size(_) => Size::TYPE_URL,
        }
    }
}

/// Parse and check an envelope. When `expected` is set, the `@type` must
/// match and both envelope keys are stripped from the returned fields.
fn open_envelope(bytes: &[u8], expected: Option<&str>) -> Result<(Map<String, Value>, u32)> {
    let value: Value = serde_json::from_slice(bytes).map_err(|e| DataSpecError::Decode {
        offset: Some(byte_offset(bytes, e.line(), e.column())),
        message: e.to_string(),
        version: None,
    })?;
    let Value::Object(mut fields) = value else {
        return Err(DataSpecError::decode("artifact is not a JSON object"));
    };

    let version = fields
        .get(VERSION_KEY)
        .and_then(Value::as_u64)
        .ok_or_else(|| DataSpecError::decode("missing or malformed 'version'"))?;
    let version = u32::try_from(version).unwrap_or(u32::MAX);
    if version == 0 || version > WIRE_VERSION {
        return Err(DataSpecError::Decode {
            message: format!("unsupported version (this build reads up to {})", WIRE_VERSION),
            offset: None,
            version: Some(version),
        });
    }

    let Some(type_url) = fields.get(TYPE_KEY).and_then(Value::as_str) else {
        return Err(DataSpecError::decode("missing or malformed '@type'"));
    };
    if let Some(expected) = expected {
        if type_url != expected {
            return Err(DataSpecError::Decode {
                message: format!("expected '{}', found '{}'", expected, type_url),
                offset: None,
                version: Some(version),
            });
        }
        fields.remove(TYPE_KEY);
        fields.remove(VERSION_KEY);
    }
    Ok((fields, version))
}

/// Byte offset of a 1-based line and column reported by the JSON parser.
fn byte_offset(bytes: &[u8], line: usize, column: usize) -> usize {
    let line_start = bytes
        .iter()
        .enumerate()
        .filter(|(_, b)| **b == b'\n')
        .nth(line.saturating_sub(2))
        .map_or(0, |(i, _)| i + 1);
    let line_start = if line <= 1 { 0 } else { line_start };
    (line_start + column.saturating_sub(1)).min(bytes.len())
}

/// The three encoded artifacts of a dataset node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifacts {
    pub dataset: Vec<u8>,
    pub schema: Vec<u8>,
    pub size: Vec<u8>,
}

impl Artifacts {
    pub const DATASET_FILE: &'static str = "dataset.json";
    pub const SCHEMA_FILE: &'static str = "schema.json";
    pub const SIZE_FILE: &'static str = "size.json";

    /// Write `dataset.json`, `schema.json` and `size.json` into `dir`.
    pub fn write_to(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|source| DataSpecError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        for (name, bytes) in [
            (Self::DATASET_FILE, &self.dataset),
            (Self::SCHEMA_FILE, &self.schema),
            (Self::SIZE_FILE, &self.size),
        ] {
            let path = dir.join(name);
            fs::write(&path, bytes).map_err(|source| DataSpecError::Io { path, source })?;
        }
        Ok(())
    }
}
