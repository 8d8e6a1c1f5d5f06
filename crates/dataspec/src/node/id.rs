//! Content-derived node identities.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{DataSpecError, Result};

use super::kind::NodeKind;

/// Number of hex characters kept from the SHA-256 digest.
const ID_LEN: usize = 32;

/// Identity of a node: the truncated SHA-256 of its canonical definition.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeId(String);

impl NodeId {
    /// Hash arbitrary bytes into an identity.
    pub fn from_digest(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        let hex = format!("{:x}", hasher.finalize());
        NodeId(hex[..ID_LEN].to_string())
    }

    /// Identity of a facet (schema, size) derived from a dataset node.
    pub fn derived(kind: NodeKind, dataset: &NodeId) -> Self {
        Self::from_digest(format!("{}:{}", kind, dataset).as_bytes())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for NodeId {
    type Err = DataSpecError;

    fn from_str(s: &str) -> Result<Self> {
        let valid = s.len() == ID_LEN
            && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if valid {
            Ok(NodeId(s.to_string()))
        } else {
            Err(DataSpecError::decode(format!(
                "'{}' is not a {}-character lowercase hex node id",
                s, ID_LEN
            )))
        }
    }
}

impl TryFrom<String> for NodeId {
    type Error = DataSpecError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<NodeId> for String {
    fn from(id: NodeId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_is_stable() {
        let a = NodeId::from_digest(b"census");
        let b = NodeId::from_digest(b"census");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 32);
        assert_ne!(a, NodeId::from_digest(b"beacon"));
    }

    #[test]
    fn test_parse() {
        let id = NodeId::from_digest(b"x");
        let parsed: NodeId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("not-an-id".parse::<NodeId>().is_err());
        assert!("90D5ACCE1F9376D873C600DC29D55633".parse::<NodeId>().is_err());
    }

    #[test]
    fn test_derived_ids_differ_by_kind() {
        let dataset = NodeId::from_digest(b"ds");
        assert_ne!(
            NodeId::derived(NodeKind::Schema, &dataset),
            NodeId::derived(NodeKind::Size, &dataset)
        );
    }

    #[test]
    fn test_serde_rejects_malformed() {
        let err = serde_json::from_str::<NodeId>("\"zz\"");
        assert!(err.is_err());
    }
}
