//! Path trees addressing tables inside a dataset type.

use serde::{Deserialize, Serialize};

/// A tree of labels. Every root-to-leaf walk (excluding the root label)
/// addresses one member of the dataset type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Path {
    pub label: String,
    #[serde(default)]
    pub paths: Vec<Path>,
}

impl Path {
    /// A path with no children.
    pub fn leaf(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            paths: Vec::new(),
        }
    }

    /// Build a tree under `label` from root-relative leaf walks.
    ///
    /// Shared prefixes are merged; order of first appearance is kept.
    pub fn from_leaves<I, P>(label: impl Into<String>, leaves: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<[String]>,
    {
        let mut root = Path::leaf(label);
        for leaf in leaves {
            root.insert(leaf.as_ref());
        }
        root
    }

    fn insert(&mut self, walk: &[String]) {
        let Some((head, rest)) = walk.split_first() else {
            return;
        };
        let position = match self.paths.iter().position(|p| &p.label == head) {
            Some(position) => position,
            None => {
                self.paths.push(Path::leaf(head.clone()));
                self.paths.len() - 1
            }
        };
        self.paths[position].insert(rest);
    }

    /// Root-relative walks to every leaf. A bare root yields no walks.
    pub fn leaves(&self) -> Vec<Vec<String>> {
        let mut out = Vec::new();
        for child in &self.paths {
            child.collect(Vec::new(), &mut out);
        }
        out
    }

    fn collect(&self, mut prefix: Vec<String>, out: &mut Vec<Vec<String>>) {
        prefix.push(self.label.clone());
        if self.paths.is_empty() {
            out.push(prefix);
        } else {
            for child in &self.paths {
                child.collect(prefix.clone(), out);
            }
        }
    }

    /// Whether `walk` is one of the leaves of this tree.
    pub fn contains_leaf(&self, walk: &[String]) -> bool {
        self.leaves().iter().any(|leaf| leaf == walk)
    }

    /// Whether the tree addresses nothing.
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}
