//! Lifecycle statuses of nodes, per task.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::REASON;
use crate::error::{DataSpecError, Result};
use crate::node::NodeId;

/// State of a task on a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    Pending,
    Ready,
    Error,
}

impl State {
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Pending => "pending",
            State::Ready => "ready",
            State::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, State::Pending)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for State {
    type Err = DataSpecError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(State::Pending),
            "ready" => Ok(State::Ready),
            "error" => Ok(State::Error),
            _ => Err(DataSpecError::decode(format!("unknown status state '{}'", s))),
        }
    }
}

/// How a write treats the state already stored for its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePolicy {
    /// Pending may move to any state; a terminal state may only be re-set
    /// to itself.
    Transition,
    /// Replace whatever is stored. Used by reconciliation.
    Overwrite,
}

impl WritePolicy {
    /// Whether a write of `next` is allowed over `current`.
    pub fn permits(&self, current: Option<State>, next: State) -> bool {
        match (self, current) {
            (WritePolicy::Overwrite, _) | (_, None) | (_, Some(State::Pending)) => true,
            (WritePolicy::Transition, Some(current)) => current == next,
        }
    }
}

/// A stored status record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    pub node: NodeId,
    pub task: String,
    pub state: State,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    /// Incremented by the store on every write to the key.
    pub version: u64,
    /// The manager that wrote this version.
    pub manager: String,
    pub updated_at: DateTime<Utc>,
}

impl Status {
    pub fn is_ready(&self) -> bool {
        self.state == State::Ready
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// The recorded cause of an error status.
    pub fn reason(&self) -> &str {
        self.property(REASON).unwrap_or("no reason recorded")
    }
}

/// A write to the status of `(node, task)`.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub node: NodeId,
    pub task: String,
    pub state: State,
    pub properties: BTreeMap<String, String>,
    pub manager: String,
}

impl StatusUpdate {
    pub fn new(node: &NodeId, task: impl Into<String>, state: State) -> Self {
        Self {
            node: node.clone(),
            task: task.into(),
            state,
            properties: BTreeMap::new(),
            manager: String::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_properties(mut self, properties: BTreeMap<String, String>) -> Self {
        self.properties.extend(properties);
        self
    }

    pub fn by(mut self, manager: impl Into<String>) -> Self {
        self.manager = manager.into();
        self
    }

    /// The record the store keeps after applying this update over
    /// `current`, or a conflict if `policy` forbids it.
    pub(crate) fn apply(
        self,
        current: Option<(State, u64)>,
        policy: WritePolicy,
        now: DateTime<Utc>,
    ) -> Result<Status> {
        if !policy.permits(current.map(|(state, _)| state), self.state) {
            let current = current.map(|(state, _)| state).unwrap_or(State::Pending);
            return Err(DataSpecError::StatusConflict {
                node: self.node,
                task: self.task,
                current,
            });
        }
        Ok(Status {
            node: self.node,
            task: self.task,
            state: self.state,
            properties: self.properties,
            version: current.map_or(1, |(_, version)| version + 1),
            manager: self.manager,
            updated_at: now,
        })
    }
}
