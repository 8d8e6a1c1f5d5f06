//! Task names, property keys and reserved field names.

/// External task classifying a dataset as big data.
pub const BIG_DATA_TASK: &str = "big_data";
/// Property of [`BIG_DATA_TASK`] holding `"True"`/`"False"`.
pub const IS_BIG_DATA: &str = "is_big_data";
/// Task reporting that a node's value has been computed and validated.
pub const COMPUTE_TASK: &str = "compute";

/// Property set on error statuses: the failing upstream node.
pub const UPSTREAM_NODE: &str = "upstream_node";
/// Property set on error statuses: the failing upstream task.
pub const UPSTREAM_TASK: &str = "upstream_task";
/// Property set on error statuses: a human-readable cause.
pub const REASON: &str = "reason";

/// Union member property marking a public table.
pub const PUBLIC: &str = "public";

/// Field of a protected dataset holding the original data.
pub const DATA: &str = "data";
/// Field of a protected dataset holding the privacy unit identifier.
pub const PROTECTED_ENTITY: &str = "protected_entity";
/// Field of a protected dataset flagging public rows.
pub const IS_PUBLIC: &str = "is_public";
/// Field of a protected dataset holding row weights.
pub const WEIGHTS: &str = "weights";

/// Named parameter of `protect`.
pub const PROTECTED_PATHS: &str = "protected_paths";
/// Named parameter of `protect`.
pub const PUBLIC_PATHS: &str = "public_paths";
/// Named parameter of `user_settings`.
pub const USER_TYPE: &str = "user_type";
/// Named parameter of `assign_budget`.
pub const ATTRIBUTES_BUDGET: &str = "attributes_budget";
