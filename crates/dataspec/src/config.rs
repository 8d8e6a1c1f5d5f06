//! Manager configuration.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::budget::BudgetPolicy;
use crate::error::{DataSpecError, Result};
use crate::transform::UserSettingsPolicy;

/// Configuration of a [`Manager`](crate::Manager).
///
/// Policies end up in the properties of the transforms they drive, so
/// two managers with different policies build different nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Name recorded on every status this manager writes. Generated when
    /// absent.
    pub manager_id: Option<String>,
    /// How long `apply` waits for parents to become ready (0 = no wait).
    pub ready_timeout_ms: u64,
    /// Delay between status polls while waiting.
    pub poll_interval_ms: u64,
    pub budget: BudgetPolicy,
    pub user_settings: UserSettingsPolicy,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            manager_id: None,
            ready_timeout_ms: 0,
            poll_interval_ms: 50,
            budget: BudgetPolicy::default(),
            user_settings: UserSettingsPolicy::default(),
        }
    }
}

impl ManagerConfig {
    /// Read a configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| DataSpecError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: ManagerConfig = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            DataSpecError::Config(format!("Failed to parse '{}': {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.budget
            .validate()
            .map_err(|e| DataSpecError::Config(format!("budget policy: {}", e)))?;
        if self.poll_interval_ms == 0 && self.ready_timeout_ms > 0 {
            return Err(DataSpecError::Config(
                "poll_interval_ms must be positive when waiting for readiness".to_string(),
            ));
        }
        if matches!(&self.manager_id, Some(id) if id.trim().is_empty()) {
            return Err(DataSpecError::Config("manager_id must not be blank".to_string()));
        }
        Ok(())
    }

    pub fn with_manager_id(mut self, id: impl Into<String>) -> Self {
        self.manager_id = Some(id.into());
        self
    }

    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_budget_policy(mut self, policy: BudgetPolicy) -> Self {
        self.budget = policy;
        self
    }

    pub fn with_user_settings_policy(mut self, policy: UserSettingsPolicy) -> Self {
        self.user_settings = policy;
        self
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// The configured manager id, or a fresh one of the form
    /// `manager-<pid>-<random>`.
    pub fn resolve_manager_id(&self) -> String {
        match &self.manager_id {
            Some(id) => id.clone(),
            None => format!(
                "manager-{}-{:08x}",
                std::process::id(),
                fastrand::u32(..)
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"manager_id": "etl-1", "ready_timeout_ms": 250, "budget": {{"max_epsilon": 5.0}}}}"#
        )
        .unwrap();
        let config = ManagerConfig::load(file.path()).unwrap();
        assert_eq!(config.manager_id.as_deref(), Some("etl-1"));
        assert_eq!(config.ready_timeout(), Duration::from_millis(250));
        assert_eq!(config.budget.max_epsilon, 5.0);
        assert_eq!(config.budget.base_epsilon, BudgetPolicy::default().base_epsilon);
        assert_eq!(config.resolve_manager_id(), "etl-1");
    }

    #[test]
    fn test_load_rejects_bad_policy() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"budget": {{"delta": 2.0}}}}"#).unwrap();
        assert!(matches!(
            ManagerConfig::load(file.path()),
            Err(DataSpecError::Config(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            ManagerConfig::load("/nonexistent/dataspec.json"),
            Err(DataSpecError::Io { .. })
        ));
    }

    #[test]
    fn test_generated_ids_differ() {
        let config = ManagerConfig::default();
        let id = config.resolve_manager_id();
        assert!(id.starts_with(&format!("manager-{}-", std::process::id())));
    }

    #[test]
    fn test_builders() {
        let config = ManagerConfig::default()
            .with_manager_id("m")
            .with_ready_timeout(Duration::from_secs(1))
            .with_poll_interval(Duration::from_millis(5));
        assert_eq!(config.ready_timeout_ms, 1000);
        assert_eq!(config.poll_interval_ms, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_oversized_durations_saturate() {
        let config = ManagerConfig::default()
            .with_ready_timeout(Duration::MAX)
            .with_poll_interval(Duration::from_secs(u64::MAX / 10));
        assert_eq!(config.ready_timeout_ms, u64::MAX);
        assert_eq!(config.poll_interval_ms, u64::MAX);
        assert_eq!(config.ready_timeout(), Duration::from_millis(u64::MAX));
    }
}
