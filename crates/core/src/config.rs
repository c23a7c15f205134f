//! Runner configuration.

use std::num::NonZeroUsize;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// What the runner does after an operation fails.
///
/// Operations already in flight are never aborted; the policy only decides
/// whether workers keep claiming new work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop claiming after the first failure and report it once in-flight
    /// operations finish.
    #[default]
    StopClaiming,
    /// Run every operation, then report the first failure.
    Continue,
}

impl std::fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailurePolicy::StopClaiming => write!(f, "stop_claiming"),
            FailurePolicy::Continue => write!(f, "continue"),
        }
    }
}

/// Configuration for a runner invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Number of worker lanes, i.e. the most operations ever in flight
    pub max_concurrency: NonZeroUsize,
    /// Behaviour after an operation fails
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: NonZeroUsize::MIN,
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl RunnerConfig {
    /// Create a config with the default failure policy.
    pub fn new(max_concurrency: NonZeroUsize) -> Self {
        Self {
            max_concurrency,
            ..Self::default()
        }
    }

    /// Create a config from an unchecked limit.
    pub fn from_limit(max_concurrency: usize) -> Result<Self, ConfigError> {
        NonZeroUsize::new(max_concurrency)
            .map(Self::new)
            .ok_or(ConfigError::InvalidConcurrency(max_concurrency))
    }

    /// Load a config from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Set the concurrency limit.
    pub fn with_max_concurrency(mut self, max: NonZeroUsize) -> Self {
        self.max_concurrency = max;
        self
    }

    /// Set the failure policy.
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = RunnerConfig::default();
        assert_eq!(config.max_concurrency.get(), 1);
        assert_eq!(config.failure_policy, FailurePolicy::StopClaiming);
    }

    #[test]
    fn test_from_limit_rejects_zero() {
        let err = RunnerConfig::from_limit(0).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidConcurrency(0)));

        let config = RunnerConfig::from_limit(8).unwrap();
        assert_eq!(config.max_concurrency.get(), 8);
    }

    #[test]
    fn test_builder_setters() {
        let config = RunnerConfig::default()
            .with_max_concurrency(NonZeroUsize::new(3).unwrap())
            .with_failure_policy(FailurePolicy::Continue);
        assert_eq!(config.max_concurrency.get(), 3);
        assert_eq!(config.failure_policy, FailurePolicy::Continue);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"max_concurrency": 4, "failure_policy": "continue"}}"#).unwrap();

        let config = RunnerConfig::load(file.path()).unwrap();
        assert_eq!(config.max_concurrency.get(), 4);
        assert_eq!(config.failure_policy, FailurePolicy::Continue);
    }

    #[test]
    fn test_load_defaults_policy() {
        let config: RunnerConfig = serde_json::from_str(r#"{"max_concurrency": 2}"#).unwrap();
        assert_eq!(config.failure_policy, FailurePolicy::StopClaiming);
    }

    #[test]
    fn test_load_rejects_zero_concurrency() {
        let result = serde_json::from_str::<RunnerConfig>(r#"{"max_concurrency": 0}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = RunnerConfig::load(dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
