//! Process-wide reconciliation defaults.
//!
//! Established once at process start (YAML file, then environment overrides)
//! and read-only afterwards. Components receive the values they need as
//! explicit parameters; [`install`] / [`global`] only exist so that a
//! binary can make its one loaded copy reachable without threading it through
//! every layer.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{io_err, ConfigError};

pub const ENV_CONSISTENCY_CHECKS: &str = "RECONCILE_CONSISTENCY_CHECKS";
pub const ENV_RETRY_INTERVAL_MS: &str = "RECONCILE_RETRY_INTERVAL_MS";
pub const ENV_READ_TIMEOUT_SECS: &str = "RECONCILE_READ_TIMEOUT_SECS";
pub const ENV_DELETE_TIMEOUT_SECS: &str = "RECONCILE_DELETE_TIMEOUT_SECS";

static GLOBAL: OnceLock<ReconcileDefaults> = OnceLock::new();

/// Tunables shared by every reconciliation run in the process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReconcileDefaults {
    /// Consistency-check attempt ceiling per run.
    pub consistency_max_attempts: u32,
    /// Fixed delay between attempts.
    pub retry_interval_ms: u64,
    /// Default read budget for resources without an override.
    pub read_timeout_secs: u64,
    /// Budget for write calls retried on transient failures.
    pub write_timeout_secs: u64,
    /// Budget for polling until a deleted object disappears.
    pub delete_timeout_secs: u64,
    /// Attempt ceiling for count-bounded write retries.
    pub retry_when_max_attempts: u32,
    /// Per resource type read budget, in seconds.
    pub read_timeout_overrides: BTreeMap<String, u64>,
}

impl Default for ReconcileDefaults {
    fn default() -> Self {
        Self {
            consistency_max_attempts: 5,
            retry_interval_ms: 100,
            read_timeout_secs: 300,
            write_timeout_secs: 120,
            delete_timeout_secs: 180,
            retry_when_max_attempts: 10,
            read_timeout_overrides: BTreeMap::new(),
        }
    }
}

impl ReconcileDefaults {
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    pub fn delete_timeout(&self) -> Duration {
        Duration::from_secs(self.delete_timeout_secs)
    }

    /// Read budget for `resource_type`, honouring per-type overrides.
    pub fn read_timeout_for(&self, resource_type: &str) -> Duration {
        let secs = self
            .read_timeout_overrides
            .get(resource_type)
            .copied()
            .unwrap_or(self.read_timeout_secs);
        Duration::from_secs(secs)
    }

    /// Load defaults from a YAML file. A missing file yields the built-in
    /// defaults; keys absent from the file keep their default values.
    pub fn load_at(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no reconcile defaults file, using built-ins");
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        let defaults: Self =
            serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        defaults.validate()?;
        Ok(defaults)
    }

    /// Apply `RECONCILE_*` overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides_from(|var| std::env::var(var).ok())
    }

    /// Apply `RECONCILE_*` overrides resolved through `lookup`.
    pub fn with_overrides_from(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(v) = parse_env::<u32>(&lookup, ENV_CONSISTENCY_CHECKS)? {
            self.consistency_max_attempts = v;
        }
        if let Some(v) = parse_env::<u64>(&lookup, ENV_RETRY_INTERVAL_MS)? {
            self.retry_interval_ms = v;
        }
        if let Some(v) = parse_env::<u64>(&lookup, ENV_READ_TIMEOUT_SECS)? {
            self.read_timeout_secs = v;
        }
        if let Some(v) = parse_env::<u64>(&lookup, ENV_DELETE_TIMEOUT_SECS)? {
            self.delete_timeout_secs = v;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.consistency_max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "consistency_max_attempts must be at least 1".to_string(),
            ));
        }
        if self.retry_when_max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "retry_when_max_attempts must be at least 1".to_string(),
            ));
        }
        if self.retry_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "retry_interval_ms must be greater than zero".to_string(),
            ));
        }
        for (name, secs) in [
            ("read_timeout_secs", self.read_timeout_secs),
            ("write_timeout_secs", self.write_timeout_secs),
            ("delete_timeout_secs", self.delete_timeout_secs),
        ] {
            if secs == 0 {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be greater than zero"
                )));
            }
        }
        if let Some((resource_type, _)) = self
            .read_timeout_overrides
            .iter()
            .find(|(_, secs)| **secs == 0)
        {
            return Err(ConfigError::Invalid(format!(
                "read timeout override for {resource_type} must be greater than zero"
            )));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(
    lookup: &dyn Fn(&str) -> Option<String>,
    var: &str,
) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    let Some(raw) = lookup(var) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    trimmed
        .parse::<T>()
        .map(Some)
        .map_err(|e| ConfigError::InvalidEnv {
            var: var.to_string(),
            value: raw.clone(),
            reason: e.to_string(),
        })
}

/// Make `defaults` the process-wide copy. Only the first call succeeds.
pub fn install(defaults: ReconcileDefaults) -> Result<(), ConfigError> {
    defaults.validate()?;
    GLOBAL
        .set(defaults)
        .map_err(|_| ConfigError::AlreadyInstalled)
}

/// The installed process-wide defaults, or the built-ins if none were installed.
pub fn global() -> &'static ReconcileDefaults {
    GLOBAL.get_or_init(ReconcileDefaults::default)
}
