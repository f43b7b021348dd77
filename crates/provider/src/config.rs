//! Provider configuration

use gcompute_common::{Scope, ScopeKind};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::waiter::{WaitConfig, MAX_WAIT_TIMEOUT};

/// Provider configuration, owned by the orchestrator and injected into
/// every lifecycle call through [`crate::context::ProviderContext`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Project every entity lives in
    pub project: String,

    /// Region used for regional resources
    pub region: String,

    /// Zone used for zonal resources
    pub zone: String,

    /// Operation waiter settings
    pub wait: WaitSettings,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            project: "default-project".to_string(),
            region: "us-central1".to_string(),
            zone: "us-central1-a".to_string(),
            wait: WaitSettings::default(),
        }
    }
}

/// Waiter settings as written in the config file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitSettings {
    /// Wall-clock budget for one operation
    pub timeout_secs: u64,

    /// Minimum time between two status queries
    pub min_interval_ms: u64,

    /// Upper bound for the backoff between status queries
    pub max_interval_secs: u64,

    /// Growth factor of the delay after each query
    pub backoff_multiplier: f64,
}

impl Default for WaitSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 120,
            min_interval_ms: 1000,
            max_interval_secs: 10,
            backoff_multiplier: 2.0,
        }
    }
}

impl From<&WaitSettings> for WaitConfig {
    fn from(s: &WaitSettings) -> Self {
        WaitConfig {
            timeout: Duration::from_secs(s.timeout_secs),
            min_interval: Duration::from_millis(s.min_interval_ms),
            max_interval: Duration::from_secs(s.max_interval_secs),
            backoff_multiplier: s.backoff_multiplier,
        }
    }
}

impl ProviderConfig {
    /// Load configuration from file
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> gcompute_common::Result<()> {
        let invalid = |msg: &str| Err(gcompute_common::Error::InvalidConfig(msg.to_string()));
        if self.project.is_empty() {
            return invalid("project must not be empty");
        }
        if self.region.is_empty() || self.zone.is_empty() {
            return invalid("region and zone must not be empty");
        }
        if !self.wait.backoff_multiplier.is_finite() || self.wait.backoff_multiplier < 1.0 {
            return invalid("wait.backoff_multiplier must be a finite number of at least 1.0");
        }
        if self.wait.timeout_secs == 0 || self.wait.timeout_secs > MAX_WAIT_TIMEOUT.as_secs() {
            return Err(gcompute_common::Error::InvalidConfig(format!(
                "wait.timeout_secs must be between 1 and {}",
                MAX_WAIT_TIMEOUT.as_secs()
            )));
        }
        if self.wait.min_interval_ms == 0 {
            return invalid("wait.min_interval_ms must be greater than zero");
        }
        if self.wait.max_interval_secs > MAX_WAIT_TIMEOUT.as_secs() {
            return invalid("wait.max_interval_secs must not exceed the longest wait timeout");
        }
        if Duration::from_millis(self.wait.min_interval_ms) > Duration::from_secs(self.wait.timeout_secs) {
            return invalid("wait.min_interval_ms must not exceed wait.timeout_secs");
        }
        Ok(())
    }

    /// Waiter configuration derived from the `[wait]` table
    pub fn wait_config(&self) -> WaitConfig {
        WaitConfig::from(&self.wait)
    }

    /// Concrete scope for a resource type's scope kind
    pub fn scope_for(&self, kind: ScopeKind) -> Scope {
        match kind {
            ScopeKind::Global => Scope::Global,
            ScopeKind::Regional => Scope::Regional(self.region.clone()),
            ScopeKind::Zonal => Scope::Zonal(self.zone.clone()),
        }
    }
}
