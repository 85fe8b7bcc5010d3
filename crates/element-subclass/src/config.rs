use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// What a trampoline does when the private slot of an instance does not
/// resolve to its host value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveFailurePolicy {
    /// Log and abort the process.
    Abort,
    /// Log and return the slot's failure value.
    FailSafe,
}

impl Default for ResolveFailurePolicy {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::Abort
        } else {
            Self::FailSafe
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubclassConfig {
    pub registry_shards: usize,
    pub resolve_failure: ResolveFailurePolicy,
    pub warn_on_marshal: bool,
}

impl Default for SubclassConfig {
    fn default() -> Self {
        Self {
            registry_shards: 16,
            resolve_failure: ResolveFailurePolicy::default(),
            warn_on_marshal: true,
        }
    }
}

impl SubclassConfig {
    pub const MAX_SHARDS: usize = 256;

    pub fn with_registry_shards(mut self, shards: usize) -> Self {
        self.registry_shards = shards;
        self
    }

    pub fn with_resolve_failure(mut self, policy: ResolveFailurePolicy) -> Self {
        self.resolve_failure = policy;
        self
    }

    pub fn with_warn_on_marshal(mut self, warn: bool) -> Self {
        self.warn_on_marshal = warn;
        self
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.registry_shards == 0 || self.registry_shards > Self::MAX_SHARDS {
            return Err(ConfigError::InvalidShardCount(self.registry_shards));
        }
        Ok(())
    }
}

static CONFIG: OnceCell<SubclassConfig> = OnceCell::new();

/// Installs the process-wide configuration. Must run before the first
/// registration; installing the same values again is a no-op.
pub fn configure(config: SubclassConfig) -> Result<(), ConfigError> {
    config.validate()?;
    let installed = CONFIG.get_or_init(|| config.clone());
    if *installed == config {
        Ok(())
    } else {
        Err(ConfigError::AlreadyConfigured)
    }
}

/// Active configuration, falling back to the defaults.
pub fn config() -> &'static SubclassConfig {
    CONFIG.get_or_init(SubclassConfig::default)
}
