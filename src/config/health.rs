//! Configuration for provider invocation budgets.

use std::{collections::HashSet, time::Duration};

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// A per-component budget that replaces the default one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ProviderOverride {
    /// Component name the override applies to.
    #[validate(length(min = 1, message = "Provider name must not be empty"))]
    pub name: String,

    #[validate(range(
        min = 1,
        max = 300_000,
        message = "Provider timeout must be between 1 and 300000 ms"
    ))]
    pub timeout_ms: u64,
}

impl ProviderOverride {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// `[health]` section of the configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
#[validate(schema(function = "validate_unique_overrides"))]
pub struct HealthConfig {
    /// Budget for each provider invocation, in milliseconds.
    #[validate(range(
        min = 1,
        max = 300_000,
        message = "Provider timeout must be between 1 and 300000 ms"
    ))]
    pub provider_timeout_ms: u64,

    /// Per-component budgets. Names must be unique.
    #[validate(nested)]
    pub overrides: Vec<ProviderOverride>,
}

impl HealthConfig {
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_millis(self.provider_timeout_ms)
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            provider_timeout_ms: 5_000,
            overrides: Vec::new(),
        }
    }
}

/// Rejects two overrides for the same component.
fn validate_unique_overrides(config: &HealthConfig) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for o in &config.overrides {
        if !seen.insert(o.name.as_str()) {
            let mut err = ValidationError::new("duplicate_override");
            err.message = Some(format!("Duplicate timeout override for: {}", o.name).into());
            return Err(err);
        }
    }
    Ok(())
}
