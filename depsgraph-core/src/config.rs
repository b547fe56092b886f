//! Graph Configuration
//!
//! Build-time switches for a [`Depsgraph`](crate::graph::Depsgraph). The
//! copy-on-write flag is read exactly once, when the graph is created, and
//! selects the shadow strategy every ID node of that graph uses.

use serde::Deserialize;

use crate::cow::{AliasShadow, CopyShadow, ShadowStrategy};
use crate::error::Result;

/// Environment variable enabling copy-on-write evaluation.
pub const ENV_COPY_ON_WRITE: &str = "DEG_COPY_ON_WRITE";

/// Environment variable enabling shadow lifecycle logging.
pub const ENV_DEBUG_COW: &str = "DEG_DEBUG_COW";

/// Configuration for a dependency graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DepsgraphConfig {
    /// Give every ID node a private evaluation copy of its data-block.
    ///
    /// When disabled the evaluation reference aliases the original.
    pub copy_on_write: bool,

    /// Log creation and release of every copy-on-write shadow at `debug`.
    pub debug_copy_on_write: bool,
}

impl DepsgraphConfig {
    /// Config with copy-on-write evaluation turned on.
    pub fn copy_on_write() -> Self {
        Self {
            copy_on_write: true,
            ..Self::default()
        }
    }

    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read the config from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let flag = |key: &str| {
            lookup(key)
                .map(|value| matches!(value.trim(), "1" | "true" | "yes" | "on"))
                .unwrap_or(false)
        };

        Self {
            copy_on_write: flag(ENV_COPY_ON_WRITE),
            debug_copy_on_write: flag(ENV_DEBUG_COW),
        }
    }

    /// Build the shadow strategy this config selects.
    pub fn shadow_strategy(&self) -> Box<dyn ShadowStrategy> {
        if self.copy_on_write {
            Box::new(CopyShadow::new(self.debug_copy_on_write))
        } else {
            Box::new(AliasShadow)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_disables_copy_on_write() {
        let config = DepsgraphConfig::default();
        assert!(!config.copy_on_write);
        assert_eq!(config.shadow_strategy().name(), "alias");
    }

    #[test]
    fn json_fills_missing_fields() {
        let config = DepsgraphConfig::from_json(r#"{ "copy_on_write": true }"#).unwrap();
        assert!(config.copy_on_write);
        assert!(!config.debug_copy_on_write);
        assert_eq!(config.shadow_strategy().name(), "copy");
    }

    #[test]
    fn json_rejects_unknown_fields() {
        assert!(DepsgraphConfig::from_json(r#"{ "cow": true }"#).is_err());
    }

    #[test]
    fn env_flags() {
        let vars: HashMap<&str, &str> =
            [(ENV_COPY_ON_WRITE, "1"), (ENV_DEBUG_COW, "false")].into_iter().collect();
        let config = DepsgraphConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));

        assert!(config.copy_on_write);
        assert!(!config.debug_copy_on_write);
    }
}
