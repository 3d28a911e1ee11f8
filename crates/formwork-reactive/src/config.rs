#![forbid(unsafe_code)]

//! Runtime configuration.

use std::env;

/// Generation cap applied to a single reaction drain unless configured
/// otherwise.
pub const DEFAULT_MAX_DRAIN_GENERATIONS: usize = 100;

/// Environment variable overriding [`RuntimeConfig::max_drain_generations`].
pub const ENV_MAX_DRAIN_GENERATIONS: &str = "FORMWORK_MAX_DRAIN_GENERATIONS";

/// Environment variable overriding [`RuntimeConfig::log_actions`].
pub const ENV_LOG_ACTIONS: &str = "FORMWORK_LOG_ACTIONS";

/// Configuration for a reactive [`Runtime`](crate::Runtime).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Maximum number of generations one drain may run before the remaining
    /// queue is discarded and the drain is reported as a runaway.
    /// Default: 100.
    pub max_drain_generations: usize,

    /// Emit `debug` events when an action opens and closes.
    /// Default: true.
    pub log_actions: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_drain_generations: DEFAULT_MAX_DRAIN_GENERATIONS,
            log_actions: true,
        }
    }
}

impl RuntimeConfig {
    /// Defaults overridden by `FORMWORK_*` environment variables.
    ///
    /// Unparsable values are ignored.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each
    /// `FORMWORK_*` variable name.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(val) = lookup(ENV_MAX_DRAIN_GENERATIONS)
            && let Ok(n) = val.trim().parse()
        {
            config.max_drain_generations = n;
        }
        if let Some(val) = lookup(ENV_LOG_ACTIONS) {
            let val = val.trim();
            config.log_actions = val == "1" || val.eq_ignore_ascii_case("true");
        }
        config
    }

    /// Set the drain generation cap.
    #[must_use]
    pub fn with_max_drain_generations(mut self, generations: usize) -> Self {
        self.max_drain_generations = generations;
        self
    }

    /// Enable or disable per-action debug events.
    #[must_use]
    pub fn with_action_logging(mut self, enabled: bool) -> Self {
        self.log_actions = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.max_drain_generations, 100);
        assert!(config.log_actions);
    }

    #[test]
    fn lookup_overrides_defaults() {
        let config = RuntimeConfig::from_lookup(|key| match key {
            ENV_MAX_DRAIN_GENERATIONS => Some("12".to_string()),
            ENV_LOG_ACTIONS => Some("false".to_string()),
            _ => None,
        });
        assert_eq!(config.max_drain_generations, 12);
        assert!(!config.log_actions);
    }

    #[test]
    fn unparsable_generation_cap_is_ignored() {
        let config = RuntimeConfig::from_lookup(|key| {
            (key == ENV_MAX_DRAIN_GENERATIONS).then(|| "lots".to_string())
        });
        assert_eq!(config.max_drain_generations, DEFAULT_MAX_DRAIN_GENERATIONS);
    }

    #[test]
    fn builders_chain() {
        let config = RuntimeConfig::default()
            .with_max_drain_generations(3)
            .with_action_logging(false);
        assert_eq!(
            config,
            RuntimeConfig {
                max_drain_generations: 3,
                log_actions: false,
            }
        );
    }
}
