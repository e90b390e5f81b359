//! Optimizer configuration
//!
//! Defaults cover normal operation; environment variables override them in
//! deployments that need tuning.

/// Optimizer tuning knobs
#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    /// Penalty factor for leadership clustering within one collection
    pub pi_factor: f64,

    /// Candidate-group size cap; groups only flush at collection
    /// boundaries, so a group can exceed this by one collection's worth of
    /// candidates
    pub group_limit: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            pi_factor: 256e6,
            group_limit: 1000,
        }
    }
}

impl OptimizerConfig {
    /// Create configuration from environment variables, falling back to
    /// defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let pi_factor = std::env::var("SHARDPILOT_PI_FACTOR")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.pi_factor);

        let group_limit = std::env::var("SHARDPILOT_GROUP_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.group_limit);

        Self {
            pi_factor,
            group_limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OptimizerConfig::default();
        assert_eq!(config.pi_factor, 256e6);
        assert_eq!(config.group_limit, 1000);
    }
}
