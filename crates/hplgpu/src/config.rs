//! Backend configuration.
//!
//! Selects the device, the kernel execution strategy and the distribution
//! used by the matrix generator.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How kernel operands reach the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Operands are already device resident; routines run in place.
    Direct,
    /// Host operands are copied in, computed on and copied back.
    #[default]
    Staged,
}

impl StrategyKind {
    /// Parse from a string.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "direct" | "device" => Some(Self::Direct),
            "staged" | "host" => Some(Self::Staged),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Staged => "staged",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Configuration consumed by [`DeviceContext::init`](crate::DeviceContext::init)
/// and the matrix generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Ordinal of the device to select.
    pub device_id: usize,
    /// Kernel execution strategy.
    pub strategy: StrategyKind,
    /// Mean of the generated matrix entries.
    pub rng_mean: f64,
    /// Standard deviation of the generated matrix entries.
    pub rng_stddev: f64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            device_id: 0,
            strategy: StrategyKind::Staged,
            rng_mean: 0.0,
            rng_stddev: 0.1,
        }
    }
}

impl BackendConfig {
    /// Configuration for device `device_id` with default settings.
    pub fn device(device_id: usize) -> Self {
        Self {
            device_id,
            ..Default::default()
        }
    }

    /// Set the execution strategy.
    pub fn with_strategy(mut self, strategy: StrategyKind) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the generator's mean and standard deviation.
    pub fn with_distribution(mut self, mean: f64, stddev: f64) -> Self {
        self.rng_mean = mean;
        self.rng_stddev = stddev;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = BackendConfig::default();
        assert_eq!(config.device_id, 0);
        assert_eq!(config.strategy, StrategyKind::Staged);
        assert_eq!(config.rng_mean, 0.0);
        assert!((config.rng_stddev - 0.1).abs() < 1e-15);
    }

    #[test]
    fn strategy_from_name() {
        assert_eq!(StrategyKind::from_name("direct"), Some(StrategyKind::Direct));
        assert_eq!(StrategyKind::from_name("Device"), Some(StrategyKind::Direct));
        assert_eq!(StrategyKind::from_name("STAGED"), Some(StrategyKind::Staged));
        assert_eq!(StrategyKind::from_name("host"), Some(StrategyKind::Staged));
        assert_eq!(StrategyKind::from_name("auto"), None);
    }

    #[test]
    fn builder_chain() {
        let config = BackendConfig::device(2)
            .with_strategy(StrategyKind::Direct)
            .with_distribution(1.0, 0.5);
        assert_eq!(config.device_id, 2);
        assert_eq!(config.strategy, StrategyKind::Direct);
        assert_eq!(config.rng_mean, 1.0);
        assert_eq!(config.rng_stddev, 0.5);
    }
}
