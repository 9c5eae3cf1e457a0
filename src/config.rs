//! Engine configuration.

use crate::error::{Error, Result};

/// The only tunable knobs of the engine.
///
/// Annualization (252 days), weight bounds `[0, 1]` and full investment are
/// fixed and not configurable.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EngineConfig {
    /// Annualized risk-free rate (e.g., 0.02 = 2%).
    pub risk_free_rate: f64,
    /// Number of target returns on the frontier grid.
    pub num_portfolios: usize,
    /// Per-symbol deviation threshold for rebalancing suggestions.
    pub rebalance_threshold: f64,
}

impl EngineConfig {
    pub const DEFAULT_RISK_FREE_RATE: f64 = 0.02;
    pub const DEFAULT_NUM_PORTFOLIOS: usize = 50;
    pub const DEFAULT_REBALANCE_THRESHOLD: f64 = 0.05;

    pub fn with_risk_free_rate(mut self, rate: f64) -> Self {
        self.risk_free_rate = rate;
        self
    }

    pub fn with_num_portfolios(mut self, n: usize) -> Self {
        self.num_portfolios = n;
        self
    }

    pub fn with_rebalance_threshold(mut self, threshold: f64) -> Self {
        self.rebalance_threshold = threshold;
        self
    }

    /// Validate the config. Returns `Err` describing the first bad field.
    pub fn validate(&self) -> Result<()> {
        if !self.risk_free_rate.is_finite() {
            return Err(Error::InvalidConfig(format!(
                "risk_free_rate must be finite, got {}",
                self.risk_free_rate
            )));
        }
        if self.num_portfolios == 0 {
            return Err(Error::InvalidConfig("num_portfolios must be >= 1".into()));
        }
        if !self.rebalance_threshold.is_finite() || self.rebalance_threshold < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "rebalance_threshold must be >= 0 and finite, got {}",
                self.rebalance_threshold
            )));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: Self::DEFAULT_RISK_FREE_RATE,
            num_portfolios: Self::DEFAULT_NUM_PORTFOLIOS,
            rebalance_threshold: Self::DEFAULT_REBALANCE_THRESHOLD,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = EngineConfig::default();
        assert_eq!(c.risk_free_rate, 0.02);
        assert_eq!(c.num_portfolios, 50);
        assert_eq!(c.rebalance_threshold, 0.05);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn builder_setters() {
        let c = EngineConfig::default()
            .with_risk_free_rate(0.04)
            .with_num_portfolios(10)
            .with_rebalance_threshold(0.1);
        assert_eq!(c.risk_free_rate, 0.04);
        assert_eq!(c.num_portfolios, 10);
        assert_eq!(c.rebalance_threshold, 0.1);
    }

    #[test]
    fn validate_catches_zero_grid() {
        let c = EngineConfig::default().with_num_portfolios(0);
        assert!(c.validate().is_err());
    }

    #[test]
    fn validate_catches_bad_rate() {
        let c = EngineConfig::default().with_risk_free_rate(f64::NAN);
        assert!(c.validate().is_err());
    }

    #[test]
    fn validate_catches_negative_threshold() {
        let c = EngineConfig::default().with_rebalance_threshold(-0.01);
        assert!(c.validate().is_err());
    }
}
