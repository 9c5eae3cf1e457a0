//! Short-lived engine object wiring the components together.

use log::{info, warn};

use crate::config::EngineConfig;
use crate::efficiency::{self, EfficiencyReport};
use crate::error::Result;
use crate::metrics::{self, MetricsReport};
use crate::optimize::{self, OptimizationResult};
use crate::rebalance::{self, RebalancePlan};
use crate::returns::ReturnFrame;
use crate::stats::Statistics;
use crate::types::PriceSeries;

/// Efficiency report together with the optimization it was scored against.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EfficiencyAnalysis {
    pub report: EfficiencyReport,
    pub optimization: OptimizationResult,
}

/// Portfolio analytics over one immutable [`EngineConfig`].
///
/// Holds no state besides the config; every call recomputes from its inputs.
///
/// ```
/// use chrono::NaiveDate;
/// use nanofolio::{Engine, PriceSeries};
///
/// let day = |d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap();
/// let bars = |closes: [f64; 4]| (2..).map(day).zip(closes);
/// let a = PriceSeries::from_closes("A", bars([100.0, 101.0, 100.5, 102.0]));
/// let b = PriceSeries::from_closes("B", bars([50.0, 49.0, 50.5, 51.0]));
///
/// let engine = Engine::default();
/// let plan = engine.suggest_rebalancing(&[("A", 0.6), ("B", 0.4)], &[("A", 0.5), ("B", 0.5)]);
/// assert!(plan.needs_rebalancing);
///
/// let report = engine.calculate_metrics(&[a, b], &[("A", 1.0), ("B", 1.0)]).unwrap();
/// assert!(report.portfolio_metrics.max_drawdown <= 0.0);
/// ```
#[derive(Clone, Debug, Default)]
pub struct Engine {
    config: EngineConfig,
}

impl Engine {
    /// # Errors
    ///
    /// [`Error::InvalidConfig`](crate::Error::InvalidConfig) if the config
    /// fails validation.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Frontier, tangency and minimum-variance portfolios from raw prices.
    pub fn optimize_prices(&self, prices: &[PriceSeries]) -> Result<OptimizationResult> {
        let frame = ReturnFrame::from_prices(prices)?;
        Ok(self.optimize_frame(&frame))
    }

    pub fn optimize_frame(&self, frame: &ReturnFrame) -> OptimizationResult {
        self.optimize_statistics(&Statistics::from_frame(frame))
    }

    pub fn optimize_statistics(&self, stats: &Statistics) -> OptimizationResult {
        let result = optimize::optimize(stats, &self.config);
        info!(
            "Optimized {} assets: {}/{} frontier points, tangency {}, min-variance {}",
            stats.num_assets(),
            result.efficient_frontier.len(),
            result.attempts.len(),
            found(result.max_sharpe_portfolio.is_some()),
            found(result.min_variance_portfolio.is_some()),
        );
        result
    }

    /// Per-asset and portfolio risk metrics.
    ///
    /// Weights for symbols dropped for lacking history are ignored; the rest
    /// are renormalized to sum to 1.
    pub fn calculate_metrics<S: AsRef<str>>(
        &self,
        prices: &[PriceSeries],
        weights: &[(S, f64)],
    ) -> Result<MetricsReport> {
        let frame = ReturnFrame::from_prices(prices)?;
        let usable: Vec<(&str, f64)> = weights
            .iter()
            .map(|(s, w)| (s.as_ref(), *w))
            .filter(|(s, _)| {
                let dropped = frame.dropped().iter().any(|d| d == *s);
                if dropped {
                    warn!("Ignoring weight for {s}: not enough price history");
                }
                !dropped
            })
            .collect();

        let report = metrics::analyze(&frame, &usable)?;
        info!(
            "Metrics over {} aligned days for {} assets",
            frame.num_rows(),
            frame.num_assets()
        );
        Ok(report)
    }

    /// Rebalancing suggestions at the configured threshold.
    pub fn suggest_rebalancing<S: AsRef<str>, T: AsRef<str>>(
        &self,
        current: &[(S, f64)],
        optimal: &[(T, f64)],
    ) -> RebalancePlan {
        self.suggest_rebalancing_with_threshold(current, optimal, self.config.rebalance_threshold)
    }

    pub fn suggest_rebalancing_with_threshold<S: AsRef<str>, T: AsRef<str>>(
        &self,
        current: &[(S, f64)],
        optimal: &[(T, f64)],
        threshold: f64,
    ) -> RebalancePlan {
        let plan = rebalance::suggest_rebalancing(current, optimal, threshold);
        info!(
            "Total deviation {:.4} vs threshold {:.4}: {} suggestion(s)",
            plan.total_deviation,
            threshold,
            plan.suggestions.len()
        );
        plan
    }

    /// Optimize the universe of `prices` and score `current` against its
    /// tangency portfolio.
    pub fn analyze_efficiency<S: AsRef<str>>(
        &self,
        prices: &[PriceSeries],
        current: &[(S, f64)],
    ) -> Result<EfficiencyAnalysis> {
        let frame = ReturnFrame::from_prices(prices)?;
        let stats = Statistics::from_frame(&frame);
        let optimization = self.optimize_statistics(&stats);
        let report = efficiency::analyze_efficiency(
            &stats,
            &optimization,
            current,
            self.config.risk_free_rate,
        )?;
        info!(
            "Efficiency score {:.3} ({})",
            report.efficiency_score, report.rating
        );
        Ok(EfficiencyAnalysis {
            report,
            optimization,
        })
    }
}

fn found(ok: bool) -> &'static str {
    if ok { "found" } else { "not found" }
}
