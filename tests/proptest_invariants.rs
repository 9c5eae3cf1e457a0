//! Property-based tests for analytics invariants.
//!
//! These tests use proptest to verify that key invariants hold
//! across randomly generated return series and weight maps.

use nanofolio::metrics::{compute_metrics, max_drawdown};
use nanofolio::optimize::optimize;
use nanofolio::{
    EngineConfig, ReturnFrame, Statistics, max_sharpe_portfolio, min_variance_portfolio,
    suggest_rebalancing,
};
use proptest::prelude::*;

/// A daily return between -10% and +10%.
fn return_strategy() -> impl Strategy<Value = f64> {
    -0.10f64..0.10f64
}

fn series_strategy() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(return_strategy(), 2..120)
}

/// `n_assets` columns of equal length.
fn frame_strategy() -> impl Strategy<Value = ReturnFrame> {
    (2usize..5, 10usize..60).prop_flat_map(|(n_assets, n_rows)| {
        prop::collection::vec(prop::collection::vec(return_strategy(), n_rows), n_assets).prop_map(
            |columns| {
                let symbols = (0..columns.len()).map(|i| format!("S{i}")).collect();
                ReturnFrame::from_columns(symbols, columns).unwrap()
            },
        )
    })
}

fn weight_map_strategy() -> impl Strategy<Value = Vec<(String, f64)>> {
    prop::collection::vec(("[A-E]", 0.0f64..1.0), 1..6)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    // ========================================================================
    // METRICS
    // ========================================================================

    /// Drawdown is a non-positive fraction no worse than -100%
    #[test]
    fn drawdown_bounded(returns in series_strategy()) {
        let dd = max_drawdown(&returns);
        prop_assert!(dd <= 0.0);
        prop_assert!(dd >= -1.0);
    }

    /// Every metric is finite for bounded returns
    #[test]
    fn metrics_are_finite(returns in series_strategy()) {
        let m = compute_metrics(&returns).unwrap();
        prop_assert!(m.annual_return.is_finite());
        prop_assert!(m.volatility.is_finite() && m.volatility >= 0.0);
        prop_assert!(m.sharpe_ratio.is_finite());
    }

    // ========================================================================
    // OPTIMIZATION
    // ========================================================================

    /// Minimum-variance weights are long-only and fully invested, and no
    /// single asset is less risky
    #[test]
    fn min_variance_is_valid(frame in frame_strategy()) {
        let stats = Statistics::from_frame(&frame);
        let mv = min_variance_portfolio(&stats).unwrap();
        prop_assert!((mv.weights.sum() - 1.0).abs() < 1e-6);
        prop_assert!(mv.weights.values.iter().all(|w| (0.0..=1.0).contains(w)));
        for vol in stats.volatilities() {
            prop_assert!(mv.risk <= vol + 1e-7, "mv={} asset={}", mv.risk, vol);
        }
    }

    /// Every grid point solves, tangency and minimum variance are found, and
    /// with a positive excess return no frontier point beats the tangency
    #[test]
    fn full_grid_solves(frame in frame_strategy()) {
        let stats = Statistics::from_frame(&frame);
        let rf = 0.02;
        let result = optimize(&stats, &EngineConfig::default().with_num_portfolios(20));
        let skipped: Vec<_> = result.skipped().collect();
        prop_assert!(skipped.is_empty(), "skipped: {:?}", skipped);
        prop_assert!(result.min_variance_portfolio.is_some());
        prop_assert!(max_sharpe_portfolio(&stats, rf).is_ok());

        if stats.mean_returns().max() > rf {
            let t = result.max_sharpe_portfolio.unwrap();
            for p in &result.efficient_frontier {
                prop_assert!(t.sharpe_ratio >= p.sharpe_ratio - 1e-7);
            }
        }
    }

    // ========================================================================
    // REBALANCING
    // ========================================================================

    /// Total deviation covers every suggestion, and each suggestion's
    /// action matches the sign of the change
    #[test]
    fn rebalancing_consistent(
        current in weight_map_strategy(),
        optimal in weight_map_strategy(),
        threshold in 0.0f64..0.3,
    ) {
        let plan = suggest_rebalancing(&current, &optimal, threshold);
        let suggested: f64 = plan.suggestions.iter().map(|s| s.deviation).sum();
        prop_assert!(suggested <= plan.total_deviation + 1e-12);
        prop_assert_eq!(plan.needs_rebalancing, plan.total_deviation > threshold);
        for s in &plan.suggestions {
            prop_assert!(s.deviation > threshold);
            prop_assert!((s.deviation - s.change_needed.abs()).abs() < 1e-15);
            prop_assert_eq!(s.action == nanofolio::Action::Increase, s.change_needed > 0.0);
        }
    }

    /// Identical maps never need rebalancing
    #[test]
    fn identical_maps_are_balanced(current in weight_map_strategy()) {
        let plan = suggest_rebalancing(&current, &current, 0.0);
        prop_assert!(plan.suggestions.is_empty());
        prop_assert!(!plan.needs_rebalancing);
    }
}
