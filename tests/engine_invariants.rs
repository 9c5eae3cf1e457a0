//! Engine invariant tests: weight validity, frontier ordering, risk bounds,
//! metric guards and the tangency round-trip through portfolio aggregation.

use nanofolio::metrics::{compute_metrics, max_drawdown, portfolio_returns};
use nanofolio::stats::{mean, pearson, sample_std};
use nanofolio::{
    Action, Engine, EngineConfig, ReturnFrame, Statistics, TRADING_DAYS, Weights,
    efficient_frontier, max_sharpe_portfolio, min_variance_portfolio, suggest_rebalancing,
};

/// Deterministic daily returns: per-asset drift plus xorshift noise in ±2%.
fn synthetic_frame(n_assets: usize, n_rows: usize, seed: u32) -> ReturnFrame {
    let mut state = seed.max(1);
    let mut columns = vec![Vec::with_capacity(n_rows); n_assets];
    for _ in 0..n_rows {
        for (i, col) in columns.iter_mut().enumerate() {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            let noise = ((state % 401) as f64 - 200.0) / 10_000.0;
            let drift = 0.0002 * (i as f64 + 1.0);
            col.push(drift + noise * (1.0 + 0.5 * i as f64));
        }
    }
    let symbols = (0..n_assets).map(|i| format!("S{i:02}")).collect();
    ReturnFrame::from_columns(symbols, columns).unwrap()
}

fn assert_valid(w: &Weights) {
    assert!(
        w.values.iter().all(|x| x.is_finite() && (0.0..=1.0).contains(x)),
        "weights out of bounds: {w}"
    );
    assert!((w.sum() - 1.0).abs() < 1e-6, "weights sum to {}", w.sum());
}

// === Weight validity ===

#[test]
fn every_finder_returns_valid_weights() {
    let frame = synthetic_frame(5, 250, 7);
    let stats = Statistics::from_frame(&frame);

    for attempt in efficient_frontier(&stats, 20, 0.02) {
        assert_valid(&attempt.outcome.unwrap().weights);
    }
    assert_valid(&max_sharpe_portfolio(&stats, 0.02).unwrap().weights);
    assert_valid(&min_variance_portfolio(&stats).unwrap().weights);
}

// === Frontier ===

#[test]
fn frontier_targets_are_non_decreasing() {
    let stats = Statistics::from_frame(&synthetic_frame(4, 200, 11));
    let attempts = efficient_frontier(&stats, 30, 0.02);
    assert_eq!(attempts.len(), 30);
    assert!(attempts.windows(2).all(|w| w[1].target_return >= w[0].target_return));

    let mu = stats.mean_returns();
    assert_eq!(attempts[0].target_return, mu.min());
    assert_eq!(attempts[29].target_return, mu.max());
}

#[test]
fn frontier_is_deterministic() {
    let stats = Statistics::from_frame(&synthetic_frame(4, 200, 3));
    let a = efficient_frontier(&stats, 15, 0.02);
    let b = efficient_frontier(&stats, 15, 0.02);
    assert_eq!(a, b);
}

#[test]
fn min_variance_never_exceeds_frontier_risk() {
    let stats = Statistics::from_frame(&synthetic_frame(6, 300, 19));
    let mv = min_variance_portfolio(&stats).unwrap();
    for attempt in efficient_frontier(&stats, 25, 0.02) {
        let p = attempt.outcome.unwrap();
        assert!(mv.risk <= p.risk + 1e-9, "mv={} frontier={}", mv.risk, p.risk);
    }
}

// === Round-trip ===

#[test]
fn tangency_round_trips_through_portfolio_aggregation() {
    let rf = 0.02;
    let frame = synthetic_frame(4, 250, 29);
    let stats = Statistics::from_frame(&frame);
    let t = max_sharpe_portfolio(&stats, rf).unwrap();

    let weights: Vec<(&str, f64)> = t.weights.iter().collect();
    let series = portfolio_returns(&frame, &weights).unwrap();

    let annual_return = mean(&series) * TRADING_DAYS;
    let risk = sample_std(&series) * TRADING_DAYS.sqrt();
    let sharpe = (annual_return - rf) / risk;

    assert!((annual_return - t.expected_return).abs() < 1e-6);
    assert!((risk - t.risk).abs() < 1e-6);
    assert!((sharpe - t.sharpe_ratio).abs() < 1e-4);

    let m = compute_metrics(&series).unwrap();
    assert!((m.volatility - t.risk).abs() < 1e-6);
}

// === Statistics ===

#[test]
fn identical_columns_are_perfectly_correlated() {
    let r = vec![0.01, -0.02, 0.015];
    let frame = ReturnFrame::from_columns(vec!["A".into(), "B".into()], vec![r.clone(), r.clone()])
        .unwrap();
    let stats = Statistics::from_frame(&frame);
    let cov = stats.covariance();
    assert_eq!(cov[(0, 1)], cov[(0, 0)]);
    assert_eq!(cov[(1, 0)], cov[(1, 1)]);
    assert!((pearson(&r, &r).unwrap() - 1.0).abs() < 1e-12);
}

// === Metrics guards ===

#[test]
fn drawdown_is_never_positive() {
    let frame = synthetic_frame(3, 500, 5);
    for col in frame.columns() {
        assert!(max_drawdown(col) <= 0.0);
    }
}

#[test]
fn non_decreasing_equity_has_no_drawdown() {
    assert_eq!(max_drawdown(&[0.01, 0.0, 0.02, 0.005]), 0.0);
}

#[test]
fn zero_volatility_gives_zero_sharpe() {
    let m = compute_metrics(&[0.0, 0.0, 0.0, 0.0]).unwrap();
    assert_eq!(m.volatility, 0.0);
    assert_eq!(m.sharpe_ratio, 0.0);
    assert!(!m.sharpe_ratio.is_nan());
}

// === Rebalancing ===

#[test]
fn rebalancing_reference_cases() {
    let plan = suggest_rebalancing(&[("A", 0.6), ("B", 0.4)], &[("A", 0.5), ("B", 0.5)], 0.05);
    assert!(plan.needs_rebalancing);
    assert!((plan.total_deviation - 0.2).abs() < 1e-12);
    let actions: Vec<Action> = plan.suggestions.iter().map(|s| s.action).collect();
    assert_eq!(actions, vec![Action::Decrease, Action::Increase]);

    let plan = suggest_rebalancing(&[("A", 0.51), ("B", 0.49)], &[("A", 0.5), ("B", 0.5)], 0.05);
    assert!(plan.suggestions.is_empty());
    assert!(!plan.needs_rebalancing);
}

// === Engine ===

#[test]
fn engine_optimization_keeps_every_attempt() {
    let engine = Engine::new(EngineConfig::default().with_num_portfolios(12)).unwrap();
    let result = engine.optimize_frame(&synthetic_frame(3, 150, 13));
    assert_eq!(result.attempts.len(), 12);
    assert_eq!(result.skipped().count(), 0);
    assert_eq!(result.efficient_frontier.len(), 12);
    assert_eq!(result.mean_returns.len(), 3);
}

#[test]
fn wide_universe_solves_every_target() {
    for (n_assets, seed) in [(12, 41), (20, 43), (30, 47)] {
        let stats = Statistics::from_frame(&synthetic_frame(n_assets, 252, seed));
        for attempt in efficient_frontier(&stats, 50, 0.02) {
            let p = attempt
                .outcome
                .unwrap_or_else(|e| panic!("n={n_assets} t={}: {e}", attempt.target_return));
            assert_valid(&p.weights);
            assert!((p.expected_return - attempt.target_return).abs() < 1e-9);
        }
        assert_valid(&max_sharpe_portfolio(&stats, 0.02).unwrap().weights);
        assert_valid(&min_variance_portfolio(&stats).unwrap().weights);
    }
}
