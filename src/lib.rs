//! # nanofolio
//!
//! Long-only mean-variance portfolio optimization and risk analytics.
//!
//! ## Features
//!
//! - **Efficient frontier**: minimum risk for a linear grid of target returns
//! - **Tangency portfolio**: maximum Sharpe ratio against a risk-free rate
//! - **Minimum variance**: the global minimum-risk portfolio
//! - **Risk metrics**: compounded annual return, volatility, Sharpe ratio,
//!   max drawdown and correlations, per asset and for a weighted portfolio
//! - **Rebalancing**: per-symbol drift against optimal weights
//!
//! Every portfolio is fully invested with weights in `[0, 1]`. Daily
//! statistics are annualized with 252 trading days.
//!
//! ## Quick Start
//!
//! ```
//! use nanofolio::{Engine, EngineConfig, ReturnFrame};
//!
//! let frame = ReturnFrame::from_columns(
//!     vec!["BOND".into(), "STOCK".into()],
//!     vec![
//!         vec![0.0010, 0.0002, 0.0008, 0.0004, 0.0006],
//!         vec![0.0120, -0.0080, 0.0150, -0.0030, 0.0090],
//!     ],
//! )
//! .unwrap();
//!
//! let engine = Engine::new(EngineConfig::default().with_num_portfolios(10)).unwrap();
//! let result = engine.optimize_frame(&frame);
//!
//! let min_var = result.min_variance_portfolio.unwrap();
//! assert!((min_var.weights.sum() - 1.0).abs() < 1e-6);
//! for point in &result.efficient_frontier {
//!     assert!(min_var.risk <= point.risk + 1e-7);
//! }
//! ```
//!
//! ## Failed solves
//!
//! A frontier target that cannot be solved is skipped, never fatal. Every
//! grid point is kept in [`OptimizationResult::attempts`] with its
//! [`SolveError`], so "infeasible" and "did not converge" stay distinct.
//!
//! ## Cargo features
//!
//! | Feature | Effect |
//! |---------|--------|
//! | `serde` | `Serialize`/`Deserialize` on all result types and [`EngineConfig`] |
//! | `parallel` | Solve frontier grid points on the rayon pool |

pub mod config;
pub mod efficiency;
pub mod engine;
mod error;
pub mod metrics;
pub mod optimize;
pub mod rebalance;
pub mod returns;
pub mod stats;
mod types;

// Re-export public API
pub use config::EngineConfig;
pub use efficiency::{EfficiencyRating, EfficiencyReport, analyze_efficiency};
pub use engine::{EfficiencyAnalysis, Engine};
pub use error::{Error, Result};
pub use metrics::{
    AssetMetrics, CorrelationMatrix, Metrics, MetricsReport, PortfolioMetrics, compute_metrics,
};
pub use optimize::{
    FrontierAttempt, FrontierPoint, MinVariancePortfolio, OptimizationResult, SolveError,
    efficient_frontier, max_sharpe_portfolio, min_variance_portfolio,
};
pub use rebalance::{Action, RebalancePlan, RebalanceSuggestion, suggest_rebalancing};
pub use returns::ReturnFrame;
pub use stats::{Performance, Statistics};
pub use types::{PriceBar, PriceSeries, TRADING_DAYS, Weights};
