//! Rebalancing advisor: compare current weights against optimal ones.
//!
//! Pure function of two weight maps and a threshold. Symbols missing from
//! the optimal map, and non-finite weights, are treated as 0.

use std::fmt;

use rustc_hash::FxHashSet;

use crate::types::weight_map;

/// Direction of a suggested weight change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Action {
    Increase,
    Decrease,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Increase => write!(f, "increase"),
            Action::Decrease => write!(f, "decrease"),
        }
    }
}

/// One symbol whose weight drifted past the threshold.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RebalanceSuggestion {
    pub symbol: String,
    pub current_weight: f64,
    pub optimal_weight: f64,
    /// `|current - optimal|`
    pub deviation: f64,
    pub action: Action,
    /// Signed `optimal - current`.
    pub change_needed: f64,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RebalancePlan {
    pub needs_rebalancing: bool,
    /// Sum of per-symbol deviations over the current map.
    pub total_deviation: f64,
    pub suggestions: Vec<RebalanceSuggestion>,
    pub threshold: f64,
}

/// Suggest weight changes for every symbol of `current` deviating from
/// `optimal` by more than `threshold`.
///
/// `needs_rebalancing` compares the *total* deviation against the same
/// per-symbol threshold. Suggestions follow the order of `current`; a symbol
/// repeated in `current` is reported once with its summed weight.
pub fn suggest_rebalancing<S: AsRef<str>, T: AsRef<str>>(
    current: &[(S, f64)],
    optimal: &[(T, f64)],
    threshold: f64,
) -> RebalancePlan {
    let current_map = weight_map(current);
    let optimal_map = weight_map(optimal);

    let mut seen = FxHashSet::default();
    let mut total_deviation = 0.0;
    let mut suggestions = Vec::new();

    for (symbol, _) in current {
        let symbol = symbol.as_ref();
        if !seen.insert(symbol) {
            continue;
        }
        let current_weight = current_map.get(symbol).copied().unwrap_or(0.0);
        let optimal_weight = optimal_map.get(symbol).copied().unwrap_or(0.0);
        let change_needed = optimal_weight - current_weight;
        let deviation = change_needed.abs();
        total_deviation += deviation;

        if deviation > threshold {
            suggestions.push(RebalanceSuggestion {
                symbol: symbol.to_string(),
                current_weight,
                optimal_weight,
                deviation,
                action: if optimal_weight > current_weight {
                    Action::Increase
                } else {
                    Action::Decrease
                },
                change_needed,
            });
        }
    }

    RebalancePlan {
        needs_rebalancing: total_deviation > threshold,
        total_deviation,
        suggestions,
        threshold,
    }
}
