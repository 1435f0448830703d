//! Decision Engine
//!
//! Portfolio construction over a list of candidate bets: pick a subset and
//! assign dollar stakes that maximise expected profit subject to bankroll,
//! per-position, factor-group, total-notional and pairwise-correlation limits.
//!
//! # Solvers
//!
//! - `greedy` - edge-ranked single pass with fractional-Kelly stakes. The
//!   baseline every other solver is benchmarked against.
//! - `exhaustive` - branch-and-bound over the same fixed stakes, exact for
//!   the objective, bounded by a time limit.
//!
//! Solvers implement [`Optimizer`]; [`make_optimizer`] maps names to
//! implementations and [`runner`] is the stateless facade callers go through.
//!
//! # Outcomes
//!
//! - Malformed input fails fast with `EngineError::InvalidInput`.
//! - Nothing selectable is a normal result: empty `positions` with every
//!   candidate's reason in `excluded_reasons`.
//! - A solver that cannot finish reports `SolverFailure` / `Timeout`, never a
//!   partial result.

pub mod benchmark;
pub mod exhaustive;
pub mod greedy;
pub mod runner;
mod state;
pub mod types;

pub use benchmark::{
    benchmark_optimizer, compare_with_greedy, BenchmarkComparison, SolverBenchmark,
    SyntheticCandidateGenerator,
};
pub use exhaustive::ExhaustiveOptimizer;
pub use greedy::GreedyOptimizer;
pub use runner::{
    run_decision_engine, run_decision_engine_with_options, run_named_optimizer,
    solve_with_timeout, DEFAULT_OPTIMIZER,
};
pub use types::{
    CandidateCorrelation, DecisionEngineConstraints, DecisionEngineResult, DecisionMetrics,
    SelectedPosition, SolveOptions,
};

use std::collections::{BTreeMap, HashSet};

use crate::error::{EngineError, Result};
use crate::models::CandidateBet;

// Exclusion reasons
pub const NO_EDGE: &str = "No edge";
pub const FACTOR_CAP_REACHED: &str = "Factor cap reached";
pub const CORRELATION_LIMIT: &str = "Correlation limit";
pub const KELLY_STAKE_ZERO: &str = "Kelly stake is 0";
pub const EXCEEDS_MAX_NOTIONAL: &str = "Would exceed max notional";
pub const MAX_POSITIONS_REACHED: &str = "Max positions reached";
pub const INSUFFICIENT_LIQUIDITY: &str = "Insufficient liquidity";
pub const NOT_IN_OPTIMAL_SUBSET: &str = "Not in optimal subset";

/// Backfilled positions are floored at this fraction of bankroll.
pub const MIN_POSITIONS_FLOOR_FRACTION: f64 = 0.005;

/// Slack on USD cap checks so stakes summing to a cap in floating point still fit.
pub(crate) const CAP_EPSILON: f64 = 1e-9;

/// A portfolio-construction strategy.
///
/// Implementations must honour the same hard caps as the greedy baseline
/// (position count, per-position fraction, factor fraction, total notional,
/// pairwise correlation) and be deterministic for identical input.
pub trait Optimizer: Send + Sync {
    fn name(&self) -> &str;

    fn solve(
        &self,
        candidates: &[CandidateBet],
        constraints: &DecisionEngineConstraints,
        options: &SolveOptions,
    ) -> Result<DecisionEngineResult>;
}

/// Registry of available optimizers with their descriptions.
pub fn available_optimizers() -> BTreeMap<&'static str, &'static str> {
    let mut map = BTreeMap::new();
    map.insert(
        "greedy",
        "Edge-ranked greedy selection with fractional-Kelly stakes (baseline)",
    );
    map.insert(
        "exhaustive",
        "Branch-and-bound search for the objective-maximising subset (time limited)",
    );
    map
}

/// Create an optimizer by name (case-insensitive).
pub fn make_optimizer(name: &str) -> Result<Box<dyn Optimizer>> {
    match name.to_lowercase().as_str() {
        "greedy" => Ok(Box::new(GreedyOptimizer::new())),
        "exhaustive" | "branch_and_bound" | "bnb" => Ok(Box::new(ExhaustiveOptimizer::default())),
        _ => {
            let available: Vec<_> = available_optimizers().keys().copied().collect();
            Err(EngineError::UnknownOptimizer {
                name: name.to_string(),
                available: available.join(", "),
            })
        }
    }
}

/// Validates solver input at the boundary.
pub(crate) fn validate_input(
    candidates: &[CandidateBet],
    constraints: &DecisionEngineConstraints,
    options: &SolveOptions,
) -> Result<()> {
    constraints.validate()?;
    options.validate()?;

    let mut seen = HashSet::with_capacity(candidates.len());
    for candidate in candidates {
        candidate.validate()?;
        if !seen.insert(candidate.id.as_str()) {
            return Err(EngineError::invalid(format!(
                "duplicate candidate id '{}'",
                candidate.id
            )));
        }
    }
    Ok(())
}

/// Splits candidates into the edge-ranked eligible list and the no-edge ids.
///
/// Ranking is edge descending, ties broken by id so identical input always
/// produces the same order.
pub(crate) fn rank_by_edge(candidates: &[CandidateBet]) -> (Vec<&CandidateBet>, Vec<&str>) {
    let mut ranked = Vec::with_capacity(candidates.len());
    let mut no_edge = Vec::new();
    for candidate in candidates {
        if candidate.edge() > 0.0 {
            ranked.push(candidate);
        } else {
            no_edge.push(candidate.id.as_str());
        }
    }
    ranked.sort_by(|a, b| b.edge().total_cmp(&a.edge()).then_with(|| a.id.cmp(&b.id)));
    (ranked, no_edge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BetSource;

    #[test]
    fn test_registry_lookup() {
        assert_eq!(make_optimizer("greedy").map(|o| o.name().to_string()), Ok("greedy".to_string()));
        assert_eq!(
            make_optimizer("Exhaustive").map(|o| o.name().to_string()),
            Ok("exhaustive".to_string())
        );
        match make_optimizer("simulated_annealing") {
            Err(EngineError::UnknownOptimizer { available, .. }) => {
                assert!(available.contains("greedy"));
                assert!(available.contains("exhaustive"));
            }
            other => panic!("unexpected: {:?}", other.map(|o| o.name().to_string())),
        }
    }

    #[test]
    fn test_rank_by_edge_is_deterministic() {
        let candidates = vec![
            CandidateBet::new("b", BetSource::Kalshi, "B", 0.55, 0.50),
            CandidateBet::new("a", BetSource::Kalshi, "A", 0.55, 0.50),
            CandidateBet::new("c", BetSource::Kalshi, "C", 0.70, 0.50),
            CandidateBet::new("d", BetSource::Kalshi, "D", 0.45, 0.50),
        ];
        let (ranked, no_edge) = rank_by_edge(&candidates);
        let ids: Vec<_> = ranked.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
        assert_eq!(no_edge, vec!["d"]);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let candidates = vec![
            CandidateBet::new("a", BetSource::Kalshi, "A", 0.55, 0.50),
            CandidateBet::new("a", BetSource::Polymarket, "A again", 0.60, 0.50),
        ];
        let err = validate_input(
            &candidates,
            &DecisionEngineConstraints::new(1000.0),
            &SolveOptions::default(),
        );
        assert!(matches!(err, Err(EngineError::InvalidInput(_))));
    }
}
