//! Solver benchmarking
//!
//! Repeats a solve on fixed input and summarises solve time and objective so
//! an alternative optimizer can be compared against the greedy baseline on
//! the same candidates. `SyntheticCandidateGenerator` produces reproducible
//! candidate sets from a seed.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use tracing::info;

use super::types::{DecisionEngineConstraints, SolveOptions};
use super::{GreedyOptimizer, Optimizer};
use crate::error::{EngineError, Result};
use crate::models::{BetSource, CandidateBet};

/// Summary of repeated solves with one optimizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolverBenchmark {
    pub solver: String,
    pub runs: usize,
    pub mean_solve_ms: f64,
    pub std_solve_ms: f64,
    pub mean_objective: f64,
    pub std_objective: f64,
    /// Positions selected by the last successful run
    pub positions: usize,
    pub failures: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkComparison {
    pub baseline: SolverBenchmark,
    pub challenger: SolverBenchmark,
    /// challenger mean objective minus baseline mean objective
    pub objective_gap: f64,
}

fn mean_and_std(samples: &[f64]) -> (f64, f64) {
    match samples.len() {
        0 => (0.0, 0.0),
        1 => (samples[0], 0.0),
        _ => (samples.iter().mean(), samples.iter().std_dev()),
    }
}

/// Solves the same input `runs` times and summarises the outcomes.
///
/// Failed runs (timeouts, solver errors) are counted, not fatal. Invalid
/// input fails immediately since every run would reject it.
pub fn benchmark_optimizer(
    optimizer: &dyn Optimizer,
    candidates: &[CandidateBet],
    constraints: &DecisionEngineConstraints,
    options: &SolveOptions,
    runs: usize,
) -> Result<SolverBenchmark> {
    if runs == 0 {
        return Err(EngineError::invalid("benchmark runs must be at least 1"));
    }

    let mut solve_ms = Vec::with_capacity(runs);
    let mut objectives = Vec::with_capacity(runs);
    let mut positions = 0;
    let mut failures = 0;

    for _ in 0..runs {
        match optimizer.solve(candidates, constraints, options) {
            Ok(result) => {
                solve_ms.push(result.solve_time_ms);
                objectives.push(result.objective_value);
                positions = result.positions.len();
            }
            Err(e @ EngineError::InvalidInput(_)) => return Err(e),
            Err(_) => failures += 1,
        }
    }

    let (mean_solve_ms, std_solve_ms) = mean_and_std(&solve_ms);
    let (mean_objective, std_objective) = mean_and_std(&objectives);

    let bench = SolverBenchmark {
        solver: optimizer.name().to_string(),
        runs,
        mean_solve_ms,
        std_solve_ms,
        mean_objective,
        std_objective,
        positions,
        failures,
    };
    info!(
        solver = %bench.solver,
        runs,
        mean_solve_ms,
        mean_objective,
        failures,
        "benchmark complete"
    );
    Ok(bench)
}

/// Benchmarks `challenger` against the greedy baseline on identical input.
pub fn compare_with_greedy(
    challenger: &dyn Optimizer,
    candidates: &[CandidateBet],
    constraints: &DecisionEngineConstraints,
    options: &SolveOptions,
    runs: usize,
) -> Result<BenchmarkComparison> {
    let baseline = benchmark_optimizer(&GreedyOptimizer::new(), candidates, constraints, options, runs)?;
    let challenger = benchmark_optimizer(challenger, candidates, constraints, options, runs)?;
    let objective_gap = challenger.mean_objective - baseline.mean_objective;
    Ok(BenchmarkComparison {
        baseline,
        challenger,
        objective_gap,
    })
}

// =============================================================================
// Synthetic candidates
// =============================================================================

/// Deterministic candidate generator for benchmarks and tests.
pub struct SyntheticCandidateGenerator {
    rng: ChaCha8Rng,
}

impl SyntheticCandidateGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Generates `n` candidates spread round-robin over `num_factors` groups.
    ///
    /// Prices are uniform in [0.2, 0.8]; edges are uniform in `edge_range`
    /// with the win probability set to `price + edge`.
    pub fn generate(
        &mut self,
        n: usize,
        num_factors: usize,
        edge_range: (f64, f64),
    ) -> Vec<CandidateBet> {
        let num_factors = num_factors.max(1);
        let (lo, hi) = if edge_range.0 <= edge_range.1 {
            edge_range
        } else {
            (edge_range.1, edge_range.0)
        };
        let sources = [BetSource::Kalshi, BetSource::Polymarket, BetSource::Sportsbook];

        (0..n)
            .map(|i| {
                let price: f64 = self.rng.gen_range(0.2..=0.8);
                let edge: f64 = if hi > lo { self.rng.gen_range(lo..hi) } else { lo };
                let win_prob = (price + edge).clamp(0.0, 0.99);
                CandidateBet::new(
                    format!("cand_{:03}", i),
                    sources[i % sources.len()],
                    format!("Synthetic market {}", i),
                    win_prob,
                    price,
                )
                .with_factors([format!("factor_{}", i % num_factors)])
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::ExhaustiveOptimizer;
    use std::collections::HashMap;

    #[test]
    fn test_generator_is_deterministic() {
        let a = SyntheticCandidateGenerator::new(42).generate(10, 3, (0.01, 0.05));
        let b = SyntheticCandidateGenerator::new(42).generate(10, 3, (0.01, 0.05));
        assert_eq!(a, b);
        assert_eq!(a[0].id, "cand_000");
        assert_eq!(a[4].factor_ids, vec!["factor_1".to_string()]);
        for c in &a {
            assert!((0.2..=0.8).contains(&c.price));
            assert!(c.edge() > 0.0);
        }
    }

    #[test]
    fn test_many_candidates_respect_caps() {
        let mut gen = SyntheticCandidateGenerator::new(7);
        let candidates = gen.generate(25, 5, (0.01, 0.035));

        let mut constraints = DecisionEngineConstraints::new(2000.0);
        constraints.max_positions = 12;
        constraints.max_fraction_per_position = 0.02;
        constraints.max_factor_fraction = Some(0.4);

        let result = GreedyOptimizer::new()
            .solve(&candidates, &constraints, &SolveOptions::default())
            .expect("solve");

        assert!(result.positions.len() <= 12);
        let by_id: HashMap<&str, &CandidateBet> =
            candidates.iter().map(|c| (c.id.as_str(), c)).collect();
        let mut per_factor: HashMap<&str, f64> = HashMap::new();
        for pos in &result.positions {
            assert!(pos.stake_usd <= 40.0 + 1e-9);
            let factor = by_id[pos.candidate_id.as_str()].factor_key();
            *per_factor.entry(factor).or_insert(0.0) += pos.stake_usd;
        }
        for total in per_factor.values() {
            assert!(*total <= 800.0 + 1e-9);
        }
        assert_eq!(
            result.positions.len() + result.excluded_reasons.len(),
            candidates.len()
        );
    }

    #[test]
    fn test_benchmark_single_run_has_zero_spread() {
        let candidates = SyntheticCandidateGenerator::new(1).generate(8, 2, (0.02, 0.06));
        let bench = benchmark_optimizer(
            &GreedyOptimizer::new(),
            &candidates,
            &DecisionEngineConstraints::new(1000.0),
            &SolveOptions::default(),
            1,
        )
        .expect("bench");
        assert_eq!(bench.runs, 1);
        assert_eq!(bench.failures, 0);
        assert_eq!(bench.std_objective, 0.0);
        assert!(bench.mean_objective > 0.0);
    }

    #[test]
    fn test_zero_runs_rejected() {
        let err = benchmark_optimizer(
            &GreedyOptimizer::new(),
            &[],
            &DecisionEngineConstraints::new(1000.0),
            &SolveOptions::default(),
            0,
        );
        assert!(matches!(err, Err(EngineError::InvalidInput(_))));
    }

    #[test]
    fn test_exhaustive_never_loses_to_greedy() {
        let candidates = SyntheticCandidateGenerator::new(99).generate(14, 3, (0.01, 0.08));
        let mut constraints = DecisionEngineConstraints::new(1000.0);
        constraints.max_positions = 5;
        constraints.max_total_notional = Some(55.0);

        let comparison = compare_with_greedy(
            &ExhaustiveOptimizer::default(),
            &candidates,
            &constraints,
            &SolveOptions::default(),
            3,
        )
        .expect("compare");
        println!(
            "greedy={:.4} exhaustive={:.4}",
            comparison.baseline.mean_objective, comparison.challenger.mean_objective
        );
        assert_eq!(comparison.challenger.failures, 0);
        // Deterministic solves: spread over repeated runs is zero
        assert_eq!(comparison.baseline.std_objective, 0.0);
        assert!(comparison.objective_gap >= -1e-9);
    }
}
