//! Exhaustive branch-and-bound solver
//!
//! Each eligible candidate keeps the stake the greedy solver would give it;
//! the search picks the subset with the highest total expected profit under
//! the hard caps. Items are explored in descending value order, so the best
//! possible completion of a partial subset is the next `k` items, which gives
//! a tight bound for pruning.
//!
//! The factor cap is enforced after admission (a group never ends above its
//! cap). Running past the time limit is a solver failure.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::state::{CorrelationIndex, FactorCapRule, SelectionState};
use super::types::{DecisionEngineConstraints, DecisionEngineResult, SolveOptions};
use super::{
    rank_by_edge, validate_input, Optimizer, CAP_EPSILON, CORRELATION_LIMIT,
    EXCEEDS_MAX_NOTIONAL, FACTOR_CAP_REACHED, INSUFFICIENT_LIQUIDITY, KELLY_STAKE_ZERO,
    NOT_IN_OPTIMAL_SUBSET, NO_EDGE,
};
use crate::bankroll::expected_profit;
use crate::error::{EngineError, Result};
use crate::models::CandidateBet;

const DEFAULT_TIME_LIMIT_MS: u64 = 1_000;
const CLOCK_CHECK_INTERVAL: u64 = 1_024;
const VALUE_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone)]
pub struct ExhaustiveOptimizer {
    default_time_limit: Duration,
}

impl Default for ExhaustiveOptimizer {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_TIME_LIMIT_MS))
    }
}

impl ExhaustiveOptimizer {
    /// `default_time_limit` applies when the caller passes no `timeLimitMs`.
    pub fn new(default_time_limit: Duration) -> Self {
        Self { default_time_limit }
    }
}

struct Item<'a> {
    candidate: &'a CandidateBet,
    stake: f64,
    value: f64,
    factor: usize,
}

struct Search<'s, 'a> {
    items: &'s [Item<'a>],
    /// prefix[i] = sum of values of items[..i]
    prefix: Vec<f64>,
    conflicts: Vec<Vec<usize>>,
    max_positions: usize,
    max_notional: Option<f64>,
    factor_cap: Option<f64>,
    deadline: Instant,
    nodes: u64,
    timed_out: bool,

    chosen: Vec<bool>,
    count: usize,
    notional: f64,
    factor_notional: Vec<f64>,
    value: f64,

    best_value: f64,
    best: Vec<bool>,
}

impl<'s, 'a> Search<'s, 'a> {
    fn bound(&self, i: usize) -> f64 {
        let remaining_slots = self.max_positions - self.count;
        let end = (i + remaining_slots).min(self.items.len());
        self.value + (self.prefix[end] - self.prefix[i])
    }

    fn fits(&self, i: usize) -> bool {
        let item = &self.items[i];
        if self.count >= self.max_positions {
            return false;
        }
        if let Some(cap) = self.max_notional {
            if self.notional + item.stake > cap + CAP_EPSILON {
                return false;
            }
        }
        if let Some(cap) = self.factor_cap {
            if self.factor_notional[item.factor] + item.stake > cap + CAP_EPSILON {
                return false;
            }
        }
        !self.conflicts[i].iter().any(|&j| self.chosen[j])
    }

    fn explore(&mut self, i: usize) {
        if self.timed_out {
            return;
        }
        self.nodes += 1;
        if self.nodes % CLOCK_CHECK_INTERVAL == 0 && Instant::now() >= self.deadline {
            self.timed_out = true;
            return;
        }

        if self.value > self.best_value + VALUE_EPSILON {
            self.best_value = self.value;
            self.best.clone_from(&self.chosen);
        }
        if i == self.items.len() || self.count == self.max_positions {
            return;
        }
        if self.bound(i) <= self.best_value + VALUE_EPSILON {
            return;
        }

        if self.fits(i) {
            let (stake, value, factor) = {
                let item = &self.items[i];
                (item.stake, item.value, item.factor)
            };
            self.chosen[i] = true;
            self.count += 1;
            self.notional += stake;
            self.factor_notional[factor] += stake;
            self.value += value;

            self.explore(i + 1);

            self.chosen[i] = false;
            self.count -= 1;
            self.notional -= stake;
            self.factor_notional[factor] -= stake;
            self.value -= value;
        }

        self.explore(i + 1);
    }
}

impl Optimizer for ExhaustiveOptimizer {
    fn name(&self) -> &str {
        "exhaustive"
    }

    fn solve(
        &self,
        candidates: &[CandidateBet],
        constraints: &DecisionEngineConstraints,
        options: &SolveOptions,
    ) -> Result<DecisionEngineResult> {
        let started = Instant::now();
        validate_input(candidates, constraints, options)?;

        let time_limit = options
            .time_limit_ms
            .map(Duration::from_millis)
            .unwrap_or(self.default_time_limit);

        let index = CorrelationIndex::new(&options.correlations);
        let mut state = SelectionState::new(constraints, &index, FactorCapRule::AfterAdmit);

        let (ranked, no_edge) = rank_by_edge(candidates);
        for id in no_edge {
            state.exclude(id, NO_EDGE);
        }

        // Pre-filter: anything that cannot be admitted even into an empty selection
        let mut factor_ids: HashMap<&str, usize> = HashMap::new();
        let mut items: Vec<Item<'_>> = Vec::new();
        for candidate in &ranked {
            if state.lacks_liquidity(candidate) {
                state.exclude(&candidate.id, INSUFFICIENT_LIQUIDITY);
                continue;
            }
            if state.correlation_blocks(candidate) {
                state.exclude(&candidate.id, CORRELATION_LIMIT);
                continue;
            }
            let stake = state.capped_kelly_stake(candidate, constraints.kelly_fraction);
            if stake <= 0.0 {
                state.exclude(&candidate.id, KELLY_STAKE_ZERO);
                continue;
            }
            if state.exceeds_total_notional(stake) {
                state.exclude(&candidate.id, EXCEEDS_MAX_NOTIONAL);
                continue;
            }
            if state.factor_cap_blocks(candidate, stake) {
                state.exclude(&candidate.id, FACTOR_CAP_REACHED);
                continue;
            }

            let next_factor = factor_ids.len();
            let factor = *factor_ids.entry(candidate.factor_key()).or_insert(next_factor);
            items.push(Item {
                candidate: *candidate,
                stake,
                value: expected_profit(stake, candidate.edge(), candidate.price),
                factor,
            });
        }

        // Value order for the bound; ties fall back to the edge ranking
        items.sort_by(|a, b| b.value.total_cmp(&a.value));

        let mut endpoint_to_item: HashMap<&str, usize> = HashMap::new();
        for (i, item) in items.iter().enumerate() {
            endpoint_to_item.insert(item.candidate.id.as_str(), i);
            if let Some(cid) = &item.candidate.contract_id {
                endpoint_to_item.insert(cid.as_str(), i);
            }
        }
        let mut conflicts: Vec<Vec<usize>> = vec![Vec::new(); items.len()];
        if let Some(limit) = constraints.correlation_limit() {
            for (i, item) in items.iter().enumerate() {
                for (other, rho) in index.candidate_neighbors(item.candidate) {
                    if rho.abs() <= limit {
                        continue;
                    }
                    if let Some(&j) = endpoint_to_item.get(other.as_str()) {
                        if j != i && !conflicts[i].contains(&j) {
                            conflicts[i].push(j);
                        }
                    }
                }
            }
        }

        let mut prefix = Vec::with_capacity(items.len() + 1);
        prefix.push(0.0);
        for item in &items {
            let last = prefix[prefix.len() - 1];
            prefix.push(last + item.value);
        }

        let mut search = Search {
            items: &items,
            prefix,
            conflicts,
            max_positions: constraints.max_positions,
            max_notional: constraints.max_total_notional,
            factor_cap: constraints.factor_cap_usd(),
            deadline: started + time_limit,
            nodes: 0,
            timed_out: false,
            chosen: vec![false; items.len()],
            count: 0,
            notional: 0.0,
            factor_notional: vec![0.0; factor_ids.len()],
            value: 0.0,
            best_value: 0.0,
            best: vec![false; items.len()],
        };
        search.explore(0);

        if search.timed_out {
            warn!(
                nodes = search.nodes,
                limit_ms = time_limit.as_millis() as u64,
                "exhaustive search timed out"
            );
            return Err(EngineError::Timeout {
                solver: self.name().to_string(),
                limit_ms: time_limit.as_millis() as u64,
            });
        }
        debug!(nodes = search.nodes, best = search.best_value, "exhaustive search complete");

        // Replay the optimal subset in edge order
        let chosen: HashMap<&str, f64> = items
            .iter()
            .zip(&search.best)
            .filter(|(_, picked)| **picked)
            .map(|(item, _)| (item.candidate.id.as_str(), item.stake))
            .collect();
        let searched: HashSet<&str> = items.iter().map(|i| i.candidate.id.as_str()).collect();
        for candidate in &ranked {
            if let Some(&stake) = chosen.get(candidate.id.as_str()) {
                let reason = format!("Edge {:.1}%", candidate.edge() * 100.0);
                state.admit(candidate, stake, reason);
            } else if searched.contains(candidate.id.as_str()) {
                state.exclude(&candidate.id, NOT_IN_OPTIMAL_SUBSET);
            }
        }

        state.backfill_min_positions(&ranked);

        Ok(state.into_result(self.name(), started, options, candidates))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BetSource;
    use crate::optimizer::{CandidateCorrelation, GreedyOptimizer};

    fn bet(id: &str, win_prob: f64, price: f64) -> CandidateBet {
        CandidateBet::new(id, BetSource::Kalshi, id.to_uppercase(), win_prob, price)
    }

    #[test]
    fn test_matches_greedy_without_binding_constraints() {
        let candidates = vec![bet("a", 0.70, 0.50), bet("b", 0.60, 0.40), bet("c", 0.30, 0.20)];
        let constraints = DecisionEngineConstraints::new(1000.0);
        let options = SolveOptions::default();

        let greedy = GreedyOptimizer::new()
            .solve(&candidates, &constraints, &options)
            .expect("greedy");
        let exact = ExhaustiveOptimizer::default()
            .solve(&candidates, &constraints, &options)
            .expect("exhaustive");

        assert_eq!(greedy.positions, exact.positions);
        assert!((greedy.objective_value - exact.objective_value).abs() < 1e-9);
        assert_eq!(exact.solver, "exhaustive");
    }

    #[test]
    fn test_beats_greedy_under_correlation_conflict() {
        // Greedy takes the top-edge bet and then loses both correlated ones;
        // the exact search trades it for the pair.
        let candidates = vec![
            bet("top", 0.56, 0.50).with_max_size(20.0),
            bet("x", 0.30, 0.25),
            bet("y", 0.30, 0.25),
        ];
        let mut constraints = DecisionEngineConstraints::new(1000.0);
        constraints.max_pairwise_correlation = Some(0.5);
        let options = SolveOptions::with_correlations(vec![
            CandidateCorrelation::new("top", "x", 0.9),
            CandidateCorrelation::new("top", "y", 0.9),
        ]);

        let greedy = GreedyOptimizer::new()
            .solve(&candidates, &constraints, &options)
            .expect("greedy");
        let exact = ExhaustiveOptimizer::default()
            .solve(&candidates, &constraints, &options)
            .expect("exhaustive");

        let ids: Vec<_> = greedy.positions.iter().map(|p| p.candidate_id.as_str()).collect();
        assert_eq!(ids, vec!["top"]);
        let ids: Vec<_> = exact.positions.iter().map(|p| p.candidate_id.as_str()).collect();
        assert_eq!(ids, vec!["x", "y"]);
        assert!(exact.objective_value > greedy.objective_value);
        assert_eq!(
            exact.excluded_reasons.get("top").map(String::as_str),
            Some(NOT_IN_OPTIMAL_SUBSET)
        );
    }

    #[test]
    fn test_factor_cap_is_hard() {
        let candidates: Vec<_> = (0..6)
            .map(|i| bet(&format!("c{}", i), 0.70 - i as f64 * 0.01, 0.50).with_factors(["crypto"]))
            .collect();
        let mut constraints = DecisionEngineConstraints::new(1000.0);
        constraints.max_factor_fraction = Some(0.05); // $50, $20 per position

        let result = ExhaustiveOptimizer::default()
            .solve(&candidates, &constraints, &SolveOptions::default())
            .expect("solve");
        assert_eq!(result.positions.len(), 2);
        assert!(result.total_stake_usd() <= 50.0 + 1e-9);
    }

    #[test]
    fn test_fills_notional_cap_exactly() {
        let candidates = vec![bet("a", 0.60, 0.50), bet("b", 0.60, 0.50), bet("c", 0.60, 0.50)];
        let mut constraints = DecisionEngineConstraints::new(10.0);
        constraints.max_fraction_per_position = 0.01;
        constraints.max_total_notional = Some(0.3);

        let result = ExhaustiveOptimizer::default()
            .solve(&candidates, &constraints, &SolveOptions::default())
            .expect("solve");
        assert_eq!(result.positions.len(), 3);
    }

    #[test]
    fn test_time_limit_is_a_solver_failure() {
        // 40 equal-value items; the notional cap binds at 9 but the bound only
        // counts free slots, so the tree is far too large for a zero limit.
        let candidates: Vec<_> = (0..40)
            .map(|i| bet(&format!("c{:02}", i), 0.60, 0.50))
            .collect();
        let mut constraints = DecisionEngineConstraints::new(100_000.0);
        constraints.max_positions = 20;
        constraints.max_total_notional = Some(20_000.0 - 1.0);
        let options = SolveOptions {
            correlations: Vec::new(),
            time_limit_ms: Some(0),
            now: None,
        };

        let err = ExhaustiveOptimizer::default().solve(&candidates, &constraints, &options);
        match err {
            Err(e) => assert!(e.is_solver_failure(), "unexpected error {:?}", e),
            Ok(r) => panic!("expected timeout, got {} positions", r.positions.len()),
        }
    }
}
