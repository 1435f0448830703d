//! Greedy edge-ranked solver
//!
//! 1. Drop candidates with no edge
//! 2. Rank the rest by edge (descending, ties by id)
//! 3. Walk the ranking, admitting each candidate at its capped
//!    fractional-Kelly stake unless a limit blocks it
//! 4. Backfill to `minPositions` at half Kelly if still short
//!
//! Cost is `O(N log N + M)` for N candidates and M correlation pairs.

use std::time::Instant;

use tracing::debug;

use super::state::{CorrelationIndex, FactorCapRule, SelectionState};
use super::types::{DecisionEngineConstraints, DecisionEngineResult, SolveOptions};
use super::{
    rank_by_edge, validate_input, Optimizer, CORRELATION_LIMIT, EXCEEDS_MAX_NOTIONAL,
    FACTOR_CAP_REACHED, INSUFFICIENT_LIQUIDITY, KELLY_STAKE_ZERO, MAX_POSITIONS_REACHED, NO_EDGE,
};
use crate::error::Result;
use crate::models::CandidateBet;

#[derive(Debug, Clone, Default)]
pub struct GreedyOptimizer;

impl GreedyOptimizer {
    pub fn new() -> Self {
        Self
    }
}

impl Optimizer for GreedyOptimizer {
    fn name(&self) -> &str {
        "greedy"
    }

    fn solve(
        &self,
        candidates: &[CandidateBet],
        constraints: &DecisionEngineConstraints,
        options: &SolveOptions,
    ) -> Result<DecisionEngineResult> {
        let started = Instant::now();
        validate_input(candidates, constraints, options)?;

        let index = CorrelationIndex::new(&options.correlations);
        let mut state = SelectionState::new(constraints, &index, FactorCapRule::BeforeAdmit);

        let (ranked, no_edge) = rank_by_edge(candidates);
        for id in no_edge {
            state.exclude(id, NO_EDGE);
        }

        for candidate in &ranked {
            if state.is_full() {
                state.exclude(&candidate.id, MAX_POSITIONS_REACHED);
                continue;
            }
            if state.lacks_liquidity(candidate) {
                state.exclude(&candidate.id, INSUFFICIENT_LIQUIDITY);
                continue;
            }
            if state.factor_cap_blocks(candidate, 0.0) {
                state.exclude(&candidate.id, FACTOR_CAP_REACHED);
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

            debug!(candidate = %candidate.id, stake, edge = candidate.edge(), "admitted");
            let reason = format!("Edge {:.1}%", candidate.edge() * 100.0);
            state.admit(candidate, stake, reason);
        }

        state.backfill_min_positions(&ranked);

        Ok(state.into_result(self.name(), started, options, candidates))
    }
}
