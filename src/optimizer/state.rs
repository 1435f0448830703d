//! Running selection state shared by the solvers.
//!
//! Tracks admitted positions, notional per factor group and the exclusion
//! ledger, and implements the min-positions backfill pass so every solver
//! applies it identically.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Instant;

use chrono::Utc;
use tracing::debug;

use super::types::{
    CandidateCorrelation, DecisionEngineConstraints, DecisionEngineResult, DecisionMetrics,
    SelectedPosition, SolveOptions,
};
use super::{
    CAP_EPSILON, CORRELATION_LIMIT, FACTOR_CAP_REACHED, INSUFFICIENT_LIQUIDITY,
    MIN_POSITIONS_FLOOR_FRACTION,
};
use crate::bankroll::{
    estimate_drawdown_risk, expected_profit, full_kelly_binary, kelly_stake_usd,
    weighted_lockup_days,
};
use crate::models::CandidateBet;

/// Adjacency view over the supplied correlation list.
pub(crate) struct CorrelationIndex {
    neighbors: HashMap<String, Vec<(String, f64)>>,
}

impl CorrelationIndex {
    pub fn new(correlations: &[CandidateCorrelation]) -> Self {
        let mut neighbors: HashMap<String, Vec<(String, f64)>> = HashMap::new();
        for c in correlations {
            if c.id_a == c.id_b {
                continue;
            }
            neighbors
                .entry(c.id_a.clone())
                .or_default()
                .push((c.id_b.clone(), c.correlation));
            neighbors
                .entry(c.id_b.clone())
                .or_default()
                .push((c.id_a.clone(), c.correlation));
        }
        Self { neighbors }
    }

    pub fn neighbors(&self, id: &str) -> &[(String, f64)] {
        self.neighbors.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Neighbors of a candidate under both its id and its linked contract id.
    pub fn candidate_neighbors<'a>(
        &'a self,
        candidate: &'a CandidateBet,
    ) -> impl Iterator<Item = &'a (String, f64)> + 'a {
        self.neighbors(&candidate.id).iter().chain(
            candidate
                .contract_id
                .as_deref()
                .map(|cid| self.neighbors(cid))
                .unwrap_or(&[])
                .iter(),
        )
    }
}

/// How the factor cap is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FactorCapRule {
    /// Reject once the group's notional has reached the cap (greedy).
    BeforeAdmit,
    /// Reject when the group's notional would exceed the cap after admitting.
    AfterAdmit,
}

pub(crate) struct SelectionState<'a> {
    constraints: &'a DecisionEngineConstraints,
    correlations: &'a CorrelationIndex,
    factor_rule: FactorCapRule,
    /// Ids that count as held for correlation checks
    held_endpoints: HashSet<String>,
    selected: HashSet<String>,
    total_notional: f64,
    factor_notional: HashMap<String, f64>,
    positions: Vec<SelectedPosition>,
    objective: f64,
    excluded: BTreeMap<String, String>,
}

impl<'a> SelectionState<'a> {
    pub fn new(
        constraints: &'a DecisionEngineConstraints,
        correlations: &'a CorrelationIndex,
        factor_rule: FactorCapRule,
    ) -> Self {
        Self {
            constraints,
            correlations,
            factor_rule,
            held_endpoints: constraints.existing_contract_ids.iter().cloned().collect(),
            selected: HashSet::new(),
            total_notional: 0.0,
            factor_notional: HashMap::new(),
            positions: Vec::new(),
            objective: 0.0,
            excluded: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_full(&self) -> bool {
        self.positions.len() >= self.constraints.max_positions
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selected.contains(id)
    }

    pub fn lacks_liquidity(&self, candidate: &CandidateBet) -> bool {
        match (self.constraints.min_liquidity, candidate.max_size) {
            (Some(min), Some(available)) => available < min,
            _ => false,
        }
    }

    /// True when admitting `stake` into the candidate's factor group breaks the cap.
    pub fn factor_cap_blocks(&self, candidate: &CandidateBet, stake: f64) -> bool {
        let Some(cap) = self.constraints.factor_cap_usd() else {
            return false;
        };
        let current = self
            .factor_notional
            .get(candidate.factor_key())
            .copied()
            .unwrap_or(0.0);
        match self.factor_rule {
            FactorCapRule::BeforeAdmit => current >= cap,
            FactorCapRule::AfterAdmit => current + stake > cap + CAP_EPSILON,
        }
    }

    /// True when the candidate is correlated above the limit with anything held.
    pub fn correlation_blocks(&self, candidate: &CandidateBet) -> bool {
        let Some(limit) = self.constraints.correlation_limit() else {
            return false;
        };
        self.correlations
            .candidate_neighbors(candidate)
            .any(|(other, rho)| rho.abs() > limit && self.held_endpoints.contains(other))
    }

    /// Clamped fractional-Kelly stake before any notional room check.
    pub fn capped_kelly_stake(&self, candidate: &CandidateBet, kelly_fraction: f64) -> f64 {
        let stake = kelly_stake_usd(
            self.constraints.bankroll_usd,
            kelly_fraction,
            candidate.win_prob,
            candidate.price,
        );
        self.cap_stake(candidate, stake)
    }

    fn cap_stake(&self, candidate: &CandidateBet, stake: f64) -> f64 {
        let mut stake = stake.min(self.constraints.max_stake_per_position());
        if let Some(max_size) = candidate.max_size {
            stake = stake.min(max_size);
        }
        stake
    }

    pub fn exceeds_total_notional(&self, stake: f64) -> bool {
        match self.constraints.max_total_notional {
            Some(cap) => self.total_notional + stake > cap + CAP_EPSILON,
            None => false,
        }
    }

    /// USD still available under `maxTotalNotional`.
    pub fn notional_room(&self) -> Option<f64> {
        self.constraints
            .max_total_notional
            .map(|cap| (cap - self.total_notional).max(0.0))
    }

    pub fn admit(&mut self, candidate: &CandidateBet, stake: f64, reason: String) {
        let shares = if candidate.price > 0.0 {
            Some(stake / candidate.price)
        } else {
            None
        };

        self.positions.push(SelectedPosition {
            candidate_id: candidate.id.clone(),
            stake_usd: stake,
            shares,
            reason,
        });
        self.objective += expected_profit(stake, candidate.edge(), candidate.price);
        self.total_notional += stake;
        *self
            .factor_notional
            .entry(candidate.factor_key().to_string())
            .or_insert(0.0) += stake;

        self.selected.insert(candidate.id.clone());
        self.held_endpoints.insert(candidate.id.clone());
        if let Some(cid) = &candidate.contract_id {
            self.held_endpoints.insert(cid.clone());
        }
        self.excluded.remove(&candidate.id);
    }

    pub fn exclude(&mut self, candidate_id: &str, reason: &str) {
        debug!(candidate = candidate_id, reason, "candidate excluded");
        self.excluded
            .insert(candidate_id.to_string(), reason.to_string());
    }

    /// Tops the selection up to `minPositions` with half-Kelly stakes.
    ///
    /// Re-scans `ranked` (edge order) for unselected candidates, sizing each
    /// at half the configured Kelly fraction floored at 0.5% of bankroll and
    /// still bounded by the per-position, liquidity and notional caps. Factor
    /// and correlation limits stay in force.
    pub fn backfill_min_positions(&mut self, ranked: &[&CandidateBet]) {
        let Some(min_positions) = self.constraints.min_positions else {
            return;
        };
        if self.len() >= min_positions {
            return;
        }

        let half_kelly = self.constraints.kelly_fraction / 2.0;
        let floor = self.constraints.bankroll_usd * MIN_POSITIONS_FLOOR_FRACTION;

        for candidate in ranked {
            if self.len() >= min_positions || self.is_full() {
                break;
            }
            if self.is_selected(&candidate.id) {
                continue;
            }
            if self.lacks_liquidity(candidate) {
                self.exclude(&candidate.id, INSUFFICIENT_LIQUIDITY);
                continue;
            }
            if full_kelly_binary(candidate.win_prob, candidate.price) <= 0.0 {
                continue;
            }

            let sized = kelly_stake_usd(
                self.constraints.bankroll_usd,
                half_kelly,
                candidate.win_prob,
                candidate.price,
            )
            .max(floor);
            let mut stake = self.cap_stake(candidate, sized);
            if let Some(room) = self.notional_room() {
                stake = stake.min(room);
            }
            if stake <= 0.0 {
                continue;
            }
            if self.factor_cap_blocks(candidate, stake) {
                self.exclude(&candidate.id, FACTOR_CAP_REACHED);
                continue;
            }
            if self.correlation_blocks(candidate) {
                self.exclude(&candidate.id, CORRELATION_LIMIT);
                continue;
            }

            let reason = format!("Edge {:.1}% (min-positions pass)", candidate.edge() * 100.0);
            self.admit(candidate, stake, reason);
        }
    }

    pub fn into_result(
        self,
        solver: &str,
        started: Instant,
        options: &SolveOptions,
        candidates: &[CandidateBet],
    ) -> DecisionEngineResult {
        // Endpoints of the new selection only; existing holdings do not count
        let mut selected_endpoints: HashSet<&str> = HashSet::new();
        for c in candidates.iter().filter(|c| self.selected.contains(&c.id)) {
            selected_endpoints.insert(c.id.as_str());
            if let Some(cid) = &c.contract_id {
                selected_endpoints.insert(cid.as_str());
            }
        }
        let num_correlated_pairs = options
            .correlations
            .iter()
            .filter(|c| {
                c.id_a != c.id_b
                    && selected_endpoints.contains(c.id_a.as_str())
                    && selected_endpoints.contains(c.id_b.as_str())
            })
            .count();

        let by_id: HashMap<&str, &CandidateBet> =
            candidates.iter().map(|c| (c.id.as_str(), c)).collect();
        let held: Vec<(&SelectedPosition, &CandidateBet)> = self
            .positions
            .iter()
            .filter_map(|p| by_id.get(p.candidate_id.as_str()).map(|c| (p, *c)))
            .collect();

        let payoff_variance: f64 = held
            .iter()
            .filter_map(|(p, c)| p.shares.map(|n| n * n * c.variance_per_dollar()))
            .sum();
        let now = options.now.unwrap_or_else(Utc::now);
        let avg_lockup_days = weighted_lockup_days(
            held.iter().filter_map(|(p, c)| c.resolution_time.map(|t| (p.stake_usd, t))),
            now,
        );

        let bankroll = self.constraints.bankroll_usd;
        DecisionEngineResult {
            metrics: DecisionMetrics {
                expected_return: self.objective / bankroll,
                num_correlated_pairs,
                total_stake_usd: self.total_notional,
                drawdown_risk: estimate_drawdown_risk(
                    self.total_notional,
                    bankroll,
                    self.constraints.kelly_fraction,
                ),
                payoff_volatility_usd: payoff_variance.max(0.0).sqrt(),
                avg_lockup_days,
            },
            positions: self.positions,
            objective_value: self.objective,
            excluded_reasons: self.excluded,
            solver: solver.to_string(),
            solve_time_ms: started.elapsed().as_secs_f64() * 1000.0,
        }
    }
}
