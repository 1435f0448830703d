use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::bankroll::DrawdownEstimate;
use crate::error::{ensure_finite, EngineError, Result};

fn default_kelly_fraction() -> f64 {
    0.25
}

fn default_max_fraction_per_position() -> f64 {
    0.02
}

fn default_max_positions() -> usize {
    12
}

/// Caller-supplied budget and risk limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionEngineConstraints {
    pub bankroll_usd: f64,
    /// Fraction of full Kelly to apply
    #[serde(default = "default_kelly_fraction")]
    pub kelly_fraction: f64,
    #[serde(default = "default_max_fraction_per_position")]
    pub max_fraction_per_position: f64,
    #[serde(default = "default_max_positions")]
    pub max_positions: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_positions: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_total_notional: Option<f64>,
    /// Unconstrained when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_pairwise_correlation: Option<f64>,
    /// Caps USD assigned into any single factor group, as a fraction of bankroll
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_factor_fraction: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_liquidity: Option<f64>,
    #[serde(default)]
    pub existing_contract_ids: Vec<String>,
}

impl DecisionEngineConstraints {
    pub fn new(bankroll_usd: f64) -> Self {
        Self {
            bankroll_usd,
            kelly_fraction: default_kelly_fraction(),
            max_fraction_per_position: default_max_fraction_per_position(),
            max_positions: default_max_positions(),
            min_positions: None,
            max_total_notional: None,
            max_pairwise_correlation: None,
            max_factor_fraction: None,
            min_liquidity: None,
            existing_contract_ids: Vec::new(),
        }
    }

    pub fn max_stake_per_position(&self) -> f64 {
        self.bankroll_usd * self.max_fraction_per_position
    }

    /// USD cap per factor group, if one is configured.
    pub fn factor_cap_usd(&self) -> Option<f64> {
        self.max_factor_fraction.map(|f| self.bankroll_usd * f)
    }

    /// Correlation threshold in force; `None` when pairs are unconstrained.
    pub fn correlation_limit(&self) -> Option<f64> {
        self.max_pairwise_correlation.filter(|m| *m < 1.0)
    }

    pub fn validate(&self) -> Result<()> {
        ensure_finite("bankrollUsd", self.bankroll_usd)?;
        if self.bankroll_usd <= 0.0 {
            return Err(EngineError::invalid(format!(
                "bankrollUsd must be > 0, got {}",
                self.bankroll_usd
            )));
        }
        ensure_finite("kellyFraction", self.kelly_fraction)?;
        if !(self.kelly_fraction > 0.0 && self.kelly_fraction <= 1.0) {
            return Err(EngineError::invalid(format!(
                "kellyFraction must be in (0,1], got {}",
                self.kelly_fraction
            )));
        }
        ensure_finite("maxFractionPerPosition", self.max_fraction_per_position)?;
        if !(self.max_fraction_per_position > 0.0 && self.max_fraction_per_position <= 1.0) {
            return Err(EngineError::invalid(format!(
                "maxFractionPerPosition must be in (0,1], got {}",
                self.max_fraction_per_position
            )));
        }
        if self.max_positions < 1 {
            return Err(EngineError::invalid("maxPositions must be at least 1"));
        }
        if let Some(min) = self.min_positions {
            if min > self.max_positions {
                return Err(EngineError::invalid(format!(
                    "minPositions {} exceeds maxPositions {}",
                    min, self.max_positions
                )));
            }
        }
        if let Some(cap) = self.max_total_notional {
            ensure_finite("maxTotalNotional", cap)?;
            if cap <= 0.0 {
                return Err(EngineError::invalid("maxTotalNotional must be > 0"));
            }
        }
        if let Some(rho) = self.max_pairwise_correlation {
            ensure_finite("maxPairwiseCorrelation", rho)?;
            if !(0.0..=1.0).contains(&rho) {
                return Err(EngineError::invalid(format!(
                    "maxPairwiseCorrelation must be in [0,1], got {}",
                    rho
                )));
            }
        }
        if let Some(frac) = self.max_factor_fraction {
            ensure_finite("maxFactorFraction", frac)?;
            if !(frac > 0.0 && frac <= 1.0) {
                return Err(EngineError::invalid(format!(
                    "maxFactorFraction must be in (0,1], got {}",
                    frac
                )));
            }
        }
        if let Some(liq) = self.min_liquidity {
            ensure_finite("minLiquidity", liq)?;
            if liq < 0.0 {
                return Err(EngineError::invalid("minLiquidity must be non-negative"));
            }
        }
        Ok(())
    }
}

/// Estimated correlation between two candidates (or a candidate and a held contract)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateCorrelation {
    pub id_a: String,
    pub id_b: String,
    pub correlation: f64,
}

impl CandidateCorrelation {
    pub fn new(id_a: impl Into<String>, id_b: impl Into<String>, correlation: f64) -> Self {
        Self {
            id_a: id_a.into(),
            id_b: id_b.into(),
            correlation,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveOptions {
    #[serde(default)]
    pub correlations: Vec<CandidateCorrelation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit_ms: Option<u64>,
    /// Clock for lockup metrics; the wall clock when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub now: Option<DateTime<Utc>>,
}

impl SolveOptions {
    pub fn with_correlations(correlations: Vec<CandidateCorrelation>) -> Self {
        Self {
            correlations,
            ..Self::default()
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        for c in &self.correlations {
            ensure_finite("correlation", c.correlation)?;
            if !(-1.0..=1.0).contains(&c.correlation) {
                return Err(EngineError::invalid(format!(
                    "correlation between '{}' and '{}' outside [-1,1]: {}",
                    c.id_a, c.id_b, c.correlation
                )));
            }
        }
        Ok(())
    }
}

/// One sized bet chosen by an optimizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedPosition {
    pub candidate_id: String,
    pub stake_usd: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shares: Option<f64>,
    /// Human-readable justification; not a control signal
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionMetrics {
    /// Expected profit as a fraction of bankroll
    pub expected_return: f64,
    pub num_correlated_pairs: usize,
    pub total_stake_usd: f64,
    pub drawdown_risk: DrawdownEstimate,
    /// Payoff standard deviation of the selection, treating bets as independent
    pub payoff_volatility_usd: f64,
    /// Stake-weighted days until the selected candidates resolve
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_lockup_days: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionEngineResult {
    pub positions: Vec<SelectedPosition>,
    /// Sum of expected profit across positions
    pub objective_value: f64,
    pub metrics: DecisionMetrics,
    /// One reason per candidate not selected
    pub excluded_reasons: BTreeMap<String, String>,
    pub solver: String,
    pub solve_time_ms: f64,
}

impl DecisionEngineResult {
    /// Nothing could be selected under the constraints.
    pub fn is_infeasible(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn total_stake_usd(&self) -> f64 {
        self.positions.iter().map(|p| p.stake_usd).sum()
    }
}
