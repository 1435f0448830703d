//! Portfolio Risk Engine
//!
//! Correlation-aware exposure analysis of existing holdings:
//!
//! - notional per position and in total (`size × costPerShare`)
//! - factor exposures and concentration (largest single-factor fraction)
//! - heuristic pairwise correlations between held positions
//! - a normal-approximation variance curve
//! - capital lockup and, given a bankroll, drawdown heuristics
//!
//! Pure over its inputs: `now` is injectable and nothing is cached between
//! calls. An empty portfolio is a report with a warning, never an error.

pub mod correlation;

pub use correlation::{
    parse_market, CorrelationEstimate, CorrelationEstimator, ExposureLeg,
    HeuristicCorrelationEstimator, MarketRef,
};

use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::bankroll::{avg_lockup_days, estimate_drawdown_risk, DrawdownEstimate};
use crate::error::{ensure_finite, EngineError, Result};
use crate::factors::{FactorClassifier, OTHER_FACTOR};
use crate::models::{BetSource, Contract, Portfolio, Side};

/// z-score of the 5th / 95th percentile under the normal approximation
const P5_Z: f64 = 1.65;

const DEFAULT_FACTOR_CAP: f64 = 0.4;
const MIN_FACTOR_CAP: f64 = 0.25;
const MAX_FACTOR_CAP: f64 = 0.5;

fn default_concentration_warning() -> f64 {
    0.5
}

fn default_overexposure_warning() -> f64 {
    0.6
}

fn default_min_reported_correlation() -> f64 {
    0.2
}

fn default_kelly_fraction() -> f64 {
    0.25
}

/// Warning and reporting thresholds, set from the `[risk]` config section
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskThresholds {
    /// Largest factor fraction at which a concentration warning fires
    #[serde(default = "default_concentration_warning")]
    pub concentration_warning: f64,
    /// Per non-"other" factor fraction at which an overexposure warning fires
    #[serde(default = "default_overexposure_warning")]
    pub overexposure_warning: f64,
    /// Correlations with smaller magnitude are left out of the report
    #[serde(default = "default_min_reported_correlation")]
    pub min_reported_correlation: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            concentration_warning: default_concentration_warning(),
            overexposure_warning: default_overexposure_warning(),
            min_reported_correlation: default_min_reported_correlation(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAnalysisOptions {
    /// Enables drawdown heuristics in the report
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bankroll_usd: Option<f64>,
    #[serde(default = "default_kelly_fraction")]
    pub kelly_fraction: f64,
    /// Reference time for lockup; defaults to the current time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub now: Option<DateTime<Utc>>,
}

impl Default for RiskAnalysisOptions {
    fn default() -> Self {
        Self {
            bankroll_usd: None,
            kelly_fraction: default_kelly_fraction(),
            now: None,
        }
    }
}

impl RiskAnalysisOptions {
    fn validate(&self) -> Result<()> {
        if let Some(bankroll) = self.bankroll_usd {
            ensure_finite("bankrollUsd", bankroll)?;
            if bankroll <= 0.0 {
                return Err(EngineError::invalid(format!(
                    "bankrollUsd must be > 0, got {}",
                    bankroll
                )));
            }
        }
        ensure_finite("kellyFraction", self.kelly_fraction)?;
        if !(self.kelly_fraction > 0.0 && self.kelly_fraction <= 1.0) {
            return Err(EngineError::invalid(format!(
                "kellyFraction must be in (0,1], got {}",
                self.kelly_fraction
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactorExposure {
    pub factor_id: String,
    pub factor_name: String,
    pub notional: f64,
    /// notional / totalNotional
    pub fraction: f64,
    pub contract_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractCorrelation {
    pub contract_id_a: String,
    pub contract_id_b: String,
    pub correlation: f64,
    pub reason: String,
}

/// Normal approximation of portfolio P&L spread; not an exact distribution
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VarianceCurve {
    pub variance: f64,
    pub volatility_usd: f64,
    pub p5: f64,
    pub p95: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioRiskReport {
    pub total_notional: f64,
    pub factor_exposures: Vec<FactorExposure>,
    pub correlations: Vec<ContractCorrelation>,
    /// Largest single-factor fraction, in [0,1]
    pub concentration_risk: f64,
    pub warnings: Vec<String>,
    pub suggested_factor_cap: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variance_curve: Option<VarianceCurve>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_lockup_days: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drawdown_risk: Option<DrawdownEstimate>,
}

/// `clamp(2 / n, 0.25, 0.5)` over factors carrying notional.
pub fn suggested_factor_cap(factors_with_notional: usize) -> f64 {
    if factors_with_notional == 0 {
        return DEFAULT_FACTOR_CAP;
    }
    (2.0 / factors_with_notional as f64).clamp(MIN_FACTOR_CAP, MAX_FACTOR_CAP)
}

/// Risk analysis with a configurable classifier, estimator and thresholds.
pub struct PortfolioRiskEngine {
    classifier: FactorClassifier,
    estimator: Box<dyn CorrelationEstimator>,
    thresholds: RiskThresholds,
}

impl Default for PortfolioRiskEngine {
    fn default() -> Self {
        Self {
            classifier: FactorClassifier::default(),
            estimator: Box::new(HeuristicCorrelationEstimator),
            thresholds: RiskThresholds::default(),
        }
    }
}

impl PortfolioRiskEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_classifier(mut self, classifier: FactorClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_estimator(mut self, estimator: Box<dyn CorrelationEstimator>) -> Self {
        self.estimator = estimator;
        self
    }

    pub fn with_thresholds(mut self, thresholds: RiskThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn analyze(
        &self,
        portfolio: &Portfolio,
        options: &RiskAnalysisOptions,
    ) -> Result<PortfolioRiskReport> {
        options.validate()?;
        for contract in &portfolio.contracts {
            contract.validate()?;
        }
        for position in &portfolio.positions {
            position.validate()?;
        }

        let mut warnings = Vec::new();
        if portfolio.positions.is_empty() {
            warnings.push("Portfolio is empty".to_string());
        }

        // Resolve each position into a leg with its factor set
        let mut legs = Vec::with_capacity(portfolio.positions.len());
        let mut missing: BTreeSet<&str> = BTreeSet::new();
        for position in &portfolio.positions {
            let (source, factor_ids) = match portfolio.contract(&position.contract_id) {
                Some(contract) => (contract.source, self.contract_factors(contract)),
                None => {
                    missing.insert(position.contract_id.as_str());
                    (BetSource::Other, vec![OTHER_FACTOR.to_string()])
                }
            };
            legs.push(ExposureLeg {
                contract_id: position.contract_id.clone(),
                source,
                side: position.side,
                factor_ids,
            });
        }
        for id in &missing {
            warnings.push(format!("Position references unknown contract '{}'", id));
        }

        let notionals: Vec<f64> = portfolio.positions.iter().map(|p| p.notional()).collect();
        let total_notional: f64 = notionals.iter().sum();

        let factor_exposures = self.factor_exposures(&legs, &notionals, total_notional);
        let concentration_risk = factor_exposures
            .iter()
            .map(|f| f.fraction)
            .fold(0.0_f64, f64::max)
            .clamp(0.0, 1.0);

        if total_notional <= 0.0 && !factor_exposures.is_empty() {
            warnings.push("Positions carry no notional; exposure fractions are zero".to_string());
        }
        if let Some(top) = factor_exposures.first() {
            if total_notional > 0.0 && top.fraction >= self.thresholds.concentration_warning {
                warnings.push(format!(
                    "High concentration in {} ({:.0}% of notional)",
                    top.factor_name,
                    top.fraction * 100.0
                ));
            }
        }
        for exposure in &factor_exposures {
            if exposure.factor_id != OTHER_FACTOR
                && total_notional > 0.0
                && exposure.fraction >= self.thresholds.overexposure_warning
            {
                warnings.push(format!("Overexposure to {}", exposure.factor_name));
            }
        }

        let rho = self.correlation_matrix(&legs);
        let correlations = self.reported_correlations(&legs, &rho);

        let variance_curve = if portfolio.positions.is_empty() {
            None
        } else {
            Some(variance_curve(portfolio, &rho))
        };

        let factors_with_notional = factor_exposures.iter().filter(|f| f.notional > 0.0).count();
        let now = options.now.unwrap_or_else(Utc::now);
        let avg_lockup_days = avg_lockup_days(&portfolio.positions, &portfolio.contracts, now);
        let drawdown_risk = options
            .bankroll_usd
            .map(|bankroll| estimate_drawdown_risk(total_notional, bankroll, options.kelly_fraction));

        let report = PortfolioRiskReport {
            total_notional,
            factor_exposures,
            correlations,
            concentration_risk,
            warnings,
            suggested_factor_cap: suggested_factor_cap(factors_with_notional),
            variance_curve,
            avg_lockup_days,
            drawdown_risk,
        };
        info!(
            positions = portfolio.positions.len(),
            total_notional = report.total_notional,
            concentration = report.concentration_risk,
            correlated_pairs = report.correlations.len(),
            warnings = report.warnings.len(),
            estimator = self.estimator.name(),
            "portfolio risk analysis complete"
        );
        Ok(report)
    }

    fn contract_factors(&self, contract: &Contract) -> Vec<String> {
        if !contract.factor_ids.is_empty() {
            return contract.factor_ids.clone();
        }
        match contract.title.as_deref() {
            Some(title) => self.classifier.classify_parts(&[title, &contract.id]),
            None => vec![OTHER_FACTOR.to_string()],
        }
    }

    fn factor_exposures(
        &self,
        legs: &[ExposureLeg],
        notionals: &[f64],
        total_notional: f64,
    ) -> Vec<FactorExposure> {
        let mut by_factor: BTreeMap<&str, (f64, BTreeSet<&str>)> = BTreeMap::new();
        for (leg, notional) in legs.iter().zip(notionals) {
            let mut seen = HashSet::new();
            for factor in &leg.factor_ids {
                if !seen.insert(factor.as_str()) {
                    continue;
                }
                let entry = by_factor.entry(factor.as_str()).or_default();
                entry.0 += notional;
                entry.1.insert(leg.contract_id.as_str());
            }
        }

        let mut exposures: Vec<FactorExposure> = by_factor
            .into_iter()
            .map(|(factor_id, (notional, contracts))| FactorExposure {
                factor_id: factor_id.to_string(),
                factor_name: self.classifier.factor_name(factor_id),
                notional,
                fraction: if total_notional > 0.0 {
                    notional / total_notional
                } else {
                    0.0
                },
                contract_ids: contracts.into_iter().map(str::to_string).collect(),
            })
            .collect();
        exposures.sort_by(|a, b| {
            b.notional
                .total_cmp(&a.notional)
                .then_with(|| a.factor_id.cmp(&b.factor_id))
        });
        exposures
    }

    /// Upper-triangular pairwise estimates, `rho[i][j]` for `i < j`.
    fn correlation_matrix(&self, legs: &[ExposureLeg]) -> Vec<Vec<CorrelationEstimate>> {
        (0..legs.len())
            .map(|i| {
                ((i + 1)..legs.len())
                    .map(|j| {
                        let mut est = self.estimator.estimate(&legs[i], &legs[j]);
                        est.correlation = if est.correlation.is_nan() {
                            0.0
                        } else {
                            est.correlation.clamp(-1.0, 1.0)
                        };
                        est
                    })
                    .collect()
            })
            .collect()
    }

    fn reported_correlations(
        &self,
        legs: &[ExposureLeg],
        rho: &[Vec<CorrelationEstimate>],
    ) -> Vec<ContractCorrelation> {
        let mut seen: HashSet<((&str, Side), (&str, Side))> = HashSet::new();
        let mut out = Vec::new();
        for (i, row) in rho.iter().enumerate() {
            for (k, est) in row.iter().enumerate() {
                let j = i + 1 + k;
                let (a, b) = (&legs[i], &legs[j]);
                let key_a = (a.contract_id.as_str(), a.side);
                let key_b = (b.contract_id.as_str(), b.side);
                // Repeat fills on one leg are not a pair
                if key_a == key_b {
                    continue;
                }
                if est.correlation.abs() < self.thresholds.min_reported_correlation {
                    continue;
                }
                let key = if key_a <= key_b {
                    (key_a, key_b)
                } else {
                    (key_b, key_a)
                };
                if !seen.insert(key) {
                    continue;
                }
                out.push(ContractCorrelation {
                    contract_id_a: a.contract_id.clone(),
                    contract_id_b: b.contract_id.clone(),
                    correlation: est.correlation,
                    reason: est.reason.clone(),
                });
            }
        }
        out.sort_by(|x, y| {
            y.correlation
                .abs()
                .total_cmp(&x.correlation.abs())
                .then_with(|| x.contract_id_a.cmp(&y.contract_id_a))
                .then_with(|| x.contract_id_b.cmp(&y.contract_id_b))
        });
        out
    }
}

/// `Σσ_i² + 2·Σ_{i<j} ρ_ij·σ_i·σ_j` with `σ_i = size_i·sqrt(p_i(1-p_i))`.
fn variance_curve(portfolio: &Portfolio, rho: &[Vec<CorrelationEstimate>]) -> VarianceCurve {
    let sigmas: Vec<f64> = portfolio
        .positions
        .iter()
        .map(|p| {
            let prob = p.cost_per_share.clamp(0.0, 1.0);
            p.size * (prob * (1.0 - prob)).sqrt()
        })
        .collect();

    let mut variance: f64 = sigmas.iter().map(|s| s * s).sum();
    for (i, row) in rho.iter().enumerate() {
        for (k, est) in row.iter().enumerate() {
            let j = i + 1 + k;
            variance += 2.0 * est.correlation * sigmas[i] * sigmas[j];
        }
    }
    // Heuristic estimates need not form a PSD matrix
    let variance = variance.max(0.0);
    let volatility_usd = variance.sqrt();

    VarianceCurve {
        variance,
        volatility_usd,
        p5: -P5_Z * volatility_usd,
        p95: P5_Z * volatility_usd,
    }
}

/// Analyses `portfolio` with the default classifier, heuristic estimator and thresholds.
pub fn run_portfolio_risk_analysis(portfolio: &Portfolio) -> Result<PortfolioRiskReport> {
    PortfolioRiskEngine::default().analyze(portfolio, &RiskAnalysisOptions::default())
}

/// Same as [`run_portfolio_risk_analysis`] with explicit options and estimator.
pub fn analyze_portfolio(
    portfolio: &Portfolio,
    options: &RiskAnalysisOptions,
    estimator: Box<dyn CorrelationEstimator>,
) -> Result<PortfolioRiskReport> {
    PortfolioRiskEngine::default()
        .with_estimator(estimator)
        .analyze(portfolio, options)
}
