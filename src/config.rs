//! Engine configuration
//!
//! Loaded from TOML. Every field has a default so a partial file (or no file
//! at all) is valid.
//!
//! ```toml
//! [optimizer]
//! name = "exhaustive"
//! time_limit_ms = 500
//!
//! [constraints]
//! kelly_fraction = 0.25
//! max_positions = 12
//! max_factor_fraction = 0.4
//!
//! [simulator]
//! num_runs = 10000
//! seed = 42
//!
//! [risk]
//! concentration_warning = 0.5
//!
//! [[factors]]
//! id = "esports"
//! name = "Esports"
//! keywords = ["league of legends", "valorant", "dota"]
//! ```

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::factors::{FactorClassifier, FactorDefinition};
use crate::optimizer::{
    make_optimizer, CandidateCorrelation, DecisionEngineConstraints, Optimizer, SolveOptions,
    DEFAULT_OPTIMIZER,
};
use crate::risk::{PortfolioRiskEngine, RiskThresholds};
use crate::simulator::{SimulatorConfig, DEFAULT_NUM_RUNS, DEFAULT_SEED};

pub const CONFIG_PATH_ENV: &str = "SIZING_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "sizing.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub optimizer: OptimizerSettings,
    #[serde(default)]
    pub constraints: ConstraintDefaults,
    #[serde(default)]
    pub simulator: SimulatorSettings,
    #[serde(default)]
    pub risk: RiskThresholds,
    /// Extra factor definitions merged into the built-in taxonomy
    #[serde(default)]
    pub factors: Vec<FactorDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerSettings {
    #[serde(default = "default_optimizer_name")]
    pub name: String,
    /// Solver time limit (ms)
    #[serde(default = "default_time_limit_ms")]
    pub time_limit_ms: u64,
}

fn default_optimizer_name() -> String {
    DEFAULT_OPTIMIZER.to_string()
}

fn default_time_limit_ms() -> u64 {
    1_000
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            name: default_optimizer_name(),
            time_limit_ms: default_time_limit_ms(),
        }
    }
}

/// Constraint values applied when a request only supplies a bankroll
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintDefaults {
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
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_pairwise_correlation: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_factor_fraction: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_liquidity: Option<f64>,
}

fn default_kelly_fraction() -> f64 {
    0.25
}
fn default_max_fraction_per_position() -> f64 {
    0.02
}
fn default_max_positions() -> usize {
    12
}

impl Default for ConstraintDefaults {
    fn default() -> Self {
        Self {
            kelly_fraction: default_kelly_fraction(),
            max_fraction_per_position: default_max_fraction_per_position(),
            max_positions: default_max_positions(),
            min_positions: None,
            max_total_notional: None,
            max_pairwise_correlation: None,
            max_factor_fraction: None,
            min_liquidity: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatorSettings {
    #[serde(default = "default_num_runs")]
    pub num_runs: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit_ms: Option<u64>,
}

fn default_num_runs() -> usize {
    DEFAULT_NUM_RUNS
}
fn default_seed() -> u64 {
    DEFAULT_SEED
}

impl Default for SimulatorSettings {
    fn default() -> Self {
        Self {
            num_runs: default_num_runs(),
            seed: default_seed(),
            time_limit_ms: None,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("invalid config {}", path.display()))?;
        Ok(config)
    }

    /// Load from `SIZING_CONFIG_PATH` (after `.env`) or `sizing.toml`, else defaults
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        Self::load(&path).unwrap_or_else(|e| {
            tracing::debug!("Using default sizing config ({}): {:#}", path, e);
            Self::default()
        })
    }

    /// Save to TOML file
    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        make_optimizer(&self.optimizer.name)?;
        self.constraints_for(1.0).validate()?;
        if self.simulator.num_runs == 0 {
            return Err(EngineError::invalid("simulator.num_runs must be at least 1"));
        }
        Ok(())
    }

    /// Full constraint set for `bankroll_usd` from the configured defaults.
    pub fn constraints_for(&self, bankroll_usd: f64) -> DecisionEngineConstraints {
        let d = &self.constraints;
        DecisionEngineConstraints {
            kelly_fraction: d.kelly_fraction,
            max_fraction_per_position: d.max_fraction_per_position,
            max_positions: d.max_positions,
            min_positions: d.min_positions,
            max_total_notional: d.max_total_notional,
            max_pairwise_correlation: d.max_pairwise_correlation,
            max_factor_fraction: d.max_factor_fraction,
            min_liquidity: d.min_liquidity,
            ..DecisionEngineConstraints::new(bankroll_usd)
        }
    }

    pub fn optimizer(&self) -> Result<Box<dyn Optimizer>> {
        make_optimizer(&self.optimizer.name)
    }

    /// Solve options carrying the configured time limit.
    pub fn solve_options(&self, correlations: Vec<CandidateCorrelation>) -> SolveOptions {
        SolveOptions {
            correlations,
            time_limit_ms: Some(self.optimizer.time_limit_ms),
            now: None,
        }
    }

    pub fn simulator_config(&self) -> SimulatorConfig {
        SimulatorConfig {
            num_runs: self.simulator.num_runs,
            seed: self.simulator.seed,
            time_limit_ms: self.simulator.time_limit_ms,
        }
    }

    pub fn classifier(&self) -> FactorClassifier {
        FactorClassifier::with_extra(&self.factors)
    }

    pub fn risk_engine(&self) -> PortfolioRiskEngine {
        PortfolioRiskEngine::new()
            .with_classifier(self.classifier())
            .with_thresholds(self.risk)
    }
}
