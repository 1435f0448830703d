//! Strategy Simulator
//!
//! Offline Monte Carlo comparison of sizing policies over a fixed, ordered
//! sequence of binary bets. Not on the live request path.
//!
//! Each path gets its own `ChaCha8Rng` stream derived from the run seed and
//! the path index, so paths are independent, parallel execution is
//! reproducible, and every strategy in a comparison faces the same win/loss
//! draws on a given path.

mod path;
pub mod stats;

pub use stats::{percentile, Distribution, StrategyStats, RUIN_THRESHOLD};

use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::bankroll::kelly_stake_usd;
use crate::error::{ensure_finite, EngineError, Result};
use path::{simulate_path, PathOutcome};

pub const DEFAULT_NUM_RUNS: usize = 10_000;
pub const DEFAULT_SEED: u64 = 0x5EED_2024;

/// One bet in the simulated sequence
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulatedBet {
    pub win_prob: f64,
    pub price: f64,
}

impl SimulatedBet {
    pub fn new(win_prob: f64, price: f64) -> Self {
        Self { win_prob, price }
    }

    fn validate(&self, index: usize) -> Result<()> {
        ensure_finite("bet winProb", self.win_prob)?;
        ensure_finite("bet price", self.price)?;
        if !(0.0..=1.0).contains(&self.win_prob) {
            return Err(EngineError::invalid(format!(
                "bet {} winProb {} outside [0,1]",
                index, self.win_prob
            )));
        }
        if !(self.price > 0.0 && self.price < 1.0) {
            return Err(EngineError::invalid(format!(
                "bet {} price {} outside (0,1)",
                index, self.price
            )));
        }
        Ok(())
    }
}

/// Sizing policy under test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SimulationStrategy {
    /// Fixed USD stake
    #[serde(rename_all = "camelCase")]
    Flat { stake_usd: f64 },
    /// Fixed fraction of the *initial* bankroll
    #[serde(rename_all = "camelCase")]
    FlatFraction { fraction_of_initial: f64 },
    /// Fractional Kelly against the *current* bankroll
    #[serde(rename_all = "camelCase")]
    Kelly { kelly_fraction: f64 },
}

impl SimulationStrategy {
    pub fn label(&self) -> String {
        match self {
            SimulationStrategy::Flat { stake_usd } => format!("flat(${:.2})", stake_usd),
            SimulationStrategy::FlatFraction { fraction_of_initial } => {
                format!("flat_fraction({})", fraction_of_initial)
            }
            SimulationStrategy::Kelly { kelly_fraction } => format!("kelly({})", kelly_fraction),
        }
    }

    /// Unclamped stake for `bet` at the current bankroll.
    pub fn stake_usd(&self, bet: &SimulatedBet, current: f64, initial: f64) -> f64 {
        match self {
            SimulationStrategy::Flat { stake_usd } => *stake_usd,
            SimulationStrategy::FlatFraction {
                fraction_of_initial,
            } => initial * fraction_of_initial,
            SimulationStrategy::Kelly { kelly_fraction } => {
                kelly_stake_usd(current, *kelly_fraction, bet.win_prob, bet.price)
            }
        }
    }

    fn validate(&self) -> Result<()> {
        let (name, value, max) = match self {
            SimulationStrategy::Flat { stake_usd } => ("stakeUsd", *stake_usd, f64::INFINITY),
            SimulationStrategy::FlatFraction {
                fraction_of_initial,
            } => ("fractionOfInitial", *fraction_of_initial, 1.0),
            SimulationStrategy::Kelly { kelly_fraction } => ("kellyFraction", *kelly_fraction, 1.0),
        };
        ensure_finite(name, value)?;
        if !(value > 0.0 && value <= max) {
            return Err(EngineError::invalid(format!(
                "{}: {} must be > 0 and <= {}",
                self.label(),
                name,
                max
            )));
        }
        Ok(())
    }
}

/// Flat 2%-of-initial, quarter-Kelly and half-Kelly.
pub fn default_strategies() -> Vec<SimulationStrategy> {
    vec![
        SimulationStrategy::FlatFraction {
            fraction_of_initial: 0.02,
        },
        SimulationStrategy::Kelly {
            kelly_fraction: 0.25,
        },
        SimulationStrategy::Kelly {
            kelly_fraction: 0.5,
        },
    ]
}

fn default_num_runs() -> usize {
    DEFAULT_NUM_RUNS
}

fn default_seed() -> u64 {
    DEFAULT_SEED
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulatorConfig {
    #[serde(default = "default_num_runs")]
    pub num_runs: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Per-strategy wall-clock budget; unlimited when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit_ms: Option<u64>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            num_runs: DEFAULT_NUM_RUNS,
            seed: DEFAULT_SEED,
            time_limit_ms: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyComparison {
    pub initial_bankroll_usd: f64,
    pub num_bets: usize,
    pub strategies: Vec<StrategyStats>,
}

impl StrategyComparison {
    pub fn get(&self, strategy: &SimulationStrategy) -> Option<&StrategyStats> {
        self.strategies.iter().find(|s| &s.strategy == strategy)
    }
}

fn validate_inputs(
    initial_bankroll_usd: f64,
    bets: &[SimulatedBet],
    strategies: &[SimulationStrategy],
    config: &SimulatorConfig,
) -> Result<()> {
    ensure_finite("initialBankrollUsd", initial_bankroll_usd)?;
    if initial_bankroll_usd <= 0.0 {
        return Err(EngineError::invalid(format!(
            "initialBankrollUsd must be > 0, got {}",
            initial_bankroll_usd
        )));
    }
    if config.num_runs == 0 {
        return Err(EngineError::invalid("numRuns must be at least 1"));
    }
    for (i, bet) in bets.iter().enumerate() {
        bet.validate(i)?;
    }
    for strategy in strategies {
        strategy.validate()?;
    }
    Ok(())
}

/// Runs every path for one strategy.
///
/// Path 0 always runs; later paths are skipped once the time budget is spent.
fn run_paths(
    initial_bankroll_usd: f64,
    bets: &[SimulatedBet],
    strategy: &SimulationStrategy,
    config: &SimulatorConfig,
) -> Vec<PathOutcome> {
    let deadline = config
        .time_limit_ms
        .map(|ms| Instant::now() + Duration::from_millis(ms));

    (0..config.num_runs)
        .into_par_iter()
        .filter_map(|path_index| {
            if path_index > 0 {
                if let Some(deadline) = deadline {
                    if Instant::now() >= deadline {
                        return None;
                    }
                }
            }
            let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
            rng.set_stream(path_index as u64);
            Some(simulate_path(initial_bankroll_usd, bets, strategy, &mut rng))
        })
        .collect()
}

/// Simulates one strategy and summarises its paths.
pub fn simulate_strategy(
    initial_bankroll_usd: f64,
    bets: &[SimulatedBet],
    strategy: &SimulationStrategy,
    config: &SimulatorConfig,
) -> Result<StrategyStats> {
    validate_inputs(
        initial_bankroll_usd,
        bets,
        std::slice::from_ref(strategy),
        config,
    )?;
    Ok(summarise(initial_bankroll_usd, bets, strategy, config))
}

fn summarise(
    initial_bankroll_usd: f64,
    bets: &[SimulatedBet],
    strategy: &SimulationStrategy,
    config: &SimulatorConfig,
) -> StrategyStats {
    let started = Instant::now();
    let outcomes = run_paths(initial_bankroll_usd, bets, strategy, config);
    let stats = StrategyStats::from_outcomes(strategy, initial_bankroll_usd, &outcomes);
    debug!(
        strategy = %stats.label,
        paths = stats.paths_completed,
        median_terminal = stats.terminal_bankroll.median,
        p95_drawdown = stats.max_drawdown.p95,
        ruin_rate = stats.ruin_rate,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "strategy simulated"
    );
    stats
}

/// Compares sizing strategies on the same bet sequence with explicit settings.
pub fn run_strategy_comparison_with_config(
    initial_bankroll_usd: f64,
    bets: &[SimulatedBet],
    strategies: &[SimulationStrategy],
    config: &SimulatorConfig,
) -> Result<StrategyComparison> {
    validate_inputs(initial_bankroll_usd, bets, strategies, config)?;

    let started = Instant::now();
    let stats: Vec<StrategyStats> = strategies
        .iter()
        .map(|s| summarise(initial_bankroll_usd, bets, s, config))
        .collect();

    info!(
        strategies = stats.len(),
        bets = bets.len(),
        num_runs = config.num_runs,
        seed = config.seed,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "strategy comparison complete"
    );

    Ok(StrategyComparison {
        initial_bankroll_usd,
        num_bets: bets.len(),
        strategies: stats,
    })
}

/// Compares `strategies` (default set when `None`) over `num_runs` paths
/// (10,000 when `None`) with the default seed.
pub fn run_strategy_comparison(
    initial_bankroll_usd: f64,
    bets: &[SimulatedBet],
    strategies: Option<Vec<SimulationStrategy>>,
    num_runs: Option<usize>,
) -> Result<StrategyComparison> {
    let strategies = strategies.unwrap_or_else(default_strategies);
    let config = SimulatorConfig {
        num_runs: num_runs.unwrap_or(DEFAULT_NUM_RUNS),
        ..SimulatorConfig::default()
    };
    run_strategy_comparison_with_config(initial_bankroll_usd, bets, &strategies, &config)
}
