//! Distribution summaries over simulated paths

use serde::{Deserialize, Serialize};

use super::path::PathOutcome;
use super::SimulationStrategy;

/// Bankroll below this fraction of initial counts as ruined
pub const RUIN_THRESHOLD: f64 = 0.01;

/// Median and tail percentiles of a sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Distribution {
    pub median: f64,
    pub p5: f64,
    pub p25: f64,
    pub p75: f64,
    pub p95: f64,
}

impl Distribution {
    /// Nearest-rank percentiles; `samples` need not be sorted.
    pub fn from_samples(samples: &[f64]) -> Self {
        let mut sorted = samples.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        Self {
            median: percentile(&sorted, 0.50),
            p5: percentile(&sorted, 0.05),
            p25: percentile(&sorted, 0.25),
            p75: percentile(&sorted, 0.75),
            p95: percentile(&sorted, 0.95),
        }
    }
}

/// `q`-th percentile of an ascending slice; 0 for an empty one.
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let index = ((sorted.len() - 1) as f64 * q.clamp(0.0, 1.0)).round() as usize;
    sorted[index.min(sorted.len() - 1)]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyStats {
    pub strategy: SimulationStrategy,
    pub label: String,
    pub paths_completed: usize,
    pub terminal_bankroll: Distribution,
    pub max_drawdown: Distribution,
    pub mean_terminal_bankroll: f64,
    /// Fraction of paths ending below 1% of initial bankroll
    pub ruin_rate: f64,
}

impl StrategyStats {
    pub(crate) fn from_outcomes(
        strategy: &SimulationStrategy,
        initial_bankroll: f64,
        outcomes: &[PathOutcome],
    ) -> Self {
        let terminals: Vec<f64> = outcomes.iter().map(|o| o.terminal_bankroll).collect();
        let drawdowns: Vec<f64> = outcomes.iter().map(|o| o.max_drawdown).collect();

        let n = outcomes.len();
        let (mean_terminal_bankroll, ruin_rate) = if n == 0 {
            (0.0, 0.0)
        } else {
            let ruined = terminals
                .iter()
                .filter(|t| **t < initial_bankroll * RUIN_THRESHOLD)
                .count();
            (
                terminals.iter().sum::<f64>() / n as f64,
                ruined as f64 / n as f64,
            )
        };

        Self {
            strategy: strategy.clone(),
            label: strategy.label(),
            paths_completed: n,
            terminal_bankroll: Distribution::from_samples(&terminals),
            max_drawdown: Distribution::from_samples(&drawdowns),
            mean_terminal_bankroll,
            ruin_rate,
        }
    }
}
