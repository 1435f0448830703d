//! Stateless entry points for the decision engine
//!
//! `run_decision_engine` uses the greedy baseline unless an optimizer is
//! supplied. `solve_with_timeout` hosts any solver on the blocking pool with
//! a wall-clock limit for async callers.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::types::{DecisionEngineConstraints, DecisionEngineResult, SolveOptions};
use super::{make_optimizer, GreedyOptimizer, Optimizer};
use crate::error::{EngineError, Result};
use crate::models::CandidateBet;

pub const DEFAULT_OPTIMIZER: &str = "greedy";

/// Runs the decision engine without correlation data.
pub fn run_decision_engine(
    candidates: &[CandidateBet],
    constraints: &DecisionEngineConstraints,
    optimizer: Option<&dyn Optimizer>,
) -> Result<DecisionEngineResult> {
    run_decision_engine_with_options(candidates, constraints, &SolveOptions::default(), optimizer)
}

pub fn run_decision_engine_with_options(
    candidates: &[CandidateBet],
    constraints: &DecisionEngineConstraints,
    options: &SolveOptions,
    optimizer: Option<&dyn Optimizer>,
) -> Result<DecisionEngineResult> {
    let greedy = GreedyOptimizer::new();
    let optimizer = optimizer.unwrap_or(&greedy);

    let result = optimizer.solve(candidates, constraints, options)?;
    info!(
        solver = %result.solver,
        candidates = candidates.len(),
        selected = result.positions.len(),
        excluded = result.excluded_reasons.len(),
        total_stake_usd = result.metrics.total_stake_usd,
        objective = result.objective_value,
        solve_ms = result.solve_time_ms,
        "decision engine run complete"
    );
    Ok(result)
}

/// Looks the optimizer up by name and runs it.
pub fn run_named_optimizer(
    name: &str,
    candidates: &[CandidateBet],
    constraints: &DecisionEngineConstraints,
    options: &SolveOptions,
) -> Result<DecisionEngineResult> {
    let optimizer = make_optimizer(name)?;
    run_decision_engine_with_options(candidates, constraints, options, Some(optimizer.as_ref()))
}

/// Runs a solver on the blocking pool, abandoning it after `timeout`.
///
/// The solver thread is not interrupted; its result is discarded once the
/// limit passes.
pub async fn solve_with_timeout(
    optimizer: Arc<dyn Optimizer>,
    candidates: Vec<CandidateBet>,
    constraints: DecisionEngineConstraints,
    options: SolveOptions,
    timeout: Duration,
) -> Result<DecisionEngineResult> {
    let solver = optimizer.name().to_string();
    let task = tokio::task::spawn_blocking({
        let optimizer = Arc::clone(&optimizer);
        move || optimizer.solve(&candidates, &constraints, &options)
    });

    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => {
            warn!(solver = %solver, error = %e, "solver task panicked");
            Err(EngineError::SolverFailure {
                solver,
                reason: e.to_string(),
            })
        }
        Err(_) => {
            warn!(solver = %solver, timeout_ms = timeout.as_millis() as u64, "solver timed out");
            Err(EngineError::Timeout {
                solver,
                limit_ms: timeout.as_millis() as u64,
            })
        }
    }
}
