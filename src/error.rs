//! Engine error types
//!
//! Infeasibility is not an error: a solve that selects nothing still returns
//! a `DecisionEngineResult` with every candidate's exclusion reason. Errors
//! are reserved for malformed input and for solvers that could not finish.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum EngineError {
    /// Malformed constraints, candidates, contracts or simulation input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A solver backend failed internally.
    #[error("Solver '{solver}' failed: {reason}")]
    SolverFailure { solver: String, reason: String },

    /// A solver (or the host wrapping it) ran out of time.
    #[error("Solver '{solver}' exceeded its time limit of {limit_ms}ms")]
    Timeout { solver: String, limit_ms: u64 },

    #[error("Unknown optimizer: '{name}'. Available optimizers: {available}")]
    UnknownOptimizer { name: String, available: String },
}

impl EngineError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        EngineError::InvalidInput(msg.into())
    }

    /// True for failures of the solver itself (as opposed to bad input).
    pub fn is_solver_failure(&self) -> bool {
        matches!(
            self,
            EngineError::SolverFailure { .. } | EngineError::Timeout { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// Fails with `InvalidInput` unless `value` is a finite number.
pub(crate) fn ensure_finite(field: &str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(EngineError::invalid(format!("{} must be finite, got {}", field, value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solver_failure_classification() {
        let timeout = EngineError::Timeout {
            solver: "exhaustive".into(),
            limit_ms: 5,
        };
        assert!(timeout.is_solver_failure());
        assert!(!EngineError::invalid("bankroll").is_solver_failure());
        assert!(timeout.to_string().contains("5ms"));
    }

    #[test]
    fn test_ensure_finite() {
        assert!(ensure_finite("price", 0.5).is_ok());
        assert!(ensure_finite("price", f64::NAN).is_err());
        assert!(ensure_finite("price", f64::INFINITY).is_err());
    }
}
