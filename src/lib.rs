//! BetterBot Sizing Library
//!
//! Quantitative core for recommending and sizing wagers across sportsbooks
//! and binary prediction markets:
//!
//! - `bankroll`: Kelly sizing and drawdown / lockup heuristics
//! - `optimizer`: the decision engine (portfolio construction over candidates)
//! - `risk`: correlation-aware exposure analysis of existing holdings
//! - `simulator`: Monte Carlo comparison of sizing strategies
//! - `factors`: keyword classifier behind factor grouping
//!
//! Entry points are [`run_decision_engine`], [`run_portfolio_risk_analysis`]
//! and [`run_strategy_comparison`]. All take and return plain serde data.

pub mod bankroll;
pub mod config;
pub mod error;
pub mod factors;
pub mod models;
pub mod optimizer;
pub mod risk;
pub mod simulator;

pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use models::{BetSource, CandidateBet, Contract, Portfolio, Position, Side};
pub use optimizer::{
    run_decision_engine, run_decision_engine_with_options, DecisionEngineConstraints,
    DecisionEngineResult, Optimizer, SolveOptions,
};
pub use risk::{run_portfolio_risk_analysis, PortfolioRiskReport};
pub use simulator::{run_strategy_comparison, SimulatedBet, SimulationStrategy, StrategyComparison};
