//! Bankroll / Kelly Engine
//!
//! Pure, stateless sizing functions shared by the optimizers, the portfolio
//! risk engine and the strategy simulator:
//! 1. Binary-contract Kelly fractions and fractional-Kelly stakes
//! 2. Single-bet stake recommendations with caps and minimums
//! 3. Drawdown / risk-of-ruin heuristics and capital lockup

pub mod drawdown;
pub mod kelly;

pub use drawdown::{
    avg_lockup_days, estimate_drawdown_risk, prob_drawdown_20, prob_drawdown_30_in_45d,
    risk_of_ruin, weighted_lockup_days, DrawdownEstimate,
};
pub use kelly::{
    expected_profit, full_kelly_binary, kelly_stake_usd, recommend_stake, KellyParams,
    StakeRecommendation,
};
