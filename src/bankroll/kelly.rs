//! Kelly Criterion Position Sizing
//!
//! For a binary contract paying $1 on a win at cost `price`:
//!   b  = 1/price - 1          (net odds)
//!   f* = (b·p - q) / b        (full Kelly)
//! which simplifies to
//!   f* = (p - price) / (1 - price) = edge / (1 - price)
//!
//! We size with FRACTIONAL Kelly (typically 0.25x) to reduce volatility.

use serde::{Deserialize, Serialize};

/// Full Kelly fraction for a binary contract, clamped to [0,1].
///
/// Returns 0 when there is no edge or the price is outside (0,1).
pub fn full_kelly_binary(win_prob: f64, price: f64) -> f64 {
    if !(price > 0.0 && price < 1.0) || !win_prob.is_finite() {
        return 0.0;
    }
    let edge = win_prob - price;
    if edge <= 0.0 {
        return 0.0;
    }
    (edge / (1.0 - price)).clamp(0.0, 1.0)
}

/// Recommended stake in USD: `bankroll × kelly_fraction × full_kelly`.
pub fn kelly_stake_usd(bankroll_usd: f64, kelly_fraction: f64, win_prob: f64, price: f64) -> f64 {
    if !(bankroll_usd > 0.0) || !(kelly_fraction > 0.0) {
        return 0.0;
    }
    bankroll_usd * kelly_fraction * full_kelly_binary(win_prob, price)
}

/// Expected profit of staking `stake_usd` at `price` with the given edge.
pub fn expected_profit(stake_usd: f64, edge: f64, price: f64) -> f64 {
    if !(price > 0.0) {
        return 0.0;
    }
    stake_usd * edge * (1.0 / price - 1.0)
}

/// Single-bet sizing parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KellyParams {
    /// Total bankroll in USD
    pub bankroll_usd: f64,
    /// Fractional Kelly multiplier (0.25 = quarter Kelly)
    #[serde(default = "default_kelly_fraction")]
    pub kelly_fraction: f64,
    /// Maximum single position as a fraction of bankroll
    #[serde(default = "default_max_position_pct")]
    pub max_position_pct: f64,
    /// Minimum stake worth placing
    #[serde(default = "default_min_stake_usd")]
    pub min_stake_usd: f64,
}

fn default_kelly_fraction() -> f64 {
    0.25
}

fn default_max_position_pct() -> f64 {
    0.02
}

fn default_min_stake_usd() -> f64 {
    1.0
}

impl Default for KellyParams {
    fn default() -> Self {
        Self {
            bankroll_usd: 1000.0,
            kelly_fraction: default_kelly_fraction(),
            max_position_pct: default_max_position_pct(),
            min_stake_usd: default_min_stake_usd(),
        }
    }
}

/// Sizing recommendation for one bet
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StakeRecommendation {
    pub stake_usd: f64,
    /// Kelly fraction before the fractional multiplier
    pub full_kelly_fraction: f64,
    /// Fraction of bankroll actually staked (after multiplier and cap)
    pub applied_fraction: f64,
    pub edge: f64,
    pub should_bet: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
}

impl StakeRecommendation {
    fn skip(edge: f64, full_kelly_fraction: f64, reason: String) -> Self {
        Self {
            stake_usd: 0.0,
            full_kelly_fraction,
            applied_fraction: 0.0,
            edge,
            should_bet: false,
            skip_reason: Some(reason),
        }
    }
}

/// Size one bet with fractional Kelly, the per-position cap and a minimum stake.
pub fn recommend_stake(win_prob: f64, price: f64, params: &KellyParams) -> StakeRecommendation {
    if !(0.0..=1.0).contains(&win_prob) {
        return StakeRecommendation::skip(0.0, 0.0, "Invalid win probability".to_string());
    }
    if !(price > 0.0 && price < 1.0) {
        return StakeRecommendation::skip(0.0, 0.0, "Invalid market price".to_string());
    }

    let edge = win_prob - price;
    if edge <= 0.0 {
        return StakeRecommendation::skip(
            edge,
            0.0,
            format!(
                "No edge: win probability {:.1}% <= price {:.1}%",
                win_prob * 100.0,
                price * 100.0
            ),
        );
    }

    let full_kelly = full_kelly_binary(win_prob, price);
    let applied_fraction = (full_kelly * params.kelly_fraction).min(params.max_position_pct);
    let stake_usd = params.bankroll_usd.max(0.0) * applied_fraction;

    if stake_usd < params.min_stake_usd {
        return StakeRecommendation::skip(
            edge,
            full_kelly,
            format!(
                "Stake ${:.2} below minimum ${:.2}",
                stake_usd, params.min_stake_usd
            ),
        );
    }

    StakeRecommendation {
        stake_usd,
        full_kelly_fraction: full_kelly,
        applied_fraction,
        edge,
        should_bet: true,
        skip_reason: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_kelly_worked_example() {
        // 60% at 50c: edge 0.10, f* = 0.10 / 0.50 = 0.20
        let f = full_kelly_binary(0.60, 0.50);
        assert!((f - 0.20).abs() < 1e-12);

        let stake = kelly_stake_usd(1000.0, 0.25, 0.60, 0.50);
        assert!((stake - 50.0).abs() < 1e-9, "stake was {}", stake);
    }

    #[test]
    fn test_kelly_invalid_price() {
        assert_eq!(full_kelly_binary(0.9, 1.0), 0.0);
        assert_eq!(full_kelly_binary(0.9, 0.0), 0.0);
        assert_eq!(full_kelly_binary(0.9, -0.2), 0.0);
        assert_eq!(full_kelly_binary(0.9, f64::NAN), 0.0);
    }

    #[test]
    fn test_kelly_no_edge() {
        assert_eq!(full_kelly_binary(0.40, 0.50), 0.0);
        assert_eq!(full_kelly_binary(0.50, 0.50), 0.0);
        assert_eq!(kelly_stake_usd(1000.0, 0.25, 0.40, 0.50), 0.0);
    }

    #[test]
    fn test_kelly_stake_zero_bankroll() {
        assert_eq!(kelly_stake_usd(0.0, 0.25, 0.60, 0.50), 0.0);
        assert_eq!(kelly_stake_usd(-100.0, 0.25, 0.60, 0.50), 0.0);
    }

    #[test]
    fn test_kelly_certain_win_clamped() {
        // p = 1 at price 0.2: f* = 0.8 / 0.8 = 1
        assert!((full_kelly_binary(1.0, 0.2) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_kelly_monotonic_in_bankroll_and_fraction() {
        let mut prev = 0.0;
        for bankroll in [100.0, 500.0, 1000.0, 5000.0] {
            let stake = kelly_stake_usd(bankroll, 0.25, 0.58, 0.45);
            assert!(stake >= prev);
            prev = stake;
        }

        let mut prev = 0.0;
        for fraction in [0.1, 0.25, 0.5, 1.0] {
            let stake = kelly_stake_usd(1000.0, fraction, 0.58, 0.45);
            assert!(stake >= prev);
            prev = stake;
        }
    }

    #[test]
    fn test_expected_profit() {
        // $50 at 50c with a 10% edge: 50 × 0.10 × 1 = 5
        assert!((expected_profit(50.0, 0.10, 0.50) - 5.0).abs() < 1e-9);
        assert_eq!(expected_profit(50.0, 0.10, 0.0), 0.0);
    }

    #[test]
    fn test_recommend_stake_with_edge() {
        let params = KellyParams {
            bankroll_usd: 10_000.0,
            kelly_fraction: 0.25,
            max_position_pct: 0.10,
            min_stake_usd: 1.0,
        };

        let rec = recommend_stake(0.60, 0.50, &params);
        assert!(rec.should_bet);
        // 10k × 0.25 × 0.20 = 500
        assert!((rec.stake_usd - 500.0).abs() < 1e-9);
        assert!(rec.skip_reason.is_none());
    }

    #[test]
    fn test_recommend_stake_capped() {
        let params = KellyParams {
            bankroll_usd: 10_000.0,
            kelly_fraction: 0.25,
            max_position_pct: 0.02,
            min_stake_usd: 1.0,
        };

        let rec = recommend_stake(0.90, 0.50, &params);
        assert!(rec.should_bet);
        assert!(rec.stake_usd <= params.bankroll_usd * params.max_position_pct + 1e-9);
    }

    #[test]
    fn test_recommend_stake_skips() {
        let params = KellyParams::default();

        let rec = recommend_stake(0.40, 0.50, &params);
        assert!(!rec.should_bet);
        assert!(rec.edge < 0.0);

        let rec = recommend_stake(0.60, 1.0, &params);
        assert!(!rec.should_bet);
        assert_eq!(rec.skip_reason.as_deref(), Some("Invalid market price"));

        let tiny = KellyParams {
            bankroll_usd: 20.0,
            min_stake_usd: 5.0,
            ..KellyParams::default()
        };
        let rec = recommend_stake(0.51, 0.50, &tiny);
        assert!(!rec.should_bet);
        assert!(rec.skip_reason.unwrap_or_default().contains("below minimum"));
    }
}
