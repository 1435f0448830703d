//! Drawdown and capital lockup heuristics
//!
//! HEURISTIC, NOT A RISK MODEL. The drawdown and risk-of-ruin figures below
//! are monotone in the exposure ratio (`total_notional / bankroll`) and in
//! the Kelly fraction, but their constants are not fitted to any data.
//! Callers must not treat them as calibrated probabilities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::{Contract, Position};

const P20_RATE: f64 = 0.4;
const P30_45D_RATE: f64 = 0.5;
const DRAWDOWN_PROB_CAP: f64 = 0.95;
const RUIN_CAP: f64 = 0.5;
const RUIN_BASE: f64 = 0.15;
const RUIN_KELLY_PENALTY: f64 = 0.15;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Heuristic drawdown profile for a level of exposure
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawdownEstimate {
    pub exposure_ratio: f64,
    /// P(20% drawdown)
    pub prob_drawdown_20: f64,
    /// P(30% drawdown within 45 days)
    pub prob_drawdown_30_in_45d: f64,
    pub risk_of_ruin: f64,
}

/// `min(0.95, 1 - e^(-0.4·ratio))`
pub fn prob_drawdown_20(ratio: f64) -> f64 {
    (1.0 - (-P20_RATE * ratio.max(0.0)).exp()).min(DRAWDOWN_PROB_CAP)
}

/// `min(0.95, 1 - e^(-0.5·ratio))`
pub fn prob_drawdown_30_in_45d(ratio: f64) -> f64 {
    (1.0 - (-P30_45D_RATE * ratio.max(0.0)).exp()).min(DRAWDOWN_PROB_CAP)
}

/// `min(0.5, ratio × (0.15 + (1 - kelly_fraction) × 0.15))`
pub fn risk_of_ruin(ratio: f64, kelly_fraction: f64) -> f64 {
    let penalty = (1.0 - kelly_fraction.clamp(0.0, 1.0)) * RUIN_KELLY_PENALTY;
    (ratio.max(0.0) * (RUIN_BASE + penalty)).min(RUIN_CAP)
}

/// Evaluates all drawdown heuristics for `total_notional` against `bankroll_usd`.
///
/// A non-positive bankroll is treated as unbounded exposure.
pub fn estimate_drawdown_risk(
    total_notional: f64,
    bankroll_usd: f64,
    kelly_fraction: f64,
) -> DrawdownEstimate {
    if !(bankroll_usd > 0.0) {
        return DrawdownEstimate {
            exposure_ratio: f64::MAX,
            prob_drawdown_20: DRAWDOWN_PROB_CAP,
            prob_drawdown_30_in_45d: DRAWDOWN_PROB_CAP,
            risk_of_ruin: RUIN_CAP,
        };
    }

    let ratio = (total_notional / bankroll_usd).max(0.0);
    DrawdownEstimate {
        exposure_ratio: ratio,
        prob_drawdown_20: prob_drawdown_20(ratio),
        prob_drawdown_30_in_45d: prob_drawdown_30_in_45d(ratio),
        risk_of_ruin: risk_of_ruin(ratio, kelly_fraction),
    }
}

/// Notional-weighted average days until resolution.
///
/// Only positions whose contract resolves after `now` count. Returns `None`
/// when no held contract has usable resolution data.
pub fn avg_lockup_days(
    positions: &[Position],
    contracts: &[Contract],
    now: DateTime<Utc>,
) -> Option<f64> {
    let by_id: HashMap<&str, &Contract> = contracts.iter().map(|c| (c.id.as_str(), c)).collect();

    weighted_lockup_days(
        positions.iter().filter_map(|pos| {
            by_id
                .get(pos.contract_id.as_str())
                .and_then(|c| c.resolution_time)
                .map(|resolves_at| (pos.notional(), resolves_at))
        }),
        now,
    )
}

/// Weighted average days from `now` over `(weight, resolvesAt)` pairs.
///
/// Pairs resolving at or before `now` are skipped; `None` when nothing is left.
pub fn weighted_lockup_days<I>(exposures: I, now: DateTime<Utc>) -> Option<f64>
where
    I: IntoIterator<Item = (f64, DateTime<Utc>)>,
{
    let mut weighted_days = 0.0;
    let mut total_weight = 0.0;

    for (weight, resolves_at) in exposures {
        if resolves_at <= now {
            continue;
        }
        let days = (resolves_at - now).num_seconds() as f64 / SECONDS_PER_DAY;
        weighted_days += days * weight;
        total_weight += weight;
    }

    if total_weight > 0.0 {
        Some(weighted_days / total_weight)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BetSource, Side};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_zero_exposure_is_zero_risk() {
        let est = estimate_drawdown_risk(0.0, 1000.0, 0.25);
        assert_eq!(est.exposure_ratio, 0.0);
        assert_eq!(est.prob_drawdown_20, 0.0);
        assert_eq!(est.prob_drawdown_30_in_45d, 0.0);
        assert_eq!(est.risk_of_ruin, 0.0);
    }

    #[test]
    fn test_heuristic_values() {
        // ratio 0.5
        let est = estimate_drawdown_risk(500.0, 1000.0, 0.25);
        assert!((est.prob_drawdown_20 - (1.0 - (-0.2f64).exp())).abs() < 1e-12);
        assert!((est.prob_drawdown_30_in_45d - (1.0 - (-0.25f64).exp())).abs() < 1e-12);
        // 0.5 × (0.15 + 0.75 × 0.15) = 0.13125
        assert!((est.risk_of_ruin - 0.13125).abs() < 1e-12);
    }

    #[test]
    fn test_heuristics_are_capped() {
        let est = estimate_drawdown_risk(100_000.0, 1000.0, 0.1);
        assert_eq!(est.prob_drawdown_20, 0.95);
        assert_eq!(est.prob_drawdown_30_in_45d, 0.95);
        assert_eq!(est.risk_of_ruin, 0.5);

        let broke = estimate_drawdown_risk(10.0, 0.0, 0.25);
        assert_eq!(broke.risk_of_ruin, 0.5);
    }

    #[test]
    fn test_heuristics_monotonic() {
        let mut prev = estimate_drawdown_risk(0.0, 1000.0, 0.25);
        for notional in [50.0, 200.0, 800.0, 2000.0] {
            let est = estimate_drawdown_risk(notional, 1000.0, 0.25);
            assert!(est.prob_drawdown_20 >= prev.prob_drawdown_20);
            assert!(est.prob_drawdown_30_in_45d >= prev.prob_drawdown_30_in_45d);
            assert!(est.risk_of_ruin >= prev.risk_of_ruin);
            prev = est;
        }

        // Higher Kelly fraction => lower ruin heuristic
        assert!(risk_of_ruin(1.0, 0.5) < risk_of_ruin(1.0, 0.25));
    }

    #[test]
    fn test_avg_lockup_weighted() {
        let contracts = vec![
            Contract::new("a", BetSource::Kalshi, 0.5).with_resolution(now() + Duration::days(10)),
            Contract::new("b", BetSource::Kalshi, 0.5).with_resolution(now() + Duration::days(30)),
        ];
        let positions = vec![
            Position::new("a", Side::Yes, 100.0, 0.5), // $50
            Position::new("b", Side::Yes, 300.0, 0.5), // $150
        ];
        let days = avg_lockup_days(&positions, &contracts, now()).expect("lockup");
        // (10×50 + 30×150) / 200 = 25
        assert!((days - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_avg_lockup_undefined_without_data() {
        let contracts = vec![
            Contract::new("a", BetSource::Polymarket, 0.5),
            Contract::new("b", BetSource::Polymarket, 0.5).with_resolution(now() - Duration::days(1)),
        ];
        let positions = vec![
            Position::new("a", Side::Yes, 100.0, 0.5),
            Position::new("b", Side::No, 100.0, 0.5),
        ];
        assert_eq!(avg_lockup_days(&positions, &contracts, now()), None);
        assert_eq!(avg_lockup_days(&[], &contracts, now()), None);
    }
}
