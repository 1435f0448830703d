//! Pairwise correlation estimation between held positions
//!
//! The heuristic estimator is a placeholder, not an empirical model:
//!
//! - Two positions on the same underlying market correlate `+1` when they
//!   point the same way and `-1` when they oppose. "Same market" is the same
//!   contract, or ids that differ only in a trailing yes/no outcome suffix
//!   (`KXFED-25MAR-YES` / `KXFED-25MAR-NO`, `0xabc:yes` / `0xabc:no`).
//! - Competing outcomes of one event are the two sides of that event and
//!   correlate `-1` when both are backed, whatever their factors. Events are
//!   found by id prefix: the Kalshi event ticker before the last `-`
//!   (`KXNBAGAME-25JAN01LALBOS-LAL` / `...-BOS`) or the Polymarket condition
//!   id before the last `:` (`0xabc:lakers` / `0xabc:celtics`).
//! - Otherwise positions sharing non-"other" factors correlate at
//!   `0.3 + 0.5 × |shared| / |union|`, i.e. within [0.3, 0.8].
//! - Everything else is treated as independent.
//!
//! A better model plugs in through [`CorrelationEstimator`].

use std::collections::BTreeSet;

use crate::factors::OTHER_FACTOR;
use crate::models::{BetSource, Side};

const SHARED_FACTOR_BASE: f64 = 0.3;
const SHARED_FACTOR_SPAN: f64 = 0.5;

/// A held position as seen by a correlation estimator
#[derive(Debug, Clone, PartialEq)]
pub struct ExposureLeg {
    pub contract_id: String,
    pub source: BetSource,
    pub side: Side,
    /// Resolved factor ids (never empty)
    pub factor_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationEstimate {
    pub correlation: f64,
    pub reason: String,
}

impl CorrelationEstimate {
    pub fn independent() -> Self {
        Self {
            correlation: 0.0,
            reason: "Independent".to_string(),
        }
    }
}

pub trait CorrelationEstimator: Send + Sync {
    fn name(&self) -> &str;

    /// Correlation between the P&L of two legs, in [-1, 1].
    fn estimate(&self, a: &ExposureLeg, b: &ExposureLeg) -> CorrelationEstimate;
}

/// Underlying market of a contract id plus the direction its outcome token points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketRef {
    pub key: String,
    pub outcome: Side,
}

/// Splits a contract id into its market key and outcome.
///
/// A trailing `yes`/`no` segment after `:`, `-`, `_` or `/` is the outcome;
/// ids without one are the "yes" token of their own market.
pub fn parse_market(contract_id: &str) -> MarketRef {
    let lower = contract_id.trim().to_lowercase();
    if let Some(idx) = lower.rfind([':', '-', '_', '/']) {
        let (head, tail) = (&lower[..idx], &lower[idx + 1..]);
        let outcome = match tail {
            "yes" => Some(Side::Yes),
            "no" => Some(Side::No),
            _ => None,
        };
        if let Some(outcome) = outcome {
            if !head.is_empty() {
                return MarketRef {
                    key: head.to_string(),
                    outcome,
                };
            }
        }
    }
    MarketRef {
        key: lower,
        outcome: Side::Yes,
    }
}

/// Event id and outcome segment of a lowercased market key, if it names one
/// outcome of a multi-outcome event.
///
/// Polymarket `condition:outcome` keys split at the last `:`. Kalshi
/// `kxseries-event-outcome` tickers split at the last `-` and need at least
/// two segments left for the event ticker.
pub fn event_outcome(key: &str) -> Option<(&str, &str)> {
    if let Some((event, outcome)) = key.rsplit_once(':') {
        return (!event.is_empty() && !outcome.is_empty()).then_some((event, outcome));
    }
    if !key.starts_with("kx") {
        return None;
    }
    let (event, outcome) = key.rsplit_once('-')?;
    (event.contains('-') && !outcome.is_empty()).then_some((event, outcome))
}

/// `+1` when the position profits on the market's "yes" outcome.
fn direction(leg: &ExposureLeg, market: &MarketRef) -> f64 {
    let held = if leg.side == Side::No {
        market.outcome.opposite()
    } else {
        market.outcome
    };
    match held {
        Side::Yes => 1.0,
        Side::No => -1.0,
    }
}

fn meaningful_factors(leg: &ExposureLeg) -> BTreeSet<&str> {
    leg.factor_ids
        .iter()
        .map(String::as_str)
        .filter(|f| *f != OTHER_FACTOR)
        .collect()
}

/// Id-pattern and factor-overlap heuristic
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicCorrelationEstimator;

impl CorrelationEstimator for HeuristicCorrelationEstimator {
    fn name(&self) -> &str {
        "heuristic"
    }

    fn estimate(&self, a: &ExposureLeg, b: &ExposureLeg) -> CorrelationEstimate {
        let market_a = parse_market(&a.contract_id);
        let market_b = parse_market(&b.contract_id);
        if market_a.key == market_b.key {
            let rho = direction(a, &market_a) * direction(b, &market_b);
            let reason = if rho < 0.0 {
                "Opposite sides of the same market"
            } else {
                "Same side of the same market"
            };
            return CorrelationEstimate {
                correlation: rho,
                reason: reason.to_string(),
            };
        }

        if let (Some((event_a, _)), Some((event_b, _))) =
            (event_outcome(&market_a.key), event_outcome(&market_b.key))
        {
            if event_a == event_b {
                let rho = -direction(a, &market_a) * direction(b, &market_b);
                let reason = if rho < 0.0 {
                    format!("Competing outcomes of event {}", event_a)
                } else {
                    format!("Offsetting positions on competing outcomes of event {}", event_a)
                };
                return CorrelationEstimate {
                    correlation: rho,
                    reason,
                };
            }
        }

        let fa = meaningful_factors(a);
        let fb = meaningful_factors(b);
        let shared: Vec<&str> = fa.intersection(&fb).copied().collect();
        if shared.is_empty() {
            return CorrelationEstimate::independent();
        }
        let union = fa.union(&fb).count();
        let overlap = shared.len() as f64 / union as f64;

        CorrelationEstimate {
            correlation: SHARED_FACTOR_BASE + SHARED_FACTOR_SPAN * overlap,
            reason: format!("Shared factors: {}", shared.join(", ")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leg(id: &str, side: Side, factors: &[&str]) -> ExposureLeg {
        ExposureLeg {
            contract_id: id.to_string(),
            source: BetSource::Kalshi,
            side,
            factor_ids: factors.iter().map(|f| f.to_string()).collect(),
        }
    }

    #[test]
    fn test_parse_market_suffixes() {
        assert_eq!(
            parse_market("KXFED-25MAR-YES"),
            MarketRef {
                key: "kxfed-25mar".into(),
                outcome: Side::Yes
            }
        );
        assert_eq!(parse_market("0xabc:no").key, "0xabc");
        assert_eq!(parse_market("0xabc:no").outcome, Side::No);
        // Strike suffixes are part of the market
        assert_eq!(parse_market("KXFED-25MAR-T4.25").key, "kxfed-25mar-t4.25");
        assert_eq!(parse_market("no").key, "no");
    }

    #[test]
    fn test_event_outcome_prefixes() {
        assert_eq!(
            event_outcome("kxnbagame-25jan01lalbos-lal"),
            Some(("kxnbagame-25jan01lalbos", "lal"))
        );
        assert_eq!(event_outcome("0xabc:lakers"), Some(("0xabc", "lakers")));
        // Series-only prefix is not an event
        assert_eq!(event_outcome("kxfed-25mar"), None);
        assert_eq!(event_outcome("btc-100k"), None);
        assert_eq!(event_outcome("0xabc"), None);
    }

    #[test]
    fn test_competing_outcomes_ignore_factors() {
        let e = HeuristicCorrelationEstimator;
        let lal = leg("KXNBAGAME-25JAN01LALBOS-LAL", Side::Yes, &["sports"]);
        let bos = leg("KXNBAGAME-25JAN01LALBOS-BOS", Side::Yes, &["sports"]);
        assert_eq!(e.estimate(&lal, &bos).correlation, -1.0);

        // Backing LAL and fading BOS point the same way
        let fade_bos = leg("KXNBAGAME-25JAN01LALBOS-BOS", Side::No, &["sports"]);
        assert_eq!(e.estimate(&lal, &fade_bos).correlation, 1.0);

        let lakers = leg("0xabc:lakers", Side::Yes, &[]);
        let celtics = leg("0xabc:celtics", Side::Yes, &[]);
        assert_eq!(e.estimate(&lakers, &celtics).correlation, -1.0);

        // Different events of one series fall back to factor overlap
        let other_game = leg("KXNBAGAME-25JAN02NYKMIA-NYK", Side::Yes, &["sports"]);
        assert!((e.estimate(&lal, &other_game).correlation - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_opposite_sides_same_contract() {
        let est = HeuristicCorrelationEstimator.estimate(
            &leg("KXBTC-25DEC31", Side::Yes, &["crypto"]),
            &leg("KXBTC-25DEC31", Side::No, &["crypto"]),
        );
        assert_eq!(est.correlation, -1.0);
    }

    #[test]
    fn test_outcome_tokens_of_one_condition() {
        let e = HeuristicCorrelationEstimator;
        let yes = leg("0xabc:yes", Side::Yes, &[]);
        let no = leg("0xabc:no", Side::Yes, &[]);
        assert_eq!(e.estimate(&yes, &no).correlation, -1.0);

        // Selling the "no" token is the same bet as buying "yes"
        let short_no = leg("0xabc:no", Side::No, &[]);
        assert_eq!(e.estimate(&yes, &short_no).correlation, 1.0);
    }

    #[test]
    fn test_shared_factor_band() {
        let e = HeuristicCorrelationEstimator;
        let full = e.estimate(
            &leg("a", Side::Yes, &["crypto"]),
            &leg("b", Side::Yes, &["crypto"]),
        );
        assert!((full.correlation - 0.8).abs() < 1e-12);

        let partial = e.estimate(
            &leg("a", Side::Yes, &["crypto", "tech"]),
            &leg("b", Side::Yes, &["crypto", "macro"]),
        );
        // 1 shared of 3
        assert!((partial.correlation - (0.3 + 0.5 / 3.0)).abs() < 1e-12);
        assert!(partial.reason.contains("crypto"));

        let other = e.estimate(&leg("a", Side::Yes, &["other"]), &leg("b", Side::Yes, &["other"]));
        assert_eq!(other.correlation, 0.0);
    }
}
