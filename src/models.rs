use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ensure_finite, EngineError, Result};

/// Where a candidate bet was sourced from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BetSource {
    Sportsbook,
    Kalshi,
    Polymarket,
    Other,
}

/// One opportunity to stake money, as produced by a market adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateBet {
    pub id: String,
    pub source: BetSource,
    pub label: String,
    /// Caller's estimated probability of winning
    pub win_prob: f64,
    /// Cost per $1 of payoff (binary contract) or implied probability (sportsbook)
    pub price: f64,
    /// Signed edge; derived as `win_prob - price` when not supplied
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variance_per_dollar: Option<f64>,
    /// Liquidity cap in USD
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size: Option<f64>,
    #[serde(default)]
    pub factor_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_time: Option<DateTime<Utc>>,
}

impl CandidateBet {
    pub fn new(
        id: impl Into<String>,
        source: BetSource,
        label: impl Into<String>,
        win_prob: f64,
        price: f64,
    ) -> Self {
        Self {
            id: id.into(),
            source,
            label: label.into(),
            win_prob,
            price,
            edge: None,
            variance_per_dollar: None,
            max_size: None,
            factor_ids: Vec::new(),
            contract_id: None,
            resolution_time: None,
        }
    }

    pub fn with_factors<I, S>(mut self, factors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.factor_ids = factors.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_size(mut self, max_size: f64) -> Self {
        self.max_size = Some(max_size);
        self
    }

    pub fn with_edge(mut self, edge: f64) -> Self {
        self.edge = Some(edge);
        self
    }

    pub fn with_contract(mut self, contract_id: impl Into<String>) -> Self {
        self.contract_id = Some(contract_id.into());
        self
    }

    pub fn with_resolution(mut self, resolution_time: DateTime<Utc>) -> Self {
        self.resolution_time = Some(resolution_time);
        self
    }

    /// Edge used for ranking and eligibility.
    pub fn edge(&self) -> f64 {
        self.edge.unwrap_or(self.win_prob - self.price)
    }

    /// Payoff variance per share, `price·(1-price)` unless supplied.
    pub fn variance_per_dollar(&self) -> f64 {
        self.variance_per_dollar
            .unwrap_or(self.price * (1.0 - self.price))
    }

    /// Concentration group: first factor id, or the candidate's own id.
    pub fn factor_key(&self) -> &str {
        self.factor_ids
            .first()
            .map(String::as_str)
            .unwrap_or(self.id.as_str())
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(EngineError::invalid("candidate id must not be empty"));
        }
        ensure_finite(&format!("candidate '{}' winProb", self.id), self.win_prob)?;
        ensure_finite(&format!("candidate '{}' price", self.id), self.price)?;
        if !(0.0..=1.0).contains(&self.win_prob) {
            return Err(EngineError::invalid(format!(
                "candidate '{}' winProb {} outside [0,1]",
                self.id, self.win_prob
            )));
        }
        if let Some(edge) = self.edge {
            ensure_finite(&format!("candidate '{}' edge", self.id), edge)?;
        }
        if let Some(variance) = self.variance_per_dollar {
            ensure_finite(&format!("candidate '{}' variancePerDollar", self.id), variance)?;
            if variance < 0.0 {
                return Err(EngineError::invalid(format!(
                    "candidate '{}' variancePerDollar must be non-negative",
                    self.id
                )));
            }
        }
        if let Some(max_size) = self.max_size {
            ensure_finite(&format!("candidate '{}' maxSize", self.id), max_size)?;
            if max_size < 0.0 {
                return Err(EngineError::invalid(format!(
                    "candidate '{}' maxSize must be non-negative",
                    self.id
                )));
            }
        }
        Ok(())
    }
}

/// Side of a binary contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Yes,
    No,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Yes => Side::No,
            Side::No => Side::Yes,
        }
    }
}

/// A tradeable instrument held in a portfolio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    pub id: String,
    pub source: BetSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bid: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ask: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub factor_ids: Vec<String>,
}

impl Contract {
    pub fn new(id: impl Into<String>, source: BetSource, price: f64) -> Self {
        Self {
            id: id.into(),
            source,
            title: None,
            price,
            bid: None,
            ask: None,
            resolution_time: None,
            factor_ids: Vec::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_factors<I, S>(mut self, factors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.factor_ids = factors.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_resolution(mut self, at: DateTime<Utc>) -> Self {
        self.resolution_time = Some(at);
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        ensure_finite(&format!("contract '{}' price", self.id), self.price)?;
        if !(0.0..=1.0).contains(&self.price) {
            return Err(EngineError::invalid(format!(
                "contract '{}' price {} outside [0,1]",
                self.id, self.price
            )));
        }
        Ok(())
    }
}

/// Shares held on one side of a contract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub contract_id: String,
    pub side: Side,
    /// Shares held
    pub size: f64,
    pub cost_per_share: f64,
}

impl Position {
    pub fn new(contract_id: impl Into<String>, side: Side, size: f64, cost_per_share: f64) -> Self {
        Self {
            contract_id: contract_id.into(),
            side,
            size,
            cost_per_share,
        }
    }

    pub fn notional(&self) -> f64 {
        self.size * self.cost_per_share
    }

    pub(crate) fn validate(&self) -> Result<()> {
        ensure_finite(&format!("position '{}' size", self.contract_id), self.size)?;
        ensure_finite(
            &format!("position '{}' costPerShare", self.contract_id),
            self.cost_per_share,
        )?;
        if self.size < 0.0 || self.cost_per_share < 0.0 {
            return Err(EngineError::invalid(format!(
                "position '{}' has negative size or cost",
                self.contract_id
            )));
        }
        Ok(())
    }
}

/// Existing holdings plus the metadata of the contracts they reference
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Portfolio {
    #[serde(default)]
    pub positions: Vec<Position>,
    #[serde(default)]
    pub contracts: Vec<Contract>,
}

impl Portfolio {
    pub fn contract(&self, id: &str) -> Option<&Contract> {
        self.contracts.iter().find(|c| c.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_derived_from_price() {
        let bet = CandidateBet::new("a", BetSource::Kalshi, "A", 0.6, 0.5);
        assert!((bet.edge() - 0.1).abs() < 1e-12);
        assert!((bet.variance_per_dollar() - 0.25).abs() < 1e-12);

        let bet = bet.with_edge(0.03);
        assert!((bet.edge() - 0.03).abs() < 1e-12);
    }

    #[test]
    fn test_factor_key_falls_back_to_id() {
        let bet = CandidateBet::new("solo", BetSource::Sportsbook, "Solo", 0.6, 0.5);
        assert_eq!(bet.factor_key(), "solo");
        let bet = bet.with_factors(["sports", "nfl"]);
        assert_eq!(bet.factor_key(), "sports");
    }

    #[test]
    fn test_candidate_validation() {
        assert!(CandidateBet::new("a", BetSource::Other, "A", 1.2, 0.5)
            .validate()
            .is_err());
        assert!(CandidateBet::new("a", BetSource::Other, "A", 0.5, f64::NAN)
            .validate()
            .is_err());
        // Out-of-range prices are unsizeable, not malformed
        assert!(CandidateBet::new("a", BetSource::Other, "A", 0.5, 1.0)
            .validate()
            .is_ok());

        let mut bet = CandidateBet::new("a", BetSource::Other, "A", 0.5, 0.4);
        bet.variance_per_dollar = Some(-0.1);
        assert!(bet.validate().is_err());
    }

    #[test]
    fn test_candidate_json_uses_camel_case() {
        let json = r#"{
            "id": "kx-1",
            "source": "kalshi",
            "label": "Fed cuts in December",
            "winProb": 0.55,
            "price": 0.48,
            "factorIds": ["fed_policy"],
            "maxSize": 250.0
        }"#;
        let bet: CandidateBet = serde_json::from_str(json).expect("parse");
        assert_eq!(bet.source, BetSource::Kalshi);
        assert_eq!(bet.max_size, Some(250.0));
        assert_eq!(bet.factor_ids, vec!["fed_policy".to_string()]);
        assert!(bet.edge.is_none());
    }

    #[test]
    fn test_position_notional() {
        let pos = Position::new("c1", Side::Yes, 100.0, 0.42);
        assert!((pos.notional() - 42.0).abs() < 1e-9);
        assert!(Position::new("c1", Side::No, -1.0, 0.4).validate().is_err());
    }
}
