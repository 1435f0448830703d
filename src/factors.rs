//! Factor Classifier
//!
//! Maps free text (contract titles, event tickers, tags) onto a fixed
//! taxonomy of thematic factors used for correlation grouping and
//! concentration limits. Matching is case-insensitive keyword membership:
//!
//! - single-word keywords match whole tokens (`fed` matches "Fed cuts" but
//!   not "Federer")
//! - multi-word keywords match a run of tokens (`rate cut`)
//! - a trailing `*` matches token prefixes (`kxbtc*` matches `KXBTCD-25DEC`)
//!
//! Text that matches nothing, and empty text, classifies as `["other"]`.

use serde::{Deserialize, Serialize};

/// Catch-all factor for contracts that match no theme.
pub const OTHER_FACTOR: &str = "other";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl FactorDefinition {
    fn builtin(id: &str, name: &str, keywords: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }
}

fn builtin_taxonomy() -> Vec<FactorDefinition> {
    vec![
        FactorDefinition::builtin(
            "sports",
            "Sports",
            &[
                "nfl", "nba", "mlb", "nhl", "mls", "ncaa", "wnba", "soccer", "football",
                "basketball", "baseball", "hockey", "tennis", "golf", "ufc", "boxing",
                "playoffs", "super bowl", "world cup", "world series", "stanley cup",
                "premier league", "champions league", "kxnfl*", "kxnba*", "kxmlb*", "kxnhl*",
            ],
        ),
        FactorDefinition::builtin(
            "fed_policy",
            "Fed Policy",
            &[
                "fed", "fomc", "powell", "federal reserve", "interest rate", "interest rates",
                "rate cut", "rate cuts", "rate hike", "rate hikes", "fed funds", "kxfed*",
            ],
        ),
        FactorDefinition::builtin(
            "crypto",
            "Crypto",
            &[
                "bitcoin", "btc", "ethereum", "eth", "solana", "crypto", "cryptocurrency",
                "dogecoin", "doge", "xrp", "stablecoin", "kxbtc*", "kxeth*",
            ],
        ),
        FactorDefinition::builtin(
            "elections",
            "Elections",
            &[
                "election", "elections", "president", "presidential", "senate", "congress",
                "governor", "primary", "nominee", "ballot", "democrat", "democrats",
                "republican", "republicans", "gop", "electoral", "kxpres*",
            ],
        ),
        FactorDefinition::builtin(
            "macro",
            "Macro Data",
            &[
                "inflation", "cpi", "gdp", "unemployment", "payrolls", "jobs report",
                "recession", "pce", "kxcpi*", "kxgdp*",
            ],
        ),
        FactorDefinition::builtin(
            "geopolitics",
            "Geopolitics",
            &[
                "war", "ceasefire", "nato", "ukraine", "russia", "china", "taiwan", "israel",
                "iran", "sanctions", "tariff", "tariffs",
            ],
        ),
        FactorDefinition::builtin(
            "weather",
            "Weather",
            &[
                "weather", "hurricane", "temperature", "snowfall", "rainfall", "heat",
                "tornado", "kxhigh*",
            ],
        ),
        FactorDefinition::builtin(
            "entertainment",
            "Entertainment",
            &[
                "oscars", "oscar", "grammy", "grammys", "emmy", "emmys", "box office",
                "billboard", "album", "movie", "netflix",
            ],
        ),
        FactorDefinition::builtin(
            "tech",
            "Tech",
            &[
                "ai", "openai", "apple", "google", "tesla", "nvidia", "spacex", "microsoft",
                "iphone", "chatgpt",
            ],
        ),
    ]
}

/// Keyword classifier over a factor taxonomy
#[derive(Debug, Clone)]
pub struct FactorClassifier {
    factors: Vec<FactorDefinition>,
}

impl Default for FactorClassifier {
    fn default() -> Self {
        Self::new(builtin_taxonomy())
    }
}

impl FactorClassifier {
    pub fn new(factors: Vec<FactorDefinition>) -> Self {
        let factors = factors
            .into_iter()
            .map(|mut f| {
                f.keywords = f.keywords.iter().map(|k| k.trim().to_lowercase()).collect();
                f
            })
            .collect();
        Self { factors }
    }

    /// Built-in taxonomy extended with `extra`: keywords for an existing id
    /// are appended, unknown ids become new factors.
    pub fn with_extra(extra: &[FactorDefinition]) -> Self {
        let mut factors = builtin_taxonomy();
        for def in extra {
            match factors.iter_mut().find(|f| f.id == def.id) {
                Some(existing) => existing.keywords.extend(def.keywords.iter().cloned()),
                None => factors.push(def.clone()),
            }
        }
        Self::new(factors)
    }

    /// Factor ids matched by `text`, in taxonomy order.
    pub fn classify(&self, text: &str) -> Vec<String> {
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return vec![OTHER_FACTOR.to_string()];
        }

        let matched: Vec<String> = self
            .factors
            .iter()
            .filter(|f| f.keywords.iter().any(|k| keyword_matches(k, &tokens)))
            .map(|f| f.id.clone())
            .collect();

        if matched.is_empty() {
            vec![OTHER_FACTOR.to_string()]
        } else {
            matched
        }
    }

    /// Classifies several text fragments (title, ticker, tags) as one text.
    pub fn classify_parts(&self, parts: &[&str]) -> Vec<String> {
        self.classify(&parts.join(" "))
    }

    /// Display name for a factor id; unknown ids are returned unchanged.
    pub fn factor_name(&self, id: &str) -> String {
        if id == OTHER_FACTOR {
            return "Other".to_string();
        }
        self.factors
            .iter()
            .find(|f| f.id == id)
            .map(|f| f.name.clone())
            .unwrap_or_else(|| id.to_string())
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

fn keyword_matches(keyword: &str, tokens: &[String]) -> bool {
    if keyword.is_empty() {
        return false;
    }
    if let Some(prefix) = keyword.strip_suffix('*') {
        return !prefix.is_empty() && tokens.iter().any(|t| t.starts_with(prefix));
    }

    let words: Vec<&str> = keyword.split_whitespace().collect();
    match words.len() {
        0 => false,
        1 => tokens.iter().any(|t| t == words[0]),
        n => tokens
            .windows(n)
            .any(|w| w.iter().zip(&words).all(|(t, k)| t == k)),
    }
}
