//! Manifold Markets adapter.
//!
//! Play-money prediction market; used as a probability anchor for EV.
//! API docs: https://docs.manifold.markets/api

use chrono::{DateTime, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::platforms::MarketSource;
use crate::types::{d, Market, MarketType, Outcome};

const MANIFOLD_BASE_URL: &str = "https://api.manifold.markets/v0";
const FETCH_TIMEOUT_SECS: u64 = 10;
const FETCH_LIMIT: u32 = 100;

#[derive(Debug, Deserialize, Clone)]
#[allow(dead_code)]
struct ManifoldAnswer {
    #[serde(default)]
    text: String,
    #[serde(default)]
    probability: Option<f64>,
}

#[derive(Debug, Deserialize, Clone)]
#[allow(dead_code)]
struct ManifoldMarket {
    #[serde(default)]
    id: String,
    #[serde(default)]
    question: String,
    #[serde(default, rename = "outcomeType")]
    outcome_type: String,
    #[serde(default)]
    probability: Option<f64>,
    #[serde(default)]
    answers: Option<Vec<ManifoldAnswer>>,
    #[serde(default, rename = "totalLiquidity")]
    total_liquidity: Option<f64>,
    #[serde(default, rename = "groupSlugs")]
    group_slugs: Option<Vec<String>>,
    #[serde(default, rename = "closeTime")]
    close_time: Option<i64>,
    #[serde(default, rename = "isResolved")]
    is_resolved: bool,
}

pub struct ManifoldClient {
    http: Client,
    api_key: Option<String>,
}

impl ManifoldClient {
    pub fn new(api_key: Option<String>) -> Self {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self { http, api_key }
    }

    async fn fetch_raw(&self) -> anyhow::Result<Vec<ManifoldMarket>> {
        let mut req = self
            .http
            .get(format!("{MANIFOLD_BASE_URL}/markets"))
            .query(&[
                ("limit", FETCH_LIMIT.to_string()),
                ("sort", "last-bet-time".to_string()),
                ("order", "desc".to_string()),
            ]);
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Key {key}"));
        }

        let resp = req.send().await?;
        if !resp.status().is_success() {
            anyhow::bail!("Manifold API error {}", resp.status());
        }
        Ok(resp.json().await?)
    }

    fn parse_market(raw: &ManifoldMarket) -> Option<Market> {
        if raw.id.is_empty() || raw.question.is_empty() {
            return None;
        }

        let outcomes = match raw.outcome_type.as_str() {
            "BINARY" => {
                let prob = raw.probability.unwrap_or(0.5).clamp(0.01, 0.99);
                vec![
                    Outcome {
                        name: "Yes".to_string(),
                        odds_decimal: Decimal::ONE / d(prob),
                        venue: "manifold".to_string(),
                        liquidity: raw.total_liquidity.map(d),
                        observed_at: Utc::now(),
                    },
                    Outcome {
                        name: "No".to_string(),
                        odds_decimal: Decimal::ONE / d(1.0 - prob),
                        venue: "manifold".to_string(),
                        liquidity: raw.total_liquidity.map(d),
                        observed_at: Utc::now(),
                    },
                ]
            }
            "MULTIPLE_CHOICE" => {
                let answers = raw.answers.as_ref()?;
                let mut outs = Vec::new();
                for ans in answers {
                    let Some(prob) = ans.probability else { continue };
                    if prob <= 0.0 || prob >= 1.0 {
                        continue;
                    }
                    outs.push(Outcome {
                        name: ans.text.clone(),
                        odds_decimal: Decimal::ONE / d(prob),
                        venue: "manifold".to_string(),
                        liquidity: None,
                        observed_at: Utc::now(),
                    });
                }
                if outs.len() < 2 {
                    return None;
                }
                outs
            }
            _ => return None,
        };

        let category = raw
            .group_slugs
            .as_ref()
            .and_then(|g| g.first().cloned())
            .unwrap_or_else(|| "prediction".to_string());

        let start_time = raw
            .close_time
            .and_then(|ms| DateTime::from_timestamp(ms / 1000, 0));

        let market_type = if raw.outcome_type == "BINARY" {
            MarketType::Binary
        } else {
            MarketType::Multi
        };

        Some(Market {
            event_id: format!("manifold_{}", raw.id),
            category,
            event_name: raw.question.clone(),
            market_type,
            outcomes,
            start_time,
        })
    }
}

#[async_trait::async_trait]
impl MarketSource for ManifoldClient {
    fn name(&self) -> &str {
        "manifold"
    }

    async fn fetch(&self) -> Vec<Market> {
        let raw = match self.fetch_raw().await {
            Ok(m) => m,
            Err(err) => {
                warn!(error = %err, "manifold fetch failed");
                return Vec::new();
            }
        };
        debug!(count = raw.len(), "manifold raw markets fetched");

        let markets: Vec<Market> = raw
            .iter()
            .filter(|m| !m.is_resolved)
            .filter_map(Self::parse_market)
            .collect();
        info!(count = markets.len(), "manifold markets parsed");
        markets
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_binary_market_clamps_probability() {
        let raw = ManifoldMarket {
            id: "abc".into(),
            question: "Will X happen?".into(),
            outcome_type: "BINARY".into(),
            probability: Some(0.995),
            answers: None,
            total_liquidity: Some(500.0),
            group_slugs: Some(vec!["politics".into()]),
            close_time: None,
            is_resolved: false,
        };
        let market = ManifoldClient::parse_market(&raw).unwrap();
        assert_eq!(market.outcomes.len(), 2);
        assert_eq!(market.category, "politics");
        // clamp to 0.99 -> odds = 1/0.99
        assert!((market.outcomes[0].odds_decimal - (Decimal::ONE / d(0.99))).abs() < Decimal::new(1, 6));
    }

    #[test]
    fn parse_multiple_choice_skips_extreme_answers() {
        let raw = ManifoldMarket {
            id: "mc1".into(),
            question: "Who wins?".into(),
            outcome_type: "MULTIPLE_CHOICE".into(),
            probability: None,
            answers: Some(vec![
                ManifoldAnswer { text: "A".into(), probability: Some(0.4) },
                ManifoldAnswer { text: "B".into(), probability: Some(0.0) },
                ManifoldAnswer { text: "C".into(), probability: Some(0.3) },
            ]),
            total_liquidity: None,
            group_slugs: None,
            close_time: None,
            is_resolved: false,
        };
        let market = ManifoldClient::parse_market(&raw).unwrap();
        assert_eq!(market.outcomes.len(), 2);
        assert_eq!(market.category, "prediction");
    }

    #[test]
    fn parse_rejects_unknown_outcome_type() {
        let raw = ManifoldMarket {
            id: "x".into(),
            question: "Q".into(),
            outcome_type: "FREE_RESPONSE".into(),
            probability: None,
            answers: None,
            total_liquidity: None,
            group_slugs: None,
            close_time: None,
            is_resolved: false,
        };
        assert!(ManifoldClient::parse_market(&raw).is_none());
    }
}
