//! Polymarket adapter.
//!
//! Uses the Gamma API for market discovery — no auth required for reads.
//! Gamma API: https://gamma-api.polymarket.com

use chrono::{DateTime, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::platforms::MarketSource;
use crate::types::{d, Market, MarketType, Outcome};

const GAMMA_API_URL: &str = "https://gamma-api.polymarket.com";
const DEFAULT_LIMIT: u32 = 100;
const MIN_LIQUIDITY: f64 = 100.0;
const FETCH_TIMEOUT_SECS: u64 = 12;

#[derive(Debug, Deserialize, Clone)]
#[allow(dead_code)]
struct GammaMarket {
    #[serde(default)]
    question: String,
    #[serde(default, rename = "conditionId")]
    condition_id: String,
    #[serde(default)]
    slug: String,
    #[serde(default, rename = "endDate")]
    end_date: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default, rename = "outcomePrices")]
    outcome_prices: Option<String>,
    #[serde(default)]
    outcomes: Option<String>,
    #[serde(default)]
    liquidity: Option<f64>,
    #[serde(default, rename = "liquidityNum")]
    liquidity_num: Option<f64>,
}

pub struct PolymarketClient {
    http: Client,
}

impl PolymarketClient {
    pub fn new() -> Self {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self { http }
    }

    async fn fetch_gamma_markets(&self) -> anyhow::Result<Vec<GammaMarket>> {
        let resp = self
            .http
            .get(format!("{GAMMA_API_URL}/markets"))
            .query(&[
                ("active", "true"),
                ("closed", "false"),
                ("limit", &DEFAULT_LIMIT.to_string()),
            ])
            .send()
            .await?;

        if !resp.status().is_success() {
            anyhow::bail!("Gamma API error {}", resp.status());
        }
        Ok(resp.json().await?)
    }

    /// "[\"0.65\",\"0.35\"]" or "0.65, 0.35" → parsed f64 prices.
    fn parse_prices(s: &str) -> Vec<f64> {
        s.replace(['[', ']', '"', '\\'], "")
            .split(',')
            .filter_map(|p| p.trim().parse::<f64>().ok())
            .collect()
    }

    fn parse_outcome_names(s: &str) -> Vec<String> {
        s.replace(['[', ']', '\\'], "")
            .split(',')
            .map(|p| p.trim().trim_matches('"').to_string())
            .filter(|p| !p.is_empty())
            .collect()
    }

    fn convert_market(gm: &GammaMarket) -> Option<Market> {
        if gm.condition_id.is_empty() || gm.question.is_empty() {
            return None;
        }

        let liquidity = gm.liquidity.or(gm.liquidity_num).unwrap_or(0.0);
        if liquidity < MIN_LIQUIDITY {
            return None;
        }

        let prices = Self::parse_prices(gm.outcome_prices.as_deref().unwrap_or(""));
        let names = gm
            .outcomes
            .as_deref()
            .map(Self::parse_outcome_names)
            .filter(|n| n.len() == prices.len())
            .unwrap_or_else(|| vec!["Yes".to_string(), "No".to_string()]);

        let deadline = gm.end_date.as_deref().and_then(|raw| {
            DateTime::parse_from_rfc3339(raw)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
                .or_else(|| {
                    chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                        .ok()
                        .and_then(|nd| nd.and_hms_opt(23, 59, 59))
                        .map(|ndt| ndt.and_utc())
                })
        });

        let mut outcomes = Vec::new();
        for (name, price) in names.iter().zip(prices.iter()) {
            if *price <= 0.01 || *price >= 0.99 {
                continue;
            }
            outcomes.push(Outcome {
                name: name.clone(),
                odds_decimal: Decimal::ONE / d(*price),
                venue: "polymarket".to_string(),
                liquidity: Some(d(liquidity)),
                observed_at: Utc::now(),
            });
        }
        if outcomes.len() < 2 {
            return None;
        }

        let category = gm.category.clone().unwrap_or_else(|| "other".to_string());
        let market_type = if outcomes.len() == 2
            && outcomes
                .iter()
                .all(|o| o.name.eq_ignore_ascii_case("yes") || o.name.eq_ignore_ascii_case("no"))
        {
            MarketType::Binary
        } else {
            MarketType::Multi
        };

        Some(Market {
            event_id: format!("polymarket_{}", gm.condition_id),
            category,
            event_name: gm.question.clone(),
            market_type,
            outcomes,
            start_time: deadline,
        })
    }
}

impl Default for PolymarketClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl MarketSource for PolymarketClient {
    fn name(&self) -> &str {
        "polymarket"
    }

    async fn fetch(&self) -> Vec<Market> {
        let raw = match self.fetch_gamma_markets().await {
            Ok(m) => m,
            Err(err) => {
                warn!(error = %err, "polymarket fetch failed");
                return Vec::new();
            }
        };
        debug!(count = raw.len(), "polymarket raw markets fetched");

        let markets: Vec<Market> = raw.iter().filter_map(Self::convert_market).collect();
        info!(count = markets.len(), "polymarket markets after filtering");
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
    fn parse_prices_json_array() {
        assert_eq!(PolymarketClient::parse_prices("[\"0.65\",\"0.35\"]"), vec![0.65, 0.35]);
    }

    #[test]
    fn parse_prices_simple_csv() {
        assert_eq!(PolymarketClient::parse_prices("0.72, 0.28"), vec![0.72, 0.28]);
    }

    #[test]
    fn convert_market_rejects_empty_condition_id() {
        let gm = GammaMarket {
            question: "Test?".into(),
            condition_id: String::new(),
            slug: "test".into(),
            end_date: None,
            category: None,
            outcome_prices: Some("[\"0.5\",\"0.5\"]".into()),
            outcomes: None,
            liquidity: Some(1000.0),
            liquidity_num: None,
        };
        assert!(PolymarketClient::convert_market(&gm).is_none());
    }

    #[test]
    fn convert_market_rejects_below_liquidity_floor() {
        let gm = GammaMarket {
            question: "Will X happen?".into(),
            condition_id: "0xabc".into(),
            slug: "x".into(),
            end_date: None,
            category: Some("politics".into()),
            outcome_prices: Some("[\"0.5\",\"0.5\"]".into()),
            outcomes: None,
            liquidity: Some(50.0),
            liquidity_num: None,
        };
        assert!(PolymarketClient::convert_market(&gm).is_none());
    }

    #[test]
    fn convert_market_skips_extreme_prices() {
        let gm = GammaMarket {
            question: "Will X happen?".into(),
            condition_id: "0xabc".into(),
            slug: "x".into(),
            end_date: None,
            category: Some("politics".into()),
            outcome_prices: Some("[\"0.995\",\"0.005\"]".into()),
            outcomes: None,
            liquidity: Some(1000.0),
            liquidity_num: None,
        };
        // Both sides are extreme, so no valid outcomes survive.
        assert!(PolymarketClient::convert_market(&gm).is_none());
    }

    #[test]
    fn convert_market_valid_produces_binary_market() {
        let gm = GammaMarket {
            question: "Will Bitcoin hit $100k?".into(),
            condition_id: "0xabc123".into(),
            slug: "bitcoin-100k".into(),
            end_date: Some("2026-12-31".into()),
            category: Some("crypto".into()),
            outcome_prices: Some("[\"0.72\",\"0.28\"]".into()),
            outcomes: Some("[\"Yes\",\"No\"]".into()),
            liquidity: Some(10000.0),
            liquidity_num: None,
        };
        let market = PolymarketClient::convert_market(&gm).unwrap();
        assert_eq!(market.event_id, "polymarket_0xabc123");
        assert_eq!(market.category, "crypto");
        assert_eq!(market.outcomes.len(), 2);
        assert_eq!(market.market_type, MarketType::Binary);
    }
}
