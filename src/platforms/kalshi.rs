//! Kalshi adapter.
//!
//! Kalshi is a CFTC-regulated prediction market. Public reads are
//! anonymous; an optional RSA-signed auth header is supported for
//! endpoints that need it, but the markets listing used here does not.

use chrono::{DateTime, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::platforms::MarketSource;
use crate::types::{d, Market, MarketType, Outcome};

const KALSHI_BASE_URL: &str = "https://api.elections.kalshi.com/trade-api/v2";
const FETCH_TIMEOUT_SECS: u64 = 12;
const FETCH_LIMIT: u32 = 200;

#[derive(Debug, Deserialize, Clone, Default)]
#[allow(dead_code)]
struct KalshiMarket {
    #[serde(default)]
    ticker: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    yes_bid: Option<i64>,
    #[serde(default)]
    yes_ask: Option<i64>,
    #[serde(default)]
    no_bid: Option<i64>,
    #[serde(default)]
    no_ask: Option<i64>,
    #[serde(default)]
    volume: Option<f64>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    close_time: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct KalshiMarketsResponse {
    #[serde(default)]
    markets: Vec<KalshiMarket>,
}

/// Kalshi quotes a `key_id` + RSA-signed headers for authenticated
/// endpoints; the public markets listing does not require them.
pub struct KalshiClient {
    http: Client,
}

impl KalshiClient {
    pub fn new() -> Self {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self { http }
    }

    async fn fetch_raw(&self) -> anyhow::Result<Vec<KalshiMarket>> {
        let resp = self
            .http
            .get(format!("{KALSHI_BASE_URL}/markets"))
            .query(&[("limit", FETCH_LIMIT.to_string()), ("status", "open".to_string())])
            .send()
            .await?;
        if !resp.status().is_success() {
            anyhow::bail!("Kalshi API error {}", resp.status());
        }
        Ok(resp.json::<KalshiMarketsResponse>().await?.markets)
    }

    fn parse_market(raw: &KalshiMarket) -> Option<Market> {
        if raw.ticker.is_empty() || raw.title.is_empty() {
            return None;
        }

        let yes_bid = raw.yes_bid.unwrap_or(0) as f64;
        let yes_ask = raw.yes_ask.unwrap_or(100) as f64;
        let no_bid = raw.no_bid.unwrap_or(0) as f64;
        let no_ask = raw.no_ask.unwrap_or(100) as f64;

        let yes_mid = ((yes_bid + yes_ask) / 2.0 / 100.0).clamp(0.02, 0.98);
        let no_mid = ((no_bid + no_ask) / 2.0 / 100.0).clamp(0.02, 0.98);

        let liquidity = raw.volume.map(d);
        let start_time = raw
            .close_time
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|dt| dt.with_timezone(&Utc));

        let category = raw.category.clone().filter(|c| !c.is_empty()).unwrap_or_else(|| "prediction".to_string());

        Some(Market {
            event_id: format!("kalshi_{}", raw.ticker),
            category,
            event_name: raw.title.chars().take(200).collect(),
            market_type: MarketType::Binary,
            outcomes: vec![
                Outcome {
                    name: "Yes".to_string(),
                    odds_decimal: Decimal::ONE / d(yes_mid),
                    venue: "kalshi".to_string(),
                    liquidity,
                    observed_at: Utc::now(),
                },
                Outcome {
                    name: "No".to_string(),
                    odds_decimal: Decimal::ONE / d(no_mid),
                    venue: "kalshi".to_string(),
                    liquidity,
                    observed_at: Utc::now(),
                },
            ],
            start_time,
        })
    }
}

impl Default for KalshiClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl MarketSource for KalshiClient {
    fn name(&self) -> &str {
        "kalshi"
    }

    async fn fetch(&self) -> Vec<Market> {
        let raw = match self.fetch_raw().await {
            Ok(m) => m,
            Err(err) => {
                warn!(error = %err, "kalshi fetch failed");
                return Vec::new();
            }
        };
        debug!(count = raw.len(), "kalshi raw markets fetched");

        let markets: Vec<Market> = raw.iter().filter_map(Self::parse_market).collect();
        info!(count = markets.len(), "kalshi markets parsed");
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
    fn parse_market_mid_price_and_clamp() {
        let raw = KalshiMarket {
            ticker: "PRES-24".into(),
            title: "Will X win the presidency?".into(),
            yes_bid: Some(58),
            yes_ask: Some(62),
            no_bid: Some(38),
            no_ask: Some(42),
            volume: Some(1000.0),
            category: Some("politics".into()),
            close_time: None,
        };
        let market = KalshiClient::parse_market(&raw).unwrap();
        assert_eq!(market.event_id, "kalshi_PRES-24");
        assert_eq!(market.outcomes.len(), 2);
        // yes_mid = 0.60 -> odds = 1/0.60
        assert!((market.outcomes[0].odds_decimal - (Decimal::ONE / d(0.60))).abs() < Decimal::new(1, 4));
    }

    #[test]
    fn parse_market_clamps_extreme_prices() {
        let raw = KalshiMarket {
            ticker: "EXT-1".into(),
            title: "Extreme".into(),
            yes_bid: Some(0),
            yes_ask: Some(0),
            no_bid: Some(100),
            no_ask: Some(100),
            volume: None,
            category: None,
            close_time: None,
        };
        let market = KalshiClient::parse_market(&raw).unwrap();
        // yes_mid would be 0.0, clamped to 0.02
        assert!((market.outcomes[0].odds_decimal - (Decimal::ONE / d(0.02))).abs() < Decimal::new(1, 4));
        assert_eq!(market.category, "prediction");
    }

    #[test]
    fn parse_market_rejects_missing_fields() {
        let raw = KalshiMarket::default();
        assert!(KalshiClient::parse_market(&raw).is_none());
    }
}
