//! PredictIt adapter.
//!
//! Public, unauthenticated political prediction market. Backed by a
//! 30-second TTL cache that falls back to the last good response on a
//! 429/5xx rather than returning an empty list (§4.5 table).

use reqwest::Client;
use serde::Deserialize;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::platforms::MarketSource;
use crate::types::{d, Market, MarketType, Outcome};
use crate::util::cache::TtlCache;

const PREDICTIT_API_URL: &str = "https://www.predictit.org/api/marketdata/all/";
const FETCH_TIMEOUT_SECS: u64 = 15;
const CACHE_TTL_SECS: u64 = 30;

#[derive(Debug, Deserialize, Clone, Default)]
#[allow(dead_code)]
struct PredictItContract {
    #[serde(default)]
    name: String,
    #[serde(rename = "lastTradePrice", default)]
    last_trade_price: Option<f64>,
    #[serde(rename = "bestBuyYesCost", default)]
    best_buy_yes_cost: Option<f64>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[allow(dead_code)]
struct PredictItMarket {
    #[serde(default)]
    id: i64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    contracts: Vec<PredictItContract>,
}

#[derive(Debug, Deserialize, Default)]
struct PredictItResponse {
    #[serde(default)]
    markets: Vec<PredictItMarket>,
}

pub struct PredictItClient {
    http: Client,
    cache: Mutex<TtlCache<Vec<PredictItMarket>>>,
}

impl PredictItClient {
    pub fn new() -> Self {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self {
            http,
            cache: Mutex::new(TtlCache::new(Duration::from_secs(CACHE_TTL_SECS))),
        }
    }

    async fn fetch_raw(&self) -> Vec<PredictItMarket> {
        if let Some(cached) = self.cache.lock().expect("predictit cache poisoned").get() {
            return cached;
        }

        match self.http.get(PREDICTIT_API_URL).send().await {
            Ok(resp) if resp.status().is_success() => match resp.json::<PredictItResponse>().await {
                Ok(body) => {
                    self.cache.lock().expect("predictit cache poisoned").set(body.markets.clone());
                    body.markets
                }
                Err(err) => {
                    warn!(error = %err, "predictit response parse failed, using stale cache");
                    self.cache.lock().expect("predictit cache poisoned").get_stale().unwrap_or_default()
                }
            },
            Ok(resp) => {
                warn!(status = %resp.status(), "predictit non-2xx, using stale cache");
                self.cache.lock().expect("predictit cache poisoned").get_stale().unwrap_or_default()
            }
            Err(err) => {
                warn!(error = %err, "predictit request failed, using stale cache");
                self.cache.lock().expect("predictit cache poisoned").get_stale().unwrap_or_default()
            }
        }
    }

    /// A single-contract market produces a synthetic Yes/No market; a
    /// multi-contract market produces one Market with one outcome per
    /// contract (§4.5 table).
    fn parse_market(raw: &PredictItMarket) -> Vec<Market> {
        if raw.name.is_empty() || raw.contracts.is_empty() {
            return Vec::new();
        }

        if raw.contracts.len() == 1 {
            let contract = &raw.contracts[0];
            let Some(yes_price) = contract.last_trade_price.or(contract.best_buy_yes_cost) else {
                return Vec::new();
            };
            if yes_price <= 0.01 || yes_price >= 0.99 {
                return Vec::new();
            }
            let no_price = 1.0 - yes_price;

            let yes_odds = (1.0 / yes_price).clamp(1.01, 100.0);
            let no_odds = (1.0 / no_price).clamp(1.01, 100.0);

            return vec![Market {
                event_id: format!("predictit_{}", raw.id),
                category: "politics".to_string(),
                event_name: raw.name.chars().take(200).collect(),
                market_type: MarketType::Binary,
                outcomes: vec![
                    Outcome {
                        name: "Yes".to_string(),
                        odds_decimal: d(yes_odds),
                        venue: "predictit".to_string(),
                        liquidity: None,
                        observed_at: chrono::Utc::now(),
                    },
                    Outcome {
                        name: "No".to_string(),
                        odds_decimal: d(no_odds),
                        venue: "predictit".to_string(),
                        liquidity: None,
                        observed_at: chrono::Utc::now(),
                    },
                ],
                start_time: None,
            }];
        }

        let mut outcomes = Vec::new();
        for contract in &raw.contracts {
            let Some(price) = contract.last_trade_price.or(contract.best_buy_yes_cost) else {
                continue;
            };
            if price <= 0.01 || price >= 0.99 {
                continue;
            }
            let odds = (1.0 / price).clamp(1.01, 100.0);
            outcomes.push(Outcome {
                name: contract.name.chars().take(50).collect(),
                odds_decimal: d(odds),
                venue: "predictit".to_string(),
                liquidity: None,
                observed_at: chrono::Utc::now(),
            });
        }
        if outcomes.len() < 2 {
            return Vec::new();
        }

        vec![Market {
            event_id: format!("predictit_{}", raw.id),
            category: "politics".to_string(),
            event_name: raw.name.chars().take(200).collect(),
            market_type: MarketType::Multi,
            outcomes,
            start_time: None,
        }]
    }
}

impl Default for PredictItClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl MarketSource for PredictItClient {
    fn name(&self) -> &str {
        "predictit"
    }

    async fn fetch(&self) -> Vec<Market> {
        let raw = self.fetch_raw().await;
        debug!(count = raw.len(), "predictit raw markets fetched");

        let markets: Vec<Market> = raw
            .iter()
            .filter(|m| m.status.as_deref().map(|s| s.eq_ignore_ascii_case("open")).unwrap_or(true))
            .flat_map(Self::parse_market)
            .collect();
        info!(count = markets.len(), "predictit markets parsed");
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
    fn single_contract_produces_synthetic_yes_no() {
        let raw = PredictItMarket {
            id: 1,
            name: "Will X win?".into(),
            status: Some("Open".into()),
            contracts: vec![PredictItContract {
                name: "Yes".into(),
                last_trade_price: Some(0.65),
                best_buy_yes_cost: None,
            }],
        };
        let markets = PredictItClient::parse_market(&raw);
        assert_eq!(markets.len(), 1);
        assert_eq!(markets[0].outcomes.len(), 2);
        assert_eq!(markets[0].market_type, MarketType::Binary);
    }

    #[test]
    fn single_contract_skips_extreme_price() {
        let raw = PredictItMarket {
            id: 1,
            name: "Will X win?".into(),
            status: Some("Open".into()),
            contracts: vec![PredictItContract {
                name: "Yes".into(),
                last_trade_price: Some(0.995),
                best_buy_yes_cost: None,
            }],
        };
        assert!(PredictItClient::parse_market(&raw).is_empty());
    }

    #[test]
    fn multi_contract_produces_one_market_with_outcomes_per_contract() {
        let raw = PredictItMarket {
            id: 2,
            name: "Who wins the primary?".into(),
            status: Some("Open".into()),
            contracts: vec![
                PredictItContract { name: "A".into(), last_trade_price: Some(0.3), best_buy_yes_cost: None },
                PredictItContract { name: "B".into(), last_trade_price: Some(0.5), best_buy_yes_cost: None },
                PredictItContract { name: "C".into(), last_trade_price: Some(0.995), best_buy_yes_cost: None },
            ],
        };
        let markets = PredictItClient::parse_market(&raw);
        assert_eq!(markets.len(), 1);
        assert_eq!(markets[0].outcomes.len(), 2);
        assert_eq!(markets[0].market_type, MarketType::Multi);
    }
}
