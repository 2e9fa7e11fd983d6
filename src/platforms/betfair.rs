//! Betfair Exchange adapter (optional; §4.5 table).
//!
//! Read-only event → market-catalogue → market-book pipeline over the
//! Betfair Exchange JSON-RPC API. Returns `[]` without credentials,
//! matching the source system's behavior of never synthesizing mock
//! markets into real fetch results.

use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::platforms::MarketSource;
use crate::types::{d, Market, MarketType, Outcome};

const BETTING_URL: &str = "https://api.betfair.com/exchange/betting/json-rpc/v1";
const DEFAULT_COMMISSION_RATE: f64 = 5.0;
const FETCH_TIMEOUT_SECS: u64 = 12;

#[derive(Debug, Deserialize, Default)]
struct CatalogueEvent {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize, Default)]
struct Runner {
    #[serde(default, rename = "selectionId")]
    selection_id: i64,
    #[serde(default, rename = "runnerName")]
    runner_name: String,
}

#[derive(Debug, Deserialize, Default)]
struct MarketCatalogue {
    #[serde(default, rename = "marketId")]
    market_id: String,
    #[serde(default, rename = "marketName")]
    market_name: String,
    #[serde(default)]
    event: CatalogueEvent,
    #[serde(default)]
    runners: Vec<Runner>,
}

#[derive(Debug, Deserialize, Default)]
struct PriceSize {
    #[serde(default)]
    price: f64,
}

#[derive(Debug, Deserialize, Default)]
struct ExchangePrices {
    #[serde(default, rename = "availableToBack")]
    available_to_back: Vec<PriceSize>,
}

#[derive(Debug, Deserialize, Default)]
struct BookRunner {
    #[serde(default, rename = "selectionId")]
    selection_id: i64,
    #[serde(default)]
    ex: ExchangePrices,
}

#[derive(Debug, Deserialize, Default)]
struct MarketBook {
    #[serde(default, rename = "marketId")]
    market_id: String,
    #[serde(default)]
    runners: Vec<BookRunner>,
}

pub struct BetfairClient {
    http: Client,
    api_key: Option<String>,
}

impl BetfairClient {
    pub fn new(api_key: Option<String>) -> Self {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self { http, api_key }
    }

    async fn list_market_catalogue(&self, key: &str) -> anyhow::Result<Vec<MarketCatalogue>> {
        let resp = self
            .http
            .post(BETTING_URL)
            .header("X-Application", key)
            .json(&serde_json::json!({
                "jsonrpc": "2.0",
                "method": "SportsAPING/v1.0/listMarketCatalogue",
                "params": {
                    "filter": {},
                    "maxResults": 50,
                    "marketProjection": ["RUNNER_METADATA", "EVENT"]
                },
                "id": 1
            }))
            .send()
            .await?;
        if !resp.status().is_success() {
            anyhow::bail!("Betfair catalogue error {}", resp.status());
        }
        #[derive(Deserialize)]
        struct RpcResult {
            result: Vec<MarketCatalogue>,
        }
        Ok(resp.json::<RpcResult>().await?.result)
    }

    async fn list_market_book(&self, key: &str, market_ids: &[String]) -> anyhow::Result<Vec<MarketBook>> {
        let resp = self
            .http
            .post(BETTING_URL)
            .header("X-Application", key)
            .json(&serde_json::json!({
                "jsonrpc": "2.0",
                "method": "SportsAPING/v1.0/listMarketBook",
                "params": {
                    "marketIds": market_ids,
                    "priceProjection": {"priceData": ["EX_BEST_OFFERS"]}
                },
                "id": 2
            }))
            .send()
            .await?;
        if !resp.status().is_success() {
            anyhow::bail!("Betfair book error {}", resp.status());
        }
        #[derive(Deserialize)]
        struct RpcResult {
            result: Vec<MarketBook>,
        }
        Ok(resp.json::<RpcResult>().await?.result)
    }

    fn parse_market(cat: &MarketCatalogue, book: Option<&MarketBook>) -> Option<Market> {
        if cat.runners.len() < 2 {
            return None;
        }
        let event_name = if !cat.event.name.is_empty() {
            cat.event.name.clone()
        } else {
            cat.market_name.clone()
        };

        let outcomes: Vec<Outcome> = cat
            .runners
            .iter()
            .map(|runner| {
                let odds = book
                    .and_then(|b| b.runners.iter().find(|br| br.selection_id == runner.selection_id))
                    .and_then(|br| br.ex.available_to_back.first())
                    .map(|ps| ps.price)
                    .unwrap_or(2.0);
                Outcome {
                    name: if runner.runner_name.is_empty() {
                        format!("Selection {}", runner.selection_id)
                    } else {
                        runner.runner_name.clone()
                    },
                    odds_decimal: d(odds),
                    venue: "betfair".to_string(),
                    liquidity: None,
                    observed_at: chrono::Utc::now(),
                }
            })
            .collect();

        Some(Market {
            event_id: format!("betfair_{}", cat.market_id),
            category: "sports".to_string(),
            event_name,
            market_type: MarketType::Moneyline,
            outcomes,
            start_time: None,
        })
    }

    /// Commission applied on net winnings, not stake (`get_venue_fees`
    /// carries the canonical figure consumed by the detectors; this
    /// constant documents where that figure comes from).
    pub fn commission_rate() -> Decimal {
        d(DEFAULT_COMMISSION_RATE)
    }
}

#[async_trait::async_trait]
impl MarketSource for BetfairClient {
    fn name(&self) -> &str {
        "betfair"
    }

    async fn fetch(&self) -> Vec<Market> {
        let Some(key) = &self.api_key else {
            return Vec::new();
        };

        let catalogues = match self.list_market_catalogue(key).await {
            Ok(c) => c,
            Err(err) => {
                warn!(error = %err, "betfair catalogue fetch failed");
                return Vec::new();
            }
        };
        if catalogues.is_empty() {
            return Vec::new();
        }

        let market_ids: Vec<String> = catalogues.iter().map(|c| c.market_id.clone()).collect();
        let books = match self.list_market_book(key, &market_ids).await {
            Ok(b) => b,
            Err(err) => {
                warn!(error = %err, "betfair book fetch failed");
                Vec::new()
            }
        };

        debug!(count = catalogues.len(), "betfair catalogues fetched");

        let markets: Vec<Market> = catalogues
            .iter()
            .filter_map(|cat| {
                let book = books.iter().find(|b| b.market_id == cat.market_id);
                Self::parse_market(cat, book)
            })
            .collect();
        info!(count = markets.len(), "betfair markets parsed");
        markets
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fetch_without_credentials_returns_empty() {
        let client = BetfairClient::new(None);
        assert!(client.fetch().await.is_empty());
    }

    #[test]
    fn parse_market_requires_at_least_two_runners() {
        let cat = MarketCatalogue {
            market_id: "1.23".into(),
            market_name: "Match Odds".into(),
            event: CatalogueEvent { name: "A vs B".into() },
            runners: vec![Runner { selection_id: 1, runner_name: "A".into() }],
        };
        assert!(BetfairClient::parse_market(&cat, None).is_none());
    }

    #[test]
    fn parse_market_uses_back_price_from_book() {
        let cat = MarketCatalogue {
            market_id: "1.23".into(),
            market_name: "Match Odds".into(),
            event: CatalogueEvent { name: "A vs B".into() },
            runners: vec![
                Runner { selection_id: 1, runner_name: "A".into() },
                Runner { selection_id: 2, runner_name: "B".into() },
            ],
        };
        let book = MarketBook {
            market_id: "1.23".into(),
            runners: vec![
                BookRunner {
                    selection_id: 1,
                    ex: ExchangePrices { available_to_back: vec![PriceSize { price: 2.5 }] },
                },
                BookRunner {
                    selection_id: 2,
                    ex: ExchangePrices { available_to_back: vec![PriceSize { price: 1.6 }] },
                },
            ],
        };
        let market = BetfairClient::parse_market(&cat, Some(&book)).unwrap();
        assert_eq!(market.outcomes[0].odds_decimal, d(2.5));
        assert_eq!(market.outcomes[1].odds_decimal, d(1.6));
    }
}
