//! Sportsbook odds aggregator adapter (§4.5 table).
//!
//! A single HTTP source (modeled on the-odds-api.com's per-sport odds
//! endpoint) fans out to many bookmakers in one response. Per §4.5, this
//! adapter emits one `Market` per (event x bookmaker) pair — cross-venue
//! matching for the same real-world event happens upstream in the
//! Matcher, not here.

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::platforms::canon::normalize_team_name;
use crate::platforms::MarketSource;
use crate::types::{d, Market, MarketType, Outcome};

const ODDS_API_BASE_URL: &str = "https://api.the-odds-api.com/v4/sports";
const FETCH_TIMEOUT_SECS: u64 = 12;
const DEFAULT_REGIONS: &str = "us";
const DEFAULT_MARKETS: &str = "h2h";

/// One sport key fetched per call; the source system iterates a fixed
/// list of active sports and merges the results.
const TRACKED_SPORTS: &[&str] = &[
    "basketball_nba",
    "americanfootball_nfl",
    "baseball_mlb",
    "icehockey_nhl",
];

#[derive(Debug, Deserialize, Clone)]
#[allow(dead_code)]
struct OddsOutcome {
    #[serde(default)]
    name: String,
    #[serde(default)]
    price: f64,
}

#[derive(Debug, Deserialize, Clone)]
#[allow(dead_code)]
struct OddsMarket {
    #[serde(default)]
    key: String,
    #[serde(default)]
    outcomes: Vec<OddsOutcome>,
}

#[derive(Debug, Deserialize, Clone)]
#[allow(dead_code)]
struct Bookmaker {
    #[serde(default)]
    key: String,
    #[serde(default)]
    markets: Vec<OddsMarket>,
}

#[derive(Debug, Deserialize, Clone)]
#[allow(dead_code)]
struct OddsEvent {
    #[serde(default)]
    id: String,
    #[serde(default)]
    sport_key: String,
    #[serde(default)]
    home_team: String,
    #[serde(default)]
    away_team: String,
    #[serde(default)]
    commence_time: Option<String>,
    #[serde(default)]
    bookmakers: Vec<Bookmaker>,
}

pub struct SportsbooksClient {
    http: Client,
    api_key: String,
}

impl SportsbooksClient {
    pub fn new(api_key: String) -> Self {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self { http, api_key }
    }

    async fn fetch_sport(&self, sport: &str) -> anyhow::Result<Vec<OddsEvent>> {
        let resp = self
            .http
            .get(format!("{ODDS_API_BASE_URL}/{sport}/odds"))
            .query(&[
                ("apiKey", self.api_key.as_str()),
                ("regions", DEFAULT_REGIONS),
                ("markets", DEFAULT_MARKETS),
                ("oddsFormat", "decimal"),
            ])
            .send()
            .await?;
        if !resp.status().is_success() {
            anyhow::bail!("odds aggregator error {} for {sport}", resp.status());
        }
        Ok(resp.json().await?)
    }

    /// One `Market` per (event, bookmaker): every bookmaker's h2h quote
    /// for a game is a distinct venue-scoped market, matched against its
    /// siblings later by the cross-venue Matcher.
    fn convert_event(event: &OddsEvent) -> Vec<Market> {
        if event.id.is_empty() || event.home_team.is_empty() || event.away_team.is_empty() {
            return Vec::new();
        }

        let event_name = format!(
            "{} vs {}",
            normalize_team_name(&event.away_team),
            normalize_team_name(&event.home_team)
        );
        let start_time = event
            .commence_time
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|dt| dt.with_timezone(&Utc));

        event
            .bookmakers
            .iter()
            .filter_map(|bk| {
                let h2h = bk.markets.iter().find(|m| m.key == "h2h")?;
                let outcomes: Vec<Outcome> = h2h
                    .outcomes
                    .iter()
                    .filter(|o| o.price > 1.0)
                    .map(|o| Outcome {
                        name: normalize_team_name(&o.name),
                        odds_decimal: d(o.price),
                        venue: bk.key.clone(),
                        liquidity: None,
                        observed_at: Utc::now(),
                    })
                    .collect();
                if outcomes.len() < 2 {
                    return None;
                }
                Some(Market {
                    event_id: format!("{}_{}", event.sport_key, event.id),
                    category: event.sport_key.clone(),
                    event_name: event_name.clone(),
                    market_type: MarketType::Moneyline,
                    outcomes,
                    start_time,
                })
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl MarketSource for SportsbooksClient {
    fn name(&self) -> &str {
        "sportsbooks"
    }

    async fn fetch(&self) -> Vec<Market> {
        let mut markets = Vec::new();
        for sport in TRACKED_SPORTS {
            match self.fetch_sport(sport).await {
                Ok(events) => {
                    debug!(sport, count = events.len(), "sportsbooks raw events fetched");
                    markets.extend(events.iter().flat_map(Self::convert_event));
                }
                Err(err) => {
                    warn!(sport, error = %err, "sportsbooks fetch failed for sport");
                }
            }
        }
        info!(count = markets.len(), "sportsbooks markets parsed");
        markets
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event() -> OddsEvent {
        OddsEvent {
            id: "abc123".into(),
            sport_key: "basketball_nba".into(),
            home_team: "Boston Celtics".into(),
            away_team: "Los Angeles Lakers".into(),
            commence_time: Some("2026-01-15T00:00:00Z".into()),
            bookmakers: vec![
                Bookmaker {
                    key: "draftkings".into(),
                    markets: vec![OddsMarket {
                        key: "h2h".into(),
                        outcomes: vec![
                            OddsOutcome { name: "Los Angeles Lakers".into(), price: 2.10 },
                            OddsOutcome { name: "Boston Celtics".into(), price: 1.80 },
                        ],
                    }],
                },
                Bookmaker {
                    key: "fanduel".into(),
                    markets: vec![OddsMarket {
                        key: "h2h".into(),
                        outcomes: vec![
                            OddsOutcome { name: "Los Angeles Lakers".into(), price: 2.05 },
                            OddsOutcome { name: "Boston Celtics".into(), price: 1.95 },
                        ],
                    }],
                },
            ],
        }
    }

    #[test]
    fn convert_event_emits_one_market_per_bookmaker() {
        let markets = SportsbooksClient::convert_event(&sample_event());
        assert_eq!(markets.len(), 2);
        assert!(markets.iter().any(|m| m.outcomes[0].venue == "draftkings" || m.outcomes[1].venue == "draftkings"));
        assert!(markets.iter().all(|m| m.event_id == "basketball_nba_abc123"));
    }

    #[test]
    fn convert_event_skips_odds_at_or_below_one() {
        let mut event = sample_event();
        event.bookmakers[0].markets[0].outcomes[0].price = 1.0;
        let markets = SportsbooksClient::convert_event(&event);
        // draftkings now has only one valid outcome and is dropped; fanduel survives.
        assert_eq!(markets.len(), 1);
        assert!(markets[0].outcomes.iter().all(|o| o.venue == "fanduel"));
    }

    #[test]
    fn convert_event_rejects_missing_ids() {
        let mut event = sample_event();
        event.id = String::new();
        assert!(SportsbooksClient::convert_event(&event).is_empty());
    }
}
