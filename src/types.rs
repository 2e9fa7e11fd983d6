//! Core data model: the canonical shapes that flow through the scan
//! pipeline — `Outcome` and `Market` produced by adapters, `BetInstruction`
//! and `Opportunity` produced by the detectors, and `ScanResult` published
//! once per cycle.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Convert an `f64` venue price/odds into a `Decimal`, defaulting to zero
/// on the rare non-finite input rather than propagating a parse error
/// through every adapter call site.
pub fn d(val: f64) -> Decimal {
    Decimal::from_f64_retain(val).unwrap_or(Decimal::ZERO)
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// A single priced side of a market, as quoted by exactly one venue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome {
    pub name: String,
    pub odds_decimal: Decimal,
    pub venue: String,
    pub liquidity: Option<Decimal>,
    pub observed_at: DateTime<Utc>,
}

impl Outcome {
    pub fn new(name: impl Into<String>, odds_decimal: Decimal, venue: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            odds_decimal,
            venue: venue.into(),
            liquidity: None,
            observed_at: Utc::now(),
        }
    }

    pub fn implied_probability(&self) -> Decimal {
        Decimal::ONE / self.odds_decimal
    }

    #[cfg(test)]
    pub fn sample(name: &str, odds: Decimal, venue: &str) -> Self {
        Self::new(name, odds, venue)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {} ({})", self.name, self.odds_decimal, self.venue)
    }
}

// ---------------------------------------------------------------------------
// Market
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketType {
    Moneyline,
    Spread,
    Total,
    Prop,
    Binary,
    Multi,
}

impl fmt::Display for MarketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Moneyline => "moneyline",
            Self::Spread => "spread",
            Self::Total => "total",
            Self::Prop => "prop",
            Self::Binary => "binary",
            Self::Multi => "multi",
        };
        write!(f, "{s}")
    }
}

/// A priced event as produced by a single adapter, or the union of several
/// adapters' markets once the Matcher has grouped them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Market {
    pub event_id: String,
    pub category: String,
    pub event_name: String,
    pub market_type: MarketType,
    pub outcomes: Vec<Outcome>,
    pub start_time: Option<DateTime<Utc>>,
}

impl Market {
    pub fn venues(&self) -> std::collections::HashSet<&str> {
        self.outcomes.iter().map(|o| o.venue.as_str()).collect()
    }

    pub fn is_binary(&self) -> bool {
        let names: std::collections::HashSet<String> = self
            .outcomes
            .iter()
            .map(|o| o.name.to_lowercase())
            .collect();
        !names.is_empty() && names.iter().all(|n| n == "yes" || n == "no")
    }

    #[cfg(test)]
    pub fn sample(event_id: &str, venue: &str, category: &str, event_name: &str) -> Self {
        Self {
            event_id: event_id.to_string(),
            category: category.to_string(),
            event_name: event_name.to_string(),
            market_type: MarketType::Binary,
            outcomes: vec![
                Outcome::new("Yes", Decimal::new(190, 2), venue),
                Outcome::new("No", Decimal::new(210, 2), venue),
            ],
            start_time: None,
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] ({} outcomes)",
            self.event_name,
            self.category,
            self.outcomes.len()
        )
    }
}

// ---------------------------------------------------------------------------
// BetInstruction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetInstruction {
    /// Position within its `Opportunity.instructions`, 1-indexed; assigned
    /// by the detector once the full instruction list is known.
    pub step: usize,
    pub venue: String,
    pub outcome: String,
    pub stake_usd: Decimal,
    pub odds_decimal: Decimal,
    pub odds_american: String,
    pub potential_payout: Decimal,
}

impl BetInstruction {
    pub fn new(venue: impl Into<String>, outcome: impl Into<String>, stake_usd: Decimal, odds_decimal: Decimal) -> Self {
        let odds_american = crate::engine::odds::decimal_to_american_str(odds_decimal);
        let potential_payout = (stake_usd * odds_decimal).round_dp(2);
        Self {
            step: 0,
            venue: venue.into(),
            outcome: outcome.into(),
            stake_usd,
            odds_decimal,
            odds_american,
            potential_payout,
        }
    }
}

/// Assign 1-indexed `step` values in place, matching the order
/// instructions appear in the opportunity.
pub fn number_instructions(instructions: &mut [BetInstruction]) {
    for (i, instruction) in instructions.iter_mut().enumerate() {
        instruction.step = i + 1;
    }
}

// ---------------------------------------------------------------------------
// Opportunity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OpportunityType {
    Arbitrage,
    Ev,
    BestPrice,
}

impl fmt::Display for OpportunityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Arbitrage => "ARBITRAGE",
            Self::Ev => "EV",
            Self::BestPrice => "BEST_PRICE",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Opportunity {
    #[serde(rename = "type")]
    pub kind: OpportunityType,
    pub event_id: String,
    pub event_name: String,
    /// Market category the opportunity was detected in (e.g.
    /// `basketball_nba`, `politics`) — carried through from the matched
    /// group's markets so `/api/opportunities?sport=` can filter on it.
    pub category: String,
    pub market_type: MarketType,
    #[serde(rename = "profit_pct")]
    pub expected_profit_pct: Decimal,
    #[serde(rename = "profit_usd")]
    pub expected_profit_usd: Decimal,
    pub total_stake: Decimal,
    pub instructions: Vec<BetInstruction>,
    pub fees_usd: Decimal,
    pub risk: RiskLevel,
    pub expires_in_seconds: i64,
    pub detected_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// ScanResult
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    pub opportunities: Vec<Opportunity>,
    pub markets_scanned: usize,
    pub scan_duration_ms: u64,
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_implied_probability() {
        let o = Outcome::sample("Yes", Decimal::new(200, 2), "polymarket");
        assert_eq!(o.implied_probability(), Decimal::new(50, 2));
    }

    #[test]
    fn test_market_venues() {
        let m = Market::sample("evt1", "draftkings", "basketball_nba", "Lakers vs Celtics");
        assert_eq!(m.venues().len(), 1);
        assert!(m.venues().contains("draftkings"));
    }

    #[test]
    fn test_bet_instruction_payout() {
        let inst = BetInstruction::new("draftkings", "Lakers", Decimal::new(10000, 2), Decimal::new(210, 2));
        assert_eq!(inst.potential_payout, Decimal::new(21000, 2));
        assert_eq!(inst.odds_american, "+110");
    }

    #[test]
    fn test_opportunity_serializes_type_as_type_field() {
        let opp = Opportunity {
            kind: OpportunityType::Arbitrage,
            event_id: "evt1".into(),
            event_name: "Lakers vs Celtics".into(),
            category: "basketball_nba".into(),
            market_type: MarketType::Moneyline,
            expected_profit_pct: Decimal::new(110, 2),
            expected_profit_usd: Decimal::new(1102, 2),
            total_stake: Decimal::new(100000, 2),
            instructions: vec![],
            fees_usd: Decimal::ZERO,
            risk: RiskLevel::Medium,
            expires_in_seconds: 30,
            detected_at: Utc::now(),
        };
        let json = serde_json::to_value(&opp).unwrap();
        assert_eq!(json["type"], "ARBITRAGE");
        assert_eq!(json["risk"], "MEDIUM");
    }
}
