//! Arbitrage detection and stake sizing, and the opportunity-construction
//! step that turns a matched event group into zero or one `Opportunity`.

use std::collections::HashMap;

use chrono::Utc;
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

use crate::engine::fees::{get_venue_fees, PREDICTION_MARKETS};
use crate::types::{BetInstruction, Market, Opportunity, OpportunityType, Outcome, RiskLevel};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct ArbConfig {
    pub min_arbitrage_profit_pct: Decimal,
    pub default_stake_usd: Decimal,
}

impl Default for ArbConfig {
    fn default() -> Self {
        Self {
            min_arbitrage_profit_pct: dec!(0.1),
            default_stake_usd: dec!(1000),
        }
    }
}

// ---------------------------------------------------------------------------
// Pure predicate and sizing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct ArbitrageCheck {
    pub is_arbitrage: bool,
    pub profit_pct: Decimal,
    pub implied_prob_sum: Decimal,
}

/// `P = Σ 1/oᵢ`, `threshold = 1 - f/100`, arbitrage iff `P < threshold`.
pub fn detect_arbitrage(odds: &[Decimal], fee_pct: Decimal) -> ArbitrageCheck {
    let implied_prob_sum: Decimal = odds.iter().map(|o| Decimal::ONE / o).sum();
    let threshold = Decimal::ONE - fee_pct / dec!(100);
    let is_arbitrage = implied_prob_sum < threshold;
    let profit_pct = if is_arbitrage {
        (threshold - implied_prob_sum) * dec!(100)
    } else {
        Decimal::ZERO
    };
    ArbitrageCheck {
        is_arbitrage,
        profit_pct,
        implied_prob_sum,
    }
}

#[derive(Debug, Clone)]
pub struct Sizing {
    pub stakes: Vec<Decimal>,
    pub guaranteed_cashout: Decimal,
    pub guaranteed_profit: Decimal,
}

/// `stakeᵢ = round(C · Pᵢ / ΣP, 2)`, rescaled once if rounding pushed the
/// total over capital.
pub fn calculate_stakes(odds: &[Decimal], capital: Decimal, fee_pct: Decimal) -> Sizing {
    let probs: Vec<Decimal> = odds.iter().map(|o| Decimal::ONE / o).collect();
    let prob_sum: Decimal = probs.iter().sum();

    let mut stakes: Vec<Decimal> = probs
        .iter()
        .map(|p| (capital * p / prob_sum).round_dp(2))
        .collect();

    let total: Decimal = stakes.iter().sum();
    if total > capital {
        let scale = capital / total;
        stakes = stakes.iter().map(|s| (*s * scale).round_dp(2)).collect();
    }

    let guaranteed_cashout = stakes
        .iter()
        .zip(odds.iter())
        .map(|(s, o)| *s * o)
        .fold(Decimal::MAX, Decimal::min);

    let total_stake: Decimal = stakes.iter().sum();
    let guaranteed_profit = guaranteed_cashout - total_stake - total_stake * fee_pct / dec!(100);

    Sizing {
        stakes,
        guaranteed_cashout,
        guaranteed_profit,
    }
}

/// Base risk from `profit_pct`, forced LOW for all-prediction-market
/// groups, upgraded to MEDIUM when a LOW-base group crosses venue types.
pub fn assess_risk(profit_pct: Decimal, venues: &[&str]) -> RiskLevel {
    let base = if profit_pct >= dec!(2.0) {
        RiskLevel::Low
    } else if profit_pct >= dec!(0.5) {
        RiskLevel::Medium
    } else {
        RiskLevel::High
    };

    let all_prediction_markets = venues.iter().all(|v| PREDICTION_MARKETS.contains(v));
    if all_prediction_markets {
        return RiskLevel::Low;
    }

    let distinct: std::collections::HashSet<&&str> = venues.iter().collect();
    if distinct.len() > 1 && base == RiskLevel::Low {
        return RiskLevel::Medium;
    }

    base
}

// ---------------------------------------------------------------------------
// Opportunity construction
// ---------------------------------------------------------------------------

pub struct ArbDetector {
    config: ArbConfig,
}

impl ArbDetector {
    pub fn new(config: ArbConfig) -> Self {
        Self { config }
    }

    /// Evaluate every event group and emit the arbitrage opportunities
    /// found, per the §4.2 construction steps.
    pub fn find_opportunities(&self, groups: &HashMap<String, Vec<Market>>) -> Vec<Opportunity> {
        let mut opportunities = Vec::new();
        for (event_id, markets) in groups {
            if let Some(opp) = self.evaluate_group(event_id, markets) {
                opportunities.push(opp);
            }
        }
        opportunities
    }

    fn evaluate_group(&self, event_id: &str, markets: &[Market]) -> Option<Opportunity> {
        // Arbitrage requires at least two markets (i.e. a cross-venue group);
        // a lone market's own two-sided quote is a single venue's pricing,
        // not a guaranteed-payout allocation across venues.
        if markets.len() < 2 {
            return None;
        }

        let mut outcomes_by_name: HashMap<String, Vec<&Outcome>> = HashMap::new();
        for market in markets {
            for outcome in &market.outcomes {
                outcomes_by_name
                    .entry(outcome.name.to_lowercase())
                    .or_default()
                    .push(outcome);
            }
        }

        if outcomes_by_name.len() < 2 {
            return None;
        }

        // Best outcome per name: max odds, tie-break earliest observed_at
        // then lexicographic venue.
        let mut best: Vec<&Outcome> = outcomes_by_name
            .values()
            .map(|candidates| {
                candidates
                    .iter()
                    .copied()
                    .max_by(|a, b| {
                        a.odds_decimal
                            .cmp(&b.odds_decimal)
                            .then_with(|| b.observed_at.cmp(&a.observed_at))
                            .then_with(|| b.venue.cmp(&a.venue))
                    })
                    .expect("non-empty candidate list")
            })
            .collect();
        // Stable, deterministic instruction order.
        best.sort_by(|a, b| a.name.cmp(&b.name));

        let odds: Vec<Decimal> = best.iter().map(|o| o.odds_decimal).collect();
        let venues: Vec<&str> = best.iter().map(|o| o.venue.as_str()).collect();
        let fee_pct: Decimal = venues
            .iter()
            .map(|v| get_venue_fees(v).trading_fee_pct)
            .sum();

        let check = detect_arbitrage(&odds, fee_pct);
        if !check.is_arbitrage || check.profit_pct < self.config.min_arbitrage_profit_pct {
            return None;
        }

        let sizing = calculate_stakes(&odds, self.config.default_stake_usd, fee_pct);
        let total_stake: Decimal = sizing.stakes.iter().sum();
        let fees_usd = total_stake * fee_pct / dec!(100);

        let mut instructions: Vec<BetInstruction> = best
            .iter()
            .zip(sizing.stakes.iter())
            .map(|(o, stake)| BetInstruction::new(o.venue.clone(), o.name.clone(), *stake, o.odds_decimal))
            .collect();
        crate::types::number_instructions(&mut instructions);

        let risk = assess_risk(check.profit_pct, &venues);
        let event_name = longest_event_name(markets);
        let market_type = markets[0].market_type;
        let oldest = best.iter().map(|o| o.observed_at).min().unwrap_or_else(Utc::now);

        debug!(
            event_id,
            profit_pct = %check.profit_pct,
            venues = ?venues,
            "arbitrage opportunity detected"
        );

        Some(Opportunity {
            kind: OpportunityType::Arbitrage,
            event_id: event_id.to_string(),
            event_name,
            category: markets[0].category.clone(),
            market_type,
            expected_profit_pct: check.profit_pct,
            expected_profit_usd: sizing.guaranteed_profit,
            total_stake,
            instructions,
            fees_usd,
            risk,
            expires_in_seconds: estimate_expiry_seconds(oldest),
            detected_at: Utc::now(),
        })
    }
}

/// The longest `event_name` across a group's markets, ties broken by
/// input order — the same rule the Matcher uses for its canonical key,
/// kept consistent so the label matches the key it produced.
pub fn longest_event_name(markets: &[Market]) -> String {
    markets
        .iter()
        .max_by_key(|m| m.event_name.len())
        .map(|m| m.event_name.clone())
        .unwrap_or_default()
}

/// A guaranteed arbitrage window closes quickly once one side is bet into;
/// expiry counts down from the oldest quote backing the opportunity.
pub fn estimate_expiry_seconds(oldest_observed_at: chrono::DateTime<Utc>) -> i64 {
    let elapsed = (Utc::now() - oldest_observed_at).num_seconds().max(0);
    (30 - elapsed).max(5)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
