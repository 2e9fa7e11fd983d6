//! Expected-value detection against anchor (prediction-market) venues.

use std::collections::HashMap;

use chrono::Utc;
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

use crate::engine::arbitrage::{estimate_expiry_seconds, longest_event_name};
use crate::engine::fees::{get_venue_fees, ANCHOR_VENUES};
use crate::types::{BetInstruction, Market, Opportunity, OpportunityType, RiskLevel};

#[derive(Debug, Clone, Copy)]
pub struct EvConfig {
    pub min_ev_pct: Decimal,
    pub default_stake_usd: Decimal,
}

impl Default for EvConfig {
    fn default() -> Self {
        Self {
            min_ev_pct: dec!(3.0),
            default_stake_usd: dec!(1000),
        }
    }
}

/// `(p_true · odds − 1) · 100 − f`.
pub fn calculate_ev_pct(odds_decimal: Decimal, p_true: Decimal, fee_pct: Decimal) -> Decimal {
    (p_true * odds_decimal - Decimal::ONE) * dec!(100) - fee_pct
}

/// `max(0, (p(b+1) − 1)/b)`, `b = odds·(1 − f/100) − 1`.
pub fn calculate_kelly_fraction(odds_decimal: Decimal, p_true: Decimal, fee_pct: Decimal) -> Decimal {
    let b = odds_decimal * (Decimal::ONE - fee_pct / dec!(100)) - Decimal::ONE;
    if b <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let kelly = (p_true * (b + Decimal::ONE) - Decimal::ONE) / b;
    kelly.max(Decimal::ZERO)
}

pub struct EvDetector {
    config: EvConfig,
}

impl EvDetector {
    pub fn new(config: EvConfig) -> Self {
        Self { config }
    }

    pub fn find_opportunities(&self, groups: &HashMap<String, Vec<Market>>) -> Vec<Opportunity> {
        let mut opportunities = Vec::new();
        for (event_id, markets) in groups {
            opportunities.extend(self.evaluate_group(event_id, markets));
        }
        opportunities
    }

    fn evaluate_group(&self, event_id: &str, markets: &[Market]) -> Vec<Opportunity> {
        let (anchor_markets, betting_markets): (Vec<&Market>, Vec<&Market>) = markets
            .iter()
            .partition(|m| m.outcomes.first().is_some_and(|o| ANCHOR_VENUES.contains(&o.venue.as_str())));

        if anchor_markets.is_empty() || betting_markets.is_empty() {
            return Vec::new();
        }

        // Stable choice: first anchor market in input order (§9 open question:
        // order-dependent when multiple anchors disagree — preserved as-is).
        let anchor = anchor_markets[0];
        let anchor_prob: HashMap<String, Decimal> = anchor
            .outcomes
            .iter()
            .map(|o| (o.name.to_lowercase(), Decimal::ONE / o.odds_decimal))
            .collect();

        let event_name = longest_event_name(markets);
        let mut out = Vec::new();

        for market in &betting_markets {
            for outcome in &market.outcomes {
                let Some(&p_true) = anchor_prob.get(&outcome.name.to_lowercase()) else {
                    continue;
                };
                let fee_pct = get_venue_fees(&outcome.venue).trading_fee_pct;
                let ev_pct = calculate_ev_pct(outcome.odds_decimal, p_true, fee_pct);
                if ev_pct < self.config.min_ev_pct {
                    continue;
                }

                let kelly = calculate_kelly_fraction(outcome.odds_decimal, p_true, fee_pct);
                let stake = (self.config.default_stake_usd * kelly.min(Decimal::ONE) * dec!(0.25))
                    .min(self.config.default_stake_usd)
                    .round_dp(2);
                let mut instruction = BetInstruction::new(
                    outcome.venue.clone(),
                    outcome.name.clone(),
                    stake,
                    outcome.odds_decimal,
                );
                instruction.step = 1;
                let expected_profit_usd = stake * (ev_pct / dec!(100));
                let risk = if ev_pct >= dec!(5.0) {
                    RiskLevel::Medium
                } else {
                    RiskLevel::High
                };

                debug!(
                    event_id,
                    venue = %outcome.venue,
                    ev_pct = %ev_pct,
                    "EV opportunity detected"
                );

                out.push(Opportunity {
                    kind: OpportunityType::Ev,
                    event_id: event_id.to_string(),
                    event_name: event_name.clone(),
                    category: market.category.clone(),
                    market_type: market.market_type,
                    expected_profit_pct: ev_pct,
                    expected_profit_usd,
                    total_stake: stake,
                    instructions: vec![instruction],
                    fees_usd: stake * fee_pct / dec!(100),
                    risk,
                    expires_in_seconds: estimate_expiry_seconds(outcome.observed_at),
                    detected_at: Utc::now(),
                });
            }
        }

        out
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MarketType, Outcome};

    #[test]
    fn test_calculate_ev_pct() {
        let ev = calculate_ev_pct(dec!(2.00), dec!(0.60), Decimal::ZERO);
        assert_eq!(ev, dec!(20.0));
    }

    #[test]
    fn test_calculate_kelly_fraction_positive() {
        let k = calculate_kelly_fraction(dec!(2.00), dec!(0.60), Decimal::ZERO);
        assert!(k > Decimal::ZERO);
    }

    #[test]
    fn test_calculate_kelly_fraction_zero_when_no_edge() {
        let k = calculate_kelly_fraction(dec!(2.00), dec!(0.50), Decimal::ZERO);
        assert_eq!(k, Decimal::ZERO);
    }

    #[test]
    fn test_scenario_ev_against_anchor() {
        let mut anchor = Market::sample("evt1", "manifold", "politics", "Will X happen?");
        anchor.outcomes = vec![Outcome::new("Yes", dec!(1.667), "manifold")];
        let mut betting = Market::sample("evt1", "draftkings", "politics", "Will X happen?");
        betting.market_type = MarketType::Binary;
        betting.outcomes = vec![Outcome::new("Yes", dec!(2.00), "draftkings")];

        let detector = EvDetector::new(EvConfig {
            min_ev_pct: dec!(3.0),
            default_stake_usd: dec!(1000),
        });
        let mut groups = HashMap::new();
        groups.insert("evt1".to_string(), vec![anchor, betting]);

        let opps = detector.find_opportunities(&groups);
        assert_eq!(opps.len(), 1);
        let opp = &opps[0];
        assert_eq!(opp.kind, OpportunityType::Ev);
        // p_true = 1/1.667 ~ 0.59988, b = 2.00 - 1 = 1.0,
        // kelly = (0.59988*2 - 1)/1 ~ 0.19976 -> quarter-Kelly stake ~ $49.94.
        assert!((opp.expected_profit_pct - dec!(19.976)).abs() < dec!(0.01));
        assert_eq!(opp.total_stake, dec!(49.94));
        assert_eq!(opp.risk, RiskLevel::Medium);
    }

    #[test]
    fn test_skips_group_with_no_anchor() {
        let mut betting = Market::sample("evt1", "draftkings", "politics", "Will X happen?");
        betting.outcomes = vec![Outcome::new("Yes", dec!(2.00), "draftkings")];
        let detector = EvDetector::new(EvConfig::default());
        let mut groups = HashMap::new();
        groups.insert("evt1".to_string(), vec![betting]);
        assert!(detector.find_opportunities(&groups).is_empty());
    }

    #[test]
    fn test_skips_outcome_name_absent_from_anchor() {
        let mut anchor = Market::sample("evt1", "manifold", "politics", "Will X happen?");
        anchor.outcomes = vec![Outcome::new("Yes", dec!(1.667), "manifold")];
        let mut betting = Market::sample("evt1", "draftkings", "politics", "Will X happen?");
        betting.outcomes = vec![Outcome::new("Maybe", dec!(2.00), "draftkings")];
        let detector = EvDetector::new(EvConfig::default());
        let mut groups = HashMap::new();
        groups.insert("evt1".to_string(), vec![anchor, betting]);
        assert!(detector.find_opportunities(&groups).is_empty());
    }
}
