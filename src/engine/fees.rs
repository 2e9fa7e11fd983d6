//! Static venue fee table. Every venue maps to a `VenueFees`; unknown
//! venues fall back to a conservative default rather than being treated
//! as fee-free.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VenueFees {
    pub trading_fee_pct: Decimal,
    pub settlement_fee: Decimal,
    pub withdrawal_fee: Decimal,
}

impl VenueFees {
    const fn new(trading_fee_pct: Decimal, settlement_fee: Decimal, withdrawal_fee: Decimal) -> Self {
        Self {
            trading_fee_pct,
            settlement_fee,
            withdrawal_fee,
        }
    }
}

/// The set of venues treated as prediction markets (probability anchors,
/// and eligible for the forced-LOW risk rule in arbitrage classification).
pub const PREDICTION_MARKETS: &[&str] = &["polymarket", "kalshi", "manifold"];

/// The set of venues usable as an EV anchor — prediction markets plus
/// Betfair's exchange pricing.
pub const ANCHOR_VENUES: &[&str] = &["polymarket", "kalshi", "manifold", "betfair"];

/// Look up the fee schedule for a venue, falling back to `default` for
/// unrecognized venues (sportsbook aggregator entries vary by bookmaker
/// and are not individually tabulated here).
pub fn get_venue_fees(venue: &str) -> VenueFees {
    match venue {
        "polymarket" => VenueFees::new(dec!(2.0), Decimal::ZERO, dec!(1.0)),
        "kalshi" => VenueFees::new(dec!(1.0), Decimal::ZERO, Decimal::ZERO),
        "manifold" => VenueFees::new(Decimal::ZERO, Decimal::ZERO, Decimal::ZERO),
        "predictit" => VenueFees::new(dec!(10.0), dec!(5.0), dec!(0.0)),
        "betfair" => VenueFees::new(dec!(5.0), Decimal::ZERO, Decimal::ZERO),
        "draftkings" | "fanduel" | "betmgm" | "caesars" | "pointsbet" => {
            VenueFees::new(Decimal::ZERO, Decimal::ZERO, Decimal::ZERO)
        }
        _ => default_fees(),
    }
}

fn default_fees() -> VenueFees {
    VenueFees::new(dec!(3.0), Decimal::ZERO, Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_venue() {
        assert_eq!(get_venue_fees("polymarket").trading_fee_pct, dec!(2.0));
    }

    #[test]
    fn test_sportsbook_venue_is_fee_free() {
        assert_eq!(get_venue_fees("draftkings").trading_fee_pct, Decimal::ZERO);
    }

    #[test]
    fn test_unknown_venue_falls_back_to_default() {
        assert_eq!(get_venue_fees("some_new_exchange"), default_fees());
    }
}
