//! Human-readable instruction formatting (§11, supplemented).
//!
//! Turns an `Opportunity` into the advisory text a human reads before
//! deciding what to do with it, and the short-form table used by
//! `/api/opportunities?format=text`. Every rendering carries the
//! advisory disclaimer required by §6 — this crate never places a bet.

use std::fmt::Write as _;

use crate::types::{BetInstruction, Opportunity};

pub const DISCLAIMER: &str =
    "Advisory only. Not financial advice. Odds move; verify before betting. This system never places bets.";

/// `"1. Bet $500.00 on Lakers at draftkings (+110) -> payout $1050.00"`.
pub fn format_instruction(step: usize, instruction: &BetInstruction) -> String {
    format!(
        "{step}. Bet ${:.2} on {} at {} ({}) -> payout ${:.2}",
        instruction.stake_usd,
        instruction.outcome,
        instruction.venue,
        instruction.odds_american,
        instruction.potential_payout,
    )
}

/// Full multi-line rendering of an opportunity: header, one numbered
/// instruction per line, and the disclaimer.
pub fn format_opportunity(opp: &Opportunity) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "[{}] {} ({}) — {:.2}% expected profit, ${:.2} on ${:.2} stake, risk={}",
        opp.kind, opp.event_name, opp.market_type, opp.expected_profit_pct, opp.expected_profit_usd, opp.total_stake, opp.risk
    );
    for (i, instruction) in opp.instructions.iter().enumerate() {
        let _ = writeln!(out, "{}", format_instruction(i + 1, instruction));
    }
    let _ = writeln!(out, "Expires in {}s. {}", opp.expires_in_seconds, DISCLAIMER);
    out
}

/// One-line summary, used in log lines and compact list views.
pub fn format_opportunity_short(opp: &Opportunity) -> String {
    format!(
        "{} {} {:.2}% (${:.2} on ${:.2}, risk={})",
        opp.kind, opp.event_name, opp.expected_profit_pct, opp.expected_profit_usd, opp.total_stake, opp.risk
    )
}

/// Plain-text table of opportunities, newest-sorted-first order preserved
/// from the caller, for the text-rendering branch of `/api/opportunities`.
pub fn format_opportunities_table(opps: &[Opportunity]) -> String {
    if opps.is_empty() {
        return format!("No opportunities detected.\n{DISCLAIMER}");
    }
    let mut out = String::new();
    for (i, opp) in opps.iter().enumerate() {
        let _ = writeln!(out, "{}. {}", i + 1, format_opportunity_short(opp));
    }
    let _ = writeln!(out, "\n{DISCLAIMER}");
    out
}
