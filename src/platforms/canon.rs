//! Team / market-type canonicalization (§4.4.1).
//!
//! Supplemented from the source system: free-text bookmaker feeds spell
//! the same team or market type many ways ("LA Lakers", "Lakers",
//! "h2h", "ML"). This runs upstream of the Matcher, inside adapters that
//! receive bookmaker feeds directly — prediction-market adapters deal in
//! whole event questions already and don't need it.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;

static TEAM_ALIASES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        // NBA
        ("la lakers", "Los Angeles Lakers"),
        ("lakers", "Los Angeles Lakers"),
        ("lac", "Los Angeles Clippers"),
        ("la clippers", "Los Angeles Clippers"),
        ("clippers", "Los Angeles Clippers"),
        ("boston", "Boston Celtics"),
        ("celtics", "Boston Celtics"),
        ("gsw", "Golden State Warriors"),
        ("golden state", "Golden State Warriors"),
        ("warriors", "Golden State Warriors"),
        ("ny knicks", "New York Knicks"),
        ("knicks", "New York Knicks"),
        ("phx", "Phoenix Suns"),
        ("phoenix", "Phoenix Suns"),
        ("suns", "Phoenix Suns"),
        // NFL
        ("kc", "Kansas City Chiefs"),
        ("kansas city", "Kansas City Chiefs"),
        ("chiefs", "Kansas City Chiefs"),
        ("sf", "San Francisco 49ers"),
        ("san francisco", "San Francisco 49ers"),
        ("49ers", "San Francisco 49ers"),
        ("niners", "San Francisco 49ers"),
    ])
});

static MARKET_TYPE_ALIASES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("ml", "moneyline"),
        ("money line", "moneyline"),
        ("h2h", "moneyline"),
        ("head to head", "moneyline"),
        ("spread", "spread"),
        ("ats", "spread"),
        ("point spread", "spread"),
        ("handicap", "spread"),
        ("total", "total"),
        ("ou", "total"),
        ("over/under", "total"),
        ("over under", "total"),
        ("prop", "prop"),
        ("player prop", "prop"),
    ])
});

fn title_case(name: &str) -> String {
    name.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Looks a team name up in the alias table; falls back to title-casing
/// the input unchanged when there is no known alias.
pub fn normalize_team_name(name: &str) -> String {
    if name.is_empty() {
        return name.to_string();
    }
    let cleaned = name.trim().to_lowercase();
    let collapsed: String = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    if let Some(canonical) = TEAM_ALIASES.get(collapsed.as_str()) {
        canonical.to_string()
    } else {
        title_case(name.trim())
    }
}

/// Looks a market-type string up in the alias table; falls back to the
/// cleaned-but-unmapped string, matching the source behavior of never
/// rejecting an unrecognized market type.
pub fn normalize_market_type(market_type: &str) -> String {
    if market_type.is_empty() {
        return "unknown".to_string();
    }
    let cleaned = market_type
        .trim()
        .to_lowercase()
        .replace(['/', '\\'], " ");
    let collapsed: String = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    MARKET_TYPE_ALIASES
        .get(collapsed.as_str())
        .map(|s| s.to_string())
        .unwrap_or(collapsed)
}

/// `{sport}_{team1}_vs_{team2}_{YYYY_MM_DD}`, teams canonicalized and
/// sorted alphabetically so home/away ordering doesn't fork the id.
pub fn generate_event_id(sport: &str, team1: &str, team2: &str, date: Option<DateTime<Utc>>) -> String {
    let sport_clean = sport.trim().to_lowercase().replace(' ', "_");
    let t1 = normalize_team_name(team1).to_lowercase().replace(' ', "_");
    let t2 = normalize_team_name(team2).to_lowercase().replace(' ', "_");
    let mut teams = [t1, t2];
    teams.sort();

    match date {
        Some(d) => format!(
            "{sport_clean}_{}_vs_{}_{}",
            teams[0],
            teams[1],
            d.format("%Y_%m_%d")
        ),
        None => format!("{sport_clean}_{}_vs_{}", teams[0], teams[1]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_team_alias_hit() {
        assert_eq!(normalize_team_name("lakers"), "Los Angeles Lakers");
        assert_eq!(normalize_team_name("LA Lakers".to_lowercase().as_str()), "Los Angeles Lakers");
    }

    #[test]
    fn normalize_team_no_alias_title_cases() {
        assert_eq!(normalize_team_name("miami heat"), "Miami Heat");
    }

    #[test]
    fn normalize_market_type_aliases() {
        assert_eq!(normalize_market_type("ML"), "moneyline");
        assert_eq!(normalize_market_type("h2h"), "moneyline");
        assert_eq!(normalize_market_type("O/U"), "total");
    }

    #[test]
    fn generate_event_id_sorts_teams() {
        let id1 = generate_event_id("NBA", "Boston Celtics", "Los Angeles Lakers", None);
        let id2 = generate_event_id("NBA", "Los Angeles Lakers", "Boston Celtics", None);
        assert_eq!(id1, id2);
        assert!(id1.starts_with("nba_"));
    }
}
