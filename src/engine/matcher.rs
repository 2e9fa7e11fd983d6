//! Cross-venue market matching (§4.4).
//!
//! Groups markets from independent adapters that describe the same
//! real-world event, using category compatibility, outcome-shape
//! compatibility, and a weighted text-similarity score over event names.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::Market;

pub const DEFAULT_THRESHOLD: f64 = 0.45;

// ---------------------------------------------------------------------------
// Category normalization
// ---------------------------------------------------------------------------

const POLITICS_WORDS: &[&str] = &[
    "politics",
    "election",
    "president",
    "senate",
    "house",
    "congress",
    "governor",
];
const SPORTS_WORDS: &[&str] = &["sports", "nba", "nfl", "mlb", "nhl", "soccer", "football"];
const CRYPTO_WORDS: &[&str] = &["crypto", "bitcoin", "ethereum", "defi"];
const TECH_WORDS: &[&str] = &["tech", "technology", "ai", "software"];
const ECONOMICS_WORDS: &[&str] = &["economics", "economy", "fed", "inflation", "gdp", "rates"];
const ENTERTAINMENT_WORDS: &[&str] = &["entertainment", "movie", "oscar", "grammy", "music"];
const WORLD_WORDS: &[&str] = &["world", "international", "ukraine", "china", "taiwan"];

/// Buckets a raw adapter category string into one of a fixed set.
fn normalize_category(raw: &str) -> &'static str {
    let norm = raw.to_lowercase().replace(['_', ' '], "-");

    let contains_any = |words: &[&str]| words.iter().any(|w| norm.contains(w));

    if contains_any(POLITICS_WORDS) {
        "politics"
    } else if contains_any(SPORTS_WORDS) {
        "sports"
    } else if contains_any(CRYPTO_WORDS) {
        "crypto"
    } else if contains_any(TECH_WORDS) {
        "tech"
    } else if contains_any(ECONOMICS_WORDS) {
        "economics"
    } else if contains_any(ENTERTAINMENT_WORDS) {
        "entertainment"
    } else if contains_any(WORLD_WORDS) {
        "world"
    } else {
        "other"
    }
}

/// Two categories are compatible if they normalize to the same bucket, with
/// one relaxation: `tech` is compatible with `{tech, politics, world,
/// economics}` since some sources tag politics as a generic "prediction".
fn categories_compatible(cat1: &str, cat2: &str) -> bool {
    let n1 = normalize_category(cat1);
    let n2 = normalize_category(cat2);
    if n1 == n2 {
        return true;
    }
    let relaxed = |n: &str| matches!(n, "tech" | "politics" | "world" | "economics");
    (n1 == "tech" && relaxed(n2)) || (n2 == "tech" && relaxed(n1))
}

// ---------------------------------------------------------------------------
// Outcome-shape compatibility
// ---------------------------------------------------------------------------

fn is_binary_shape(market: &Market) -> bool {
    let names: HashSet<String> = market
        .outcomes
        .iter()
        .map(|o| o.name.to_lowercase())
        .collect();
    !names.is_empty() && names.iter().all(|n| n == "yes" || n == "no")
}

fn outcomes_compatible(m1: &Market, m2: &Market) -> bool {
    let bin1 = is_binary_shape(m1);
    let bin2 = is_binary_shape(m2);
    if bin1 && bin2 {
        return true;
    }
    if bin1 || bin2 {
        return false;
    }
    m1.outcomes.iter().any(|o1| {
        let n1 = o1.name.to_lowercase();
        m2.outcomes.iter().any(|o2| {
            let n2 = o2.name.to_lowercase();
            n1.contains(&n2) || n2.contains(&n1)
        })
    })
}

// ---------------------------------------------------------------------------
// Text similarity
// ---------------------------------------------------------------------------

static PREFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(will |who will |what will |which )").expect("static regex")
});
static PUNCT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s\d\-]").expect("static regex"));
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));
static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"20\d{2}").expect("static regex"));

pub fn normalize_text(text: &str) -> String {
    let lower = text.to_lowercase();
    let stripped = PREFIX_RE.replace(&lower, "");
    let no_punct = PUNCT_RE.replace_all(&stripped, " ");
    WHITESPACE_RE
        .replace_all(no_punct.trim(), " ")
        .trim()
        .to_string()
}

/// Ratio of matched characters in the longest common matching blocks,
/// `2*M / (len(a) + len(b))` — the classical sequence-matcher definition.
pub fn sequence_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    let matched = matching_blocks_total(&a, &b);
    (2 * matched) as f64 / total as f64
}

/// Sum of lengths of matching blocks found by recursively taking the
/// longest common substring and recursing on the left/right remainders —
/// the same recursive strategy `difflib.SequenceMatcher.ratio()` uses.
fn matching_blocks_total(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let (len, ai, bi) = longest_common_substring(a, b);
    if len == 0 {
        return 0;
    }
    let left = matching_blocks_total(&a[..ai], &b[..bi]);
    let right = matching_blocks_total(&a[ai + len..], &b[bi + len..]);
    len + left + right
}

fn longest_common_substring(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best_len = 0;
    let mut best_ai = 0;
    let mut best_bi = 0;
    let mut prev = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        let mut cur = vec![0usize; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            if ca == cb {
                cur[j + 1] = prev[j] + 1;
                if cur[j + 1] > best_len {
                    best_len = cur[j + 1];
                    best_ai = i + 1 - best_len;
                    best_bi = j + 1 - best_len;
                }
            }
        }
        prev = cur;
    }
    (best_len, best_ai, best_bi)
}

const POLITICIANS: &[&str] = &[
    "trump",
    "biden",
    "vance",
    "desantis",
    "harris",
    "obama",
    "pence",
    "haley",
    "ramaswamy",
    "newsom",
    "ocasio-cortez",
    "aoc",
    "rubio",
    "cruz",
    "sanders",
    "warren",
    "pelosi",
    "mcconnell",
    "buttigieg",
    "booker",
    "klobuchar",
    "yang",
    "gabbard",
];
const POLITICAL_TERMS: &[&str] = &[
    "president",
    "presidential",
    "election",
    "nomination",
    "nominee",
    "republican",
    "democrat",
    "gop",
    "dnc",
    "rnc",
    "senate",
    "house",
    "congress",
    "governor",
    "primary",
    "caucus",
    "midterm",
];
const ECONOMIC_TERMS: &[&str] = &[
    "fed",
    "federal reserve",
    "interest rate",
    "rates",
    "bps",
    "inflation",
    "gdp",
    "recession",
    "tariff",
];
const NAMED_EVENTS: &[&str] = &[
    "super bowl",
    "world series",
    "nba finals",
    "stanley cup",
    "oscars",
    "grammy",
    "emmy",
    "golden globe",
    "greenland",
    "ukraine",
    "russia",
    "china",
    "taiwan",
];

/// Extracts a fixed-lexicon entity set from the *original* (unnormalized)
/// text — the same politician/political-term/economic-term/named-event
/// lexicons the matcher ported from, plus any `20xx` year token.
pub fn extract_entities(text: &str) -> HashSet<String> {
    let lower = text.to_lowercase();
    let mut entities = HashSet::new();

    for p in POLITICIANS {
        if lower.contains(p) {
            entities.insert((*p).to_string());
        }
    }
    for year in YEAR_RE.find_iter(text) {
        entities.insert(year.as_str().to_string());
    }
    for term in POLITICAL_TERMS {
        if lower.contains(term) {
            entities.insert((*term).to_string());
        }
    }
    for term in ECONOMIC_TERMS {
        if lower.contains(term) {
            entities.insert(term.replace(' ', "_"));
        }
    }
    for event in NAMED_EVENTS {
        if lower.contains(event) {
            entities.insert(event.replace(' ', "_"));
        }
    }

    entities
}

fn jaccard<T: Eq + std::hash::Hash>(a: &HashSet<T>, b: &HashSet<T>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let inter = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        0.0
    } else {
        inter as f64 / union as f64
    }
}

/// `0.5*entity_jaccard + 0.3*word_jaccard + 0.2*sequence_ratio`.
pub fn similarity(event_name1: &str, event_name2: &str) -> f64 {
    let norm1 = normalize_text(event_name1);
    let norm2 = normalize_text(event_name2);

    let string_sim = sequence_ratio(&norm1, &norm2);

    let entities1 = extract_entities(event_name1);
    let entities2 = extract_entities(event_name2);
    let entity_sim = jaccard(&entities1, &entities2);

    let words1: HashSet<&str> = norm1.split_whitespace().collect();
    let words2: HashSet<&str> = norm2.split_whitespace().collect();
    let word_sim = jaccard(&words1, &words2);

    entity_sim * 0.5 + word_sim * 0.3 + string_sim * 0.2
}

// ---------------------------------------------------------------------------
// Matching predicate + grouping
// ---------------------------------------------------------------------------

pub fn matches(m1: &Market, m2: &Market, threshold: f64) -> bool {
    let venues1 = m1.venues();
    let venues2 = m2.venues();
    if !venues1.is_disjoint(&venues2) {
        return false;
    }
    if !categories_compatible(&m1.category, &m2.category) {
        return false;
    }
    if !outcomes_compatible(m1, m2) {
        return false;
    }
    similarity(&m1.event_name, &m2.event_name) >= threshold
}

/// Longest `event_name` in the group, ties broken by input order — the
/// same tie-break arbitrage.rs's `longest_event_name` uses, kept
/// consistent so the label a reader sees matches the label that produced
/// the group's canonical key.
fn longest_name(markets: &[&Market]) -> String {
    let mut best = markets[0].event_name.clone();
    for m in &markets[1..] {
        if m.event_name.len() > best.len() {
            best = m.event_name.clone();
        }
    }
    best
}

fn canonical_event_id(markets: &[&Market]) -> String {
    let best_name = longest_name(markets);
    let normalized = normalize_text(&best_name);
    let words: Vec<&str> = normalized.split_whitespace().take(5).collect();
    format!("matched_{}", words.join("_"))
}

/// Groups markets that describe the same event (§4.4).
///
/// O(n^2): for each unclaimed index `i`, opens a group seeded with it and
/// absorbs every later unclaimed index `j` that matches any current
/// member. Groups spanning >= 2 distinct venues get a canonical key;
/// everything else is emitted under its original `event_id`.
pub fn group_markets(markets: &[Market], threshold: f64) -> HashMap<String, Vec<Market>> {
    let n = markets.len();
    let mut claimed = vec![false; n];
    let mut merged_groups: Vec<Vec<usize>> = Vec::new();

    for i in 0..n {
        if claimed[i] {
            continue;
        }
        let mut group = vec![i];
        claimed[i] = true;

        for j in (i + 1)..n {
            if claimed[j] {
                continue;
            }
            let is_match = group
                .iter()
                .any(|&k| matches(&markets[k], &markets[j], threshold));
            if is_match {
                group.push(j);
                claimed[j] = true;
            }
        }

        if group.len() > 1 {
            merged_groups.push(group);
        }
    }

    let mut result: HashMap<String, Vec<Market>> = HashMap::new();
    let mut grouped_indices: HashSet<usize> = HashSet::new();

    for group in &merged_groups {
        let refs: Vec<&Market> = group.iter().map(|&i| &markets[i]).collect();
        let venues: HashSet<&str> = refs.iter().flat_map(|m| m.venues()).collect();
        if venues.len() < 2 {
            continue;
        }
        let key = canonical_event_id(&refs);
        grouped_indices.extend(group.iter().copied());
        result
            .entry(key)
            .or_default()
            .extend(group.iter().map(|&i| markets[i].clone()));
    }

    for (i, market) in markets.iter().enumerate() {
        if grouped_indices.contains(&i) {
            continue;
        }
        result
            .entry(market.event_id.clone())
            .or_default()
            .push(market.clone());
    }

    result
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    use crate::types::{MarketType, Outcome};

    fn binary_market(event_id: &str, venue: &str, category: &str, name: &str) -> Market {
        Market {
            event_id: event_id.to_string(),
            category: category.to_string(),
            event_name: name.to_string(),
            market_type: MarketType::Binary,
            outcomes: vec![
                Outcome::new("Yes", dec!(1.90), venue),
                Outcome::new("No", dec!(2.10), venue),
            ],
            start_time: None,
        }
    }

    #[test]
    fn normalize_strips_prefix_and_punctuation() {
        assert_eq!(
            normalize_text("Will Trump win the 2024 election?!"),
            "trump win the 2024 election"
        );
    }

    #[test]
    fn sequence_ratio_identical_is_one() {
        assert_eq!(sequence_ratio("abc", "abc"), 1.0);
    }

    #[test]
    fn sequence_ratio_disjoint_is_zero() {
        assert_eq!(sequence_ratio("abc", "xyz"), 0.0);
    }

    #[test]
    fn entities_extract_politician_and_year() {
        let e = extract_entities("Will Trump win the 2024 presidential election?");
        assert!(e.contains("trump"));
        assert!(e.contains("2024"));
        assert!(e.contains("president") || e.contains("election") || e.contains("presidential"));
    }

    #[test]
    fn similarity_is_symmetric() {
        let a = "Will Trump win the 2024 presidential election?";
        let b = "Trump to win 2024 election";
        assert!((similarity(a, b) - similarity(b, a)).abs() < 1e-12);
    }

    #[test]
    fn matches_is_symmetric_predicate() {
        let m1 = binary_market(
            "poly1",
            "polymarket",
            "politics",
            "Will Trump win the 2024 presidential election?",
        );
        let m2 = binary_market("kalshi1", "kalshi", "politics", "Trump to win 2024 election");
        assert_eq!(
            matches(&m1, &m2, DEFAULT_THRESHOLD),
            matches(&m2, &m1, DEFAULT_THRESHOLD)
        );
        assert!(matches(&m1, &m2, DEFAULT_THRESHOLD));
    }

    #[test]
    fn same_venue_never_matches() {
        let m1 = binary_market("a", "polymarket", "politics", "Will Trump win 2024?");
        let m2 = binary_market("b", "polymarket", "politics", "Will Trump win 2024?");
        assert!(!matches(&m1, &m2, DEFAULT_THRESHOLD));
    }

    #[test]
    fn incompatible_categories_never_match() {
        let m1 = binary_market("a", "polymarket", "politics", "Will Trump win 2024?");
        let m2 = binary_market("b", "draftkings", "basketball_nba", "Lakers vs Celtics");
        assert!(!matches(&m1, &m2, DEFAULT_THRESHOLD));
    }

    #[test]
    fn mismatched_outcome_shapes_never_match() {
        let mut m1 = binary_market("a", "polymarket", "politics", "Will Trump win 2024?");
        m1.outcomes = vec![Outcome::new("Yes", dec!(1.5), "polymarket")];
        let mut m2 = binary_market("b", "kalshi", "politics", "Trump wins 2024 election?");
        m2.outcomes = vec![
            Outcome::new("Trump", dec!(1.5), "kalshi"),
            Outcome::new("Biden", dec!(3.0), "kalshi"),
        ];
        assert!(!matches(&m1, &m2, DEFAULT_THRESHOLD));
    }

    #[test]
    fn determinism_same_input_same_groups() {
        let markets = vec![
            binary_market(
                "poly1",
                "polymarket",
                "politics",
                "Will Trump win the 2024 presidential election?",
            ),
            binary_market("kalshi1", "kalshi", "politics", "Trump to win 2024 election"),
            binary_market("dk1", "draftkings", "basketball_nba", "Lakers vs Celtics"),
        ];
        let g1 = group_markets(&markets, DEFAULT_THRESHOLD);
        let g2 = group_markets(&markets, DEFAULT_THRESHOLD);
        let mut k1: Vec<&String> = g1.keys().collect();
        let mut k2: Vec<&String> = g2.keys().collect();
        k1.sort();
        k2.sort();
        assert_eq!(k1, k2);
        for key in k1 {
            assert_eq!(g1[key].len(), g2[key].len());
        }
    }

    /// End-to-end scenario 5 (§8): politics markets group across venues,
    /// the sportsbook market keeps its own key.
    #[test]
    fn scenario_matcher_groups_politics_across_venues() {
        let markets = vec![
            binary_market(
                "poly1",
                "polymarket",
                "politics",
                "Will Trump win the 2024 presidential election?",
            ),
            binary_market("kalshi1", "kalshi", "politics", "Trump to win 2024 election"),
            binary_market("dk1", "draftkings", "basketball_nba", "Lakers vs Celtics"),
        ];
        let groups = group_markets(&markets, DEFAULT_THRESHOLD);

        let matched_key = groups.keys().find(|k| k.starts_with("matched_trump"));
        assert!(matched_key.is_some(), "expected a matched_trump_* key, got {:?}", groups.keys().collect::<Vec<_>>());
        assert_eq!(groups[matched_key.unwrap()].len(), 2);

        assert!(groups.contains_key("dk1"));
        assert_eq!(groups["dk1"].len(), 1);
    }

    #[test]
    fn singleton_markets_keep_original_event_id() {
        let markets = vec![binary_market("solo1", "polymarket", "politics", "Will X happen?")];
        let groups = group_markets(&markets, DEFAULT_THRESHOLD);
        assert_eq!(groups.len(), 1);
        assert!(groups.contains_key("solo1"));
    }
}
