//! Scanner — the scan-cycle orchestrator (§4.6) and the subscription
//! fabric subscribers attach to (§4.7).
//!
//! Owns the current `Market` snapshot and `Opportunity` list exclusively;
//! every reader (HTTP surface, WebSocket subscribers) observes a
//! consistent snapshot that the scan loop replaces atomically once per
//! cycle (§5).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{watch, Mutex, RwLock};
use tracing::{info, warn};

use crate::engine::arbitrage::{ArbConfig, ArbDetector};
use crate::engine::ev::{EvConfig, EvDetector};
use crate::engine::matcher;
use crate::platforms::MarketSource;
use crate::types::{Market, Opportunity, ScanResult};
use crate::util::timer::Timer;

/// Per-adapter fetch deadline (§4.5: "total per-adapter deadline of
/// 10-15s"). Enforced here in addition to each adapter's own HTTP client
/// timeout, so a client that forgets its own timeout still can't stall a
/// scan cycle indefinitely.
const ADAPTER_DEADLINE: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy)]
pub struct ScannerConfig {
    pub scan_interval: Duration,
    pub match_threshold: f64,
    pub arb: ArbConfig,
    pub ev: EvConfig,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            scan_interval: Duration::from_secs(2),
            match_threshold: matcher::DEFAULT_THRESHOLD,
            arb: ArbConfig::default(),
            ev: EvConfig::default(),
        }
    }
}

/// A registered listener, notified once per published `ScanResult` (§4.7).
/// The WebSocket layer implements this to fan a scan result out to
/// connected clients; `scan_once` is itself a minimal `Subscriber`-free
/// caller that also works standalone (e.g. from tests or a CLI `--once`
/// mode) without any subscriber attached.
#[async_trait]
pub trait Subscriber: Send + Sync {
    async fn on_scan_result(&self, result: &ScanResult);
}

/// Orchestrates one scan cycle end to end: fan-out ingestion with
/// per-adapter fault isolation, matching, detection, and publication.
pub struct Scanner {
    adapters: Vec<Arc<dyn MarketSource>>,
    config: ScannerConfig,
    snapshot: RwLock<HashMap<String, Market>>,
    opportunities: RwLock<Vec<Opportunity>>,
    last_scan: RwLock<Option<ScanResult>>,
    subscribers: Mutex<Vec<(u64, Arc<dyn Subscriber>)>>,
    next_subscriber_id: AtomicU64,
}

impl Scanner {
    pub fn new(adapters: Vec<Arc<dyn MarketSource>>, config: ScannerConfig) -> Self {
        Self {
            adapters,
            config,
            snapshot: RwLock::new(HashMap::new()),
            opportunities: RwLock::new(Vec::new()),
            last_scan: RwLock::new(None),
            subscribers: Mutex::new(Vec::new()),
            next_subscriber_id: AtomicU64::new(1),
        }
    }

    /// Register a subscriber; returns an id usable with [`Scanner::unsubscribe`].
    pub async fn subscribe(&self, subscriber: Arc<dyn Subscriber>) -> u64 {
        let id = self.next_subscriber_id.fetch_add(1, Ordering::SeqCst);
        self.subscribers.lock().await.push((id, subscriber));
        id
    }

    pub async fn unsubscribe(&self, id: u64) {
        self.subscribers.lock().await.retain(|(sub_id, _)| *sub_id != id);
    }

    pub async fn current_opportunities(&self) -> Vec<Opportunity> {
        self.opportunities.read().await.clone()
    }

    pub async fn current_snapshot(&self) -> HashMap<String, Market> {
        self.snapshot.read().await.clone()
    }

    pub async fn last_scan_result(&self) -> Option<ScanResult> {
        self.last_scan.read().await.clone()
    }

    /// Per-venue market counts and reachability, for `/api/sources`
    /// (§11, supplemented). "Reachable" means the adapter's most recent
    /// fetch contributed at least one market to the current snapshot;
    /// an adapter that legitimately has zero live markets right now is
    /// indistinguishable from one that failed, which mirrors the source
    /// system's own behavior (§4.5(e): both paths return `[]`).
    pub async fn source_status(&self) -> Vec<(String, usize)> {
        let snapshot = self.snapshot.read().await;
        self.adapters
            .iter()
            .map(|a| {
                let count = snapshot.values().filter(|m| m.venues().contains(a.name())).count();
                (a.name().to_string(), count)
            })
            .collect()
    }

    /// Run one scan cycle: fetch, match, detect, publish. Never panics
    /// out of a failed adapter or subscriber (§7).
    pub async fn scan_once(&self) -> ScanResult {
        let timer = Timer::start();

        let markets = self.fetch_all().await;

        {
            let mut snapshot = self.snapshot.write().await;
            snapshot.clear();
            for market in &markets {
                for venue in market.venues() {
                    snapshot.insert(format!("{}_{venue}", market.event_id), market.clone());
                }
            }
        }

        let groups = matcher::group_markets(&markets, self.config.match_threshold);

        let arb_detector = ArbDetector::new(self.config.arb);
        let ev_detector = EvDetector::new(self.config.ev);
        let mut opportunities = arb_detector.find_opportunities(&groups);
        opportunities.extend(ev_detector.find_opportunities(&groups));
        opportunities.sort_by(|a, b| b.expected_profit_pct.cmp(&a.expected_profit_pct));

        let scan_duration_ms = timer.elapsed_ms();
        let timestamp = self.monotonic_timestamp().await;

        {
            *self.opportunities.write().await = opportunities.clone();
        }

        let result = ScanResult {
            opportunities,
            markets_scanned: markets.len(),
            scan_duration_ms,
            timestamp,
        };

        *self.last_scan.write().await = Some(result.clone());

        info!(
            markets_scanned = result.markets_scanned,
            opportunities = result.opportunities.len(),
            groups = groups.len(),
            scan_duration_ms = result.scan_duration_ms,
            "scan cycle complete"
        );

        self.notify_subscribers(&result).await;

        result
    }

    /// `last_scan_timestamp` is strictly non-decreasing across scans (§5),
    /// so a system clock hiccup can never publish a result that appears
    /// to precede the previous one.
    async fn monotonic_timestamp(&self) -> chrono::DateTime<Utc> {
        let now = Utc::now();
        match self.last_scan.read().await.as_ref() {
            Some(prev) if prev.timestamp >= now => prev.timestamp,
            _ => now,
        }
    }

    /// Fan out to every adapter concurrently. Each gets its own deadline
    /// and its own task: a panic or timeout in one adapter contributes an
    /// empty list and a logged warning, the rest proceed unaffected (§5,
    /// §7, §8 property 9).
    async fn fetch_all(&self) -> Vec<Market> {
        let mut handles = Vec::with_capacity(self.adapters.len());
        for adapter in &self.adapters {
            let adapter = Arc::clone(adapter);
            handles.push(tokio::spawn(async move {
                let name = adapter.name().to_string();
                match tokio::time::timeout(ADAPTER_DEADLINE, adapter.fetch()).await {
                    Ok(markets) => markets,
                    Err(_) => {
                        warn!(adapter = %name, "adapter fetch exceeded deadline");
                        Vec::new()
                    }
                }
            }));
        }

        let mut markets = Vec::new();
        for (adapter, handle) in self.adapters.iter().zip(handles) {
            match handle.await {
                Ok(m) => markets.extend(m),
                Err(join_err) => {
                    warn!(adapter = adapter.name(), error = %join_err, "adapter task panicked");
                }
            }
        }
        markets
    }

    /// Copies the subscriber list under a short lock, then notifies
    /// unlocked (§5), sequentially in registration order (§4.7). Each
    /// callback runs in its own task so a panicking subscriber can't
    /// poison the scan loop; its failure is logged and the subscriber is
    /// NOT auto-unsubscribed (§7).
    async fn notify_subscribers(&self, result: &ScanResult) {
        let subs: Vec<(u64, Arc<dyn Subscriber>)> = self.subscribers.lock().await.clone();
        for (id, sub) in subs {
            let sub = Arc::clone(&sub);
            let result = result.clone();
            let outcome = tokio::spawn(async move { sub.on_scan_result(&result).await }).await;
            if let Err(join_err) = outcome {
                warn!(subscriber_id = id, error = %join_err, "subscriber callback failed");
            }
        }
    }

    /// Continuous scan loop: `scan_once`, sleep `scan_interval`, repeat.
    /// `stop` flips to `true` to request a graceful exit; the loop always
    /// finishes and publishes the in-flight cycle before checking it
    /// (§5: "no mid-cycle abort").
    pub async fn run(&self, mut stop: watch::Receiver<bool>) {
        loop {
            self.scan_once().await;
            if *stop.borrow() {
                break;
            }
            tokio::select! {
                _ = tokio::time::sleep(self.config.scan_interval) => {}
                _ = stop.changed() => {
                    if *stop.borrow() {
                        break;
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MarketType, Outcome};
    use rust_decimal_macros::dec;
    use std::sync::atomic::AtomicUsize;

    struct FakeSource {
        venue_name: &'static str,
        markets: Vec<Market>,
        fail: bool,
    }

    #[async_trait]
    impl MarketSource for FakeSource {
        fn name(&self) -> &str {
            self.venue_name
        }

        async fn fetch(&self) -> Vec<Market> {
            if self.fail {
                panic!("simulated adapter failure");
            }
            self.markets.clone()
        }
    }

    fn two_venue_market(venue: &str, lakers_odds: rust_decimal::Decimal, celtics_odds: rust_decimal::Decimal) -> Market {
        Market {
            event_id: "evt1".to_string(),
            category: "basketball_nba".to_string(),
            event_name: "Lakers vs Celtics".to_string(),
            market_type: MarketType::Moneyline,
            outcomes: vec![
                Outcome::new("Lakers", lakers_odds, venue),
                Outcome::new("Celtics", celtics_odds, venue),
            ],
            start_time: None,
        }
    }

    #[tokio::test]
    async fn scenario_adapter_isolation_still_produces_a_scan_result() {
        let adapters: Vec<Arc<dyn MarketSource>> = vec![
            Arc::new(FakeSource {
                venue_name: "draftkings",
                markets: vec![two_venue_market("draftkings", dec!(2.10), dec!(1.80))],
                fail: false,
            }),
            Arc::new(FakeSource {
                venue_name: "fanduel",
                markets: vec![two_venue_market("fanduel", dec!(2.05), dec!(1.95))],
                fail: false,
            }),
            Arc::new(FakeSource { venue_name: "broken_a", markets: vec![], fail: true }),
            Arc::new(FakeSource { venue_name: "broken_b", markets: vec![], fail: true }),
        ];
        let scanner = Scanner::new(adapters, ScannerConfig::default());
        let result = scanner.scan_once().await;

        assert_eq!(result.markets_scanned, 2);
        assert_eq!(result.opportunities.len(), 1);
        assert_eq!(result.opportunities[0].kind, crate::types::OpportunityType::Arbitrage);
    }

    #[tokio::test]
    async fn scan_monotonicity_across_successive_scans() {
        let scanner = Scanner::new(Vec::new(), ScannerConfig::default());
        let r1 = scanner.scan_once().await;
        let r2 = scanner.scan_once().await;
        assert!(r2.timestamp >= r1.timestamp);
    }

    #[tokio::test]
    async fn opportunities_sorted_descending_by_profit_pct() {
        let adapters: Vec<Arc<dyn MarketSource>> = vec![
            Arc::new(FakeSource {
                venue_name: "draftkings",
                markets: vec![two_venue_market("draftkings", dec!(2.10), dec!(1.80))],
                fail: false,
            }),
            Arc::new(FakeSource {
                venue_name: "fanduel",
                markets: vec![two_venue_market("fanduel", dec!(2.05), dec!(1.95))],
                fail: false,
            }),
        ];
        let scanner = Scanner::new(adapters, ScannerConfig::default());
        let result = scanner.scan_once().await;
        let pcts: Vec<_> = result.opportunities.iter().map(|o| o.expected_profit_pct).collect();
        let mut sorted = pcts.clone();
        sorted.sort();
        sorted.reverse();
        assert_eq!(pcts, sorted);
    }

    struct CountingSubscriber {
        count: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Subscriber for CountingSubscriber {
        async fn on_scan_result(&self, _result: &ScanResult) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct PanickingSubscriber;

    #[async_trait]
    impl Subscriber for PanickingSubscriber {
        async fn on_scan_result(&self, _result: &ScanResult) {
            panic!("simulated subscriber failure");
        }
    }

    #[tokio::test]
    async fn subscribers_are_notified_and_survive_a_panicking_peer() {
        let scanner = Scanner::new(Vec::new(), ScannerConfig::default());
        let count = Arc::new(AtomicUsize::new(0));
        scanner.subscribe(Arc::new(PanickingSubscriber)).await;
        scanner
            .subscribe(Arc::new(CountingSubscriber { count: Arc::clone(&count) }))
            .await;

        scanner.scan_once().await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unsubscribe_stops_future_notifications() {
        let scanner = Scanner::new(Vec::new(), ScannerConfig::default());
        let count = Arc::new(AtomicUsize::new(0));
        let id = scanner
            .subscribe(Arc::new(CountingSubscriber { count: Arc::clone(&count) }))
            .await;
        scanner.scan_once().await;
        scanner.unsubscribe(id).await;
        scanner.scan_once().await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_adapter_list_still_publishes_empty_scan_result() {
        let scanner = Scanner::new(Vec::new(), ScannerConfig::default());
        let result = scanner.scan_once().await;
        assert_eq!(result.markets_scanned, 0);
        assert!(result.opportunities.is_empty());
    }
}
