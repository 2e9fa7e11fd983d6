//! Ingestion adapters (§4.5).
//!
//! Each adapter implements `MarketSource`: one async `fetch()` that never
//! propagates an error. Source-unavailable and malformed-record failures
//! are classified and logged at the point of catch; the adapter degrades
//! to an empty list rather than poisoning the scan cycle (§7, §9).

pub mod betfair;
pub mod canon;
pub mod kalshi;
pub mod manifold;
pub mod polymarket;
pub mod predictit;
pub mod sportsbooks;

use async_trait::async_trait;

use crate::types::Market;

#[async_trait]
pub trait MarketSource: Send + Sync {
    /// Adapter name, used for snapshot keys, logging, and `/api/sources`.
    fn name(&self) -> &str;

    /// Fetch this venue's currently active markets. Never raises: any
    /// HTTP, parse, or validation failure is caught internally and
    /// results in an empty list.
    async fn fetch(&self) -> Vec<Market>;
}
