//! arb-intel — cross-market odds intelligence engine.
//!
//! Entry point. Loads configuration, initializes structured logging,
//! wires up the enabled ingestion adapters, and runs the scan loop with
//! graceful shutdown on Ctrl+C (§5).

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use rust_decimal::prelude::*;
use tracing::info;

use arb_intel::config::{self, AdapterEntry, AppConfig};
use arb_intel::dashboard;
use arb_intel::engine::arbitrage::ArbConfig;
use arb_intel::engine::ev::EvConfig;
use arb_intel::engine::scanner::{Scanner, ScannerConfig};
use arb_intel::platforms::{
    betfair::BetfairClient, kalshi::KalshiClient, manifold::ManifoldClient,
    polymarket::PolymarketClient, predictit::PredictItClient, sportsbooks::SportsbooksClient,
    MarketSource,
};

const BANNER: &str = r#"
   _    ____  ____       ___ _   _ _____ _____ _
  / \  |  _ \| __ )     |_ _| \ | |_   _| ____| |
 / _ \ | |_) |  _ \ _____| ||  \| | | | |  _| | |
/ ___ \|  _ <| |_) |_____| || |\  | | | | |___| |___
/_/   \_\_| \_\____/     |___|_| \_| |_| |_____|_____|

  Cross-market odds arbitrage and expected-value intelligence engine
"#;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenv::dotenv();

    let cfg = AppConfig::load("config.toml")?;
    init_logging();

    println!("{BANNER}");
    info!(
        scan_interval_secs = cfg.scan.scan_interval_secs,
        min_arbitrage_profit_pct = cfg.scan.min_arbitrage_profit_pct,
        min_ev_pct = cfg.scan.min_ev_pct,
        default_stake_usd = cfg.scan.default_stake_usd,
        "arb-intel starting up"
    );

    let adapters = build_adapters(&cfg.adapters);
    info!(adapter_count = adapters.len(), "adapters enabled");

    let scanner_config = ScannerConfig {
        scan_interval: Duration::from_secs(cfg.scan.scan_interval_secs),
        match_threshold: cfg.scan.match_threshold,
        arb: ArbConfig {
            min_arbitrage_profit_pct: decimal_from_f64(cfg.scan.min_arbitrage_profit_pct),
            default_stake_usd: decimal_from_f64(cfg.scan.default_stake_usd),
        },
        ev: EvConfig {
            min_ev_pct: decimal_from_f64(cfg.scan.min_ev_pct),
            default_stake_usd: decimal_from_f64(cfg.scan.default_stake_usd),
        },
    };
    let scanner = Arc::new(Scanner::new(adapters, scanner_config));

    if cfg.dashboard.enabled {
        let dashboard_scanner = Arc::clone(&scanner);
        let port = cfg.dashboard.port;
        tokio::spawn(async move {
            if let Err(err) = dashboard::serve(dashboard_scanner, port).await {
                tracing::error!(error = %err, "dashboard server exited with an error");
            }
        });
        info!(port, "dashboard listening");
    }

    let (stop_tx, stop_rx) = tokio::sync::watch::channel(false);
    let scan_scanner = Arc::clone(&scanner);
    let scan_task = tokio::spawn(async move { scan_scanner.run(stop_rx).await });

    info!("entering scan loop. press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received, finishing the in-flight cycle before exiting...");
    let _ = stop_tx.send(true);
    let _ = scan_task.await;

    info!("arb-intel shut down cleanly.");
    Ok(())
}

/// Construct one `MarketSource` per enabled adapter entry, resolving each
/// adapter's optional credential from its configured env var.
fn build_adapters(adapters: &config::AdaptersConfig) -> Vec<Arc<dyn MarketSource>> {
    let mut sources: Vec<Arc<dyn MarketSource>> = Vec::new();

    if adapters.polymarket.enabled {
        sources.push(Arc::new(PolymarketClient::new()));
    }
    if adapters.kalshi.enabled {
        sources.push(Arc::new(KalshiClient::new()));
    }
    if adapters.manifold.enabled {
        sources.push(Arc::new(ManifoldClient::new(resolve_credential(&adapters.manifold))));
    }
    if adapters.predictit.enabled {
        sources.push(Arc::new(PredictItClient::new()));
    }
    if adapters.betfair.enabled {
        sources.push(Arc::new(BetfairClient::new(resolve_credential(&adapters.betfair))));
    }
    if adapters.sportsbooks.enabled {
        match resolve_credential(&adapters.sportsbooks) {
            Some(key) => sources.push(Arc::new(SportsbooksClient::new(key))),
            None => tracing::warn!("sportsbooks adapter enabled but no api key configured, skipping"),
        }
    }

    sources
}

fn resolve_credential(entry: &AdapterEntry) -> Option<String> {
    AppConfig::resolve_optional_credential(entry)
}

fn decimal_from_f64(val: f64) -> rust_decimal::Decimal {
    rust_decimal::Decimal::from_f64_retain(val).unwrap_or(rust_decimal::Decimal::ZERO)
}

/// Initialize the `tracing` subscriber.
///
/// - In development, uses human-readable pretty format.
/// - When `ARB_INTEL_LOG_JSON` is set, uses structured JSON logging to
///   stdout instead.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("arb_intel=info"));

    if std::env::var("ARB_INTEL_LOG_JSON").is_ok() {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .init();
    } else {
        fmt().with_env_filter(env_filter).with_target(true).init();
    }
}
