//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` (if present) and deserializes into strongly-typed
//! structs; every field has a documented default so a missing file — or a
//! file missing a table — never blocks booting (§10.3). Secrets (API
//! keys) are referenced by env-var name in the config and resolved at
//! runtime via `std::env::var`, never written into the file itself.

use std::fs;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::EngineError;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AppConfig {
    pub scan: ScanConfig,
    pub adapters: AdaptersConfig,
    pub dashboard: DashboardConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            scan: ScanConfig::default(),
            adapters: AdaptersConfig::default(),
            dashboard: DashboardConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ScanConfig {
    pub scan_interval_secs: u64,
    pub min_arbitrage_profit_pct: f64,
    pub min_ev_pct: f64,
    pub default_stake_usd: f64,
    pub match_threshold: f64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            scan_interval_secs: 2,
            min_arbitrage_profit_pct: 0.1,
            min_ev_pct: 3.0,
            default_stake_usd: 1000.0,
            match_threshold: crate::engine::matcher::DEFAULT_THRESHOLD,
        }
    }
}

/// Per-venue enable flag plus the env-var name holding that venue's
/// credential, if it needs one. `main` resolves the env var at startup;
/// the config file never carries a secret value itself.
#[derive(Debug, Deserialize, Clone)]
pub struct AdapterEntry {
    pub enabled: bool,
    #[serde(default)]
    pub api_key_env: Option<String>,
}

impl Default for AdapterEntry {
    fn default() -> Self {
        Self { enabled: true, api_key_env: None }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AdaptersConfig {
    pub polymarket: AdapterEntry,
    pub kalshi: AdapterEntry,
    pub manifold: AdapterEntry,
    pub predictit: AdapterEntry,
    pub betfair: AdapterEntry,
    pub sportsbooks: AdapterEntry,
}

impl Default for AdaptersConfig {
    fn default() -> Self {
        Self {
            polymarket: AdapterEntry { enabled: true, api_key_env: None },
            kalshi: AdapterEntry { enabled: true, api_key_env: None },
            manifold: AdapterEntry { enabled: true, api_key_env: Some("MANIFOLD_API_KEY".into()) },
            predictit: AdapterEntry { enabled: true, api_key_env: None },
            betfair: AdapterEntry { enabled: false, api_key_env: Some("BETFAIR_API_KEY".into()) },
            sportsbooks: AdapterEntry { enabled: false, api_key_env: Some("ODDS_API_KEY".into()) },
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DashboardConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self { enabled: true, port: 7878 }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file. A missing file is not an
    /// error: the caller gets `AppConfig::default()` instead, since
    /// every field already has a sane default (§10.3).
    pub fn load(path: &str) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(contents) => {
                let config: AppConfig = toml::from_str(&contents)
                    .with_context(|| format!("failed to parse config file: {path}"))?;
                config.validate()?;
                Ok(config)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path, "no config file found, using defaults");
                Ok(Self::default())
            }
            Err(err) => Err(err).with_context(|| format!("failed to read config file: {path}")),
        }
    }

    /// Reject configuration values that would make the engine's math
    /// meaningless rather than letting them silently produce garbage
    /// opportunities at runtime.
    fn validate(&self) -> Result<()> {
        if self.scan.default_stake_usd <= 0.0 {
            return Err(EngineError::Configuration("default_stake_usd must be positive".into()).into());
        }
        if !(0.0..=100.0).contains(&self.scan.min_arbitrage_profit_pct) {
            return Err(EngineError::Configuration(
                "min_arbitrage_profit_pct must be within [0, 100]".into(),
            )
            .into());
        }
        if !(0.0..1.0).contains(&self.scan.match_threshold) {
            return Err(EngineError::Configuration("match_threshold must be within [0, 1)".into()).into());
        }
        if self.scan.scan_interval_secs == 0 {
            return Err(EngineError::Configuration("scan_interval_secs must be nonzero".into()).into());
        }
        Ok(())
    }

    /// Resolve an environment variable name to its value. Used for
    /// secrets referenced by name in the config, e.g. `api_key_env`.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name).with_context(|| format!("environment variable not set: {env_name}"))
    }

    /// Resolve an adapter entry's credential if it names one, returning
    /// `None` when the adapter has no credential requirement or the env
    /// var is unset — callers treat a missing optional credential as
    /// "run unauthenticated" rather than a fatal error.
    pub fn resolve_optional_credential(entry: &AdapterEntry) -> Option<String> {
        entry.api_key_env.as_deref().and_then(|name| std::env::var(name).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = AppConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.scan.scan_interval_secs, 2);
        assert!(cfg.adapters.polymarket.enabled);
        assert!(!cfg.adapters.betfair.enabled);
    }

    #[test]
    fn load_missing_file_falls_back_to_defaults() {
        let cfg = AppConfig::load("/nonexistent/path/config.toml").unwrap();
        assert_eq!(cfg.scan.default_stake_usd, 1000.0);
    }

    #[test]
    fn negative_stake_is_rejected() {
        let mut cfg = AppConfig::default();
        cfg.scan.default_stake_usd = -5.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn out_of_range_profit_threshold_is_rejected() {
        let mut cfg = AppConfig::default();
        cfg.scan.min_arbitrage_profit_pct = 150.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn parses_toml_overriding_defaults() {
        let toml_str = r#"
            [scan]
            scan_interval_secs = 5
            min_ev_pct = 4.5

            [adapters.betfair]
            enabled = true
            api_key_env = "BETFAIR_API_KEY"

            [dashboard]
            enabled = false
            port = 9000
        "#;
        let cfg: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.scan.scan_interval_secs, 5);
        assert_eq!(cfg.scan.min_ev_pct, 4.5);
        assert!(cfg.adapters.betfair.enabled);
        assert!(!cfg.dashboard.enabled);
        assert_eq!(cfg.dashboard.port, 9000);
        // Fields not mentioned in the TOML still take their defaults.
        assert_eq!(cfg.scan.default_stake_usd, 1000.0);
        assert!(cfg.adapters.polymarket.enabled);
    }
}
