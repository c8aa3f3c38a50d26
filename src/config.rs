// ============================================================================
// Module : config
// ============================================================================
// Configuration depuis les variables d'environnement (fichier .env accepté)
//
// Variables :
// - LAZYALERT_SYMBOL             (défaut : BTCUSDT)
// - LAZYALERT_BASE_CURRENCY      (défaut : usd)
// - LAZYALERT_QUOTE_CURRENCY     (défaut : inr)
// - LAZYALERT_REFRESH_SECS       (défaut : 5)
// - LAZYALERT_DISPLAY_DECIMALS   (défaut : 0)
// - LAZYALERT_DB_PATH            (défaut : <data_local_dir>/lazyalert/alerts.db)
// - LAZYALERT_LOG_DIR            (défaut : <data_local_dir>/lazyalert/logs)
// - LAZYALERT_NOTIFIER_URL       (défaut : http://localhost:5000/api/send-alert)
// - LAZYALERT_HTTP_TIMEOUT_SECS  (défaut : 10)
// - LAZYALERT_CONFIRM_ON_CREATE  (défaut : true)
// - LAZYALERT_STRICT_STRATEGIES  (défaut : false)
// - LAZYALERT_BINANCE_URL, LAZYALERT_FX_URL
// ============================================================================

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::api::{binance, fx, relay};
use crate::app::LoopSettings;
use crate::engine::TriggerPolicy;
use crate::models::Interval;

/// Configuration complète de l'application
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub symbol: String,
    pub base_currency: String,
    pub quote_currency: String,
    pub refresh_secs: u64,
    pub display_decimals: u32,
    pub db_path: PathBuf,
    pub log_dir: PathBuf,
    pub notifier_url: String,
    pub http_timeout_secs: u64,
    pub confirm_on_create: bool,
    pub strict_strategies: bool,
    pub binance_url: String,
    pub fx_url: String,
}

impl AppConfig {
    /// Charge .env (s'il existe) puis lit l'environnement
    pub fn load() -> Self {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Construit la configuration depuis une fonction de lecture
    ///
    /// CONCEPT : injection de la source
    /// - en production : std::env::var
    /// - en test : une HashMap, sans toucher à l'environnement du process
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lazyalert");

        let text = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        Self {
            symbol: text("LAZYALERT_SYMBOL", "BTCUSDT").to_uppercase(),
            base_currency: text("LAZYALERT_BASE_CURRENCY", "usd").to_lowercase(),
            quote_currency: text("LAZYALERT_QUOTE_CURRENCY", "inr").to_lowercase(),
            refresh_secs: parsed(&lookup, "LAZYALERT_REFRESH_SECS", 5u64).max(1),
            display_decimals: parsed(&lookup, "LAZYALERT_DISPLAY_DECIMALS", 0u32).min(8),
            db_path: lookup("LAZYALERT_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir.join("alerts.db")),
            log_dir: lookup("LAZYALERT_LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir.join("logs")),
            notifier_url: text("LAZYALERT_NOTIFIER_URL", relay::DEFAULT_URL),
            http_timeout_secs: parsed(&lookup, "LAZYALERT_HTTP_TIMEOUT_SECS", 10u64).max(1),
            confirm_on_create: parsed(&lookup, "LAZYALERT_CONFIRM_ON_CREATE", true),
            strict_strategies: parsed(&lookup, "LAZYALERT_STRICT_STRATEGIES", false),
            binance_url: text("LAZYALERT_BINANCE_URL", binance::DEFAULT_BASE_URL),
            fx_url: text("LAZYALERT_FX_URL", fx::DEFAULT_BASE_URL),
        }
    }

    pub fn trigger_policy(&self) -> TriggerPolicy {
        if self.strict_strategies {
            TriggerPolicy::Strict
        } else {
            TriggerPolicy::ThresholdOnly
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn loop_settings(&self) -> LoopSettings {
        LoopSettings {
            symbol: self.symbol.clone(),
            interval: Interval::D1,
            base_currency: self.base_currency.clone(),
            quote_currency: self.quote_currency.clone(),
            display_decimals: self.display_decimals,
            refresh_every: Duration::from_secs(self.refresh_secs),
        }
    }
}

/// Lit et parse une variable, valeur par défaut (avec warning) si invalide
fn parsed<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Debug,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, ?default, "Invalid configuration value, using default");
            default
        }),
    }
}
