// ============================================================================
// Module : api
// ============================================================================
// Contrats des collaborateurs externes du moteur et leurs implémentations
// HTTP (Binance, API de change, relais mail).
//
// CONCEPT RUST : Traits comme interfaces
// - La RefreshLoop ne connaît que les traits
// - Les tests branchent des implémentations en mémoire
// ============================================================================

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::error::AlertResult;
use crate::models::{CandleSeries, Interval};

pub mod binance; // Chandelles + prix spot (Binance)
pub mod fx;      // Taux de change (jsDelivr currency-api)
pub mod relay;   // Notification via le relais mail HTTP

pub use binance::BinanceClient;
pub use fx::FxRateClient;
pub use relay::RelayNotifier;

/// Source de données de marché
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Récupère les `count` chandelles les plus récentes, plus ancienne en premier
    async fn fetch_candles(
        &self,
        symbol: &str,
        interval: Interval,
        count: usize,
    ) -> AlertResult<CandleSeries>;

    /// Récupère le prix spot courant (devise de base)
    async fn fetch_spot(&self, symbol: &str) -> AlertResult<Decimal>;
}

/// Source du taux de conversion
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Taux tel que `montant_quote = montant_base * taux`
    async fn fetch_rate(&self, base: &str, quote: &str) -> AlertResult<Decimal>;
}

/// Délivre une notification à un destinataire
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> AlertResult<()>;
}

/// Construit le client HTTP partagé avec un timeout borné
///
/// Un appel bloqué retarde simplement le tick suivant : c'est le timeout
/// du client qui borne la durée d'un cycle.
pub fn http_client(timeout: std::time::Duration) -> AlertResult<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("lazyalert/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()
        .map_err(|e| crate::error::AlertError::data_unavailable(format!("http client: {}", e)))
}
