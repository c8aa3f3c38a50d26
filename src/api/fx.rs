// ============================================================================
// API Client : taux de change
// ============================================================================
// Récupère le taux base -> quote depuis la currency-api publiée sur jsDelivr
// Format : GET /v1/currencies/usd.json -> { "date": "...", "usd": { "inr": 83.1 } }
// ============================================================================

use std::str::FromStr;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::{debug, error, instrument};

use crate::api::RateSource;
use crate::error::{AlertError, AlertResult};

pub const DEFAULT_BASE_URL: &str = "https://cdn.jsdelivr.net/npm/@fawazahmed0/currency-api@latest";

#[derive(Debug, Clone)]
pub struct FxRateClient {
    http: reqwest::Client,
    base_url: String,
}

impl FxRateClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn rates_url(&self, base: &str) -> String {
        format!("{}/v1/currencies/{}.json", self.base_url, base.to_lowercase())
    }
}

#[async_trait]
impl RateSource for FxRateClient {
    #[instrument(skip(self))]
    async fn fetch_rate(&self, base: &str, quote: &str) -> AlertResult<Decimal> {
        // Même devise : pas d'appel réseau
        if base.eq_ignore_ascii_case(quote) {
            return Ok(Decimal::ONE);
        }

        let url = self.rates_url(base);
        debug!(url = %url, "Fetching conversion rate");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| AlertError::data_unavailable(format!("fx request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            error!(status = %status, "Currency API returned error status");
            return Err(AlertError::data_unavailable(format!("fx api returned HTTP {}", status)));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| AlertError::data_unavailable(format!("fx json: {}", e)))?;

        let rate = extract_rate(&body, base, quote)?;
        debug!(rate = %rate, "Fetched conversion rate");
        Ok(rate)
    }
}

/// Lit `body[base][quote]` et vérifie que le taux est strictement positif
fn extract_rate(body: &Value, base: &str, quote: &str) -> AlertResult<Decimal> {
    let base = base.to_lowercase();
    let quote = quote.to_lowercase();

    let raw = body
        .get(&base)
        .and_then(|rates| rates.get(&quote))
        .ok_or_else(|| AlertError::data_unavailable(format!("no {}/{} rate in response", base, quote)))?;

    let rate = match raw {
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        Value::String(s) => Decimal::from_str(s).ok(),
        _ => None,
    }
    .filter(|r| *r > Decimal::ZERO)
    .ok_or_else(|| AlertError::data_unavailable(format!("invalid {}/{} rate: {}", base, quote, raw)))?;

    Ok(rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_rates_url() {
        let client = FxRateClient::new(reqwest::Client::new(), "https://example.org/api/");
        assert_eq!(client.rates_url("USD"), "https://example.org/api/v1/currencies/usd.json");
    }

    #[test]
    fn test_extract_rate() {
        let body = json!({ "date": "2024-05-01", "usd": { "inr": 83.42, "eur": 0.93 } });
        assert_eq!(extract_rate(&body, "usd", "inr").unwrap(), dec!(83.42));
        assert_eq!(extract_rate(&body, "USD", "EUR").unwrap(), dec!(0.93));
    }

    #[test]
    fn test_extract_rate_missing_or_invalid() {
        let body = json!({ "usd": { "inr": 0 } });
        assert!(extract_rate(&body, "usd", "inr").is_err());
        assert!(extract_rate(&body, "usd", "gbp").is_err());
    }

    #[tokio::test]
    async fn test_same_currency_needs_no_request() {
        let client = FxRateClient::new(reqwest::Client::new(), "http://127.0.0.1:9");
        assert_eq!(client.fetch_rate("usd", "USD").await.unwrap(), Decimal::ONE);
    }
}
