// ============================================================================
// API Client : Binance
// ============================================================================
// Récupère les chandelles journalières et le prix spot depuis Binance
//
// CONCEPTS RUST :
// 1. async/await : programmation asynchrone (non-bloquante)
// 2. Serde : désérialisation JSON (ici des tableaux hétérogènes)
// 3. Conversion des erreurs réseau vers la taxonomie du moteur
// ============================================================================

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, info, instrument};

use crate::api::MarketDataSource;
use crate::error::{AlertError, AlertResult};
use crate::models::{Candle, CandleSeries, Interval};

pub const DEFAULT_BASE_URL: &str = "https://api.binance.com";

// ============================================================================
// Structures pour parser la réponse JSON de Binance
// ============================================================================
// Les klines sont des tableaux : [openTime, "open", "high", "low", "close",
// "volume", closeTime, ...] d'où le passage par serde_json::Value
// ============================================================================

/// Réponse de /api/v3/ticker/price
#[derive(Debug, Deserialize)]
struct TickerPrice {
    #[allow(dead_code)]
    symbol: String,
    price: String,
}

/// Client Binance (API publique, sans clé)
#[derive(Debug, Clone)]
pub struct BinanceClient {
    http: reqwest::Client,
    base_url: String,
}

impl BinanceClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn klines_url(&self, symbol: &str, interval: Interval, count: usize) -> String {
        format!(
            "{}/api/v3/klines?symbol={}&interval={}&limit={}",
            self.base_url,
            symbol,
            interval.to_binance_string(),
            count
        )
    }

    fn ticker_url(&self, symbol: &str) -> String {
        format!("{}/api/v3/ticker/price?symbol={}", self.base_url, symbol)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> AlertResult<T> {
        debug!(url = %url, "Sending HTTP request to Binance");
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| AlertError::data_unavailable(format!("binance request failed: {}", e)))?;

        let status = response.status();
        debug!(status = %status, "Received HTTP response");

        if !status.is_success() {
            error!(status = %status, "Binance returned error status");
            return Err(AlertError::data_unavailable(format!(
                "binance returned HTTP {}",
                status
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| AlertError::data_unavailable(format!("binance json: {}", e)))
    }
}

#[async_trait]
impl MarketDataSource for BinanceClient {
    #[instrument(skip(self, interval), fields(interval = %interval.to_binance_string()))]
    async fn fetch_candles(
        &self,
        symbol: &str,
        interval: Interval,
        count: usize,
    ) -> AlertResult<CandleSeries> {
        let url = self.klines_url(symbol, interval, count);
        let raw: Vec<Vec<Value>> = self.get_json(&url).await?;

        let series = parse_klines(raw, symbol, interval, Utc::now())?;
        info!(candles = series.len(), forming = series.last_forming(), "Fetched klines");
        Ok(series)
    }

    #[instrument(skip(self))]
    async fn fetch_spot(&self, symbol: &str) -> AlertResult<Decimal> {
        let ticker: TickerPrice = self.get_json(&self.ticker_url(symbol)).await?;
        let price = parse_decimal(&Value::String(ticker.price))?;
        debug!(price = %price, "Fetched spot price");
        Ok(price)
    }
}

/// Convertit les klines brutes en CandleSeries
///
/// La dernière chandelle est marquée "en formation" si son heure de
/// clôture est dans le futur par rapport à `now`.
fn parse_klines(
    raw: Vec<Vec<Value>>,
    symbol: &str,
    interval: Interval,
    now: DateTime<Utc>,
) -> AlertResult<CandleSeries> {
    let mut candles = Vec::with_capacity(raw.len());
    let mut last_close_time = None;

    for row in &raw {
        if row.len() < 7 {
            return Err(AlertError::data_unavailable(format!(
                "kline row has {} fields, expected at least 7",
                row.len()
            )));
        }

        let open_time = parse_millis(&row[0])?;
        candles.push(Candle::new(
            open_time,
            parse_decimal(&row[1])?,
            parse_decimal(&row[2])?,
            parse_decimal(&row[3])?,
            parse_decimal(&row[4])?,
        ));
        last_close_time = Some(parse_millis(&row[6])?);
    }

    let forming = last_close_time.map(|t| t > now).unwrap_or(false);
    if forming {
        CandleSeries::new(symbol.to_string(), interval, candles)
    } else {
        CandleSeries::closed(symbol.to_string(), interval, candles)
    }
}

fn parse_decimal(value: &Value) -> AlertResult<Decimal> {
    match value {
        Value::String(s) => Decimal::from_str(s)
            .map_err(|e| AlertError::data_unavailable(format!("invalid price '{}': {}", s, e))),
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .map_err(|e| AlertError::data_unavailable(format!("invalid price '{}': {}", n, e))),
        other => Err(AlertError::data_unavailable(format!(
            "expected a price, got {}",
            other
        ))),
    }
}

fn parse_millis(value: &Value) -> AlertResult<DateTime<Utc>> {
    value
        .as_i64()
        .and_then(DateTime::from_timestamp_millis)
        .ok_or_else(|| AlertError::data_unavailable(format!("invalid timestamp {}", value)))
}

// ============================================================================
// Tests unitaires
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use serde_json::json;

    const DAY_MS: i64 = 86_400_000;

    fn kline(open_ms: i64, close: &str) -> Vec<Value> {
        json!([open_ms, "100.00", "110.50", "95.25", close, "12.5", open_ms + DAY_MS - 1, "0"])
            .as_array()
            .cloned()
            .unwrap()
    }

    #[test]
    fn test_urls() {
        let client = BinanceClient::new(reqwest::Client::new(), "https://api.binance.com/");
        assert_eq!(
            client.klines_url("BTCUSDT", Interval::D1, 14),
            "https://api.binance.com/api/v3/klines?symbol=BTCUSDT&interval=1d&limit=14"
        );
        assert!(client.ticker_url("BTCUSDT").ends_with("/api/v3/ticker/price?symbol=BTCUSDT"));
    }

    #[test]
    fn test_parse_klines_marks_forming_candle() {
        let start = 1_700_000_000_000;
        let raw = vec![kline(start, "101.1"), kline(start + DAY_MS, "102.2")];
        let now = Utc.timestamp_millis_opt(start + DAY_MS + 1000).unwrap();

        let series = parse_klines(raw, "BTCUSDT", Interval::D1, now).unwrap();
        assert_eq!(series.len(), 2);
        assert!(series.last_forming());
        assert_eq!(series.candles()[1].close, dec!(102.2));
        assert_eq!(series.candles()[0].low, dec!(95.25));
    }

    #[test]
    fn test_parse_klines_all_closed() {
        let start = 1_700_000_000_000;
        let raw = vec![kline(start, "101.1"), kline(start + DAY_MS, "102.2")];
        let now = Utc.timestamp_millis_opt(start + 3 * DAY_MS).unwrap();

        let series = parse_klines(raw, "BTCUSDT", Interval::D1, now).unwrap();
        assert!(!series.last_forming());
    }

    #[test]
    fn test_parse_klines_rejects_garbage() {
        let raw = vec![kline(1_700_000_000_000, "not-a-number")];
        assert!(matches!(
            parse_klines(raw, "BTCUSDT", Interval::D1, Utc::now()),
            Err(AlertError::DataUnavailable(_))
        ));

        let short = vec![vec![json!(1), json!("2")]];
        assert!(parse_klines(short, "BTCUSDT", Interval::D1, Utc::now()).is_err());
    }

    #[test]
    fn test_parse_decimal_accepts_numbers() {
        assert_eq!(parse_decimal(&json!("64000.12")).unwrap(), dec!(64000.12));
        assert_eq!(parse_decimal(&json!(83)).unwrap(), dec!(83));
        assert!(parse_decimal(&json!(null)).is_err());
    }
}
