// ============================================================================
// Module : message
// ============================================================================
// Sujet et corps des notifications (création et déclenchement d'alerte)
// ============================================================================

use rust_decimal::Decimal;

use crate::engine::round_display;
use crate::models::{Alert, Indicators};

pub const SUBJECT_TRIGGERED: &str = "Crypto Alert Triggered";
pub const SUBJECT_CREATED: &str = "Crypto Alert Set";

fn money(value: Decimal, currency: &str) -> String {
    format!("{} {}", currency.to_uppercase(), value.normalize())
}

/// Notification de déclenchement : spot, seuil, stratégies et indicateurs
pub fn triggered(alert: &Alert, indicators: &Indicators, currency: &str) -> (String, String) {
    let body = format!(
        "Your price alert has been triggered.\n\
         Current price: {}\n\
         Alert price: {}\n\
         Strategies: {}\n\
         RSI (14): {} ({})\n\
         7-day average: {}\n\
         24h change: {}%",
        money(indicators.spot, currency),
        money(alert.threshold_price, currency),
        alert.strategies_label(),
        round_display(indicators.rsi14, 2),
        indicators.rsi_zone().label(),
        money(round_display(indicators.sma7, 2), currency),
        indicators.change24h,
    );

    (SUBJECT_TRIGGERED.to_string(), body)
}

/// Confirmation envoyée à la création de l'alerte
pub fn created(alert: &Alert, currency: &str) -> (String, String) {
    let body = format!(
        "Your alert has been set with the following details:\n\
         Price Alert: {}\n\
         Strategies: {}\n\
         Alert ID: {}",
        money(alert.threshold_price, currency),
        alert.strategies_label(),
        alert.id,
    );

    (SUBJECT_CREATED.to_string(), body)
}
