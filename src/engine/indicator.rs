// ============================================================================
// IndicatorEngine
// ============================================================================
// Transforme une CandleSeries + un prix spot en instantané Indicators
//
// Algorithme (fenêtre de 14 chandelles) :
// 1. RSI 14 : moyenne SIMPLE des gains / pertes sur les 13 différences
//    (pas de lissage de Wilder), epsilon 0.01 si une moyenne est nulle
// 2. SMA 7 : clôtures converties ET arrondies une à une, puis moyennées
// 3. Plus bas / plus haut de la fenêtre, convertis
// 4. Variation 24h : spot vs clôture de la veille, arrondie à 2 décimales
// ============================================================================

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{debug, instrument};

use crate::engine::convert::{convert_display, round_display};
use crate::error::{AlertError, AlertResult};
use crate::models::{CandleSeries, Indicators, WINDOW};

/// Nombre de clôtures de la moyenne mobile
pub const SMA_PERIOD: usize = 7;

/// Plancher des moyennes de gains / pertes (évite la division par zéro)
const EPSILON: Decimal = dec!(0.01);

/// Moteur de calcul des indicateurs
#[derive(Debug, Clone, Copy)]
pub struct IndicatorEngine {
    /// Décimales de la devise d'affichage (0 = entier le plus proche)
    display_decimals: u32,
}

impl IndicatorEngine {
    pub fn new(display_decimals: u32) -> Self {
        Self { display_decimals }
    }

    /// Calcule les indicateurs
    ///
    /// # Arguments
    /// * `series` - au moins `WINDOW` chandelles, prix en devise de base
    /// * `spot` - prix spot courant en devise de base
    /// * `rate` - taux de conversion base -> affichage
    ///
    /// # Erreurs
    /// * `InsufficientData` si la série est trop courte (jamais de calcul partiel)
    /// * `DataUnavailable` si le taux ou la clôture de la veille sont inexploitables
    #[instrument(skip(self, series), fields(symbol = %series.symbol, candles = series.len()))]
    pub fn compute(
        &self,
        series: &CandleSeries,
        spot: Decimal,
        rate: Decimal,
    ) -> AlertResult<Indicators> {
        if !series.is_ready() {
            return Err(AlertError::InsufficientData {
                required: WINDOW,
                actual: series.len(),
            });
        }

        if rate <= Decimal::ZERO {
            return Err(AlertError::data_unavailable(format!(
                "conversion rate must be positive, got {}",
                rate
            )));
        }

        // Seules les WINDOW dernières chandelles comptent
        let window = &series.candles()[series.len() - WINDOW..];
        let closes: Vec<Decimal> = window.iter().map(|c| c.close).collect();

        let rsi14 = rsi(&closes);

        let price_history: Vec<Decimal> = closes[closes.len() - SMA_PERIOD..]
            .iter()
            .map(|&c| convert_display(c, rate, self.display_decimals))
            .collect();
        let sma7 = mean(&price_history);

        // CONCEPT RUST : Iterator::min / max sur Decimal (Ord, pas de partial_cmp)
        let low = window.iter().map(|c| c.low).min().unwrap_or_default();
        let high = window.iter().map(|c| c.high).max().unwrap_or_default();

        let previous_close = series
            .previous_close()
            .filter(|c| !c.is_zero())
            .ok_or_else(|| AlertError::data_unavailable("previous close is missing or zero"))?;
        let change24h = round_display((spot - previous_close) / previous_close * dec!(100), 2);

        let open = window.last().map(|c| c.open).unwrap_or_default();

        let indicators = Indicators {
            rsi14,
            sma7,
            window_low: convert_display(low, rate, self.display_decimals),
            window_high: convert_display(high, rate, self.display_decimals),
            change24h,
            spot: convert_display(spot, rate, self.display_decimals),
            open: convert_display(open, rate, self.display_decimals),
            price_history,
            rate,
        };

        debug!(
            rsi = %indicators.rsi14,
            sma7 = %indicators.sma7,
            change24h = %indicators.change24h,
            "Indicators computed"
        );

        Ok(indicators)
    }
}

impl Default for IndicatorEngine {
    fn default() -> Self {
        Self::new(0)
    }
}

/// RSI à moyenne simple sur toutes les différences successives
///
/// Un marché plat donne epsilon / epsilon = 1, donc RSI = 50.
pub fn rsi(closes: &[Decimal]) -> Decimal {
    let diffs: Vec<Decimal> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    if diffs.is_empty() {
        return dec!(50);
    }

    let n = Decimal::from(diffs.len());
    let gains: Decimal = diffs.iter().map(|d| (*d).max(Decimal::ZERO)).sum();
    let losses: Decimal = diffs.iter().map(|d| (-*d).max(Decimal::ZERO)).sum();

    let avg_gain = floor_epsilon(gains / n);
    let avg_loss = floor_epsilon(losses / n);

    let rs = avg_gain / avg_loss;
    dec!(100) - dec!(100) / (Decimal::ONE + rs)
}

fn floor_epsilon(value: Decimal) -> Decimal {
    if value.is_zero() {
        EPSILON
    } else {
        value
    }
}

fn mean(values: &[Decimal]) -> Decimal {
    if values.is_empty() {
        return Decimal::ZERO;
    }
    values.iter().sum::<Decimal>() / Decimal::from(values.len())
}

// ============================================================================
// Tests unitaires
// ============================================================================
