// ============================================================================
// Structure : Indicators
// ============================================================================
// Instantané des indicateurs dérivés d'une CandleSeries
//
// Recalculé en entier à chaque rafraîchissement, jamais modifié sur place.
// Les prix sont en devise d'affichage, sauf rsi14 et change24h qui sont
// sans unité.
// ============================================================================

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Zone du RSI (lecture classique 30 / 70)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RsiZone {
    /// RSI < 30
    Oversold,
    /// 30 <= RSI <= 70
    Neutral,
    /// RSI > 70
    Overbought,
}

impl RsiZone {
    pub fn from_rsi(rsi: Decimal) -> Self {
        if rsi < dec!(30) {
            RsiZone::Oversold
        } else if rsi > dec!(70) {
            RsiZone::Overbought
        } else {
            RsiZone::Neutral
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RsiZone::Oversold => "Oversold",
            RsiZone::Neutral => "Neutral",
            RsiZone::Overbought => "Overbought",
        }
    }
}

/// Indicateurs calculés par l'IndicatorEngine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Indicators {
    /// RSI 14 périodes, dans [0, 100], non arrondi
    pub rsi14: Decimal,

    /// Moyenne des 7 dernières clôtures (converties et arrondies une à une)
    pub sma7: Decimal,

    /// Plus bas de la fenêtre (devise d'affichage)
    pub window_low: Decimal,

    /// Plus haut de la fenêtre (devise d'affichage)
    pub window_high: Decimal,

    /// Variation spot vs clôture de la veille, en %, arrondie à 2 décimales
    pub change24h: Decimal,

    /// Prix spot converti et arrondi
    pub spot: Decimal,

    /// Ouverture de la dernière chandelle (devise d'affichage)
    pub open: Decimal,

    /// Les 7 dernières clôtures en devise d'affichage (mini-graphique)
    pub price_history: Vec<Decimal>,

    /// Taux de conversion utilisé pour ce calcul
    pub rate: Decimal,
}

impl Indicators {
    pub fn rsi_zone(&self) -> RsiZone {
        RsiZone::from_rsi(self.rsi14)
    }

    /// Le spot est-il sous la moyenne 7 jours ?
    pub fn below_sma7(&self) -> bool {
        self.spot < self.sma7
    }

    /// Indication d'achat : RSI survendu, spot sous la moyenne, ou chute > 5%
    pub fn is_good_time_to_buy(&self) -> bool {
        self.rsi_zone() == RsiZone::Oversold || self.below_sma7() || self.change24h < dec!(-5)
    }
}
