// ============================================================================
// Structures : Candle et CandleSeries
// ============================================================================
// Représente les chandelles japonaises (OHLC) d'un actif unique
//
// CONCEPTS RUST :
// 1. DateTime<Utc> : type de chrono pour dates avec timezone UTC
// 2. Decimal : arithmétique décimale exacte pour les prix (rust_decimal)
// 3. Invariants vérifiés à la construction (timestamps strictement croissants)
// ============================================================================

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{AlertError, AlertResult};

/// Taille de la fenêtre d'indicateurs (14 chandelles journalières)
pub const WINDOW: usize = 14;

/// Intervalle de temps entre les chandelles
///
/// Les indicateurs sont journaliers : la fenêtre de 14 chandelles couvre
/// 14 jours et la variation "24h" compare à la clôture de la veille.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Interval {
    /// 1 jour (daily)
    #[default]
    D1,
}

impl Interval {
    /// Convertit l'intervalle en string pour l'API Binance
    pub fn to_binance_string(&self) -> &'static str {
        match self {
            Interval::D1 => "1d",
        }
    }
}

/// Une chandelle japonaise, immuable une fois récupérée
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Timestamp d'ouverture de la chandelle
    pub timestamp: DateTime<Utc>,

    /// Prix d'ouverture (Open)
    pub open: Decimal,

    /// Prix le plus haut (High)
    pub high: Decimal,

    /// Prix le plus bas (Low)
    pub low: Decimal,

    /// Prix de clôture (Close)
    pub close: Decimal,
}

impl Candle {
    pub fn new(
        timestamp: DateTime<Utc>,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
        }
    }
}

/// Fenêtre ordonnée de chandelles pour un actif et un intervalle
///
/// CONCEPT : Invariants à la construction
/// - timestamps strictement croissants (plus ancienne en premier)
/// - la longueur n'est PAS vérifiée ici : une série courte est "pas prête",
///   c'est l'IndicatorEngine qui la refuse avec InsufficientData
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandleSeries {
    /// Symbole de l'actif (ex: "BTCUSDT")
    pub symbol: String,

    /// Intervalle entre les chandelles
    pub interval: Interval,

    candles: Vec<Candle>,

    /// true si la dernière chandelle est encore en formation
    /// (données live : la chandelle du jour n'est pas clôturée)
    last_forming: bool,
}

impl CandleSeries {
    /// Crée une série dont la dernière chandelle est en formation (données live)
    pub fn new(symbol: String, interval: Interval, candles: Vec<Candle>) -> AlertResult<Self> {
        Self::build(symbol, interval, candles, true)
    }

    /// Crée une série composée uniquement de chandelles clôturées
    pub fn closed(symbol: String, interval: Interval, candles: Vec<Candle>) -> AlertResult<Self> {
        Self::build(symbol, interval, candles, false)
    }

    fn build(
        symbol: String,
        interval: Interval,
        candles: Vec<Candle>,
        last_forming: bool,
    ) -> AlertResult<Self> {
        // CONCEPT RUST : windows(2) pour comparer les voisins deux à deux
        if let Some(pair) = candles
            .windows(2)
            .find(|w| w[1].timestamp <= w[0].timestamp)
        {
            return Err(AlertError::data_unavailable(format!(
                "candles not strictly increasing at {}",
                pair[1].timestamp
            )));
        }

        Ok(Self {
            symbol,
            interval,
            candles,
            last_forming,
        })
    }

    /// Retourne le nombre de chandelles
    pub fn len(&self) -> usize {
        self.candles.len()
    }

    /// Vérifie si la série est vide
    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    /// Vrai si la série contient au moins `WINDOW` chandelles
    pub fn is_ready(&self) -> bool {
        self.candles.len() >= WINDOW
    }

    /// Vrai si la dernière chandelle n'est pas encore clôturée
    pub fn last_forming(&self) -> bool {
        self.last_forming
    }

    /// Accès en lecture aux chandelles
    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    /// Retourne la chandelle la plus récente
    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    /// Prix de clôture dans l'ordre chronologique
    pub fn closes(&self) -> Vec<Decimal> {
        self.candles.iter().map(|c| c.close).collect()
    }

    /// Clôture de la veille : avant-dernière chandelle si la dernière est en
    /// formation, sinon la dernière
    pub fn previous_close(&self) -> Option<Decimal> {
        let offset = if self.last_forming { 2 } else { 1 };
        let index = self.candles.len().checked_sub(offset)?;
        self.candles.get(index).map(|c| c.close)
    }
}

// ============================================================================
// Tests unitaires
// ============================================================================
