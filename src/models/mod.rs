// ============================================================================
// Module : models
// ============================================================================
// Ce module contient toutes les structures de données du moteur
// ============================================================================

pub mod alert;      // Alertes et validation à la création
pub mod candle;     // Chandelles OHLC et série de 14 jours
pub mod indicators; // Instantané des indicateurs dérivés

// Re-export des structures principales pour simplifier les imports
pub use alert::{Alert, AlertId, AlertRequest, AlertStatus};
pub use candle::{Candle, CandleSeries, Interval, WINDOW};
pub use indicators::{Indicators, RsiZone};
