// ============================================================================
// Structure : Alert
// ============================================================================
// Alerte "le prix passe sous un seuil", déclenchée une seule fois
//
// CONCEPTS RUST :
// 1. Enum pour un cycle de vie : Pending -> Triggered, jamais l'inverse
// 2. Newtype AlertId : évite de confondre un identifiant avec une String
// 3. Validation à la création : AlertRequest -> Result<Alert>
// ============================================================================

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{AlertError, AlertResult};

/// Identifiant unique d'une alerte (millisecondes de création + suffixe)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AlertId(String);

impl AlertId {
    /// Génère un identifiant à partir de l'instant de création
    ///
    /// Le compteur garantit l'unicité quand deux alertes sont créées
    /// dans la même milliseconde.
    pub fn generate(at: DateTime<Utc>) -> Self {
        use std::sync::atomic::{AtomicU32, Ordering};
        static COUNTER: AtomicU32 = AtomicU32::new(0);

        let seq = COUNTER.fetch_add(1, Ordering::Relaxed) % 1000;
        Self(format!("{}{:03}", at.timestamp_millis(), seq))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for AlertId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for AlertId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for AlertId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

/// État d'une alerte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertStatus {
    Pending,
    Triggered,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Pending => "pending",
            AlertStatus::Triggered => "triggered",
        }
    }
}

impl FromStr for AlertStatus {
    type Err = AlertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(AlertStatus::Pending),
            "triggered" => Ok(AlertStatus::Triggered),
            other => Err(AlertError::Storage(format!("unknown alert status '{}'", other))),
        }
    }
}

/// Une alerte enregistrée
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: AlertId,

    /// Seuil en devise d'affichage
    pub threshold_price: Decimal,

    /// Stratégie RSI cochée (affichée dans la notification)
    pub use_rsi: bool,

    /// Stratégie moyenne mobile cochée (affichée dans la notification)
    pub use_ma: bool,

    /// Destinataire de la notification (adresse email)
    pub recipient: String,

    pub created_at: DateTime<Utc>,

    pub status: AlertStatus,
}

impl Alert {
    pub fn is_pending(&self) -> bool {
        self.status == AlertStatus::Pending
    }

    /// Libellé des stratégies, ex: "RSI MA"
    pub fn strategies_label(&self) -> String {
        let mut parts = Vec::new();
        if self.use_rsi {
            parts.push("RSI");
        }
        if self.use_ma {
            parts.push("MA");
        }
        if parts.is_empty() {
            "none".to_string()
        } else {
            parts.join(" ")
        }
    }
}

/// Demande de création saisie par l'utilisateur (non validée)
///
/// Le seuil reste du texte brut : la validation numérique fait partie
/// des règles de création.
#[derive(Debug, Clone)]
pub struct AlertRequest {
    pub threshold: String,
    pub use_rsi: bool,
    pub use_ma: bool,
    pub recipient: String,
}

impl AlertRequest {
    pub fn new(threshold: impl Into<String>, recipient: impl Into<String>) -> Self {
        Self {
            threshold: threshold.into(),
            use_rsi: true,
            use_ma: true,
            recipient: recipient.into(),
        }
    }

    /// Valide la demande contre le prix spot courant (devise d'affichage)
    ///
    /// Règles :
    /// - le seuil doit être un nombre strictement positif
    /// - le seuil doit être strictement inférieur au spot
    /// - le destinataire ne peut pas être vide
    pub fn validate(self, spot: Decimal, now: DateTime<Utc>) -> AlertResult<Alert> {
        let raw = self.threshold.trim();
        let threshold = Decimal::from_str(raw)
            .map_err(|_| AlertError::invalid_alert(format!("'{}' is not a valid price", raw)))?;

        if threshold <= Decimal::ZERO {
            return Err(AlertError::invalid_alert("alert price must be positive"));
        }

        if threshold >= spot {
            return Err(AlertError::invalid_alert(format!(
                "alert price {} must be lower than the current price {}",
                threshold, spot
            )));
        }

        let recipient = self.recipient.trim();
        if recipient.is_empty() {
            return Err(AlertError::invalid_alert("recipient is required"));
        }

        Ok(Alert {
            id: AlertId::generate(now),
            threshold_price: threshold,
            use_rsi: self.use_rsi,
            use_ma: self.use_ma,
            recipient: recipient.to_string(),
            created_at: now,
            status: AlertStatus::Pending,
        })
    }
}
