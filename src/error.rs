// ============================================================================
// Module : error
// ============================================================================
// Taxonomie des erreurs du moteur d'indicateurs et d'alertes
//
// Aucune de ces erreurs n'est fatale : un cycle de rafraîchissement qui
// échoue conserve le dernier état valide et réessaie au tick suivant.
// Seule InvalidAlert remonte directement à l'appelant (création d'alerte).
// ============================================================================

use thiserror::Error;

/// Erreurs du moteur
#[derive(Debug, Error)]
pub enum AlertError {
    /// Échec réseau ou parsing sur une source de données
    #[error("data unavailable: {0}")]
    DataUnavailable(String),

    /// Série de chandelles plus courte que la fenêtre requise
    #[error("insufficient data: need {required} candles, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    /// La notification n'a pas pu être délivrée (l'alerte reste Pending)
    #[error("notification failed: {0}")]
    NotificationFailure(String),

    /// Validation à la création (seuil >= prix spot, seuil non numérique, ...)
    #[error("invalid alert: {0}")]
    InvalidAlert(String),

    /// Échec du stockage des alertes
    #[error("alert store error: {0}")]
    Storage(String),
}

impl AlertError {
    pub fn data_unavailable(msg: impl Into<String>) -> Self {
        AlertError::DataUnavailable(msg.into())
    }

    pub fn invalid_alert(msg: impl Into<String>) -> Self {
        AlertError::InvalidAlert(msg.into())
    }

    pub fn notification(msg: impl Into<String>) -> Self {
        AlertError::NotificationFailure(msg.into())
    }

    /// true si l'erreur laisse le cycle récupérable au tick suivant
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, AlertError::InvalidAlert(_))
    }
}

impl From<rusqlite::Error> for AlertError {
    fn from(e: rusqlite::Error) -> Self {
        AlertError::Storage(e.to_string())
    }
}

/// Alias pratique pour les résultats du moteur
pub type AlertResult<T> = Result<T, AlertError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_data_message() {
        let err = AlertError::InsufficientData { required: 14, actual: 9 };
        assert_eq!(err.to_string(), "insufficient data: need 14 candles, got 9");
    }

    #[test]
    fn test_only_invalid_alert_is_surfaced() {
        assert!(AlertError::data_unavailable("timeout").is_recoverable());
        assert!(AlertError::notification("smtp down").is_recoverable());
        assert!(!AlertError::invalid_alert("threshold too high").is_recoverable());
    }
}
