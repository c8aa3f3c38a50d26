// ============================================================================
// Module : store
// ============================================================================
// AlertStore : identifiant -> Alert (create, list, delete, update_status)
//
// Chaque opération s'exécute dans une seule section critique (Mutex),
// ce qui linéarise lectures et écritures entre la boucle de rafraîchissement
// et les commandes utilisateur.
// ============================================================================

use crate::error::{AlertError, AlertResult};
use crate::models::{Alert, AlertId, AlertStatus};

pub mod memory; // Stockage en mémoire (tests, exécutions éphémères)
pub mod sqlite; // Stockage durable SQLite

pub use memory::MemoryAlertStore;
pub use sqlite::SqliteAlertStore;

/// Contrat de stockage des alertes
pub trait AlertStore: Send + Sync {
    /// Enregistre une nouvelle alerte (l'identifiant doit être inédit)
    fn create(&self, alert: Alert) -> AlertResult<Alert>;

    /// Toutes les alertes, par date de création croissante
    fn list(&self) -> AlertResult<Vec<Alert>>;

    /// Supprime une alerte quel que soit son état. false si inconnue.
    fn delete(&self, id: &AlertId) -> AlertResult<bool>;

    /// Change l'état d'une alerte. false si elle a été supprimée entre-temps.
    fn update_status(&self, id: &AlertId, status: AlertStatus) -> AlertResult<bool>;
}

pub(crate) fn poisoned<T>(_: T) -> AlertError {
    AlertError::Storage("alert store lock poisoned".to_string())
}
