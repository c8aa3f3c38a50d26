// ============================================================================
// Structure : AlertService
// ============================================================================
// Actions utilisateur sur les alertes : créer, lister, supprimer
//
// La création valide la demande contre le spot courant, envoie la
// confirmation (si activée) puis persiste. Si la confirmation échoue,
// rien n'est persisté.
// ============================================================================

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, instrument, warn};

use crate::api::Notifier;
use crate::error::AlertResult;
use crate::message;
use crate::models::{Alert, AlertId, AlertRequest};
use crate::store::AlertStore;

pub struct AlertService {
    store: Arc<dyn AlertStore>,
    notifier: Arc<dyn Notifier>,
    currency: String,
    confirm_on_create: bool,
}

impl AlertService {
    pub fn new(
        store: Arc<dyn AlertStore>,
        notifier: Arc<dyn Notifier>,
        currency: impl Into<String>,
        confirm_on_create: bool,
    ) -> Self {
        Self {
            store,
            notifier,
            currency: currency.into(),
            confirm_on_create,
        }
    }

    /// Crée une alerte
    ///
    /// # Erreurs
    /// * `InvalidAlert` : seuil non numérique, <= 0, ou >= `spot`
    /// * `NotificationFailure` : la confirmation n'a pas pu être envoyée
    #[instrument(skip(self, request), fields(recipient = %request.recipient))]
    pub async fn create(&self, request: AlertRequest, spot: Decimal) -> AlertResult<Alert> {
        let alert = match request.validate(spot, Utc::now()) {
            Ok(alert) => alert,
            Err(e) => {
                warn!(error = %e, "Alert rejected");
                return Err(e);
            }
        };

        if self.confirm_on_create {
            let (subject, body) = message::created(&alert, &self.currency);
            self.notifier.send(&alert.recipient, &subject, &body).await?;
        }

        let alert = self.store.create(alert)?;
        info!(alert_id = %alert.id, threshold = %alert.threshold_price, "Alert created");
        Ok(alert)
    }

    pub fn list(&self) -> AlertResult<Vec<Alert>> {
        self.store.list()
    }

    /// Supprime une alerte, quel que soit son état
    pub fn delete(&self, id: &AlertId) -> AlertResult<bool> {
        let removed = self.store.delete(id)?;
        info!(alert_id = %id, removed, "Alert delete requested");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AlertError;
    use crate::store::MemoryAlertStore;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        fail: bool,
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, recipient: &str, subject: &str, _body: &str) -> AlertResult<()> {
            if self.fail {
                return Err(AlertError::notification("relay down"));
            }
            self.sent
                .lock()
                .unwrap()
                .push((recipient.to_string(), subject.to_string()));
            Ok(())
        }
    }

    fn service(notifier: Arc<RecordingNotifier>, confirm: bool) -> (AlertService, Arc<MemoryAlertStore>) {
        let store = Arc::new(MemoryAlertStore::new());
        (AlertService::new(store.clone(), notifier, "inr", confirm), store)
    }

    #[tokio::test]
    async fn test_create_persists_and_confirms() {
        let notifier = Arc::new(RecordingNotifier::default());
        let (service, store) = service(notifier.clone(), true);

        let alert = service
            .create(AlertRequest::new("95", "me@example.com"), dec!(100))
            .await
            .unwrap();

        assert_eq!(store.list().unwrap(), vec![alert]);
        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, "Crypto Alert Set");
    }

    #[tokio::test]
    async fn test_threshold_at_spot_is_not_persisted() {
        let notifier = Arc::new(RecordingNotifier::default());
        let (service, store) = service(notifier.clone(), true);

        let result = service
            .create(AlertRequest::new("100", "me@example.com"), dec!(100))
            .await;

        assert!(matches!(result, Err(AlertError::InvalidAlert(_))));
        assert!(store.list().unwrap().is_empty());
        assert!(notifier.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_confirmation_is_not_persisted() {
        let notifier = Arc::new(RecordingNotifier {
            fail: true,
            ..Default::default()
        });
        let (service, store) = service(notifier, true);

        let result = service
            .create(AlertRequest::new("90", "me@example.com"), dec!(100))
            .await;

        assert!(matches!(result, Err(AlertError::NotificationFailure(_))));
        assert!(store.list().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_without_confirmation_no_notification() {
        let notifier = Arc::new(RecordingNotifier {
            fail: true,
            ..Default::default()
        });
        let (service, store) = service(notifier, false);

        service
            .create(AlertRequest::new("90", "me@example.com"), dec!(100))
            .await
            .unwrap();
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete() {
        let (service, _) = service(Arc::new(RecordingNotifier::default()), false);
        let alert = service
            .create(AlertRequest::new("90", "me@example.com"), dec!(100))
            .await
            .unwrap();

        assert!(service.delete(&alert.id).unwrap());
        assert!(service.list().unwrap().is_empty());
    }
}
