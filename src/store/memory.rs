// ============================================================================
// MemoryAlertStore
// ============================================================================
// CONCEPT RUST : Mutex<BTreeMap<..>>
// - Mutex : accès exclusif, une opération = un lock
// - BTreeMap : ordre stable des identifiants
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::error::{AlertError, AlertResult};
use crate::models::{Alert, AlertId, AlertStatus};
use crate::store::{poisoned, AlertStore};

#[derive(Debug, Default)]
pub struct MemoryAlertStore {
    alerts: Mutex<BTreeMap<AlertId, Alert>>,
}

impl MemoryAlertStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AlertStore for MemoryAlertStore {
    fn create(&self, alert: Alert) -> AlertResult<Alert> {
        let mut alerts = self.alerts.lock().map_err(poisoned)?;
        if alerts.contains_key(&alert.id) {
            return Err(AlertError::Storage(format!("alert {} already exists", alert.id)));
        }
        alerts.insert(alert.id.clone(), alert.clone());
        Ok(alert)
    }

    fn list(&self) -> AlertResult<Vec<Alert>> {
        let alerts = self.alerts.lock().map_err(poisoned)?;
        let mut list: Vec<Alert> = alerts.values().cloned().collect();
        list.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(list)
    }

    fn delete(&self, id: &AlertId) -> AlertResult<bool> {
        let mut alerts = self.alerts.lock().map_err(poisoned)?;
        Ok(alerts.remove(id).is_some())
    }

    fn update_status(&self, id: &AlertId, status: AlertStatus) -> AlertResult<bool> {
        let mut alerts = self.alerts.lock().map_err(poisoned)?;
        match alerts.get_mut(id) {
            Some(alert) => {
                alert.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
