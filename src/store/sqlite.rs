// ============================================================================
// SqliteAlertStore
// ============================================================================
// Historique des alertes persistant entre deux lancements
//
// Schéma :
//   alerts(id TEXT PK, threshold TEXT, use_rsi INT, use_ma INT,
//          recipient TEXT, created_at INT (ms), status TEXT)
//
// Les montants sont stockés en TEXT pour garder la précision décimale.
// ============================================================================

use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::error::{AlertError, AlertResult};
use crate::models::{Alert, AlertId, AlertStatus};
use crate::store::{poisoned, AlertStore};

pub struct SqliteAlertStore {
    conn: Mutex<Connection>,
}

impl SqliteAlertStore {
    /// Ouvre (ou crée) la base à `db_path`
    pub fn open(db_path: impl AsRef<Path>) -> AlertResult<Self> {
        let db_path = db_path.as_ref();

        // Crée le répertoire parent s'il n'existe pas
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                AlertError::Storage(format!(
                    "failed to create database directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let conn = Connection::open(db_path)?;
        // journal_mode renvoie une ligne : pragma_update_and_check
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
        info!(path = %db_path.display(), "Opened alert database");
        Self::with_connection(conn)
    }

    /// Base en mémoire (perdue à la fermeture)
    pub fn open_in_memory() -> AlertResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> AlertResult<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS alerts (
                id TEXT PRIMARY KEY,
                threshold TEXT NOT NULL,
                use_rsi INTEGER NOT NULL,
                use_ma INTEGER NOT NULL,
                recipient TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                status TEXT NOT NULL
            )",
            [],
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

/// Colonnes brutes d'une ligne, converties ensuite hors de rusqlite
type AlertRow = (String, String, bool, bool, String, i64, String);

fn row_to_alert(row: AlertRow) -> AlertResult<Alert> {
    let (id, threshold, use_rsi, use_ma, recipient, created_ms, status) = row;

    let threshold_price = Decimal::from_str(&threshold)
        .map_err(|e| AlertError::Storage(format!("alert {}: bad threshold: {}", id, e)))?;
    let created_at = DateTime::<Utc>::from_timestamp_millis(created_ms)
        .ok_or_else(|| AlertError::Storage(format!("alert {}: bad timestamp {}", id, created_ms)))?;

    Ok(Alert {
        id: AlertId::from(id),
        threshold_price,
        use_rsi,
        use_ma,
        recipient,
        created_at,
        status: AlertStatus::from_str(&status)?,
    })
}

impl AlertStore for SqliteAlertStore {
    fn create(&self, alert: Alert) -> AlertResult<Alert> {
        let conn = self.conn.lock().map_err(poisoned)?;

        let exists: Option<String> = conn
            .query_row(
                "SELECT id FROM alerts WHERE id = ?1",
                params![alert.id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_some() {
            return Err(AlertError::Storage(format!("alert {} already exists", alert.id)));
        }

        conn.execute(
            "INSERT INTO alerts (id, threshold, use_rsi, use_ma, recipient, created_at, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                alert.id.as_str(),
                alert.threshold_price.to_string(),
                alert.use_rsi,
                alert.use_ma,
                alert.recipient,
                alert.created_at.timestamp_millis(),
                alert.status.as_str(),
            ],
        )?;

        debug!(alert_id = %alert.id, "Alert persisted");
        Ok(alert)
    }

    fn list(&self) -> AlertResult<Vec<Alert>> {
        let conn = self.conn.lock().map_err(poisoned)?;
        let mut stmt = conn.prepare(
            "SELECT id, threshold, use_rsi, use_ma, recipient, created_at, status
             FROM alerts ORDER BY created_at ASC, id ASC",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
            ))
        })?;

        let mut alerts = Vec::new();
        for row in rows {
            alerts.push(row_to_alert(row?)?);
        }
        Ok(alerts)
    }

    fn delete(&self, id: &AlertId) -> AlertResult<bool> {
        let conn = self.conn.lock().map_err(poisoned)?;
        let removed = conn.execute("DELETE FROM alerts WHERE id = ?1", params![id.as_str()])?;
        Ok(removed > 0)
    }

    fn update_status(&self, id: &AlertId, status: AlertStatus) -> AlertResult<bool> {
        let conn = self.conn.lock().map_err(poisoned)?;
        let updated = conn.execute(
            "UPDATE alerts SET status = ?1 WHERE id = ?2",
            params![status.as_str(), id.as_str()],
        )?;
        Ok(updated > 0)
    }
}

// ============================================================================
// Tests unitaires
// ============================================================================
