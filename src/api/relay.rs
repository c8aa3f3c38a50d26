// ============================================================================
// Notifier : relais mail HTTP
// ============================================================================
// Envoie les notifications au service d'envoi d'emails
// POST <url>  { "to": ..., "subject": ..., "message": ... }
// 2xx = délivré, tout le reste = NotificationFailure
// ============================================================================

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use tracing::{error, info, instrument};

use crate::api::Notifier;
use crate::error::{AlertError, AlertResult};

pub const DEFAULT_URL: &str = "http://localhost:5000/api/send-alert";

/// Corps de la requête attendu par le relais
#[derive(Debug, Serialize)]
struct SendAlertRequest<'a> {
    to: &'a str,
    subject: &'a str,
    message: &'a str,
}

#[derive(Debug, Clone)]
pub struct RelayNotifier {
    http: reqwest::Client,
    url: String,
}

impl RelayNotifier {
    pub fn new(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }
}

#[async_trait]
impl Notifier for RelayNotifier {
    #[instrument(skip(self, body))]
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> AlertResult<()> {
        let payload = SendAlertRequest {
            to: recipient,
            subject,
            message: body,
        };

        let response = self
            .http
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AlertError::notification(format!("relay unreachable: {}", e)))?;

        let status = response.status();
        let detail = if status.is_success() {
            String::new()
        } else {
            response.text().await.unwrap_or_default()
        };
        check_delivery(status, &detail)?;

        info!("Notification delivered");
        Ok(())
    }
}

/// 2xx = délivré, tout le reste = NotificationFailure
fn check_delivery(status: StatusCode, detail: &str) -> AlertResult<()> {
    if status.is_success() {
        return Ok(());
    }
    error!(status = %status, detail = %detail, "Mail relay rejected notification");
    Err(AlertError::notification(format!("relay returned HTTP {}", status)))
}
