//! Outbound notifications for change request transitions.
//!
//! Delivery is best effort: it happens after the transition has committed and
//! a failure is logged, never returned to the caller.

use anyhow::{anyhow, bail, Result};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

use super::signing::compute_signature;
use crate::models::ActorRole;

/// Payload describing one committed transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationEvent {
    /// e.g. `cr.submitted`, `cr.approved`
    pub kind: String,
    pub change_request_id: Uuid,
    pub code: String,
    pub status: String,
    pub actor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appendix: Option<String>,
}

pub trait Notifier: Send + Sync {
    fn notify(&self, recipient: ActorRole, event: &NotificationEvent) -> Result<()>;
}

/// How the engine hands events to its notifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Delivery {
    /// Detached thread per event.
    #[default]
    Background,
    /// On the calling thread after commit. Deterministic, used by tests.
    Inline,
}

/// Send `event` through `notifier`, logging any failure.
pub fn dispatch(
    notifier: Arc<dyn Notifier>,
    delivery: Delivery,
    recipient: ActorRole,
    event: NotificationEvent,
) {
    match delivery {
        Delivery::Inline => deliver(notifier.as_ref(), recipient, &event),
        Delivery::Background => {
            let spawned = std::thread::Builder::new()
                .name("contractcmd-notify".to_string())
                .spawn(move || deliver(notifier.as_ref(), recipient, &event));
            if let Err(e) = spawned {
                tracing::warn!(error = %e, "could not spawn notification thread");
            }
        }
    }
}

fn deliver(notifier: &dyn Notifier, recipient: ActorRole, event: &NotificationEvent) {
    match notifier.notify(recipient, event) {
        Ok(()) => tracing::debug!(
            kind = %event.kind,
            cr_id = %event.change_request_id,
            recipient = recipient.as_str(),
            "notification delivered"
        ),
        Err(e) => tracing::warn!(
            kind = %event.kind,
            cr_id = %event.change_request_id,
            recipient = recipient.as_str(),
            error = %e,
            "notification delivery failed"
        ),
    }
}

/// Writes events to the log only.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, recipient: ActorRole, event: &NotificationEvent) -> Result<()> {
        tracing::info!(
            kind = %event.kind,
            code = %event.code,
            status = %event.status,
            recipient = recipient.as_str(),
            "notification"
        );
        Ok(())
    }
}

/// Collects events in memory.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<(ActorRole, NotificationEvent)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(ActorRole, NotificationEvent)> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, recipient: ActorRole, event: &NotificationEvent) -> Result<()> {
        self.events
            .lock()
            .map_err(|_| anyhow!("recorder lock poisoned"))?
            .push((recipient, event.clone()));
        Ok(())
    }
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    recipient: &'a str,
    #[serde(flatten)]
    event: &'a NotificationEvent,
}

/// POSTs each event as JSON to a configured URL.
pub struct WebhookNotifier {
    url: String,
    secret: Option<String>,
    client: reqwest::blocking::Client,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, secret: Option<String>) -> Result<Self> {
        let url = url.into();
        if !url.starts_with("http://") && !url.starts_with("https://") {
            bail!("Invalid webhook URL: must start with http:// or https://");
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { url, secret, client })
    }
}

impl Notifier for WebhookNotifier {
    fn notify(&self, recipient: ActorRole, event: &NotificationEvent) -> Result<()> {
        let body = serde_json::to_vec(&WebhookPayload {
            recipient: recipient.as_str(),
            event,
        })?;

        let mut request = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .header("User-Agent", concat!("contractcmd/", env!("CARGO_PKG_VERSION")));
        if let Some(secret) = &self.secret {
            let timestamp = chrono::Utc::now().timestamp().to_string();
            let signature = compute_signature(secret, &timestamp, &body);
            request = request
                .header("X-Contractcmd-Timestamp", timestamp)
                .header("X-Contractcmd-Signature", signature);
        }

        let response = request
            .body(body)
            .send()
            .map_err(|e| anyhow!("HTTP request failed: {}", e))?;
        let status = response.status();
        if !status.is_success() {
            bail!("Webhook returned HTTP {}", status.as_u16());
        }
        Ok(())
    }
}
