//! Outbound document notifications
//!
//! Notifications are fire-and-forget: the store dispatches them on a spawned
//! task after commit, and a failed delivery is only logged.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use shared::EndpointKind;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Message about a committed document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub subject: String,
    pub body: String,
    pub transaction_type: EndpointKind,
    pub transaction_id: Uuid,
}

impl Notification {
    pub fn new(
        transaction_type: EndpointKind,
        transaction_id: Uuid,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
            transaction_type,
            transaction_id,
        }
    }
}

/// Delivery channel for notifications
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> AppResult<()>;
}

/// Posts notifications as JSON to a webhook
#[derive(Clone)]
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: String, timeout: Duration) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Configuration(format!("Invalid webhook client: {}", e)))?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, notification: &Notification) -> AppResult<()> {
        let response = self
            .client
            .post(&self.url)
            .json(notification)
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("Webhook request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalService(format!(
                "Webhook error: {} - {}",
                status, body
            )));
        }

        Ok(())
    }
}

/// Discards every notification
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, notification: &Notification) -> AppResult<()> {
        tracing::trace!(
            transaction_id = %notification.transaction_id,
            "Notification dropped"
        );
        Ok(())
    }
}

/// Records notifications in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn notify(&self, notification: &Notification) -> AppResult<()> {
        self.sent.lock().push(notification.clone());
        Ok(())
    }
}
