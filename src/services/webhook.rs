use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::models::webhook::Payload;

/// Destination of webhook notifications.
#[async_trait]
pub trait WebhookSink: Send + Sync {
    async fn deliver(&self, payload: &Payload) -> Result<(), DeliveryError>;
}

/// POSTs payloads as JSON to one configured endpoint.
pub struct HttpWebhookSink {
    http: Client,
    url: String,
}

impl HttpWebhookSink {
    /// `timeout` bounds each delivery, connect included.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, DeliveryError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(DeliveryError::Http)?;

        Ok(Self {
            http,
            url: url.into(),
        })
    }
}

#[async_trait]
impl WebhookSink for HttpWebhookSink {
    async fn deliver(&self, payload: &Payload) -> Result<(), DeliveryError> {
        let response = self
            .http
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .map_err(DeliveryError::Http)?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryError::Status(status.as_u16()));
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Webhook endpoint returned status {0}")]
    Status(u16),
}
