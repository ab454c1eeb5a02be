//! NATS message producer for prediction results

use crate::types::prediction::{ErrorMessage, GestureMessage};
use anyhow::Result;
use async_nats::Client;
use tracing::debug;

/// Publisher for prediction results and request-level errors
#[derive(Clone)]
pub struct ResultPublisher {
    client: Client,
    subject: String,
}

impl ResultPublisher {
    /// Create a new result publisher with a default subject
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
        }
    }

    /// Publish a prediction; replies on `reply_subject` when the request
    /// carried one, otherwise on the configured result subject.
    pub async fn publish(
        &self,
        message: &GestureMessage,
        reply_subject: Option<String>,
    ) -> Result<()> {
        let payload = serde_json::to_vec(message)?;
        let subject = reply_subject.unwrap_or_else(|| self.subject.clone());

        self.client.publish(subject, payload.into()).await?;

        debug!(
            prediction = %message.prediction,
            confidence = message.confidence,
            "Published prediction"
        );

        Ok(())
    }

    /// Surface a failed request to the caller as an application-level error.
    pub async fn publish_error(
        &self,
        message: &ErrorMessage,
        reply_subject: Option<String>,
    ) -> Result<()> {
        let payload = serde_json::to_vec(message)?;
        let subject = reply_subject.unwrap_or_else(|| self.subject.clone());

        self.client.publish(subject, payload.into()).await?;

        debug!(error = %message.error, "Published error message");

        Ok(())
    }

    /// Get the default subject name
    pub fn subject(&self) -> &str {
        &self.subject
    }
}

#[cfg(test)]
mod tests {
    // Integration tests would require a running NATS server
}
