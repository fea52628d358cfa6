use crate::config::NotificationConfig;
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_sns::error::DisplayErrorContext;
use aws_sdk_sns::Client as SnsClient;
#[cfg(test)]
use mockall::automock;
use thiserror::Error;
use tracing::{info, instrument};

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("SNS publish failed: {0}")]
    Sdk(String),
}

/// Where notifications go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// Direct SMS, E.164 phone number
    PhoneNumber(String),
    /// SNS topic ARN
    Topic(String),
}

impl Destination {
    /// Destination from configuration; a topic wins over a phone number
    pub fn from_config(config: &NotificationConfig) -> Option<Self> {
        config
            .topic_arn
            .clone()
            .map(Destination::Topic)
            .or_else(|| config.phone_number.clone().map(Destination::PhoneNumber))
    }
}

/// Completion notification channel
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Publish `message`, returning the service's message ID
    async fn publish(&self, message: &str) -> Result<String, NotificationError>;
}

/// SNS-backed notifier
pub struct SnsNotifier {
    client: SnsClient,
    destination: Destination,
}

impl SnsNotifier {
    pub fn new(aws_config: &SdkConfig, region: &str, destination: Destination) -> Self {
        let config = aws_sdk_sns::config::Builder::from(aws_config)
            .region(aws_config::Region::new(region.to_string()))
            .build();

        Self {
            client: SnsClient::from_conf(config),
            destination,
        }
    }
}

#[async_trait]
impl Notifier for SnsNotifier {
    #[instrument(skip(self, message), fields(destination = ?self.destination))]
    async fn publish(&self, message: &str) -> Result<String, NotificationError> {
        let request = self.client.publish().message(message);

        let request = match self.destination {
            Destination::PhoneNumber(ref number) => request.phone_number(number),
            Destination::Topic(ref arn) => request.topic_arn(arn),
        };

        let response = request
            .send()
            .await
            .map_err(|e| NotificationError::Sdk(DisplayErrorContext(&e).to_string()))?;

        let message_id = response.message_id().unwrap_or("unknown").to_string();
        info!(message_id = %message_id, "Notification published");

        Ok(message_id)
    }
}
