//! Code delivery over email and SMS
//!
//! Delivery itself belongs to another service. This module hands each
//! notification to a `Notifier`: either the log (development) or a JSON
//! webhook that fans out to the real providers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::core::config::NotifyConfig;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("notifier configuration error: {0}")]
    Config(String),

    #[error("notification request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("notification rejected with status {0}")]
    Rejected(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    Sms,
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub channel: Channel,
    pub destination: String,
    pub template: &'static str,
    pub data: serde_json::Value,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Build the notifier selected by configuration
pub fn build_notifier(config: &NotifyConfig) -> Result<Arc<dyn Notifier>, NotifyError> {
    match &config.webhook_url {
        Some(url) => Ok(Arc::new(WebhookNotifier::new(
            url,
            Duration::from_secs(config.timeout_secs),
        )?)),
        None => {
            tracing::warn!("No notification webhook configured, codes are only written to the debug log");
            Ok(Arc::new(LogNotifier))
        }
    }
}

/// Send `template` to every channel the user has, each independently
///
/// A failing channel is logged and does not stop the other one. Returns the
/// number of channels that accepted the notification.
pub async fn send_all_channels(
    notifier: &dyn Notifier,
    email: Option<&str>,
    phone: Option<&str>,
    template: &'static str,
    data: serde_json::Value,
) -> usize {
    let email = email.map(|d| Notification {
        channel: Channel::Email,
        destination: d.to_string(),
        template,
        data: data.clone(),
    });
    let sms = phone.map(|d| Notification {
        channel: Channel::Sms,
        destination: d.to_string(),
        template,
        data,
    });

    let (email_ok, sms_ok) = tokio::join!(deliver(notifier, email), deliver(notifier, sms));
    usize::from(email_ok) + usize::from(sms_ok)
}

async fn deliver(notifier: &dyn Notifier, notification: Option<Notification>) -> bool {
    let Some(notification) = notification else {
        return false;
    };
    match notifier.send(&notification).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(
                channel = ?notification.channel,
                template = notification.template,
                error = %e,
                "Notification channel failed"
            );
            false
        }
    }
}

/// Writes notifications to the debug log
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        tracing::debug!(
            channel = ?notification.channel,
            destination = %notification.destination,
            template = notification.template,
            data = %notification.data,
            "Notification (log only)"
        );
        Ok(())
    }
}

/// POSTs each notification as JSON
#[derive(Debug)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: reqwest::Url,
}

impl WebhookNotifier {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, NotifyError> {
        let url = reqwest::Url::parse(url)
            .map_err(|e| NotifyError::Config(format!("invalid webhook url: {}", e)))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Config(format!("failed to build HTTP client: {}", e)))?;

        tracing::debug!(host = url.host_str().unwrap_or_default(), "Webhook notifier initialized");
        Ok(Self { client, url })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let resp = self
            .client
            .post(self.url.clone())
            .json(notification)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(NotifyError::Rejected(resp.status().as_u16()));
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingNotifier;
    use super::*;

    #[tokio::test]
    async fn test_sends_both_channels() {
        let notifier = RecordingNotifier::default();
        let sent = send_all_channels(
            &notifier,
            Some("a@x.com"),
            Some("+15550100"),
            "otp_login",
            serde_json::json!({"code": "123456"}),
        )
        .await;
        assert_eq!(sent, 2);
        let channels: Vec<Channel> = notifier.sent().iter().map(|n| n.channel).collect();
        assert!(channels.contains(&Channel::Email));
        assert!(channels.contains(&Channel::Sms));
    }

    #[tokio::test]
    async fn test_failing_channel_does_not_block_other() {
        let notifier = RecordingNotifier::failing(Channel::Sms);
        let sent = send_all_channels(
            &notifier,
            Some("a@x.com"),
            Some("+15550100"),
            "otp_login",
            serde_json::json!({"code": "123456"}),
        )
        .await;
        assert_eq!(sent, 1);
        assert_eq!(notifier.sent()[0].channel, Channel::Email);
    }

    #[tokio::test]
    async fn test_missing_destination_skipped() {
        let notifier = RecordingNotifier::default();
        let sent = send_all_channels(
            &notifier,
            None,
            Some("+15550100"),
            "otp_login",
            serde_json::Value::Null,
        )
        .await;
        assert_eq!(sent, 1);
    }

    #[test]
    fn test_notification_wire_shape() {
        let n = Notification {
            channel: Channel::Sms,
            destination: "+15550100".to_string(),
            template: "password_reset",
            data: serde_json::json!({"code": "654321"}),
        };
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["channel"], "sms");
        assert_eq!(json["template"], "password_reset");
        assert_eq!(json["data"]["code"], "654321");
    }

    #[test]
    fn test_webhook_rejects_bad_url() {
        let result = WebhookNotifier::new("not a url", Duration::from_secs(1));
        assert!(matches!(result, Err(NotifyError::Config(_))));
    }

    #[test]
    fn test_build_notifier_defaults_to_log() {
        let config = NotifyConfig {
            webhook_url: None,
            timeout_secs: 5,
        };
        assert!(build_notifier(&config).is_ok());
    }
}
