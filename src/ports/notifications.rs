//! Notification sink port.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationChannel {
    #[serde(rename = "order_channel")]
    OrderEvents,
    #[serde(rename = "banner_channel")]
    PromotionalBanners,
}

impl NotificationChannel {
    pub fn id(self) -> &'static str {
        match self { Self::OrderEvents => "order_channel", Self::PromotionalBanners => "banner_channel" }
    }

    pub fn display_name(self) -> &'static str {
        match self { Self::OrderEvents => "Order Confirmations", Self::PromotionalBanners => "New Banners" }
    }
}

impl fmt::Display for NotificationChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.id()) }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub channel: NotificationChannel,
    pub title: String,
    pub body: String,
}

impl Notification {
    pub const DEFAULT_TITLE: &'static str = "Baby Dino";
    pub const DEFAULT_BODY: &'static str = "You have a new notification!";

    pub fn order_confirmed() -> Self {
        Self { channel: NotificationChannel::OrderEvents, title: "🎉 Order Confirmed".into(), body: "Your order has been placed successfully!".into() }
    }

    pub fn new_deal() -> Self {
        Self { channel: NotificationChannel::PromotionalBanners, title: "🎉 New Deal!!!".into(), body: "Get it ASAP".into() }
    }

    /// Routes an incoming push message: titles mentioning a deal go to the banner channel.
    pub fn from_push(title: Option<&str>, body: Option<&str>) -> Self {
        let channel = match title {
            Some(t) if t.to_lowercase().contains("deal") => NotificationChannel::PromotionalBanners,
            _ => NotificationChannel::OrderEvents,
        };
        Self { channel, title: title.unwrap_or(Self::DEFAULT_TITLE).into(), body: body.unwrap_or(Self::DEFAULT_BODY).into() }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport failed: {0}")]
    Transport(String),
    #[error("notification encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Writes notifications to the log. Used when no transport is configured.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl NotificationSink for LogNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        tracing::info!(channel = notification.channel.display_name(), title = %notification.title, body = %notification.body, "Notification");
        Ok(())
    }
}

/// Publishes notifications as JSON on `{prefix}.{channel}`.
pub struct NatsNotifier {
    client: async_nats::Client,
    subject_prefix: String,
}

impl NatsNotifier {
    pub fn new(client: async_nats::Client, subject_prefix: impl Into<String>) -> Self { Self { client, subject_prefix: subject_prefix.into() } }

    pub fn subject(&self, channel: NotificationChannel) -> String { format!("{}.{}", self.subject_prefix, channel.id()) }
}

#[async_trait]
impl NotificationSink for NatsNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        let payload = serde_json::to_vec(notification)?;
        let subject = self.subject(notification.channel);
        self.client.publish(subject.clone(), payload.into()).await.map_err(|e| NotifyError::Transport(e.to_string()))?;
        tracing::debug!(%subject, "Published notification");
        Ok(())
    }
}
