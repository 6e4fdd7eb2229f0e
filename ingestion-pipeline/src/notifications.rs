use std::{pin::Pin, time::Duration};

use async_trait::async_trait;
use common::error::AppError;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// One message taken off the notification channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// A new batch is ready in the batch store.
    Batch { batch_id: String },
    /// Anything that does not reference a batch.
    Control { kind: String },
}

impl Notification {
    pub fn from_payload(payload: &[u8]) -> Result<Self, AppError> {
        let text = std::str::from_utf8(payload).map_err(|err| {
            AppError::Validation(format!("notification payload is not utf-8: {err}"))
        })?;
        let batch_id = text.trim();
        if batch_id.is_empty() {
            return Ok(Self::Control {
                kind: "empty".to_string(),
            });
        }
        Ok(Self::Batch {
            batch_id: batch_id.to_string(),
        })
    }
}

/// Source of batch notifications with a bounded wait.
#[async_trait]
pub trait NotificationSource: Send {
    /// Waits at most `wait` for the next message. `Ok(None)` means nothing arrived in
    /// time; an error from a closed channel is fatal to the consumer.
    async fn next(&mut self, wait: Duration) -> Result<Option<Notification>, AppError>;
}

type MessageStream = Pin<Box<dyn Stream<Item = redis::Msg> + Send>>;

/// Redis pub/sub subscription on the producer's channel.
pub struct RedisSubscription {
    channel: String,
    messages: MessageStream,
}

impl RedisSubscription {
    pub async fn connect(redis_url: &str, channel: &str) -> Result<Self, AppError> {
        let client = redis::Client::open(redis_url)?;
        let mut pubsub = client.get_async_pubsub().await?;
        pubsub.subscribe(channel).await?;
        info!(%channel, "subscribed to notification channel");

        Ok(Self {
            channel: channel.to_string(),
            messages: Box::pin(pubsub.into_on_message()),
        })
    }
}

#[async_trait]
impl NotificationSource for RedisSubscription {
    async fn next(&mut self, wait: Duration) -> Result<Option<Notification>, AppError> {
        match tokio::time::timeout(wait, self.messages.next()).await {
            Err(_elapsed) => Ok(None),
            Ok(None) => Err(AppError::ChannelClosed(self.channel.clone())),
            Ok(Some(msg)) => {
                debug!(channel = %msg.get_channel_name(), "notification received");
                Notification::from_payload(msg.get_payload_bytes()).map(Some)
            }
        }
    }
}

/// In-process notification source fed through an mpsc channel.
pub struct ChannelSource {
    receiver: mpsc::Receiver<Notification>,
}

impl ChannelSource {
    pub fn new(receiver: mpsc::Receiver<Notification>) -> Self {
        Self { receiver }
    }

    pub fn channel(capacity: usize) -> (mpsc::Sender<Notification>, Self) {
        let (sender, receiver) = mpsc::channel(capacity);
        (sender, Self::new(receiver))
    }
}

#[async_trait]
impl NotificationSource for ChannelSource {
    async fn next(&mut self, wait: Duration) -> Result<Option<Notification>, AppError> {
        match tokio::time::timeout(wait, self.receiver.recv()).await {
            Err(_elapsed) => Ok(None),
            Ok(None) => Err(AppError::ChannelClosed("in-process channel".into())),
            Ok(Some(notification)) => Ok(Some(notification)),
        }
    }
}
