//! Subscriber handles
//!
//! A subscriber is anything that can take a text frame: a websocket
//! writer, an in-process channel, stdout. Sends must not block; a full
//! or closed subscriber fails fast and the hub moves on.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Unique identifier for a connected subscriber
pub type SubscriberId = Uuid;

/// Shared subscriber handle held by the hub
pub type SubscriberHandle = Arc<dyn Subscriber>;

/// Failure to hand a frame to one subscriber
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("Subscriber {0} is closed")]
    Closed(SubscriberId),

    #[error("Subscriber {0} is not keeping up")]
    Full(SubscriberId),

    #[error("Send failed: {0}")]
    Transport(String),
}

/// A connected display or client
#[async_trait]
pub trait Subscriber: Send + Sync {
    fn id(&self) -> SubscriberId;

    /// Deliver one text frame.
    async fn send(&self, text: &str) -> Result<(), DeliveryError>;
}

/// Subscriber backed by a bounded in-process channel
pub struct ChannelSubscriber {
    id: SubscriberId,
    sender: mpsc::Sender<String>,
}

impl ChannelSubscriber {
    /// Create a subscriber and the receiving end of its queue.
    pub fn new(buffer: usize) -> (Arc<Self>, mpsc::Receiver<String>) {
        let (sender, receiver) = mpsc::channel(buffer.max(1));
        let subscriber = Arc::new(Self {
            id: Uuid::new_v4(),
            sender,
        });
        (subscriber, receiver)
    }
}

#[async_trait]
impl Subscriber for ChannelSubscriber {
    fn id(&self) -> SubscriberId {
        self.id
    }

    async fn send(&self, text: &str) -> Result<(), DeliveryError> {
        self.sender
            .try_send(text.to_string())
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => DeliveryError::Full(self.id),
                mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed(self.id),
            })
    }
}
