//! Channel trait and the types that cross it.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use tokio::sync::mpsc;

use crate::error::ChannelError;
use crate::survey::{Outcome, SurveyEvent};

/// One decoded inbound update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundUpdate {
    pub event: SurveyEvent,
    /// Platform id of the button tap to acknowledge, for selections.
    pub callback_id: Option<String>,
}

impl InboundUpdate {
    pub fn new(event: SurveyEvent) -> Self {
        Self {
            event,
            callback_id: None,
        }
    }

    pub fn with_callback_id(mut self, callback_id: impl Into<String>) -> Self {
        self.callback_id = Some(callback_id.into());
        self
    }
}

/// Stream of inbound updates produced by [`Channel::start`].
pub type UpdateStream = Pin<Box<dyn Stream<Item = InboundUpdate> + Send>>;

/// Sending half feeding an [`UpdateStream`] (used by the webhook route).
pub type UpdateSender = mpsc::UnboundedSender<InboundUpdate>;

/// Turn an mpsc receiver into an [`UpdateStream`].
pub fn receiver_stream(rx: mpsc::UnboundedReceiver<InboundUpdate>) -> UpdateStream {
    let stream = futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|update| (update, rx))
    });
    Box::pin(stream)
}

/// A chat transport the survey runs over.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Short channel name for logs.
    fn name(&self) -> &str;

    /// Begin receiving updates. May only be called once.
    async fn start(&self) -> Result<UpdateStream, ChannelError>;

    /// Deliver the outcome of one update back to its chat: acknowledge the
    /// tap, retire a frozen keyboard, then send or edit the prompt.
    async fn deliver(&self, update: &InboundUpdate, outcome: &Outcome) -> Result<(), ChannelError>;

    /// Check that the channel can reach its platform.
    async fn health_check(&self) -> Result<(), ChannelError>;

    /// Release platform resources (webhook registration and the like).
    async fn shutdown(&self) -> Result<(), ChannelError>;
}

/// Sends operator notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send `html` to the operator chat `chat_id`.
    async fn notify(&self, chat_id: &str, html: &str) -> Result<(), ChannelError>;
}
