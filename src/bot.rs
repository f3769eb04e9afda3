//! Run loop: pull updates from a channel, dispatch, deliver.

use std::sync::Arc;

use futures::StreamExt;

use crate::channels::{Channel, InboundUpdate};
use crate::survey::text::bilingual;
use crate::survey::{Outcome, Prompt, SurveyEngine, TextKey};

/// Owns the engine and the channel it serves.
pub struct Bot {
    engine: SurveyEngine,
    channel: Arc<dyn Channel>,
}

impl Bot {
    pub fn new(engine: SurveyEngine, channel: Arc<dyn Channel>) -> Self {
        Self { engine, channel }
    }

    /// Run until Ctrl+C or until the channel's stream ends.
    pub async fn run(self) -> crate::error::Result<()> {
        let mut updates = self.channel.start().await?;
        tracing::info!(channel = self.channel.name(), "Survey bot ready and listening");

        loop {
            let update = tokio::select! {
                biased;
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Ctrl+C received, shutting down...");
                    break;
                }
                update = updates.next() => {
                    match update {
                        Some(u) => u,
                        None => {
                            tracing::info!("Update stream ended, shutting down...");
                            break;
                        }
                    }
                }
            };

            self.handle_update(&update).await;
        }

        if let Err(e) = self.channel.shutdown().await {
            tracing::warn!("Channel shutdown failed: {}", e);
        }
        Ok(())
    }

    /// Dispatch one update and deliver the result. Failures are logged;
    /// one bad update never stops the loop.
    pub async fn handle_update(&self, update: &InboundUpdate) {
        let chat_id = update.event.chat_id.as_str();
        let outcome = match self.engine.handle(&update.event).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(chat_id, "Session storage failed: {}", e);
                Outcome::prompt(Prompt::text(bilingual(TextKey::SaveFailed)))
            }
        };

        if let Err(e) = self.channel.deliver(update, &outcome).await {
            tracing::warn!(chat_id, "Failed to deliver reply: {}", e);
        }
    }
}
