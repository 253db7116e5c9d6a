use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::conversation::render;
use crate::telegram::{ChatTransport, OutgoingMessage};
use crate::watcher::{DiffEvent, Notification};

/// Turns watcher events into chat notifications for the item's owner.
pub struct NotificationDispatcher {
    transport: Arc<dyn ChatTransport>,
}

impl NotificationDispatcher {
    pub fn new(transport: Arc<dyn ChatTransport>) -> Self {
        Self { transport }
    }

    pub async fn run(&self, mut events: mpsc::Receiver<DiffEvent>) {
        while let Some(event) = events.recv().await {
            self.dispatch(&event).await;
        }
        info!("Diff event stream closed");
    }

    /// Returns the notification that was delivered, if any. Send failures
    /// are logged and dropped.
    pub async fn dispatch(&self, event: &DiffEvent) -> Option<Notification> {
        let Some(notification) = event.notification() else {
            debug!(item_id = %event.after.id, "Nothing to notify");
            return None;
        };

        let text = match notification {
            Notification::BackInStock => render::back_in_stock(&event.after),
            Notification::PriceDecreased => render::price_decreased(&event.after),
        };

        match self
            .transport
            .send_message(event.after.chat_id, OutgoingMessage::html(text))
            .await
        {
            Ok(_) => {
                info!(
                    item_id = %event.after.id,
                    chat_id = event.after.chat_id,
                    notification = ?notification,
                    "Notification sent"
                );
                metrics::counter!("notifications_total", "outcome" => "sent").increment(1);
                Some(notification)
            }
            Err(e) => {
                error!(
                    item_id = %event.after.id,
                    chat_id = event.after.chat_id,
                    error = %e,
                    "Failed to send notification"
                );
                metrics::counter!("notifications_total", "outcome" => "failed").increment(1);
                None
            }
        }
    }
}
