use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{debug, info, warn};

use crate::config::TelegramConfig;
use crate::telegram::{InboundEvent, TelegramClient};

/// Long-polls `getUpdates` and forwards every usable update as an
/// [`InboundEvent`]. Transport failures back off and retry; the loop only
/// ends once the receiving side is gone.
pub struct UpdatePoller {
    client: Arc<TelegramClient>,
    timeout_secs: u64,
    backoff_base_ms: u64,
    backoff_max: Duration,
}

impl UpdatePoller {
    pub fn new(client: Arc<TelegramClient>, config: &TelegramConfig) -> Self {
        Self {
            client,
            timeout_secs: config.poll_timeout_secs,
            backoff_base_ms: config.backoff_base_ms,
            backoff_max: Duration::from_millis(config.backoff_max_ms),
        }
    }

    // Delays double from roughly the base up to the cap
    fn backoff(&self) -> impl Iterator<Item = Duration> {
        ExponentialBackoff::from_millis(2)
            .factor((self.backoff_base_ms / 2).max(1))
            .max_delay(self.backoff_max)
            .map(jitter)
    }

    pub async fn run(self, sender: mpsc::Sender<InboundEvent>) {
        let mut offset = 0;
        let mut backoff = self.backoff();

        info!(timeout_secs = self.timeout_secs, "Polling for updates");

        loop {
            let updates = match self.client.get_updates(offset, self.timeout_secs).await {
                Ok(updates) => updates,
                Err(e) => {
                    let delay = backoff.next().unwrap_or(self.backoff_max);
                    warn!(error = %e, delay_ms = delay.as_millis() as u64, "getUpdates failed, backing off");
                    metrics::counter!("telegram_poll_failures_total").increment(1);
                    tokio::time::sleep(delay).await;
                    continue;
                }
            };
            backoff = self.backoff();

            for update in updates {
                offset = offset.max(update.update_id + 1);

                let Some(event) = update.into_event() else {
                    debug!("Ignoring update without text");
                    continue;
                };

                if sender.send(event).await.is_err() {
                    info!("Event receiver closed, stopping poller");
                    return;
                }
            }
        }
    }
}
