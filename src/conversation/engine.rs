use chrono::FixedOffset;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::ConversationConfig;
use crate::conversation::commands::Command;
use crate::conversation::context::{ConversationContext, PendingDelete, TrackingDraft};
use crate::conversation::fsm::{Event, State};
use crate::conversation::render;
use crate::conversation::session::{Conversation, ConversationKey};
use crate::conversation::store::ConversationStore;
use crate::marketplace;
use crate::product_manager::ProductManager;
use crate::scraper::{ProductScraper, ScrapeOutcome};
use crate::telegram::{ChatTransport, InboundEvent, OutgoingMessage, SentMessage};
use crate::utils::format::display_offset;
use crate::{AppError, Result};

const LOADER_TICK: Duration = Duration::from_secs(1);
const LOADER_MIN_DOTS: usize = 3;
const LOADER_MAX_DOTS: usize = 9;

/// Drives every chat dialog: parses input, moves the conversation's state
/// machine and talks back through the transport.
pub struct ConversationEngine {
    store: ConversationStore,
    products: Arc<ProductManager>,
    scraper: Arc<dyn ProductScraper>,
    transport: Arc<dyn ChatTransport>,
    listing_per_page: u32,
    display_offset: FixedOffset,
    loader_tick: Duration,
}

impl ConversationEngine {
    pub fn new(
        store: ConversationStore,
        products: Arc<ProductManager>,
        scraper: Arc<dyn ProductScraper>,
        transport: Arc<dyn ChatTransport>,
        config: &ConversationConfig,
    ) -> Self {
        Self {
            store,
            products,
            scraper,
            transport,
            listing_per_page: config.listing_per_page.max(1),
            display_offset: display_offset(config.display_utc_offset_minutes),
            loader_tick: LOADER_TICK,
        }
    }

    pub fn with_loader_tick(mut self, tick: Duration) -> Self {
        self.loader_tick = tick;
        self
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    /// Handles events one at a time until the sender side closes.
    pub async fn run(&self, mut events: mpsc::Receiver<InboundEvent>) {
        while let Some(event) = events.recv().await {
            self.handle(event).await;
        }
        info!("Inbound event stream closed");
    }

    pub async fn handle(&self, event: InboundEvent) {
        metrics::counter!("inbound_events_total").increment(1);

        let mut conversation = self.store.acquire(ConversationKey::from(&event)).await;
        conversation.record(&event);

        debug!(
            chat_id = event.chat_id,
            user_id = event.user_id,
            state = %conversation.state(),
            callback = event.is_callback(),
            "Handling inbound event"
        );

        if let Err(e) = self.process(&mut conversation, &event).await {
            error!(
                chat_id = event.chat_id,
                user_id = event.user_id,
                state = %conversation.state(),
                error = %e,
                "Failed to handle message"
            );
            metrics::counter!("conversation_errors_total").increment(1);
            conversation.reset();

            if let Err(e) = self.reply(&event, render::APOLOGY).await {
                error!(chat_id = event.chat_id, error = %e, "Failed to send apology");
            }
        }
    }

    async fn process(&self, conversation: &mut Conversation, event: &InboundEvent) -> Result<()> {
        if let Some(callback_id) = &event.callback_id {
            if let Err(e) = self.transport.answer_callback(callback_id).await {
                warn!(chat_id = event.chat_id, error = %e, "Failed to answer callback");
            }
        }

        let command = Command::parse(&event.text);
        match &command {
            Command::Cancel => return self.cancel(conversation, event).await,
            Command::Help => {
                self.reply(event, render::HELP).await?;
                return Ok(());
            }
            Command::Welcome => {
                self.reply(event, render::welcome(event.username.as_deref())).await?;
                return Ok(());
            }
            Command::TrackProduct => {
                conversation.reset();
                conversation.begin(
                    Event::AskForUrl,
                    ConversationContext::Tracking(TrackingDraft::new(event.owner())),
                )?;
            }
            Command::ListProducts => {
                conversation.reset();
                conversation.begin(Event::List, ConversationContext::Empty)?;
            }
            // The listing stays on screen while a delete is pending
            Command::Page(_) if matches!(conversation.state(), State::Idle | State::Deleting) => {
                conversation.begin(Event::List, ConversationContext::Empty)?;
            }
            Command::Delete(_) if conversation.state() != State::Deleting => {
                conversation.begin(Event::Delete, ConversationContext::Deleting(PendingDelete::default()))?;
            }
            _ => {}
        }

        match conversation.state() {
            State::Idle => {
                self.reply(event, render::UNKNOWN_INPUT).await?;
                Ok(())
            }
            State::AskingForUrl => self.ask_for_url(conversation, event).await,
            State::WaitingForUrl => self.wait_for_url(conversation, event).await,
            State::Scraping => self.scrape(conversation, event).await,
            State::Listing => self.show_listing(conversation, event, &command).await,
            State::Deleting => self.delete(conversation, event, &command).await,
        }
    }

    async fn reply(&self, event: &InboundEvent, text: impl Into<String>) -> Result<SentMessage> {
        self.transport
            .send_message(event.chat_id, OutgoingMessage::html(text).reply_to(event.message_id))
            .await
    }

    async fn cancel(&self, conversation: &mut Conversation, event: &InboundEvent) -> Result<()> {
        conversation.trigger(Event::Cancel)?;
        conversation.reset();

        if let Err(e) = self
            .transport
            .set_reaction(event.chat_id, event.message_id, render::CANCEL_REACTION)
            .await
        {
            warn!(chat_id = event.chat_id, error = %e, "Failed to react to cancel");
        }
        Ok(())
    }

    async fn ask_for_url(&self, conversation: &mut Conversation, event: &InboundEvent) -> Result<()> {
        self.reply(event, render::ASK_FOR_URL).await?;
        conversation.trigger(Event::WaitForUrl)?;
        Ok(())
    }

    async fn wait_for_url(&self, conversation: &mut Conversation, event: &InboundEvent) -> Result<()> {
        let Some(resolved) = marketplace::resolve(&event.text) else {
            debug!(chat_id = event.chat_id, "Unknown marketplace url");
            self.reply(event, render::UNKNOWN_VENDOR).await?;
            return Ok(());
        };

        let owner = {
            let draft = conversation
                .context_mut()
                .tracking_mut()
                .ok_or_else(|| AppError::Internal("tracking draft missing".to_string()))?;
            draft.vendor = Some(resolved.vendor);
            draft.url = Some(resolved.canonical_url.clone());
            draft.owner
        };

        if let Some(existing) = self.products.find_tracked(owner, &resolved.canonical_url).await? {
            self.reply(event, render::already_tracking(&existing)).await?;
            conversation.reset();
            return Ok(());
        }

        conversation.trigger(Event::Scrape)?;
        self.scrape(conversation, event).await
    }

    async fn scrape(&self, conversation: &mut Conversation, event: &InboundEvent) -> Result<()> {
        let draft = conversation
            .context()
            .tracking()
            .cloned()
            .ok_or_else(|| AppError::Internal("tracking draft missing".to_string()))?;
        let url = draft
            .url
            .ok_or_else(|| AppError::Internal("tracking draft has no url".to_string()))?;

        let loader = self.reply(event, render::loader(LOADER_MIN_DOTS)).await?;
        let animation = self.spawn_loader(event.chat_id, loader.message_id);

        let result = self.scraper.scrape(&url).await;

        animation.abort();
        let _ = animation.await;

        let text = match result {
            Ok(ScrapeOutcome::Available(snapshot)) | Ok(ScrapeOutcome::OutOfStock(snapshot)) => {
                match self.products.track(draft.owner, &snapshot).await {
                    Ok(item) => render::tracking_started(&item),
                    Err(e) => {
                        error!(chat_id = event.chat_id, url = %url, error = %e, "Failed to save tracked product");
                        render::SAVE_FAILED.to_string()
                    }
                }
            }
            Ok(ScrapeOutcome::NotFound) => {
                info!(chat_id = event.chat_id, url = %url, "Product not found");
                render::PRODUCT_NOT_FOUND.to_string()
            }
            Err(e) => {
                warn!(chat_id = event.chat_id, url = %url, error = %e, "Scrape failed");
                render::SCRAPE_FAILED.to_string()
            }
        };

        conversation.reset();
        self.transport
            .edit_message(event.chat_id, loader.message_id, OutgoingMessage::html(text))
            .await
    }

    /// Animates the "Searching..." message until the handle is aborted.
    fn spawn_loader(&self, chat_id: i64, message_id: i64) -> JoinHandle<()> {
        let transport = Arc::clone(&self.transport);
        let tick = self.loader_tick;

        tokio::spawn(async move {
            let mut dots = LOADER_MIN_DOTS;
            loop {
                tokio::time::sleep(tick).await;
                dots = if dots >= LOADER_MAX_DOTS { LOADER_MIN_DOTS } else { dots + 1 };

                let message = OutgoingMessage::html(render::loader(dots));
                if let Err(e) = transport.edit_message(chat_id, message_id, message).await {
                    debug!(chat_id, error = %e, "Loader update failed");
                }
            }
        })
    }

    async fn show_listing(&self, conversation: &mut Conversation, event: &InboundEvent, command: &Command) -> Result<()> {
        let page = match command {
            Command::Page(page) => *page,
            Command::ListProducts => 1,
            _ => {
                self.reply(event, render::UNKNOWN_INPUT).await?;
                return Ok(());
            }
        };

        let owner = event.owner();
        let mut result = self.products.list_for_owner(owner, page, self.listing_per_page).await?;

        if result.total == 0 {
            self.reply(event, render::EMPTY_LISTING).await?;
            conversation.reset();
            return Ok(());
        }

        // Stale navigation buttons can point past the end after deletions
        if result.items.is_empty() && page > result.last_page {
            result = self
                .products
                .list_for_owner(owner, result.last_page, self.listing_per_page)
                .await?;
        }

        let message = OutgoingMessage::html(render::listing(&result, self.display_offset))
            .with_keyboard(render::page_keyboard(&result));

        if event.is_callback() {
            self.transport
                .edit_message(event.chat_id, event.message_id, message)
                .await
        } else {
            self.transport
                .send_message(event.chat_id, message.reply_to(event.message_id))
                .await
                .map(|_| ())
        }
    }

    async fn delete(&self, conversation: &mut Conversation, event: &InboundEvent, command: &Command) -> Result<()> {
        let owner = event.owner();

        match command {
            Command::Yes => {
                let slug = conversation
                    .context()
                    .pending_delete()
                    .and_then(|pending| pending.slug.clone());

                let deleted = match slug {
                    Some(slug) => self.products.delete_by_slug(owner, &slug).await?,
                    None => None,
                };

                match deleted {
                    Some(item) => self.reply(event, render::deleted(&item)).await?,
                    None => self.reply(event, render::NO_SUCH_ITEM).await?,
                };
                conversation.reset();
                Ok(())
            }
            Command::No => {
                self.reply(event, render::DELETE_CANCELLED).await?;
                conversation.reset();
                Ok(())
            }
            _ => {
                let slug = match command {
                    Command::Delete(slug) => slug.clone(),
                    _ => event.text.trim().to_string(),
                };

                if slug.is_empty() {
                    self.reply(event, render::ASK_FOR_SLUG).await?;
                    return Ok(());
                }

                match self.products.find_by_slug(owner, &slug).await? {
                    Some(item) => {
                        if let Some(pending) = conversation.context_mut().pending_delete_mut() {
                            pending.slug = Some(item.slug.clone());
                        }
                        let message = OutgoingMessage::html(render::confirm_delete(&item))
                            .reply_to(event.message_id)
                            .with_keyboard(Some(render::confirm_keyboard()));
                        self.transport.send_message(event.chat_id, message).await?;
                    }
                    None => {
                        self.reply(event, render::NO_SUCH_ITEM).await?;
                    }
                }
                Ok(())
            }
        }
    }
}
