// Shared fixtures for the integration tests: a chat transport that records
// everything the bot says and a scraper with canned answers per url.

pub mod conversation_tests;
pub mod watcher_tests;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use market_watcher::config::{ConversationConfig, WatcherConfig};
use market_watcher::conversation::{ConversationEngine, ConversationStore};
use market_watcher::marketplace::Vendor;
use market_watcher::models::{Owner, Snapshot, TrackedItem};
use market_watcher::product_manager::ProductManager;
use market_watcher::repository::{InMemoryRepository, TrackedItemRepository};
use market_watcher::scraper::{BatchItem, ProductScraper, ScrapeError, ScrapeOutcome, ScrapeResult};
use market_watcher::telegram::{ChatTransport, InboundEvent, InlineKeyboard, OutgoingMessage, SentMessage};
use market_watcher::watcher::Watcher;

pub const OZON_URL: &str = "https://www.ozon.ru/product/kettle-42/";
pub const WB_URL: &str = "https://www.wildberries.ru/catalog/12345678/detail.aspx";

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Send {
        chat_id: i64,
        text: String,
        keyboard: Option<InlineKeyboard>,
    },
    Edit {
        chat_id: i64,
        message_id: i64,
        text: String,
        keyboard: Option<InlineKeyboard>,
    },
    Answer(String),
    React(String),
}

impl Call {
    pub fn text(&self) -> Option<&str> {
        match self {
            Call::Send { text, .. } | Call::Edit { text, .. } => Some(text),
            _ => None,
        }
    }

    pub fn keyboard(&self) -> Option<&InlineKeyboard> {
        match self {
            Call::Send { keyboard, .. } | Call::Edit { keyboard, .. } => keyboard.as_ref(),
            _ => None,
        }
    }
}

#[derive(Default)]
pub struct RecordingTransport {
    calls: Mutex<Vec<Call>>,
    next_id: AtomicUsize,
    fail_sends: AtomicBool,
}

impl RecordingTransport {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn last(&self) -> Call {
        self.calls().last().cloned().expect("transport was never called")
    }

    pub fn last_text(&self) -> String {
        self.calls()
            .iter()
            .rev()
            .find_map(|call| call.text().map(str::to_string))
            .expect("no text was sent")
    }

    pub fn sent_to(&self, chat_id: i64) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Send { chat_id: to, text, .. } if to == chat_id => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn send_message(&self, chat_id: i64, message: OutgoingMessage) -> market_watcher::Result<SentMessage> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(market_watcher::AppError::Telegram {
                method: "sendMessage".to_string(),
                code: 403,
                description: "Forbidden: bot was blocked by the user".to_string(),
            });
        }

        self.calls.lock().unwrap().push(Call::Send {
            chat_id,
            text: message.text,
            keyboard: message.keyboard,
        });
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(SentMessage {
            message_id: 500 + id as i64,
        })
    }

    async fn edit_message(
        &self,
        chat_id: i64,
        message_id: i64,
        message: OutgoingMessage,
    ) -> market_watcher::Result<()> {
        self.calls.lock().unwrap().push(Call::Edit {
            chat_id,
            message_id,
            text: message.text,
            keyboard: message.keyboard,
        });
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str) -> market_watcher::Result<()> {
        self.calls.lock().unwrap().push(Call::Answer(callback_id.to_string()));
        Ok(())
    }

    async fn set_reaction(&self, _chat_id: i64, _message_id: i64, emoji: &str) -> market_watcher::Result<()> {
        self.calls.lock().unwrap().push(Call::React(emoji.to_string()));
        Ok(())
    }
}

/// Canned answers per url. Unknown urls fail as a broken page.
#[derive(Default)]
pub struct StubScraper {
    outcomes: Mutex<HashMap<String, ScrapeResult>>,
    launch_fails: AtomicBool,
    delay_ms: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
    batches: AtomicUsize,
}

impl StubScraper {
    pub fn set(&self, url: &str, result: ScrapeResult) {
        self.outcomes.lock().unwrap().insert(url.to_string(), result);
    }

    pub fn available(&self, url: &str, title: &str, price: i64) {
        let vendor = vendor_of(url);
        self.set(url, Ok(ScrapeOutcome::Available(Snapshot::available(url, vendor, title.to_string(), price))));
    }

    pub fn out_of_stock(&self, url: &str, title: &str) {
        let vendor = vendor_of(url);
        self.set(url, Ok(ScrapeOutcome::OutOfStock(Snapshot::out_of_stock(url, vendor, title.to_string()))));
    }

    pub fn fail_launch(&self) {
        self.launch_fails.store(true, Ordering::SeqCst);
    }

    pub fn delay(&self, millis: usize) {
        self.delay_ms.store(millis, Ordering::SeqCst);
    }

    pub fn max_concurrent_batches(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn batches(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }

    fn lookup(&self, url: &str) -> ScrapeResult {
        self.outcomes
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or_else(|| Err(ScrapeError::UnexpectedPage("no price on page".to_string())))
    }
}

fn vendor_of(url: &str) -> Vendor {
    if url.contains("ozon") { Vendor::Ozon } else { Vendor::Wildberries }
}

#[async_trait]
impl ProductScraper for StubScraper {
    async fn scrape(&self, url: &str) -> ScrapeResult {
        self.lookup(url)
    }

    async fn scrape_many(&self, urls: &[String]) -> Result<Vec<BatchItem>, ScrapeError> {
        if self.launch_fails.load(Ordering::SeqCst) {
            return Err(ScrapeError::Browser("failed to launch chrome".to_string()));
        }

        self.batches.fetch_add(1, Ordering::SeqCst);
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);

        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(delay as u64)).await;
        }

        let items = urls
            .iter()
            .map(|url| BatchItem {
                url: url.clone(),
                result: self.lookup(url),
            })
            .collect();

        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(items)
    }
}

pub struct TestBot {
    pub repository: Arc<InMemoryRepository>,
    pub products: Arc<ProductManager>,
    pub scraper: Arc<StubScraper>,
    pub transport: Arc<RecordingTransport>,
    pub engine: ConversationEngine,
}

pub fn create_test_bot() -> TestBot {
    create_test_bot_with(ConversationConfig::default())
}

pub fn create_test_bot_with(config: ConversationConfig) -> TestBot {
    let repository = Arc::new(InMemoryRepository::new());
    let products = Arc::new(ProductManager::new(repository.clone()));
    let scraper = Arc::new(StubScraper::default());
    let transport = Arc::new(RecordingTransport::default());

    let engine = ConversationEngine::new(
        ConversationStore::new(),
        Arc::clone(&products),
        scraper.clone(),
        transport.clone(),
        &config,
    );

    TestBot {
        repository,
        products,
        scraper,
        transport,
        engine,
    }
}

impl TestBot {
    pub fn watcher(&self, per_page: u32) -> Watcher {
        let config = WatcherConfig {
            per_page,
            ..WatcherConfig::default()
        };
        Watcher::new(Arc::clone(&self.products), self.scraper.clone(), &config)
    }

    pub async fn say(&self, owner: Owner, text: &str) {
        self.engine.handle(message(owner, text)).await;
    }

    pub async fn press(&self, owner: Owner, message_id: i64, payload: &str) {
        self.engine.handle(callback(owner, message_id, payload)).await;
    }
}

pub fn owner(chat_id: i64) -> Owner {
    Owner {
        chat_id,
        user_id: chat_id * 10,
    }
}

pub fn message(owner: Owner, text: &str) -> InboundEvent {
    InboundEvent {
        chat_id: owner.chat_id,
        user_id: owner.user_id,
        username: Some("tester".to_string()),
        message_id: 1,
        callback_id: None,
        text: text.to_string(),
        date: Utc::now(),
    }
}

pub fn callback(owner: Owner, message_id: i64, payload: &str) -> InboundEvent {
    InboundEvent {
        message_id,
        callback_id: Some(format!("cb-{}", message_id)),
        ..message(owner, payload)
    }
}

/// Stores an item whose last scrape happened `age` ago.
pub async fn seed_item(
    repository: &InMemoryRepository,
    owner: Owner,
    slug: &str,
    url: &str,
    price: i64,
    out_of_stock: bool,
    age: Duration,
) -> TrackedItem {
    let mut snapshot = if out_of_stock {
        Snapshot::out_of_stock(url, vendor_of(url), format!("Item {}", slug))
    } else {
        Snapshot::available(url, vendor_of(url), format!("Item {}", slug), price)
    };
    snapshot.scraped_at = Utc::now() - age;

    let mut item = TrackedItem::from_snapshot(owner, slug.to_string(), &snapshot);
    if out_of_stock {
        item.current_price = price;
        item.threshold_price = price;
    }
    repository.save(&item).await.unwrap()
}
