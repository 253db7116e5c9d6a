pub mod browser;
pub mod fixture;
pub mod recipes;

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::ScraperConfig;
use crate::marketplace::{self, ResolvedUrl};
use crate::models::Snapshot;
use browser::{BrowserSession, SessionFactory};
use recipes::RecipeBook;

/// What a product page said about the item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "snapshot", rename_all = "snake_case")]
pub enum ScrapeOutcome {
    Available(Snapshot),
    /// The listing exists but cannot be bought; the title is still known.
    OutOfStock(Snapshot),
    NotFound,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScrapeError {
    #[error("empty url")]
    EmptyInput,

    #[error("unsupported marketplace url: {0}")]
    UnsupportedVendor(String),

    #[error("browser error: {0}")]
    Browser(String),

    #[error("page did not load within {0:?}")]
    Timeout(Duration),

    #[error("unexpected page shape: {0}")]
    UnexpectedPage(String),
}

pub type ScrapeResult = Result<ScrapeOutcome, ScrapeError>;

impl ScrapeError {
    /// Failures worth retrying later, as opposed to bad input.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ScrapeError::Browser(_) | ScrapeError::Timeout(_) | ScrapeError::UnexpectedPage(_)
        )
    }
}

impl ScrapeOutcome {
    pub fn snapshot(&self) -> Option<&Snapshot> {
        match self {
            ScrapeOutcome::Available(snapshot) | ScrapeOutcome::OutOfStock(snapshot) => Some(snapshot),
            ScrapeOutcome::NotFound => None,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ScrapeOutcome::Available(_) => "available",
            ScrapeOutcome::OutOfStock(_) => "out_of_stock",
            ScrapeOutcome::NotFound => "not_found",
        }
    }
}

#[derive(Debug, Clone)]
pub struct BatchItem {
    pub url: String,
    pub result: ScrapeResult,
}

#[async_trait]
pub trait ProductScraper: Send + Sync {
    async fn scrape(&self, url: &str) -> ScrapeResult;

    /// Scrapes every url in order with one browser session, pausing between
    /// page loads. Per-item failures land in the returned items; the call
    /// only fails when no session could be started.
    async fn scrape_many(&self, urls: &[String]) -> Result<Vec<BatchItem>, ScrapeError>;
}

pub struct WebScraper {
    sessions: Arc<dyn SessionFactory>,
    recipes: Arc<RecipeBook>,
    config: ScraperConfig,
}

impl WebScraper {
    pub fn new(sessions: Arc<dyn SessionFactory>, config: ScraperConfig) -> Self {
        Self::with_recipes(sessions, RecipeBook::default(), config)
    }

    pub fn with_recipes(sessions: Arc<dyn SessionFactory>, recipes: RecipeBook, config: ScraperConfig) -> Self {
        Self {
            sessions,
            recipes: Arc::new(recipes),
            config,
        }
    }

    async fn run_batch(&self, urls: Vec<String>) -> Result<Vec<BatchItem>, ScrapeError> {
        let sessions = Arc::clone(&self.sessions);
        let recipes = Arc::clone(&self.recipes);
        let config = self.config.clone();

        // headless_chrome blocks, keep it off the async workers
        tokio::task::spawn_blocking(move || scrape_batch_blocking(sessions.as_ref(), &recipes, &config, &urls))
            .await
            .map_err(|e| ScrapeError::Browser(format!("scrape task failed: {}", e)))?
    }
}

#[async_trait]
impl ProductScraper for WebScraper {
    async fn scrape(&self, url: &str) -> ScrapeResult {
        // Input problems never reach the browser
        resolve_input(url)?;

        let mut items = self.run_batch(vec![url.to_string()]).await?;
        match items.pop() {
            Some(item) => item.result,
            None => Err(ScrapeError::Browser("scrape produced no result".to_string())),
        }
    }

    async fn scrape_many(&self, urls: &[String]) -> Result<Vec<BatchItem>, ScrapeError> {
        if urls.is_empty() {
            return Ok(Vec::new());
        }
        self.run_batch(urls.to_vec()).await
    }
}

fn resolve_input(url: &str) -> Result<ResolvedUrl, ScrapeError> {
    if url.trim().is_empty() {
        return Err(ScrapeError::EmptyInput);
    }
    marketplace::resolve(url).ok_or_else(|| ScrapeError::UnsupportedVendor(url.trim().to_string()))
}

fn scrape_batch_blocking(
    sessions: &dyn SessionFactory,
    recipes: &RecipeBook,
    config: &ScraperConfig,
    urls: &[String],
) -> Result<Vec<BatchItem>, ScrapeError> {
    let mut session: Option<Box<dyn BrowserSession>> = None;
    let mut visited_any = false;
    let mut items = Vec::with_capacity(urls.len());

    for url in urls {
        let result = match resolve_input(url) {
            Err(e) => Err(e),
            Ok(resolved) => {
                if visited_any {
                    std::thread::sleep(config.cooldown());
                }
                visited_any = true;

                if session.is_none() {
                    session = Some(sessions.launch()?);
                }
                match session.as_deref() {
                    Some(active) => scrape_page(active, recipes, config, &resolved),
                    None => Err(ScrapeError::Browser("no browser session".to_string())),
                }
            }
        };

        let vendor = marketplace::classify(url).map_or("unknown", |vendor| vendor.name());
        match &result {
            Ok(outcome) => {
                info!(url = %url, vendor, outcome = outcome.label(), "Scraped product page");
                metrics::counter!("scrapes_total", "vendor" => vendor, "outcome" => outcome.label()).increment(1);
            }
            Err(e) if e.is_transient() => {
                warn!(url = %url, vendor, error = %e, "Scrape failed");
                metrics::counter!("scrapes_total", "vendor" => vendor, "outcome" => "error").increment(1);
            }
            Err(e) => debug!(url = %url, error = %e, "Skipped url"),
        }

        items.push(BatchItem {
            url: url.clone(),
            result,
        });
    }

    Ok(items)
}

fn scrape_page(
    session: &dyn BrowserSession,
    recipes: &RecipeBook,
    config: &ScraperConfig,
    resolved: &ResolvedUrl,
) -> ScrapeResult {
    let recipe = recipes
        .get(resolved.vendor)
        .ok_or_else(|| ScrapeError::UnsupportedVendor(resolved.canonical_url.clone()))?;

    let page = session.open_page(config.page_timeout())?;
    recipe.extract(page.as_ref(), &resolved.canonical_url)
}
