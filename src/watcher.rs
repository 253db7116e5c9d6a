use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, error, info, warn};

use crate::config::WatcherConfig;
use crate::models::TrackedItem;
use crate::product_manager::ProductManager;
use crate::scraper::{ProductScraper, ScrapeOutcome};
use crate::{AppError, Result};

/// A tracked item before and after one watcher visit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffEvent {
    pub before: TrackedItem,
    pub after: TrackedItem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Notification {
    BackInStock,
    PriceDecreased,
}

impl DiffEvent {
    /// Decided against the threshold as it was before the visit.
    pub fn notification(&self) -> Option<Notification> {
        if self.after.out_of_stock {
            return None;
        }

        if self.before.out_of_stock {
            return Some(Notification::BackInStock);
        }

        if self.before.threshold_price > self.after.current_price {
            return Some(Notification::PriceDecreased);
        }

        None
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub pages: u32,
    pub visited: usize,
    pub updated: usize,
    pub skipped: usize,
    pub events: usize,
}

/// Re-scrapes stale tracked items and reports what changed.
pub struct Watcher {
    products: Arc<ProductManager>,
    scraper: Arc<dyn ProductScraper>,
    staleness: chrono::Duration,
    per_page: u32,
    running: Mutex<()>,
}

impl Watcher {
    pub fn new(products: Arc<ProductManager>, scraper: Arc<dyn ProductScraper>, config: &WatcherConfig) -> Self {
        Self {
            products,
            scraper,
            staleness: chrono::Duration::minutes(config.staleness_minutes),
            per_page: config.per_page.max(1),
            running: Mutex::new(()),
        }
    }

    /// One pass over every stale item, oldest first.
    ///
    /// Concurrent calls queue behind the one in progress. Items that fail to
    /// scrape or save stay stale for the next run; only a failed page query
    /// or browser launch aborts the run.
    pub async fn run_once(&self, events: &mpsc::Sender<DiffEvent>) -> Result<RunStats> {
        let _running = self.running.lock().await;
        let started = std::time::Instant::now();

        let mut stats = RunStats::default();
        let mut visited: HashSet<String> = HashSet::new();
        let mut page = 1;

        metrics::counter!("watcher_runs_total").increment(1);

        loop {
            // Updated items leave the stale set, so every page is re-queried
            let result = self.products.stale_page(self.staleness, page, self.per_page).await?;
            let last_page = result.is_last_page();
            let pending: Vec<TrackedItem> = result
                .items
                .into_iter()
                .filter(|item| !visited.contains(&item.id))
                .collect();

            if pending.is_empty() {
                if last_page {
                    break;
                }
                page += 1;
                continue;
            }

            stats.pages += 1;
            visited.extend(pending.iter().map(|item| item.id.clone()));
            debug!(page, items = pending.len(), "Scraping stale page");

            let urls: Vec<String> = pending.iter().map(|item| item.url.clone()).collect();
            let batch = self
                .scraper
                .scrape_many(&urls)
                .await
                .map_err(|e| AppError::Scraping(e.to_string()))?;

            for (item, scraped) in pending.into_iter().zip(batch) {
                stats.visited += 1;

                let snapshot = match scraped.result {
                    Ok(ScrapeOutcome::Available(snapshot)) | Ok(ScrapeOutcome::OutOfStock(snapshot)) => snapshot,
                    Ok(ScrapeOutcome::NotFound) => {
                        info!(item_id = %item.id, url = %item.url, "Tracked product not found, skipping");
                        stats.skipped += 1;
                        continue;
                    }
                    Err(e) => {
                        warn!(item_id = %item.id, url = %item.url, error = %e, "Failed to scrape tracked product");
                        stats.skipped += 1;
                        continue;
                    }
                };

                let before = item.clone();
                let mut after = item;
                after.apply_snapshot(&snapshot);

                let after = match self.products.update(&after).await {
                    Ok(saved) => saved,
                    Err(e) => {
                        error!(item_id = %before.id, error = %e, "Failed to save tracked product");
                        stats.skipped += 1;
                        continue;
                    }
                };
                stats.updated += 1;

                if before.out_of_stock && after.out_of_stock {
                    continue;
                }

                if events.send(DiffEvent { before, after }).await.is_err() {
                    warn!("Diff event receiver closed");
                } else {
                    stats.events += 1;
                }
            }
        }

        metrics::counter!("watcher_items_updated_total").increment(stats.updated as u64);
        metrics::counter!("watcher_events_total").increment(stats.events as u64);
        info!(
            pages = stats.pages,
            visited = stats.visited,
            updated = stats.updated,
            skipped = stats.skipped,
            events = stats.events,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Watcher run finished"
        );

        Ok(stats)
    }
}
