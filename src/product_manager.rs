use std::sync::Arc;
use tracing::{debug, info};

use crate::models::{Owner, PaginatedResult, Snapshot, TrackedItem, generate_slug};
use crate::repository::TrackedItemRepository;
use crate::{AppError, Result};

const MAX_SLUG_ATTEMPTS: usize = 100;

/// Tracked-item operations shared by the chat dialog and the watcher.
pub struct ProductManager {
    repository: Arc<dyn TrackedItemRepository>,
    slug_generator: fn() -> String,
}

impl ProductManager {
    pub fn new(repository: Arc<dyn TrackedItemRepository>) -> Self {
        Self {
            repository,
            slug_generator: generate_slug,
        }
    }

    pub fn with_slug_generator(mut self, slug_generator: fn() -> String) -> Self {
        self.slug_generator = slug_generator;
        self
    }

    pub async fn find_tracked(&self, owner: Owner, url: &str) -> Result<Option<TrackedItem>> {
        self.repository.find_by_owner_and_url(owner, url).await
    }

    pub async fn find_by_slug(&self, owner: Owner, slug: &str) -> Result<Option<TrackedItem>> {
        self.repository.find_by_owner_and_slug(owner, slug).await
    }

    /// Starts tracking a freshly scraped product for `owner`.
    pub async fn track(&self, owner: Owner, snapshot: &Snapshot) -> Result<TrackedItem> {
        let slug = self.unique_slug().await?;
        let item = TrackedItem::from_snapshot(owner, slug, snapshot);
        let saved = self.repository.save(&item).await?;

        info!(
            item_id = %saved.id,
            slug = %saved.slug,
            chat_id = owner.chat_id,
            vendor = %saved.vendor,
            "Tracking new product"
        );
        Ok(saved)
    }

    /// Draws slugs until the repository reports one as unused.
    pub async fn unique_slug(&self) -> Result<String> {
        for attempt in 1..=MAX_SLUG_ATTEMPTS {
            let slug = (self.slug_generator)();
            if self.repository.is_slug_unique(&slug).await? {
                return Ok(slug);
            }
            debug!(attempt, "Slug collision, regenerating");
        }

        Err(AppError::Internal(format!(
            "no unique slug after {} attempts",
            MAX_SLUG_ATTEMPTS
        )))
    }

    pub async fn list_for_owner(
        &self,
        owner: Owner,
        page: u32,
        per_page: u32,
    ) -> Result<PaginatedResult<TrackedItem>> {
        let page = page.max(1);
        let (items, total) = self
            .repository
            .find_by_owner_paginated(owner, page, per_page)
            .await?;
        Ok(PaginatedResult::new(items, page, per_page, total))
    }

    pub async fn stale_page(
        &self,
        staleness: chrono::Duration,
        page: u32,
        per_page: u32,
    ) -> Result<PaginatedResult<TrackedItem>> {
        let page = page.max(1);
        let (items, total) = self
            .repository
            .find_stale_paginated(staleness, page, per_page)
            .await?;
        Ok(PaginatedResult::new(items, page, per_page, total))
    }

    pub async fn update(&self, item: &TrackedItem) -> Result<TrackedItem> {
        self.repository.save(item).await
    }

    /// Deletes the owner's item with this slug, returning it when it existed.
    pub async fn delete_by_slug(&self, owner: Owner, slug: &str) -> Result<Option<TrackedItem>> {
        let Some(item) = self.repository.find_by_owner_and_slug(owner, slug).await? else {
            return Ok(None);
        };

        if !self.repository.delete(&item.id).await? {
            return Ok(None);
        }

        info!(item_id = %item.id, slug = %item.slug, chat_id = owner.chat_id, "Stopped tracking product");
        Ok(Some(item))
    }
}
