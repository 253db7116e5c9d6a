pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

use crate::Result;
use crate::models::{Owner, TrackedItem};

pub use memory::InMemoryRepository;
pub use sqlite::SqliteRepository;

/// Persistence for tracked items.
///
/// Paginated finders take 1-based page numbers and return the page's items
/// together with the total number of matching rows.
#[async_trait]
pub trait TrackedItemRepository: Send + Sync {
    async fn find_by_owner_and_url(&self, owner: Owner, url: &str) -> Result<Option<TrackedItem>>;

    async fn find_by_owner_and_slug(&self, owner: Owner, slug: &str) -> Result<Option<TrackedItem>>;

    async fn find_by_id(&self, id: &str) -> Result<Option<TrackedItem>>;

    /// The owner's items, oldest first.
    async fn find_by_owner_paginated(
        &self,
        owner: Owner,
        page: u32,
        per_page: u32,
    ) -> Result<(Vec<TrackedItem>, u64)>;

    /// Items last scraped at least `staleness` ago, least recently scraped first.
    async fn find_stale_paginated(
        &self,
        staleness: chrono::Duration,
        page: u32,
        per_page: u32,
    ) -> Result<(Vec<TrackedItem>, u64)>;

    /// Inserts a new item or updates an existing one by id. The slug is
    /// fixed at insert time.
    async fn save(&self, item: &TrackedItem) -> Result<TrackedItem>;

    /// Returns whether a row was removed.
    async fn delete(&self, id: &str) -> Result<bool>;

    async fn is_slug_unique(&self, slug: &str) -> Result<bool>;
}
