use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Result;
use crate::models::{Owner, TrackedItem, page_offset};
use crate::repository::TrackedItemRepository;

/// Process-local repository for tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    items: Arc<RwLock<HashMap<String, TrackedItem>>>, // id -> item
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }
}

fn paginate(mut items: Vec<TrackedItem>, page: u32, per_page: u32) -> (Vec<TrackedItem>, u64) {
    let total = items.len() as u64;
    let offset = page_offset(page, per_page) as usize;
    let page_items = if offset >= items.len() {
        Vec::new()
    } else {
        items.drain(offset..).take(per_page as usize).collect()
    };
    (page_items, total)
}

#[async_trait]
impl TrackedItemRepository for InMemoryRepository {
    async fn find_by_owner_and_url(&self, owner: Owner, url: &str) -> Result<Option<TrackedItem>> {
        let items = self.items.read().await;
        Ok(items
            .values()
            .find(|item| item.owner() == owner && item.url == url)
            .cloned())
    }

    async fn find_by_owner_and_slug(&self, owner: Owner, slug: &str) -> Result<Option<TrackedItem>> {
        let items = self.items.read().await;
        Ok(items
            .values()
            .find(|item| item.owner() == owner && item.slug == slug)
            .cloned())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<TrackedItem>> {
        Ok(self.items.read().await.get(id).cloned())
    }

    async fn find_by_owner_paginated(
        &self,
        owner: Owner,
        page: u32,
        per_page: u32,
    ) -> Result<(Vec<TrackedItem>, u64)> {
        let mut matching: Vec<TrackedItem> = self
            .items
            .read()
            .await
            .values()
            .filter(|item| item.owner() == owner)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

        Ok(paginate(matching, page, per_page))
    }

    async fn find_stale_paginated(
        &self,
        staleness: chrono::Duration,
        page: u32,
        per_page: u32,
    ) -> Result<(Vec<TrackedItem>, u64)> {
        let cutoff = Utc::now() - staleness;
        let mut matching: Vec<TrackedItem> = self
            .items
            .read()
            .await
            .values()
            .filter(|item| item.scraped_at <= cutoff)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.scraped_at.cmp(&b.scraped_at).then_with(|| a.id.cmp(&b.id)));

        Ok(paginate(matching, page, per_page))
    }

    async fn save(&self, item: &TrackedItem) -> Result<TrackedItem> {
        let mut items = self.items.write().await;
        let mut stored = item.clone();
        if let Some(existing) = items.get(&item.id) {
            stored.slug = existing.slug.clone();
            stored.created_at = existing.created_at;
        }
        items.insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.items.write().await.remove(id).is_some())
    }

    async fn is_slug_unique(&self, slug: &str) -> Result<bool> {
        Ok(!self.items.read().await.values().any(|item| item.slug == slug))
    }
}
