use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use std::time::Duration;

use crate::Result;
use crate::config::DatabaseConfig;
use crate::models::{Owner, TrackedItem, page_offset};
use crate::repository::TrackedItemRepository;

const COLUMNS: &str = "id, chat_id, user_id, slug, url, vendor, title, threshold_price, current_price, \
                       out_of_stock, scraped_at, created_at, updated_at";

/// SQLite-backed repository using `sqlx::SqlitePool`.
#[derive(Debug, Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout))
            .connect(&config.url)
            .await?;

        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl TrackedItemRepository for SqliteRepository {
    async fn find_by_owner_and_url(&self, owner: Owner, url: &str) -> Result<Option<TrackedItem>> {
        let item = sqlx::query_as::<_, TrackedItem>(&format!(
            "SELECT {COLUMNS} FROM tracked_items WHERE chat_id = ? AND user_id = ? AND url = ? LIMIT 1"
        ))
        .bind(owner.chat_id)
        .bind(owner.user_id)
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;

        Ok(item)
    }

    async fn find_by_owner_and_slug(&self, owner: Owner, slug: &str) -> Result<Option<TrackedItem>> {
        let item = sqlx::query_as::<_, TrackedItem>(&format!(
            "SELECT {COLUMNS} FROM tracked_items WHERE chat_id = ? AND user_id = ? AND slug = ?"
        ))
        .bind(owner.chat_id)
        .bind(owner.user_id)
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        Ok(item)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<TrackedItem>> {
        let item = sqlx::query_as::<_, TrackedItem>(&format!("SELECT {COLUMNS} FROM tracked_items WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(item)
    }

    async fn find_by_owner_paginated(
        &self,
        owner: Owner,
        page: u32,
        per_page: u32,
    ) -> Result<(Vec<TrackedItem>, u64)> {
        let items = sqlx::query_as::<_, TrackedItem>(&format!(
            "SELECT {COLUMNS} FROM tracked_items WHERE chat_id = ? AND user_id = ? \
             ORDER BY created_at ASC, id ASC LIMIT ? OFFSET ?"
        ))
        .bind(owner.chat_id)
        .bind(owner.user_id)
        .bind(per_page as i64)
        .bind(page_offset(page, per_page))
        .fetch_all(&self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM tracked_items WHERE chat_id = ? AND user_id = ?",
        )
        .bind(owner.chat_id)
        .bind(owner.user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok((items, total.max(0) as u64))
    }

    async fn find_stale_paginated(
        &self,
        staleness: chrono::Duration,
        page: u32,
        per_page: u32,
    ) -> Result<(Vec<TrackedItem>, u64)> {
        let cutoff = Utc::now() - staleness;

        let items = sqlx::query_as::<_, TrackedItem>(&format!(
            "SELECT {COLUMNS} FROM tracked_items WHERE scraped_at <= ? \
             ORDER BY scraped_at ASC, id ASC LIMIT ? OFFSET ?"
        ))
        .bind(cutoff)
        .bind(per_page as i64)
        .bind(page_offset(page, per_page))
        .fetch_all(&self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM tracked_items WHERE scraped_at <= ?")
            .bind(cutoff)
            .fetch_one(&self.pool)
            .await?;

        Ok((items, total.max(0) as u64))
    }

    async fn save(&self, item: &TrackedItem) -> Result<TrackedItem> {
        let saved = sqlx::query_as::<_, TrackedItem>(&format!(
            "INSERT INTO tracked_items ({COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET \
                url = excluded.url, \
                vendor = excluded.vendor, \
                title = excluded.title, \
                threshold_price = excluded.threshold_price, \
                current_price = excluded.current_price, \
                out_of_stock = excluded.out_of_stock, \
                scraped_at = excluded.scraped_at, \
                updated_at = excluded.updated_at \
             RETURNING {COLUMNS}"
        ))
        .bind(&item.id)
        .bind(item.chat_id)
        .bind(item.user_id)
        .bind(&item.slug)
        .bind(&item.url)
        .bind(item.vendor)
        .bind(&item.title)
        .bind(item.threshold_price)
        .bind(item.current_price)
        .bind(item.out_of_stock)
        .bind(item.scraped_at)
        .bind(item.created_at)
        .bind(item.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(saved)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM tracked_items WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn is_slug_unique(&self, slug: &str) -> Result<bool> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM tracked_items WHERE slug = ?")
            .bind(slug)
            .fetch_one(&self.pool)
            .await?;

        Ok(count == 0)
    }
}
