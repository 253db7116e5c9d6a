use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::marketplace::Vendor;
use crate::models::{generate_id, Owner, Snapshot};

/// A product a chat user asked to watch.
///
/// Prices are stored in minor currency units. `threshold_price` is the last
/// price the owner was told about; notifications compare against it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct TrackedItem {
    pub id: String,
    pub chat_id: i64,
    pub user_id: i64,
    pub slug: String,
    pub url: String,
    pub vendor: Vendor,
    pub title: String,
    pub threshold_price: i64,
    pub current_price: i64,
    pub out_of_stock: bool,
    pub scraped_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TrackedItem {
    /// Builds a new, unsaved item from the first successful scrape. The
    /// threshold starts at the scraped price.
    pub fn from_snapshot(owner: Owner, slug: String, snapshot: &Snapshot) -> Self {
        let now = Utc::now();
        let price = snapshot.price.max(0);
        Self {
            id: generate_id(),
            chat_id: owner.chat_id,
            user_id: owner.user_id,
            slug,
            url: snapshot.url.clone(),
            vendor: snapshot.vendor,
            title: snapshot.title.clone(),
            threshold_price: price,
            current_price: price,
            out_of_stock: snapshot.out_of_stock,
            scraped_at: snapshot.scraped_at,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn owner(&self) -> Owner {
        Owner {
            chat_id: self.chat_id,
            user_id: self.user_id,
        }
    }

    /// Applies a fresh scrape result.
    ///
    /// An out-of-stock snapshot only flips the flag and the timestamp. An
    /// in-stock snapshot also moves the current price, and the threshold
    /// follows it, but only for positive prices.
    pub fn apply_snapshot(&mut self, snapshot: &Snapshot) {
        self.scraped_at = snapshot.scraped_at;
        self.out_of_stock = snapshot.out_of_stock;
        self.updated_at = Utc::now();

        if snapshot.out_of_stock || snapshot.price <= 0 {
            return;
        }

        self.current_price = snapshot.price;
        if self.threshold_price != snapshot.price {
            self.threshold_price = snapshot.price;
        }
    }
}
