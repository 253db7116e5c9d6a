use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::marketplace::Vendor;

/// The facts read from one product page. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Snapshot {
    pub url: String,
    pub vendor: Vendor,
    pub title: String,
    /// Minor currency units; zero when the item is out of stock.
    pub price: i64,
    pub out_of_stock: bool,
    pub scraped_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn available(url: &str, vendor: Vendor, title: String, price: i64) -> Self {
        Self {
            url: url.to_string(),
            vendor,
            title,
            price,
            out_of_stock: false,
            scraped_at: Utc::now(),
        }
    }

    pub fn out_of_stock(url: &str, vendor: Vendor, title: String) -> Self {
        Self {
            url: url.to_string(),
            vendor,
            title,
            price: 0,
            out_of_stock: true,
            scraped_at: Utc::now(),
        }
    }
}
