use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub current_page: u32,
    pub per_page: u32,
    pub total: u64,
    pub last_page: u32,
}

impl<T> PaginatedResult<T> {
    pub fn new(items: Vec<T>, current_page: u32, per_page: u32, total: u64) -> Self {
        let last_page = if total == 0 || per_page == 0 {
            1
        } else {
            total.div_ceil(per_page as u64).min(u32::MAX as u64) as u32
        };

        Self {
            items,
            current_page,
            per_page,
            total,
            last_page,
        }
    }

    pub fn is_last_page(&self) -> bool {
        self.current_page >= self.last_page
    }

    /// 1-based position of the first item of this page.
    pub fn first_position(&self) -> u64 {
        (self.current_page.saturating_sub(1) as u64) * self.per_page as u64 + 1
    }
}

/// Row offset for a 1-based page number.
pub fn page_offset(page: u32, per_page: u32) -> i64 {
    (page.max(1) as i64 - 1) * per_page as i64
}
