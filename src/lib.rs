pub mod config;
pub mod conversation;
pub mod marketplace;
pub mod models;
pub mod notifier;
pub mod product_manager;
pub mod repository;
pub mod scheduler;
pub mod scraper;
pub mod telegram;
pub mod utils;
pub mod watcher;

// Re-export commonly used types
pub use config::AppConfig;
pub use utils::error::AppError;

pub type Result<T> = std::result::Result<T, AppError>;
