use thiserror::Error;

use crate::conversation::fsm::TransitionError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Telegram API error: {method} ({code}): {description}")]
    Telegram {
        method: String,
        code: i64,
        description: String,
    },

    #[error("Scraping error: {0}")]
    Scraping(String),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("Internal error: {0}")]
    Internal(String),
}
