use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub telegram: TelegramConfig,
    pub database: DatabaseConfig,
    pub scraper: ScraperConfig,
    pub watcher: WatcherConfig,
    pub conversation: ConversationConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub token: String,
    pub api_url: String,
    pub poll_timeout_secs: u64,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    pub page_timeout_secs: u64,
    pub cooldown_ms: u64,
    pub user_agent: String,
    pub chrome_path: Option<String>,
    pub headless: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    pub interval_minutes: u64,
    pub staleness_minutes: i64,
    pub per_page: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    pub listing_per_page: u32,
    pub inactivity_minutes: i64,
    pub sweep_interval_minutes: u64,
    pub display_utc_offset_minutes: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub directory: Option<String>,
    pub file_prefix: String,
    pub filter: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

impl ScraperConfig {
    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout_secs)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            page_timeout_secs: 15,
            cooldown_ms: 2000,
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36".to_string(),
            chrome_path: None,
            headless: true,
        }
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            interval_minutes: 30,
            staleness_minutes: 30,
            per_page: 10,
        }
    }
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            listing_per_page: 10,
            inactivity_minutes: 10,
            sweep_interval_minutes: 10,
            display_utc_offset_minutes: 0,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start with default configuration
            .add_source(File::with_name("config/default"))
            // Add environment-specific config
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add local config (ignored by git)
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables with prefix "MARKETWATCH_"
            .add_source(Environment::with_prefix("MARKETWATCH").separator("__"))
            .build()?;

        let mut config: AppConfig = s.try_deserialize()?;

        if config.telegram.token.is_empty() {
            config.telegram.token = env::var("TELEGRAM_BOT_TOKEN").unwrap_or_default();
        }

        if config.scraper.chrome_path.is_none() {
            config.scraper.chrome_path = env::var("CHROME_PATH").ok();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.telegram.token.trim().is_empty() {
            return Err(ConfigError::Message("Telegram bot token must be set".into()));
        }

        if Url::parse(&self.telegram.api_url).is_err() {
            return Err(ConfigError::Message("Invalid Telegram API URL format".into()));
        }

        if self.telegram.poll_timeout_secs == 0 {
            return Err(ConfigError::Message("Telegram poll_timeout_secs must be greater than 0".into()));
        }

        if self.telegram.backoff_base_ms == 0 || self.telegram.backoff_max_ms < self.telegram.backoff_base_ms {
            return Err(ConfigError::Message("Telegram backoff_max_ms must be at least backoff_base_ms, which must be greater than 0".into()));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Message("Database max_connections must be greater than 0".into()));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigError::Message("Database min_connections cannot exceed max_connections".into()));
        }

        if self.scraper.page_timeout_secs == 0 {
            return Err(ConfigError::Message("Scraper page_timeout_secs must be greater than 0".into()));
        }

        if self.watcher.interval_minutes == 0 {
            return Err(ConfigError::Message("Watcher interval_minutes must be greater than 0".into()));
        }

        if self.watcher.staleness_minutes < 0 {
            return Err(ConfigError::Message("Watcher staleness_minutes cannot be negative".into()));
        }

        if self.watcher.per_page == 0 || self.conversation.listing_per_page == 0 {
            return Err(ConfigError::Message("Page sizes must be greater than 0".into()));
        }

        if self.conversation.inactivity_minutes <= 0 || self.conversation.sweep_interval_minutes == 0 {
            return Err(ConfigError::Message("Conversation inactivity and sweep intervals must be greater than 0".into()));
        }

        // chrono::FixedOffset accepts strictly less than one day
        if self.conversation.display_utc_offset_minutes.abs() >= 24 * 60 {
            return Err(ConfigError::Message("Display UTC offset must be within +/-24 hours".into()));
        }

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(ConfigError::Message("Metrics port must be greater than 0".into()));
        }

        Ok(())
    }
}
