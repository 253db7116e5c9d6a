use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use market_watcher::AppConfig;
use market_watcher::config::LoggingConfig;
use market_watcher::conversation::{ConversationEngine, ConversationStore};
use market_watcher::notifier::NotificationDispatcher;
use market_watcher::product_manager::ProductManager;
use market_watcher::repository::SqliteRepository;
use market_watcher::scheduler::WatchScheduler;
use market_watcher::scraper::browser::ChromeSessionFactory;
use market_watcher::scraper::{ProductScraper, WebScraper};
use market_watcher::telegram::{ChatTransport, TelegramClient, UpdatePoller};
use market_watcher::watcher::Watcher;

const QUEUE_CAPACITY: usize = 100;

#[derive(Parser)]
#[command(name = "market-watcher", version, about = "Marketplace price watcher chat bot")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the bot (default)
    Run,
    /// Apply database migrations and exit
    Migrate,
    /// Scrape one product page and print the result as JSON
    Scrape { url: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = AppConfig::from_env().context("failed to load configuration")?;
    let _guard = init_logging(&config.logging)?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(config).await,
        Command::Migrate => migrate(config).await,
        Command::Scrape { url } => scrape(config, &url).await,
    }
}

fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.filter))?;
    let stdout = fmt::layer().with_target(false);

    let Some(directory) = &config.directory else {
        tracing_subscriber::registry().with(filter).with(stdout).init();
        return Ok(None);
    };

    let appender = tracing_appender::rolling::daily(directory, &config.file_prefix);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::registry()
        .with(filter)
        .with(stdout)
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .init();

    Ok(Some(guard))
}

async fn connect(config: &AppConfig) -> Result<Arc<SqliteRepository>> {
    let repository = SqliteRepository::connect(&config.database)
        .await
        .context("failed to connect to the database")?;
    repository.migrate().await.context("failed to apply migrations")?;
    Ok(Arc::new(repository))
}

fn web_scraper(config: &AppConfig) -> Arc<WebScraper> {
    let sessions = Arc::new(ChromeSessionFactory::new(config.scraper.clone()));
    Arc::new(WebScraper::new(sessions, config.scraper.clone()))
}

async fn migrate(config: AppConfig) -> Result<()> {
    connect(&config).await?;
    info!("Migrations applied");
    Ok(())
}

async fn scrape(config: AppConfig, url: &str) -> Result<()> {
    let outcome = web_scraper(&config).scrape(url).await?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

async fn run(config: AppConfig) -> Result<()> {
    info!("Starting market watcher...");

    if config.metrics.enabled {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(([0, 0, 0, 0], config.metrics.port))
            .install()
            .context("failed to install metrics exporter")?;
        info!(port = config.metrics.port, "Metrics exporter listening");
    }

    let repository = connect(&config).await?;
    let products = Arc::new(ProductManager::new(repository));
    let scraper: Arc<dyn ProductScraper> = web_scraper(&config);

    let client = Arc::new(TelegramClient::new(&config.telegram)?);
    let me = client.get_me().await.context("failed to reach the Bot API")?;
    info!(bot = me.username.as_deref().unwrap_or(&me.first_name), "Connected to Telegram");
    let transport: Arc<dyn ChatTransport> = client.clone();

    let store = ConversationStore::new();
    let engine = Arc::new(ConversationEngine::new(
        store.clone(),
        Arc::clone(&products),
        Arc::clone(&scraper),
        Arc::clone(&transport),
        &config.conversation,
    ));

    let (event_sender, event_receiver) = mpsc::channel(QUEUE_CAPACITY);
    let (diff_sender, diff_receiver) = mpsc::channel(QUEUE_CAPACITY);

    let poller = UpdatePoller::new(Arc::clone(&client), &config.telegram);
    let poller_handle = tokio::spawn(poller.run(event_sender));
    let engine_handle = tokio::spawn(async move { engine.run(event_receiver).await });

    let dispatcher = NotificationDispatcher::new(transport);
    let dispatcher_handle = tokio::spawn(async move { dispatcher.run(diff_receiver).await });

    let watcher = Arc::new(Watcher::new(products, scraper, &config.watcher));
    let mut scheduler =
        WatchScheduler::new(watcher, store, diff_sender, &config.watcher, &config.conversation).await?;
    scheduler.start().await?;
    scheduler.spawn_run_now();

    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");

    scheduler.shutdown().await?;
    poller_handle.abort();
    engine_handle.abort();
    dispatcher_handle.abort();

    Ok(())
}
