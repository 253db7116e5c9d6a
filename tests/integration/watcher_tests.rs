use super::*;
use chrono::Duration;
use market_watcher::notifier::NotificationDispatcher;
use market_watcher::watcher::{DiffEvent, Notification, RunStats};
use tokio::sync::mpsc;

fn drain(receiver: &mut mpsc::Receiver<DiffEvent>) -> Vec<DiffEvent> {
    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_price_drop_is_reported_to_owner() -> anyhow::Result<()> {
    let bot = create_test_bot();
    let ann = owner(1);
    let bob = owner(2);
    let item = seed_item(&bot.repository, ann, "Kettle1", OZON_URL, 5000, false, Duration::hours(2)).await;
    bot.scraper.available(OZON_URL, "Kettle", 4500);

    let (sender, mut receiver) = mpsc::channel(32);
    let stats = bot.watcher(10).run_once(&sender).await?;

    assert_eq!(
        stats,
        RunStats {
            pages: 1,
            visited: 1,
            updated: 1,
            skipped: 0,
            events: 1,
        }
    );

    let events = drain(&mut receiver);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].before.threshold_price, 5000);
    assert_eq!(events[0].after.current_price, 4500);
    assert_eq!(events[0].notification(), Some(Notification::PriceDecreased));

    let stored = bot.repository.find_by_id(&item.id).await?.expect("item kept");
    assert_eq!(stored.threshold_price, 4500);
    assert!(stored.scraped_at > item.scraped_at);

    let dispatcher = NotificationDispatcher::new(bot.transport.clone());
    assert_eq!(dispatcher.dispatch(&events[0]).await, Some(Notification::PriceDecreased));

    let sent = bot.transport.sent_to(ann.chat_id);
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains("went down"));
    assert!(sent[0].contains("45\u{00A0}₽"));
    assert!(bot.transport.sent_to(bob.chat_id).is_empty());

    Ok(())
}

#[tokio::test]
async fn test_back_in_stock_is_reported() -> anyhow::Result<()> {
    let bot = create_test_bot();
    let ann = owner(1);
    seed_item(&bot.repository, ann, "Sneaker", WB_URL, 3000, true, Duration::hours(1)).await;
    bot.scraper.available(WB_URL, "Sneakers", 3500);

    let (sender, mut receiver) = mpsc::channel(32);
    bot.watcher(10).run_once(&sender).await?;

    let events = drain(&mut receiver);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].notification(), Some(Notification::BackInStock));

    let dispatcher = NotificationDispatcher::new(bot.transport.clone());
    dispatcher.dispatch(&events[0]).await;
    assert!(bot.transport.last_text().contains("back on sale"));

    Ok(())
}

#[tokio::test]
async fn test_going_out_of_stock_updates_quietly() -> anyhow::Result<()> {
    let bot = create_test_bot();
    let ann = owner(1);
    let item = seed_item(&bot.repository, ann, "Kettle1", OZON_URL, 5000, false, Duration::hours(1)).await;
    bot.scraper.out_of_stock(OZON_URL, "Kettle");

    let (sender, mut receiver) = mpsc::channel(32);
    bot.watcher(10).run_once(&sender).await?;

    let stored = bot.repository.find_by_id(&item.id).await?.expect("item kept");
    assert!(stored.out_of_stock);
    assert_eq!(stored.current_price, 5000);

    let events = drain(&mut receiver);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].notification(), None);

    let dispatcher = NotificationDispatcher::new(bot.transport.clone());
    assert_eq!(dispatcher.dispatch(&events[0]).await, None);
    assert!(bot.transport.calls().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_still_out_of_stock_emits_nothing() -> anyhow::Result<()> {
    let bot = create_test_bot();
    let ann = owner(1);
    seed_item(&bot.repository, ann, "Kettle1", OZON_URL, 5000, true, Duration::hours(1)).await;
    bot.scraper.out_of_stock(OZON_URL, "Kettle");

    let (sender, mut receiver) = mpsc::channel(32);
    let stats = bot.watcher(10).run_once(&sender).await?;

    assert_eq!(stats.updated, 1);
    assert_eq!(stats.events, 0);
    assert!(drain(&mut receiver).is_empty());

    Ok(())
}

#[tokio::test]
async fn test_failed_item_is_skipped_and_stays_stale() -> anyhow::Result<()> {
    let bot = create_test_bot();
    let ann = owner(1);
    let broken = seed_item(&bot.repository, ann, "Broken1", WB_URL, 1000, false, Duration::hours(3)).await;
    seed_item(&bot.repository, ann, "Kettle1", OZON_URL, 5000, false, Duration::hours(2)).await;
    bot.scraper.available(OZON_URL, "Kettle", 5000);

    let (sender, _receiver) = mpsc::channel(32);
    let watcher = bot.watcher(10);
    let stats = watcher.run_once(&sender).await?;

    assert_eq!(stats.visited, 2);
    assert_eq!(stats.updated, 1);
    assert_eq!(stats.skipped, 1);

    let stored = bot.repository.find_by_id(&broken.id).await?.expect("item kept");
    assert_eq!(stored.scraped_at, broken.scraped_at);

    // Picked up again by the next run
    let stats = watcher.run_once(&sender).await?;
    assert_eq!(stats.visited, 1);
    assert_eq!(stats.skipped, 1);

    Ok(())
}

#[tokio::test]
async fn test_run_walks_every_stale_page() -> anyhow::Result<()> {
    let bot = create_test_bot();
    let ann = owner(1);
    for i in 0..7 {
        let url = format!("https://www.ozon.ru/product/item-{}/", i);
        seed_item(&bot.repository, ann, &format!("Stale{:02}", i), &url, 1000, false, Duration::hours(1)).await;
        bot.scraper.available(&url, "Item", 1000);
    }
    seed_item(&bot.repository, ann, "Fresh01", OZON_URL, 5000, false, Duration::minutes(1)).await;

    let (sender, _receiver) = mpsc::channel(32);
    let stats = bot.watcher(3).run_once(&sender).await?;

    assert_eq!(stats.pages, 3);
    assert_eq!(stats.visited, 7);
    assert_eq!(stats.updated, 7);
    assert_eq!(bot.scraper.batches(), 3);

    Ok(())
}

#[tokio::test]
async fn test_browser_launch_failure_aborts_run() -> anyhow::Result<()> {
    let bot = create_test_bot();
    let ann = owner(1);
    let item = seed_item(&bot.repository, ann, "Kettle1", OZON_URL, 5000, false, Duration::hours(1)).await;
    bot.scraper.available(OZON_URL, "Kettle", 4000);
    bot.scraper.fail_launch();

    let (sender, mut receiver) = mpsc::channel(32);
    let result = bot.watcher(10).run_once(&sender).await;

    assert!(result.is_err());
    assert!(drain(&mut receiver).is_empty());
    assert_eq!(bot.repository.find_by_id(&item.id).await?, Some(item));

    Ok(())
}

#[tokio::test]
async fn test_overlapping_runs_do_not_scrape_concurrently() -> anyhow::Result<()> {
    let bot = create_test_bot();
    let ann = owner(1);
    seed_item(&bot.repository, ann, "Kettle1", OZON_URL, 5000, false, Duration::hours(1)).await;
    bot.scraper.available(OZON_URL, "Kettle", 4800);
    bot.scraper.delay(50);

    let (sender, mut receiver) = mpsc::channel(32);
    let watcher = bot.watcher(10);
    let (first, second) = tokio::join!(watcher.run_once(&sender), watcher.run_once(&sender));

    assert_eq!(bot.scraper.max_concurrent_batches(), 1);
    assert_eq!(first?.visited + second?.visited, 1);
    assert_eq!(drain(&mut receiver).len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_undeliverable_notification_is_dropped() {
    let bot = create_test_bot();
    let ann = owner(1);
    let before = seed_item(&bot.repository, ann, "Kettle1", OZON_URL, 5000, false, Duration::hours(1)).await;
    let mut after = before.clone();
    after.current_price = 4000;
    after.threshold_price = 4000;

    bot.transport.fail_sends(true);
    let dispatcher = NotificationDispatcher::new(bot.transport.clone());

    assert_eq!(dispatcher.dispatch(&DiffEvent { before, after }).await, None);
}
