use super::*;
use chrono::Duration;
use market_watcher::conversation::render;
use market_watcher::conversation::{ConversationKey, State};
use rstest::rstest;

async fn state_of(bot: &TestBot, owner: Owner) -> State {
    let key = ConversationKey {
        chat_id: owner.chat_id,
        user_id: owner.user_id,
    };
    match bot.engine.store().get(key).await {
        Some(conversation) => conversation.lock().await.state(),
        None => State::Idle,
    }
}

async fn seed_many(bot: &TestBot, owner: Owner, count: usize) -> Vec<TrackedItem> {
    let mut items = Vec::with_capacity(count);
    for i in 0..count {
        let url = format!("https://www.ozon.ru/product/item-{}/", i);
        let slug = format!("Slug{:03}", i);
        items.push(seed_item(&bot.repository, owner, &slug, &url, 1000 + i as i64, false, Duration::minutes(5)).await);
    }
    items
}

#[tokio::test]
async fn test_track_product_flow() -> anyhow::Result<()> {
    let bot = create_test_bot();
    let ann = owner(1);
    bot.scraper.available(OZON_URL, "Electric kettle", 249_000);

    bot.say(ann, "/trackproduct").await;
    assert_eq!(bot.transport.last_text(), render::ASK_FOR_URL);
    assert_eq!(state_of(&bot, ann).await, State::WaitingForUrl);

    bot.say(ann, "ozon.ru/product/kettle-42/?utm_source=share").await;

    let calls = bot.transport.calls();
    assert!(matches!(&calls[calls.len() - 2], Call::Send { text, .. } if text.starts_with(render::LOADER_PREFIX)));
    match bot.transport.last() {
        Call::Edit { message_id, text, .. } => {
            assert_eq!(message_id, 501);
            assert!(text.contains("Electric kettle"));
            assert!(text.contains("2490\u{00A0}₽"));
        }
        other => panic!("expected the loader to be replaced, got {:?}", other),
    }
    assert_eq!(state_of(&bot, ann).await, State::Idle);

    let stored = bot.products.find_tracked(ann, OZON_URL).await?.expect("item saved");
    assert_eq!(stored.threshold_price, 249_000);
    assert_eq!(stored.current_price, 249_000);
    assert_eq!(stored.owner(), ann);

    Ok(())
}

#[tokio::test]
async fn test_track_out_of_stock_product() -> anyhow::Result<()> {
    let bot = create_test_bot();
    let ann = owner(1);
    bot.scraper.out_of_stock(WB_URL, "Sneakers");

    bot.say(ann, "/trackproduct").await;
    bot.say(ann, WB_URL).await;

    assert!(bot.transport.last_text().contains("out of stock"));
    let stored = bot.products.find_tracked(ann, WB_URL).await?.expect("item saved");
    assert!(stored.out_of_stock);

    Ok(())
}

#[tokio::test]
async fn test_already_tracked_url_is_not_scraped_again() -> anyhow::Result<()> {
    let bot = create_test_bot();
    let ann = owner(1);
    seed_item(&bot.repository, ann, "Kettle1", OZON_URL, 5000, false, Duration::minutes(1)).await;

    bot.say(ann, "/trackproduct").await;
    bot.say(ann, OZON_URL).await;

    // No outcome is configured, so a scrape would have failed
    let reply = bot.transport.last_text();
    assert!(reply.starts_with("Already watching it"));
    assert_eq!(state_of(&bot, ann).await, State::Idle);
    assert_eq!(bot.repository.len().await, 1);

    Ok(())
}

#[tokio::test]
async fn test_unknown_marketplace_keeps_waiting() {
    let bot = create_test_bot();
    let ann = owner(1);
    bot.scraper.available(OZON_URL, "Kettle", 5000);

    bot.say(ann, "/trackproduct").await;
    bot.say(ann, "https://example.com/item/1").await;

    assert_eq!(bot.transport.last_text(), render::UNKNOWN_VENDOR);
    assert_eq!(state_of(&bot, ann).await, State::WaitingForUrl);

    bot.say(ann, OZON_URL).await;
    assert!(bot.transport.last_text().starts_with("Okay"));
}

#[tokio::test]
async fn test_failed_scrape_reports_and_resets() {
    let bot = create_test_bot();
    let ann = owner(1);
    bot.scraper.set(OZON_URL, Err(ScrapeError::Timeout(std::time::Duration::from_secs(15))));

    bot.say(ann, "/trackproduct").await;
    bot.say(ann, OZON_URL).await;

    assert_eq!(bot.transport.last_text(), render::SCRAPE_FAILED);
    assert_eq!(state_of(&bot, ann).await, State::Idle);
    assert!(bot.repository.is_empty().await);
}

#[tokio::test]
async fn test_missing_product_page() {
    let bot = create_test_bot();
    let ann = owner(1);
    bot.scraper.set(OZON_URL, Ok(ScrapeOutcome::NotFound));

    bot.say(ann, "/trackproduct").await;
    bot.say(ann, OZON_URL).await;

    assert_eq!(bot.transport.last_text(), render::PRODUCT_NOT_FOUND);
    assert!(bot.repository.is_empty().await);
}

#[tokio::test]
async fn test_conversations_are_isolated_per_user() -> anyhow::Result<()> {
    let bot = create_test_bot();
    let ann = owner(1);
    let bob = owner(2);
    bot.scraper.available(OZON_URL, "Kettle", 5000);

    bot.say(ann, "/trackproduct").await;
    bot.say(bob, "/listproducts").await;

    assert_eq!(state_of(&bot, ann).await, State::WaitingForUrl);
    assert_eq!(bot.transport.sent_to(bob.chat_id).last().map(String::as_str), Some(render::EMPTY_LISTING));

    bot.say(ann, OZON_URL).await;
    assert!(bot.products.find_tracked(ann, OZON_URL).await?.is_some());
    assert!(bot.products.find_tracked(bob, OZON_URL).await?.is_none());

    bot.say(bob, OZON_URL).await;
    assert_eq!(bot.transport.sent_to(bob.chat_id).last().map(String::as_str), Some(render::UNKNOWN_INPUT));

    Ok(())
}

#[tokio::test]
async fn test_listing_pages_through_callbacks() {
    let bot = create_test_bot();
    let ann = owner(1);
    seed_many(&bot, ann, 25).await;

    bot.say(ann, "/listproducts").await;
    let first = bot.transport.last();
    let text = first.text().unwrap_or_default().to_string();
    assert!(text.contains("<b>1.</b>"));
    assert!(text.contains("<b>10.</b>"));
    assert!(!text.contains("<b>11.</b>"));

    let buttons: Vec<String> = first.keyboard().expect("navigation keyboard").inline_keyboard[0]
        .iter()
        .map(|button| button.text.clone())
        .collect();
    assert_eq!(buttons, vec!["· 1 ·", "2 ›", "3 »"]);
    assert_eq!(state_of(&bot, ann).await, State::Listing);

    bot.press(ann, 777, "/page_3").await;

    let calls = bot.transport.calls();
    assert_eq!(calls[calls.len() - 2], Call::Answer("cb-777".to_string()));
    match bot.transport.last() {
        Call::Edit {
            message_id,
            text,
            keyboard,
            ..
        } => {
            assert_eq!(message_id, 777);
            assert!(text.contains("<b>21.</b>"));
            assert!(text.contains("<b>25.</b>"));
            let buttons: Vec<String> = keyboard.expect("keyboard").inline_keyboard[0]
                .iter()
                .map(|button| button.text.clone())
                .collect();
            assert_eq!(buttons, vec!["« 1", "‹ 2", "· 3 ·"]);
        }
        other => panic!("expected an in-place edit, got {:?}", other),
    }
}

#[tokio::test]
async fn test_stale_page_button_shows_last_page() {
    let bot = create_test_bot();
    let ann = owner(1);
    seed_many(&bot, ann, 3).await;

    // A button from an old listing, pressed while idle
    bot.press(ann, 42, "/page_4").await;

    match bot.transport.last() {
        Call::Edit {
            message_id,
            text,
            keyboard,
            ..
        } => {
            assert_eq!(message_id, 42);
            assert!(text.contains("<b>3.</b>"));
            assert!(keyboard.is_none());
        }
        other => panic!("expected an in-place edit, got {:?}", other),
    }
}

#[tokio::test]
async fn test_listing_uses_configured_page_size() {
    let bot = create_test_bot_with(ConversationConfig {
        listing_per_page: 2,
        ..ConversationConfig::default()
    });
    let ann = owner(1);
    seed_many(&bot, ann, 3).await;

    bot.say(ann, "/listproducts").await;
    let first = bot.transport.last();
    assert!(!first.text().unwrap_or_default().contains("<b>3.</b>"));
    assert!(first.keyboard().is_some());
}

#[tokio::test]
async fn test_delete_flow_with_confirmation() -> anyhow::Result<()> {
    let bot = create_test_bot();
    let ann = owner(1);
    let item = seed_item(&bot.repository, ann, "Kettle1", OZON_URL, 5000, false, Duration::minutes(1)).await;

    bot.say(ann, "/del_Kettle1").await;

    let confirmation = bot.transport.last();
    assert!(confirmation.text().unwrap_or_default().starts_with("Stop tracking"));
    let payloads: Vec<String> = confirmation.keyboard().expect("confirm keyboard").inline_keyboard[0]
        .iter()
        .map(|button| button.callback_data.clone())
        .collect();
    assert_eq!(payloads, vec!["/yes", "/no"]);
    assert_eq!(state_of(&bot, ann).await, State::Deleting);

    bot.press(ann, 501, "/yes").await;

    assert!(bot.transport.last_text().starts_with("Done"));
    assert!(bot.repository.find_by_id(&item.id).await?.is_none());
    assert_eq!(state_of(&bot, ann).await, State::Idle);

    Ok(())
}

#[tokio::test]
async fn test_delete_declined_keeps_item() {
    let bot = create_test_bot();
    let ann = owner(1);
    seed_item(&bot.repository, ann, "Kettle1", OZON_URL, 5000, false, Duration::minutes(1)).await;

    bot.say(ann, "/del_Kettle1").await;
    bot.press(ann, 501, "/no").await;

    assert_eq!(bot.transport.last_text(), render::DELETE_CANCELLED);
    assert_eq!(bot.repository.len().await, 1);
    assert_eq!(state_of(&bot, ann).await, State::Idle);
}

#[tokio::test]
async fn test_cannot_delete_someone_elses_item() {
    let bot = create_test_bot();
    let ann = owner(1);
    let bob = owner(2);
    seed_item(&bot.repository, ann, "Kettle1", OZON_URL, 5000, false, Duration::minutes(1)).await;

    bot.say(bob, "/del_Kettle1").await;
    assert_eq!(bot.transport.last_text(), render::NO_SUCH_ITEM);

    bot.say(bob, "/yes").await;
    assert_eq!(bot.transport.last_text(), render::NO_SUCH_ITEM);
    assert_eq!(bot.repository.len().await, 1);
}

#[tokio::test]
async fn test_page_button_while_confirming_delete_returns_to_listing() -> anyhow::Result<()> {
    let bot = create_test_bot();
    let ann = owner(1);
    let items = seed_many(&bot, ann, 25).await;

    bot.say(ann, "/listproducts").await;
    bot.say(ann, "/del_Slug001").await;
    assert_eq!(state_of(&bot, ann).await, State::Deleting);

    // The listing sent first is still on screen
    bot.press(ann, 500, "/page_2").await;

    match bot.transport.last() {
        Call::Edit { message_id, text, .. } => {
            assert_eq!(message_id, 500);
            assert!(text.contains("<b>11.</b>"));
            assert!(text.contains("<b>20.</b>"));
        }
        other => panic!("expected the listing to be edited, got {:?}", other),
    }
    assert_eq!(state_of(&bot, ann).await, State::Listing);
    assert_eq!(bot.repository.len().await, 25);

    bot.say(ann, "/del_Slug001").await;
    bot.press(ann, 502, "/yes").await;

    assert!(bot.transport.last_text().starts_with("Done"));
    assert!(bot.repository.find_by_id(&items[1].id).await?.is_none());
    assert_eq!(bot.repository.len().await, 24);

    Ok(())
}

#[tokio::test]
async fn test_unknown_slug_keeps_pending_delete() -> anyhow::Result<()> {
    let bot = create_test_bot();
    let ann = owner(1);
    let item = seed_item(&bot.repository, ann, "Kettle1", OZON_URL, 5000, false, Duration::minutes(1)).await;

    bot.say(ann, "/del_Kettle1").await;
    bot.say(ann, "Nope999").await;

    assert_eq!(bot.transport.last_text(), render::NO_SUCH_ITEM);
    assert_eq!(state_of(&bot, ann).await, State::Deleting);

    bot.say(ann, "/yes").await;

    assert!(bot.transport.last_text().starts_with("Done"));
    assert!(bot.repository.find_by_id(&item.id).await?.is_none());

    Ok(())
}

#[rstest]
#[case::idle(&[])]
#[case::waiting_for_url(&["/trackproduct"])]
#[case::listing(&["/listproducts"])]
#[case::deleting(&["/del_Slug000"])]
#[tokio::test]
async fn test_cancel_from_any_state(#[case] setup: &[&str]) {
    let bot = create_test_bot();
    let ann = owner(1);
    seed_many(&bot, ann, 1).await;

    for text in setup {
        bot.say(ann, text).await;
    }
    bot.say(ann, "/cancel").await;

    assert_eq!(bot.transport.last(), Call::React("👌".to_string()));
    assert_eq!(state_of(&bot, ann).await, State::Idle);

    bot.say(ann, OZON_URL).await;
    assert_eq!(bot.transport.last_text(), render::UNKNOWN_INPUT);
}

#[tokio::test]
async fn test_restarting_a_flow_discards_the_old_one() {
    let bot = create_test_bot();
    let ann = owner(1);
    seed_many(&bot, ann, 1).await;

    bot.say(ann, "/trackproduct").await;
    bot.say(ann, "/listproducts").await;
    assert_eq!(state_of(&bot, ann).await, State::Listing);

    bot.say(ann, "/trackproduct").await;
    assert_eq!(state_of(&bot, ann).await, State::WaitingForUrl);
}

#[tokio::test]
async fn test_failed_reply_resets_conversation() {
    let bot = create_test_bot();
    let ann = owner(1);

    bot.transport.fail_sends(true);
    bot.say(ann, "/trackproduct").await;

    assert_eq!(state_of(&bot, ann).await, State::Idle);
    assert!(bot.transport.calls().is_empty());

    bot.transport.fail_sends(false);
    bot.say(ann, "/trackproduct").await;
    assert_eq!(bot.transport.last_text(), render::ASK_FOR_URL);
}
