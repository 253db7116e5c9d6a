//! Chat texts and keyboards. Everything here is Telegram HTML; titles come
//! from scraped pages and are always escaped.

use chrono::FixedOffset;

use crate::conversation::commands::{self, NO, YES};
use crate::models::{PaginatedResult, TrackedItem};
use crate::telegram::{InlineButton, InlineKeyboard};
use crate::utils::currency::format_minor;
use crate::utils::format::{escape_html, time_to_human};

pub const HELP: &str = "The full list of commands is in the menu 👇";
pub const UNKNOWN_INPUT: &str = "I'm sorry, Dave. I'm afraid I can't do that.";
pub const APOLOGY: &str = "Sorry, something went wrong on my side. Let's start over.";
pub const ASK_FOR_URL: &str = "Send me a link to a product on Wildberries or Ozon";
pub const UNKNOWN_VENDOR: &str = "I don't know this marketplace yet :(";
pub const LOADER_PREFIX: &str = "Searching";
pub const PRODUCT_NOT_FOUND: &str = "I can't find a product at this link :(";
pub const SCRAPE_FAILED: &str = "Something went wrong while loading the page. Please try again later.";
pub const SAVE_FAILED: &str = "I found the product but couldn't save it :(";
pub const EMPTY_LISTING: &str = "You aren't tracking anything yet\n\nSend <code>/trackproduct</code> to start";
pub const ASK_FOR_SLUG: &str = "Send me the code of the product you want to stop tracking";
pub const NO_SUCH_ITEM: &str = "I can't find such a product in your list";
pub const DELETE_CANCELLED: &str = "Okay, I keep tracking it";
pub const CANCEL_REACTION: &str = "👌";

pub fn welcome(username: Option<&str>) -> String {
    match username {
        Some(username) => format!("Hello there, @{}", escape_html(username)),
        None => "Hello there!".to_string(),
    }
}

pub fn loader(dots: usize) -> String {
    format!("{}{}", LOADER_PREFIX, ".".repeat(dots))
}

/// `«Title»` linked to the product page, in bold.
pub fn item_link(item: &TrackedItem) -> String {
    format!(
        "<b>«<a href=\"{}\">{}</a>»</b>",
        escape_html(&item.url),
        escape_html(&item.title)
    )
}

pub fn already_tracking(item: &TrackedItem) -> String {
    format!(
        "Already watching it :)\n\nI'll let you know when the price of {} ({}) drops below <b>{}</b>\n<i>Current price: {}</i>",
        item_link(item),
        item.vendor,
        format_minor(item.threshold_price),
        format_minor(item.current_price)
    )
}

pub fn tracking_started(item: &TrackedItem) -> String {
    if item.out_of_stock {
        return format!(
            "It's out of stock right now 😐\n\nI'll let you know when {} ({}) is back on sale",
            item_link(item),
            item.vendor
        );
    }

    format!(
        "Okay 👌\n\nI'll let you know when the price of {} ({}) drops below <b>{}</b>",
        item_link(item),
        item.vendor,
        format_minor(item.threshold_price)
    )
}

pub fn listing(result: &PaginatedResult<TrackedItem>, offset: FixedOffset) -> String {
    let mut position = result.first_position();
    let mut entries = Vec::with_capacity(result.items.len());

    for item in &result.items {
        let status = if item.out_of_stock {
            "<b>Out of stock</b>".to_string()
        } else {
            format!("<b>Current price: {}</b>", format_minor(item.current_price))
        };

        entries.push(format!(
            "<b>{}.</b> {} ({})\n{} <i>({})</i>\n<i>Delete</i>: {}",
            position,
            item_link(item),
            item.vendor,
            status,
            time_to_human(item.scraped_at, offset),
            commands::delete_payload(&item.slug)
        ));
        position += 1;
    }

    format!("<b>Tracked products</b>:\n\n{}", entries.join("\n\n"))
}

/// Navigation row for a listing, `None` when everything fits on one page.
pub fn page_keyboard<T>(result: &PaginatedResult<T>) -> Option<InlineKeyboard> {
    if result.total <= result.per_page as u64 {
        return None;
    }

    let current = result.current_page;
    let prev = current.saturating_sub(1).max(1);
    let next = (current + 1).min(result.last_page);
    let mut buttons = Vec::new();

    if prev < current {
        if prev > 1 {
            buttons.push(InlineButton::new("« 1", commands::page_payload(1)));
        }
        buttons.push(InlineButton::new(format!("‹ {}", prev), commands::page_payload(prev)));
    }

    buttons.push(InlineButton::new(format!("· {} ·", current), commands::page_payload(current)));

    if next > current {
        buttons.push(InlineButton::new(format!("{} ›", next), commands::page_payload(next)));
        if next < result.last_page {
            buttons.push(InlineButton::new(
                format!("{} »", result.last_page),
                commands::page_payload(result.last_page),
            ));
        }
    }

    Some(InlineKeyboard::single_row(buttons))
}

pub fn confirm_delete(item: &TrackedItem) -> String {
    format!("Stop tracking {} ({})?", item_link(item), item.vendor)
}

pub fn confirm_keyboard() -> InlineKeyboard {
    InlineKeyboard::single_row(vec![InlineButton::new("Yes", YES), InlineButton::new("No", NO)])
}

pub fn deleted(item: &TrackedItem) -> String {
    format!("Done, I'm no longer tracking {} ({})", item_link(item), item.vendor)
}

pub fn back_in_stock(item: &TrackedItem) -> String {
    format!(
        "{} ({}) is back on sale!\n<b>Current price: {}</b>",
        item_link(item),
        item.vendor,
        format_minor(item.current_price)
    )
}

pub fn price_decreased(item: &TrackedItem) -> String {
    format!(
        "The price of {} ({}) went down!\n<b>Current price: {}</b>",
        item_link(item),
        item.vendor,
        format_minor(item.current_price)
    )
}
