use chrono::{DateTime, FixedOffset, Offset, Utc};

pub const DATE_HUMAN: &str = "%d.%m.%Y %H:%M";

/// Escapes text for Telegram's HTML parse mode.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

pub fn time_to_human(time: DateTime<Utc>, offset: FixedOffset) -> String {
    time.with_timezone(&offset).format(DATE_HUMAN).to_string()
}

/// Falls back to UTC for offsets chrono rejects.
pub fn display_offset(minutes: i32) -> FixedOffset {
    FixedOffset::east_opt(minutes * 60).unwrap_or(Utc.fix())
}
