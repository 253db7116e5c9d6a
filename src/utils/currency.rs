use regex::Regex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;
use std::sync::LazyLock;

pub const CURRENCY_SUBUNIT: i64 = 100;
pub const RUBLE_SYMBOL: &str = "₽";

static NON_PRICE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^0-9,.]").expect("price sanitiser pattern"));

/// Parses a price label such as `"1 299,50 ₽"` into minor units.
///
/// Everything except digits and separators is dropped, `,` is read as `.`,
/// and only the last separator is kept as the decimal point. Returns `None`
/// when no number is left.
pub fn parse_price(text: &str) -> Option<i64> {
    let cleaned = NON_PRICE_CHARS.replace_all(text, "").replace(',', ".");

    let normalized = match cleaned.rfind('.') {
        Some(position) => {
            let (whole, fraction) = cleaned.split_at(position);
            format!("{}{}", whole.replace('.', ""), fraction)
        }
        None => cleaned,
    };

    if !normalized.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let major = Decimal::from_str(normalized.trim_end_matches('.')).ok()?;
    to_minor(major)
}

/// 220.50 -> 22050. Rounds to two decimals first, then drops any remainder.
pub fn to_minor(major: Decimal) -> Option<i64> {
    let rounded = major.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    (rounded * Decimal::from(CURRENCY_SUBUNIT)).trunc().to_i64()
}

/// 22050 -> 220.50
pub fn to_major(minor: i64) -> Decimal {
    Decimal::new(minor, 2)
}

/// Renders minor units as `"1299 ₽"` or `"220.50 ₽"` with a non-breaking space.
pub fn format_minor(minor: i64) -> String {
    let amount = if minor % CURRENCY_SUBUNIT == 0 {
        (minor / CURRENCY_SUBUNIT).to_string()
    } else {
        to_major(minor).to_string()
    };

    format!("{}\u{00A0}{}", amount, RUBLE_SYMBOL)
}
