//! Vendor classification and canonical URLs for supported marketplaces.
//!
//! Everything here is pure: no I/O, and the only failure mode is an
//! unrecognised URL.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;
use url::form_urlencoded;

static WILDBERRIES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:https?://)?(?:www\.)?(wildberries\.ru/catalog/\d+/detail\.aspx)(?:\?([^#]*))?(?:#.*)?$")
        .expect("wildberries pattern")
});

static OZON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:https?://)?(?:www\.)?(ozon\.ru(?:/product/[a-z0-9-]+/|/t/[A-Za-z0-9-]+))(?:\?[^#]*)?(?:#.*)?$")
        .expect("ozon pattern")
});

/// Query parameters that change which product variant a Wildberries page shows.
const WILDBERRIES_KEPT_PARAMS: &[&str] = &["size"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "TEXT")]
pub enum Vendor {
    #[sqlx(rename = "wildberries")]
    Wildberries,
    #[sqlx(rename = "ozon")]
    Ozon,
}

impl Vendor {
    pub const ALL: [Vendor; 2] = [Vendor::Wildberries, Vendor::Ozon];

    pub fn name(&self) -> &'static str {
        match self {
            Vendor::Wildberries => "Wildberries",
            Vendor::Ozon => "Ozon",
        }
    }

    fn pattern(&self) -> &'static Regex {
        match self {
            Vendor::Wildberries => &WILDBERRIES,
            Vendor::Ozon => &OZON,
        }
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A URL that belongs to a known vendor, in canonical form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedUrl {
    pub vendor: Vendor,
    pub canonical_url: String,
}

/// Returns the vendor whose URL shape matches, or `None` for anything unknown.
pub fn classify(url: &str) -> Option<Vendor> {
    let url = url.trim();
    Vendor::ALL
        .into_iter()
        .find(|vendor| vendor.pattern().is_match(url))
}

/// Canonical tracking key for a vendor URL: `https://www.` host, no tracking
/// parameters, no fragment. Returns `None` when the URL is not recognised.
pub fn canonicalize(url: &str) -> Option<String> {
    resolve(url).map(|resolved| resolved.canonical_url)
}

pub fn resolve(url: &str) -> Option<ResolvedUrl> {
    let url = url.trim();
    let vendor = classify(url)?;
    let captures = vendor.pattern().captures(url)?;
    let location = captures.get(1)?.as_str();

    let canonical_url = match vendor {
        Vendor::Wildberries => {
            let kept: Vec<(String, String)> = captures
                .get(2)
                .map(|query| {
                    form_urlencoded::parse(query.as_str().as_bytes())
                        .filter(|(key, value)| is_kept_wildberries_param(key, value))
                        .map(|(key, value)| (key.into_owned(), value.into_owned()))
                        .collect()
                })
                .unwrap_or_default();

            if kept.is_empty() {
                format!("https://www.{}", location)
            } else {
                let query = form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(kept.iter().take(1))
                    .finish();
                format!("https://www.{}?{}", location, query)
            }
        }
        Vendor::Ozon => format!("https://www.{}", location),
    };

    Some(ResolvedUrl {
        vendor,
        canonical_url,
    })
}

fn is_kept_wildberries_param(key: &str, value: &str) -> bool {
    WILDBERRIES_KEPT_PARAMS.contains(&key)
        && !value.is_empty()
        && value.chars().all(|c| c.is_ascii_digit())
}
