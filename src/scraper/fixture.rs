//! Recorded-page sessions for exercising recipes without a browser.

use scraper::{ElementRef, Html, Selector};
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::scraper::ScrapeError;
use crate::scraper::browser::{BrowserSession, PageSession, SessionFactory};

/// Serves stored HTML documents keyed by URL.
#[derive(Default)]
pub struct FixtureSessions {
    pages: Arc<HashMap<String, String>>,
    counters: Arc<SessionCounters>,
}

#[derive(Debug, Default)]
pub struct SessionCounters {
    pub launched: AtomicUsize,
    pub open_sessions: AtomicUsize,
    pub open_pages: AtomicUsize,
    pub navigations: AtomicUsize,
}

pub struct FixtureSession {
    pages: Arc<HashMap<String, String>>,
    counters: Arc<SessionCounters>,
}

/// A parsed document that behaves like a fully rendered page.
pub struct StaticPage {
    pages: Arc<HashMap<String, String>>,
    document: RefCell<Option<Html>>,
    counters: Arc<SessionCounters>,
    timeout: Duration,
}

impl FixtureSessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: impl Into<String>, html: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.pages).insert(url.into(), html.into());
        self
    }

    pub fn counters(&self) -> Arc<SessionCounters> {
        Arc::clone(&self.counters)
    }
}

impl SessionFactory for FixtureSessions {
    fn launch(&self) -> Result<Box<dyn BrowserSession>, ScrapeError> {
        self.counters.launched.fetch_add(1, Ordering::SeqCst);
        self.counters.open_sessions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FixtureSession {
            pages: Arc::clone(&self.pages),
            counters: Arc::clone(&self.counters),
        }))
    }
}

impl BrowserSession for FixtureSession {
    fn open_page(&self, timeout: Duration) -> Result<Box<dyn PageSession + '_>, ScrapeError> {
        self.counters.open_pages.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(StaticPage {
            pages: Arc::clone(&self.pages),
            document: RefCell::new(None),
            counters: Arc::clone(&self.counters),
            timeout,
        }))
    }
}

impl Drop for FixtureSession {
    fn drop(&mut self) {
        self.counters.open_sessions.fetch_sub(1, Ordering::SeqCst);
    }
}

impl StaticPage {
    /// Parses a single document directly, for recipe tests.
    pub fn from_html(url: &str, html: &str) -> Self {
        let mut pages = HashMap::new();
        pages.insert(url.to_string(), html.to_string());
        Self {
            pages: Arc::new(pages),
            document: RefCell::new(None),
            counters: Arc::new(SessionCounters::default()),
            timeout: Duration::from_secs(15),
        }
    }

    /// Runs `f` over every element matching `selector`.
    fn query<T>(&self, selector: &str, f: impl Fn(ElementRef<'_>) -> T) -> Result<Vec<T>, ScrapeError> {
        let parsed = Selector::parse(selector)
            .map_err(|e| ScrapeError::Browser(format!("Invalid CSS selector '{}': {:?}", selector, e)))?;
        let document = self.document.borrow();
        let document = document
            .as_ref()
            .ok_or_else(|| ScrapeError::Browser("page queried before navigation".to_string()))?;
        Ok(document.select(&parsed).map(f).collect())
    }

    /// Rendered text of every element matching `selector`.
    fn select(&self, selector: &str) -> Result<Vec<String>, ScrapeError> {
        self.query(selector, rendered_text)
    }
}

/// Static pages have no layout, so only inline styles can hide an element.
fn is_visible(element: ElementRef<'_>) -> bool {
    let style: String = element
        .value()
        .attr("style")
        .unwrap_or_default()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    let style = style.to_lowercase();
    !style.contains("display:none") && !style.contains("visibility:hidden")
}

fn rendered_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

impl PageSession for StaticPage {
    fn navigate(&self, url: &str) -> Result<(), ScrapeError> {
        self.counters.navigations.fetch_add(1, Ordering::SeqCst);
        let html = self
            .pages
            .get(url)
            .ok_or_else(|| ScrapeError::Browser(format!("Navigation failed: no fixture for {}", url)))?;
        *self.document.borrow_mut() = Some(Html::parse_document(html));
        Ok(())
    }

    fn wait_for(&self, selector: &str) -> Result<(), ScrapeError> {
        if self.exists(selector)? {
            Ok(())
        } else {
            Err(ScrapeError::Timeout(self.timeout))
        }
    }

    fn wait_until_hidden(&self, selector: &str) -> Result<(), ScrapeError> {
        if self.query(selector, is_visible)?.into_iter().take(1).any(|visible| visible) {
            Err(ScrapeError::Timeout(self.timeout))
        } else {
            Ok(())
        }
    }

    fn exists(&self, selector: &str) -> Result<bool, ScrapeError> {
        Ok(!self.select(selector)?.is_empty())
    }

    fn text(&self, selector: &str) -> Result<Option<String>, ScrapeError> {
        Ok(self.select(selector)?.into_iter().next())
    }

    fn texts(&self, selector: &str) -> Result<Vec<String>, ScrapeError> {
        self.select(selector)
    }
}

impl Drop for StaticPage {
    fn drop(&mut self) {
        let _ = self
            .counters
            .open_pages
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |open| open.checked_sub(1));
    }
}
