use headless_chrome::{Browser, LaunchOptions, Tab};
use serde_json::Value;
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::ScraperConfig;
use crate::scraper::ScrapeError;

const HIDDEN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// One loaded page that a vendor recipe can query.
///
/// Every call is bounded by the page deadline; once it passes, calls fail
/// with [`ScrapeError::Timeout`].
pub trait PageSession {
    fn navigate(&self, url: &str) -> Result<(), ScrapeError>;

    /// Waits until an element matching `selector` is present.
    fn wait_for(&self, selector: &str) -> Result<(), ScrapeError>;

    /// Waits until no visible element matches `selector`. An element counts
    /// as visible while it has a rendered box and is not `visibility: hidden`,
    /// whatever its positioning.
    fn wait_until_hidden(&self, selector: &str) -> Result<(), ScrapeError>;

    fn exists(&self, selector: &str) -> Result<bool, ScrapeError>;

    /// Rendered text of the first match, or `None` when nothing matches.
    fn text(&self, selector: &str) -> Result<Option<String>, ScrapeError>;

    /// Rendered text of every match, in document order.
    fn texts(&self, selector: &str) -> Result<Vec<String>, ScrapeError>;
}

/// A browser instance owned by a single scrape or batch.
pub trait BrowserSession {
    fn open_page(&self, timeout: Duration) -> Result<Box<dyn PageSession + '_>, ScrapeError>;
}

pub trait SessionFactory: Send + Sync {
    fn launch(&self) -> Result<Box<dyn BrowserSession>, ScrapeError>;
}

/// Launches a fresh headless Chrome for every session.
pub struct ChromeSessionFactory {
    config: ScraperConfig,
}

pub struct ChromeSession {
    browser: Browser,
    user_agent: String,
}

pub struct ChromePage {
    tab: Arc<Tab>,
    timeout: Duration,
    deadline: Instant,
}

impl ChromeSessionFactory {
    pub fn new(config: ScraperConfig) -> Self {
        Self { config }
    }
}

impl SessionFactory for ChromeSessionFactory {
    fn launch(&self) -> Result<Box<dyn BrowserSession>, ScrapeError> {
        let mut launch_options = LaunchOptions::default_builder()
            .headless(self.config.headless)
            .sandbox(false) // Often needed in containerized environments
            .idle_browser_timeout(self.config.page_timeout() * 4)
            .args(vec![
                OsStr::new("--no-sandbox"),
                OsStr::new("--disable-dev-shm-usage"),
                OsStr::new("--disable-gpu"),
                OsStr::new("--disable-extensions"),
                OsStr::new("--disable-blink-features=AutomationControlled"),
            ])
            .build()
            .map_err(|e| ScrapeError::Browser(format!("Failed to create launch options: {}", e)))?;

        if let Some(chrome_path) = &self.config.chrome_path {
            launch_options.path = Some(std::path::PathBuf::from(chrome_path));
        }

        let browser = Browser::new(launch_options)
            .map_err(|e| ScrapeError::Browser(format!("Failed to launch browser: {}", e)))?;

        tracing::debug!("Launched browser session");

        Ok(Box::new(ChromeSession {
            browser,
            user_agent: self.config.user_agent.clone(),
        }))
    }
}

impl BrowserSession for ChromeSession {
    fn open_page(&self, timeout: Duration) -> Result<Box<dyn PageSession + '_>, ScrapeError> {
        let tab = self
            .browser
            .new_tab()
            .map_err(|e| ScrapeError::Browser(format!("Failed to create tab: {}", e)))?;

        tab.set_default_timeout(timeout);
        tab.set_user_agent(&self.user_agent, None, None)
            .map_err(|e| ScrapeError::Browser(format!("Failed to set user agent: {}", e)))?;

        Ok(Box::new(ChromePage {
            tab,
            timeout,
            deadline: Instant::now() + timeout,
        }))
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        // The Chrome process is killed when `Browser` drops
        tracing::debug!("Closing browser session");
    }
}

impl ChromePage {
    fn remaining(&self) -> Result<Duration, ScrapeError> {
        let now = Instant::now();
        if now >= self.deadline {
            return Err(ScrapeError::Timeout(self.timeout));
        }
        Ok(self.deadline - now)
    }

    fn evaluate(&self, expression: &str) -> Result<Value, ScrapeError> {
        self.remaining()?;
        let object = self
            .tab
            .evaluate(expression, false)
            .map_err(|e| ScrapeError::Browser(format!("Script evaluation failed: {}", e)))?;
        Ok(object.value.unwrap_or(Value::Null))
    }
}

/// True while the first match has a rendered box and is not hidden.
const VISIBILITY_CHECK: &str = "(selector) => { \
    const el = document.querySelector(selector); \
    return !!el && el.getClientRects().length > 0 \
        && getComputedStyle(el).visibility !== 'hidden'; \
}";

fn visibility_script(selector: &str) -> String {
    format!("({})({})", VISIBILITY_CHECK, js_string(selector))
}

/// Quotes a CSS selector as a JavaScript string literal.
fn js_string(selector: &str) -> String {
    Value::from(selector).to_string()
}

impl PageSession for ChromePage {
    fn navigate(&self, url: &str) -> Result<(), ScrapeError> {
        self.remaining()?;
        self.tab
            .navigate_to(url)
            .and_then(|tab| tab.wait_until_navigated())
            .map_err(|e| {
                if Instant::now() >= self.deadline {
                    ScrapeError::Timeout(self.timeout)
                } else {
                    ScrapeError::Browser(format!("Navigation failed: {}", e))
                }
            })?;
        Ok(())
    }

    fn wait_for(&self, selector: &str) -> Result<(), ScrapeError> {
        let remaining = self.remaining()?;
        self.tab
            .wait_for_element_with_custom_timeout(selector, remaining)
            .map_err(|_| ScrapeError::Timeout(self.timeout))?;
        Ok(())
    }

    fn wait_until_hidden(&self, selector: &str) -> Result<(), ScrapeError> {
        let script = visibility_script(selector);

        loop {
            if !self.evaluate(&script)?.as_bool().unwrap_or(false) {
                return Ok(());
            }
            std::thread::sleep(HIDDEN_POLL_INTERVAL.min(self.remaining()?));
        }
    }

    fn exists(&self, selector: &str) -> Result<bool, ScrapeError> {
        let script = format!("document.querySelector({}) !== null", js_string(selector));
        Ok(self.evaluate(&script)?.as_bool().unwrap_or(false))
    }

    fn text(&self, selector: &str) -> Result<Option<String>, ScrapeError> {
        let script = format!(
            "(() => {{ const el = document.querySelector({}); return el ? el.innerText : null; }})()",
            js_string(selector)
        );
        Ok(self.evaluate(&script)?.as_str().map(str::to_string))
    }

    fn texts(&self, selector: &str) -> Result<Vec<String>, ScrapeError> {
        // Arrays come back as remote references, so serialise them in the page
        let script = format!(
            "JSON.stringify(Array.from(document.querySelectorAll({}), el => el.innerText))",
            js_string(selector)
        );
        let raw = self.evaluate(&script)?;
        let json = raw.as_str().unwrap_or("[]");
        serde_json::from_str(json)
            .map_err(|e| ScrapeError::Browser(format!("Failed to read element texts: {}", e)))
    }
}

impl Drop for ChromePage {
    fn drop(&mut self) {
        // Close tab to free resources
        let _ = self.tab.close(true);
    }
}
