//! Per-vendor extraction recipes.
//!
//! A recipe drives one loaded page: wait until it is ready, probe the
//! not-found and out-of-stock markers, then read title and price.
//! Update the selectors here when a vendor changes its markup, and add a
//! fixture test alongside.

use std::collections::HashMap;

use crate::marketplace::Vendor;
use crate::models::Snapshot;
use crate::scraper::browser::PageSession;
use crate::scraper::{ScrapeError, ScrapeOutcome, ScrapeResult};
use crate::utils::currency::parse_price;

pub trait VendorRecipe: Send + Sync {
    fn vendor(&self) -> Vendor;

    fn extract(&self, page: &dyn PageSession, url: &str) -> ScrapeResult;
}

mod wildberries {
    pub const PRELOADER: &str = ".general-preloader";
    pub const NOT_FOUND: &str = ".content404";
    pub const SOLD_OUT: &str = ".product-page .sold-out-product";
    pub const SOLD_OUT_TITLE: &str = ".product-page h1";
    pub const TITLE: &str = "h1";
    pub const PRICE: &str = ".price-block__final-price";
    pub const SELECTED_SIZE: &str = ".sizes-list__button.active .sizes-list__size";
}

mod ozon {
    pub const CONTAINER: &str = r#"[data-widget="container"]"#;
    pub const NOT_FOUND: &str = r#"[data-widget="container"] [data-widget="error"]"#;
    pub const OUT_OF_STOCK: &str = r#"[data-widget="container"] [data-widget="webOutOfStock"]"#;
    pub const OUT_OF_STOCK_TITLE: &str = r#"[data-widget="container"] p"#;
    pub const TITLE: &str = "h1";
    pub const PRICE_SPANS: &str = r#"[data-widget="webPrice"] span:first-of-type"#;
    /// With a loyalty-card promo the card price comes first and the regular
    /// price is the fourth span.
    pub const PROMO_PRICE_INDEX: usize = 3;
}

pub struct WildberriesRecipe;

pub struct OzonRecipe;

impl VendorRecipe for WildberriesRecipe {
    fn vendor(&self) -> Vendor {
        Vendor::Wildberries
    }

    fn extract(&self, page: &dyn PageSession, url: &str) -> ScrapeResult {
        page.navigate(url)?;
        page.wait_until_hidden(wildberries::PRELOADER)?;

        if page.exists(wildberries::NOT_FOUND)? {
            return Ok(ScrapeOutcome::NotFound);
        }

        if page.exists(wildberries::SOLD_OUT)? {
            return Ok(match non_blank(page.text(wildberries::SOLD_OUT_TITLE)?) {
                Some(title) => ScrapeOutcome::OutOfStock(Snapshot::out_of_stock(url, self.vendor(), title)),
                None => ScrapeOutcome::NotFound,
            });
        }

        let mut title = required_title(page, wildberries::TITLE)?;
        let price_text = page.text(wildberries::PRICE)?;
        let price = required_price(price_text.as_deref())?;

        // add selected size to the title
        if let Some(size) = non_blank(page.text(wildberries::SELECTED_SIZE)?) {
            title = format!("{} {}", title, size);
        }

        Ok(ScrapeOutcome::Available(Snapshot::available(url, self.vendor(), title, price)))
    }
}

impl VendorRecipe for OzonRecipe {
    fn vendor(&self) -> Vendor {
        Vendor::Ozon
    }

    fn extract(&self, page: &dyn PageSession, url: &str) -> ScrapeResult {
        page.navigate(url)?;
        page.wait_for(ozon::CONTAINER)?;

        if page.exists(ozon::NOT_FOUND)? {
            return Ok(ScrapeOutcome::NotFound);
        }

        if page.exists(ozon::OUT_OF_STOCK)? {
            return Ok(match non_blank(page.text(ozon::OUT_OF_STOCK_TITLE)?) {
                Some(title) => ScrapeOutcome::OutOfStock(Snapshot::out_of_stock(url, self.vendor(), title)),
                None => ScrapeOutcome::NotFound,
            });
        }

        let title = required_title(page, ozon::TITLE)?;
        let spans = page.texts(ozon::PRICE_SPANS)?;
        let price_text = if spans.len() > ozon::PROMO_PRICE_INDEX {
            spans.get(ozon::PROMO_PRICE_INDEX)
        } else {
            spans.first()
        };
        let price = required_price(price_text.map(String::as_str))?;

        Ok(ScrapeOutcome::Available(Snapshot::available(url, self.vendor(), title, price)))
    }
}

/// Recipes indexed by vendor.
pub struct RecipeBook {
    recipes: HashMap<Vendor, Box<dyn VendorRecipe>>,
}

impl RecipeBook {
    pub fn empty() -> Self {
        Self {
            recipes: HashMap::new(),
        }
    }

    pub fn with_recipe(mut self, recipe: Box<dyn VendorRecipe>) -> Self {
        self.recipes.insert(recipe.vendor(), recipe);
        self
    }

    pub fn get(&self, vendor: Vendor) -> Option<&dyn VendorRecipe> {
        self.recipes.get(&vendor).map(|recipe| recipe.as_ref())
    }
}

impl Default for RecipeBook {
    fn default() -> Self {
        Self::empty()
            .with_recipe(Box::new(WildberriesRecipe))
            .with_recipe(Box::new(OzonRecipe))
    }
}

fn non_blank(text: Option<String>) -> Option<String> {
    text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}

fn required_title(page: &dyn PageSession, selector: &str) -> Result<String, ScrapeError> {
    non_blank(page.text(selector)?)
        .ok_or_else(|| ScrapeError::UnexpectedPage(format!("no product title at '{}'", selector)))
}

fn required_price(text: Option<&str>) -> Result<i64, ScrapeError> {
    let text = text.ok_or_else(|| ScrapeError::UnexpectedPage("no price on an in-stock page".to_string()))?;
    parse_price(text)
        .filter(|price| *price > 0)
        .ok_or_else(|| ScrapeError::UnexpectedPage(format!("unreadable price '{}'", text.trim())))
}
