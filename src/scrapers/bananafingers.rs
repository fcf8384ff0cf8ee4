//! bananafingers.co.uk (Magento storefront) site description

use crate::config::Settings;
use crate::traits::{ScraperConfig, SiteSelectors};

pub const CATALOG_URL: &str = "https://bananafingers.co.uk/";

/// Text Magento prints on a category page past the last product
pub const END_MARKER: &str = "t find products matching the selection.";

pub fn selectors() -> SiteSelectors {
    SiteSelectors {
        category_item: "li.level-top".to_string(),
        category_link: "a".to_string(),
        product_container: "div.product.details.product-item-details".to_string(),
        link: "a.product-item-link".to_string(),
        price: "span.price".to_string(),
        old_price: "span.old-price".to_string(),
        out_of_stock: Some(".stock.unavailable".to_string()),
    }
}

/// Site configuration with URL, marker and limits taken from settings
pub fn site_config(settings: &Settings) -> ScraperConfig {
    ScraperConfig {
        name: "Bananafingers".to_string(),
        catalog_url: settings.catalog_url.clone(),
        end_marker: settings.end_marker.clone(),
        selectors: selectors(),
        limits: settings.crawl_limits,
    }
}
