//! Traits and interfaces at the edges of the pipeline: site description, page
//! fetching and message delivery

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::error::FetchError;
use crate::models::ChatId;
use crate::pagination::PageToken;

/// Configuration for a catalog website
#[derive(Debug, Clone)]
pub struct ScraperConfig {
    /// Display name for the website
    pub name: String,
    /// Root page listing the top-level categories
    pub catalog_url: String,
    /// Substring present in a listing page once no products remain
    pub end_marker: String,
    /// CSS selectors for extracting data
    pub selectors: SiteSelectors,
    /// Per-crawl safety limits
    pub limits: CrawlLimits,
}

/// CSS selectors for the category menu and product tiles
#[derive(Debug, Clone)]
pub struct SiteSelectors {
    /// Menu entry of each top-level category on the root page
    pub category_item: String,
    /// Anchor within a category menu entry
    pub category_link: String,
    /// Container selector for individual products
    pub product_container: String,
    /// Product link selector within product container
    pub link: String,
    /// Selling price within product container
    pub price: String,
    /// Crossed-out list price within product container
    pub old_price: String,
    /// Out of stock indicator (optional)
    pub out_of_stock: Option<String>,
}

/// Bounds that stop a crawl whose catalog never emits the end marker
#[derive(Debug, Clone, Copy)]
pub struct CrawlLimits {
    pub max_pages: u32,
    pub budget: Duration,
    /// Pause between consecutive pages of one crawl
    pub page_delay: Duration,
}

/// Source of raw page bodies
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch a page and return its body
    ///
    /// # Arguments
    /// * `url` - Absolute URL of the page
    ///
    /// # Returns
    /// * `Result<String, FetchError>` - The body, or why it could not be fetched
    async fn fetch(&self, url: &str) -> std::result::Result<String, FetchError>;
}

/// Opaque handle of a delivered message, used to edit it in place
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageRef(pub i64);

/// Previous/next buttons rendered under a page of deals
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PageControls {
    pub prev: Option<PageToken>,
    pub next: Option<PageToken>,
}

impl PageControls {
    pub fn is_empty(&self) -> bool {
        self.prev.is_none() && self.next.is_none()
    }
}

/// Outbound side of the messaging channel
#[async_trait]
pub trait Delivery: Send + Sync {
    /// Send a new message to a chat
    async fn send(&self, chat: ChatId, text: &str, controls: Option<PageControls>) -> Result<MessageRef>;

    /// Replace the text and controls of a message sent earlier
    async fn edit(
        &self,
        chat: ChatId,
        message: MessageRef,
        text: &str,
        controls: Option<PageControls>,
    ) -> Result<()>;
}
