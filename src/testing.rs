//! Fakes shared by the unit tests

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::error::FetchError;
use crate::models::ChatId;
use crate::scrapers::bananafingers;
use crate::traits::{CrawlLimits, Delivery, MessageRef, PageControls, PageFetcher, ScraperConfig};

pub const ROOT_URL: &str = "https://shop/";
pub const END_MARKER: &str = "We can't find products matching the selection.";

pub fn site_config() -> ScraperConfig {
    ScraperConfig {
        name: "Test shop".to_string(),
        catalog_url: ROOT_URL.to_string(),
        end_marker: "t find products matching the selection.".to_string(),
        selectors: bananafingers::selectors(),
        limits: CrawlLimits {
            max_pages: 50,
            budget: Duration::from_secs(60),
            page_delay: Duration::ZERO,
        },
    }
}

/// Markup of a listing page containing the given `(link, current, old)` tiles
pub fn listing_page(items: &[(&str, f64, f64)]) -> String {
    let tiles: String = items
        .iter()
        .map(|(link, current, old)| {
            format!(
                r#"<div class="product details product-item-details">
                     <a class="product-item-link" href="{link}">item</a>
                     <span class="special-price"><span class="price">£{current:.2}</span></span>
                     <span class="old-price"><span class="price">£{old:.2}</span></span>
                   </div>"#
            )
        })
        .collect();

    format!("<html><body>{tiles}</body></html>")
}

pub fn end_page() -> String {
    format!("<html><body><div class=\"message info empty\">{END_MARKER}</div></body></html>")
}

/// Serves canned pages by URL and records every request in order.
/// Unknown URLs answer 404.
#[derive(Default)]
pub struct FakeFetcher {
    pages: HashMap<String, String>,
    failing: HashSet<String>,
    delays: HashMap<String, Duration>,
    requests: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, body: impl Into<String>) -> Self {
        self.pages.insert(url.to_string(), body.into());
        self
    }

    pub fn timeout(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    /// Answer `url` only after `delay`
    pub fn slow(mut self, url: &str, delay: Duration) -> Self {
        self.delays.insert(url.to_string(), delay);
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.requests.lock().unwrap().push(url.to_string());

        if let Some(delay) = self.delays.get(url) {
            tokio::time::sleep(*delay).await;
        }

        if self.failing.contains(url) {
            return Err(FetchError::Timeout);
        }

        self.pages.get(url).cloned().ok_or(FetchError::Status(404))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    New {
        chat: ChatId,
        text: String,
        controls: Option<PageControls>,
    },
    Edit {
        chat: ChatId,
        message: MessageRef,
        text: String,
        controls: Option<PageControls>,
    },
}

/// Records outgoing messages; chats listed in `unreachable` fail to receive them
#[derive(Default)]
pub struct FakeDelivery {
    pub sent: Mutex<Vec<Sent>>,
    pub unreachable: HashSet<ChatId>,
}

impl FakeDelivery {
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn texts_to(&self, chat: ChatId) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::New { chat: c, text, .. } | Sent::Edit { chat: c, text, .. } if c == chat => Some(text),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Delivery for FakeDelivery {
    async fn send(&self, chat: ChatId, text: &str, controls: Option<PageControls>) -> Result<MessageRef> {
        if self.unreachable.contains(&chat) {
            anyhow::bail!("chat {chat} blocked the bot");
        }

        let mut sent = self.sent.lock().unwrap();
        sent.push(Sent::New {
            chat,
            text: text.to_string(),
            controls,
        });
        Ok(MessageRef(sent.len() as i64))
    }

    async fn edit(
        &self,
        chat: ChatId,
        message: MessageRef,
        text: &str,
        controls: Option<PageControls>,
    ) -> Result<()> {
        if self.unreachable.contains(&chat) {
            anyhow::bail!("chat {chat} blocked the bot");
        }

        self.sent.lock().unwrap().push(Sent::Edit {
            chat,
            message,
            text: text.to_string(),
            controls,
        });
        Ok(())
    }
}
