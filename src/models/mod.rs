//! Data models for catalog listings, deals and Telegram payloads

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod telegram;

/// A Telegram chat, the unit every conversation, cache entry and subscription is keyed by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A top-level catalog section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub name: String,
    pub listing_url: String,
}

/// A product tile as it appears on a listing page, before any filtering
#[derive(Debug, Clone, PartialEq)]
pub struct RawItem {
    pub detail_url: String,
    pub current_price: Option<f64>,
    pub list_price: Option<f64>,
    pub in_stock: bool,
}

/// A listing that passed availability, discount and price filtering.
///
/// Only `filter::accept` builds these, so `old_price > current_price > 0` holds and
/// `discount_pct` is the rounded percentage off the list price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    pub link: String,
    pub current_price: f64,
    pub old_price: f64,
    #[serde(rename = "sale")]
    pub discount_pct: u8,
}

/// Constraints gathered from the user (or fixed by the sweep) for one crawl
#[derive(Debug, Clone, PartialEq)]
pub struct SearchCriteria {
    pub category: Category,
    pub min_discount: u8,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
}

/// Which result list a pagination request refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Interactive,
    Notification,
}

impl Namespace {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Interactive => "interactive",
            Self::Notification => "notification",
        }
    }
}

/// Key of one page cache entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerKey {
    pub chat: ChatId,
    pub namespace: Namespace,
}

impl OwnerKey {
    pub fn interactive(chat: ChatId) -> Self {
        Self {
            chat,
            namespace: Namespace::Interactive,
        }
    }

    pub fn notification(chat: ChatId) -> Self {
        Self {
            chat,
            namespace: Namespace::Notification,
        }
    }
}

impl fmt::Display for OwnerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.chat, self.namespace.as_str())
    }
}

/// Deals ordered by descending discount, ties kept in discovery order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RankedDeals(Vec<Deal>);

impl RankedDeals {
    pub fn rank(mut deals: Vec<Deal>) -> Self {
        // sort_by is stable, so equal discounts keep crawl order
        deals.sort_by(|a, b| b.discount_pct.cmp(&a.discount_pct));
        Self(deals)
    }

    pub fn as_slice(&self) -> &[Deal] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
