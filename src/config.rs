//! Environment-driven settings, read once at startup after `.env` is loaded

use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::filter::PriceBandPolicy;
use crate::scrapers::bananafingers;
use crate::traits::CrawlLimits;

#[derive(Debug, Clone)]
pub struct Settings {
    pub telegram_token: Option<String>,
    pub database_url: String,
    pub catalog_url: String,
    pub end_marker: String,
    pub page_size: usize,
    pub request_timeout: Duration,
    pub crawl_limits: CrawlLimits,
    pub sweep_discount_floor: u8,
    /// Six-field cron expression (seconds first)
    pub sweep_schedule: String,
    pub price_band_policy: PriceBandPolicy,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let string = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let settings = Self {
            telegram_token: lookup("TELEGRAM_BOT_TOKEN"),
            database_url: string("DATABASE_URL", "sqlite:database/deals.db"),
            catalog_url: string("CATALOG_URL", bananafingers::CATALOG_URL),
            end_marker: string("END_OF_RESULTS_MARKER", bananafingers::END_MARKER),
            page_size: parsed(&lookup, "PRODUCTS_PER_PAGE", 5)?,
            request_timeout: Duration::from_secs(parsed(&lookup, "REQUEST_TIMEOUT_SECS", 20)?),
            crawl_limits: CrawlLimits {
                max_pages: parsed(&lookup, "CRAWL_MAX_PAGES", 200)?,
                budget: Duration::from_secs(parsed(&lookup, "CRAWL_BUDGET_SECS", 300)?),
                page_delay: Duration::from_millis(parsed(&lookup, "PAGE_DELAY_MS", 250)?),
            },
            sweep_discount_floor: parsed(&lookup, "SWEEP_DISCOUNT_FLOOR", 50)?,
            sweep_schedule: string("SWEEP_SCHEDULE", "0 0 9 * * *"),
            price_band_policy: parsed(&lookup, "PRICE_BAND_POLICY", PriceBandPolicy::Independent)?,
        };

        if settings.page_size == 0 {
            anyhow::bail!("PRODUCTS_PER_PAGE must be at least 1");
        }
        if settings.sweep_discount_floor > 100 {
            anyhow::bail!("SWEEP_DISCOUNT_FLOOR must be between 0 and 100");
        }
        if settings.end_marker.is_empty() {
            anyhow::bail!("END_OF_RESULTS_MARKER must not be empty");
        }

        Ok(settings)
    }
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{e}"))
            .with_context(|| format!("invalid value for {key}: '{raw}'")),
        None => Ok(default),
    }
}
