//! Sequential crawl of a category's result pages.
//!
//! Pages are requested one at a time as `{listing_url}?p={index}` with a 0-based
//! index. The crawl ends cleanly when a page contains the site's end-of-results
//! marker. Any other failure ends it with [`DealError::CrawlInterrupted`]; items
//! already handed out stay valid so callers can rank partial results.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::DealError;
use crate::filter::{self, PriceBandPolicy};
use crate::models::{Deal, RawItem, SearchCriteria};
use crate::scrapers::CompiledSelectors;
use crate::traits::{PageFetcher, ScraperConfig};

pub struct ListingCrawler {
    fetcher: Arc<dyn PageFetcher>,
    config: Arc<ScraperConfig>,
    selectors: Arc<CompiledSelectors>,
}

/// Deals found by one crawl, plus the reason it stopped early if it did
#[derive(Debug)]
pub struct CrawlOutcome {
    pub deals: Vec<Deal>,
    pub scanned: usize,
    pub interruption: Option<DealError>,
}

/// URL of the 0-based result page `index` of a listing
pub fn page_url(listing_url: &str, index: u32) -> String {
    let separator = if listing_url.contains('?') { '&' } else { '?' };
    format!("{listing_url}{separator}p={index}")
}

impl ListingCrawler {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        config: Arc<ScraperConfig>,
        selectors: Arc<CompiledSelectors>,
    ) -> Self {
        Self {
            fetcher,
            config,
            selectors,
        }
    }

    /// Start a lazy crawl; nothing is fetched until the first item is pulled
    pub fn crawl<'a>(&'a self, listing_url: &'a str) -> Crawl<'a> {
        Crawl {
            crawler: self,
            listing_url,
            page_index: 0,
            buffer: VecDeque::new(),
            yielded: 0,
            started: Instant::now(),
            finished: false,
        }
    }

    /// Crawl the criteria's category and keep the items that qualify as deals,
    /// in discovery order
    pub async fn find_deals(&self, criteria: &SearchCriteria, policy: PriceBandPolicy) -> CrawlOutcome {
        info!(
            "Crawling '{}' on {} (min discount {}%, price {:?}..{:?})",
            criteria.category.name,
            self.config.name,
            criteria.min_discount,
            criteria.min_price,
            criteria.max_price
        );

        let mut crawl = self.crawl(&criteria.category.listing_url);
        let mut deals = Vec::new();
        let mut interruption = None;

        loop {
            match crawl.next().await {
                Ok(Some(item)) => match filter::accept(&item, criteria, policy) {
                    Ok(deal) => deals.push(deal),
                    Err(reason) => debug!("Skipping {}: {:?}", item.detail_url, reason),
                },
                Ok(None) => break,
                Err(e) => {
                    warn!("{}", e);
                    interruption = Some(e);
                    break;
                }
            }
        }

        info!(
            "Found {} deals among {} items in '{}'",
            deals.len(),
            crawl.yielded(),
            criteria.category.name
        );

        CrawlOutcome {
            deals,
            scanned: crawl.yielded(),
            interruption,
        }
    }
}

/// An in-progress crawl of one listing. Finite and not restartable.
pub struct Crawl<'a> {
    crawler: &'a ListingCrawler,
    listing_url: &'a str,
    page_index: u32,
    buffer: VecDeque<RawItem>,
    yielded: usize,
    started: Instant,
    finished: bool,
}

impl Crawl<'_> {
    /// Next item of the listing, fetching the following page when the current one
    /// is used up. Returns `Ok(None)` once the end marker was seen or after an error
    /// was reported.
    pub async fn next(&mut self) -> Result<Option<RawItem>, DealError> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                self.yielded += 1;
                return Ok(Some(item));
            }

            if self.finished {
                return Ok(None);
            }

            self.load_next_page().await?;
        }
    }

    pub fn yielded(&self) -> usize {
        self.yielded
    }

    async fn load_next_page(&mut self) -> Result<(), DealError> {
        let crawler = self.crawler;
        let config = &crawler.config;
        let limits = config.limits;

        if self.page_index >= limits.max_pages {
            return Err(self.interrupt(format!("page limit of {} reached", limits.max_pages)));
        }

        if self.page_index > 0 && !limits.page_delay.is_zero() {
            tokio::time::sleep(limits.page_delay).await;
        }

        let Some(remaining) = limits.budget.checked_sub(self.started.elapsed()) else {
            return Err(self.interrupt("crawl time budget exhausted".to_string()));
        };

        let url = page_url(self.listing_url, self.page_index);
        let html = match tokio::time::timeout(remaining, crawler.fetcher.fetch(&url)).await {
            Ok(Ok(html)) => html,
            Ok(Err(e)) => return Err(self.interrupt(e.to_string())),
            Err(_) => return Err(self.interrupt("crawl time budget exhausted".to_string())),
        };

        if html.contains(&config.end_marker) {
            info!(
                "No more products in {} after {} pages",
                self.listing_url, self.page_index
            );
            self.finished = true;
            return Ok(());
        }

        let items = crawler.selectors.parse_listing(&html, &url);
        info!("Page {} of {} loaded: {} items", self.page_index + 1, self.listing_url, items.len());

        self.buffer.extend(items);
        self.page_index += 1;
        Ok(())
    }

    fn interrupt(&mut self, reason: String) -> DealError {
        self.finished = true;
        DealError::CrawlInterrupted {
            url: self.listing_url.to_string(),
            page_index: self.page_index,
            yielded: self.yielded,
            reason,
        }
    }
}
