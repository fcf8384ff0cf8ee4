//! Periodic all-categories scan that pushes the best discounts to subscribers

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::cache::PageCache;
use crate::catalog::Catalog;
use crate::crawler::ListingCrawler;
use crate::database::Database;
use crate::error::DealError;
use crate::filter::PriceBandPolicy;
use crate::messages;
use crate::models::{Namespace, OwnerKey, RankedDeals, SearchCriteria};
use crate::pagination::paginate;
use crate::traits::Delivery;

/// What one sweep did
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub categories: usize,
    pub failed_categories: usize,
    pub deals: usize,
    pub delivered: usize,
    pub failed_deliveries: usize,
}

#[derive(Clone)]
pub struct NotificationSweep {
    catalog: Arc<Catalog>,
    crawler: Arc<ListingCrawler>,
    cache: PageCache,
    database: Database,
    delivery: Arc<dyn Delivery>,
    discount_floor: u8,
    page_size: usize,
}

impl NotificationSweep {
    pub fn new(
        catalog: Arc<Catalog>,
        crawler: Arc<ListingCrawler>,
        cache: PageCache,
        database: Database,
        delivery: Arc<dyn Delivery>,
        discount_floor: u8,
        page_size: usize,
    ) -> Self {
        Self {
            catalog,
            crawler,
            cache,
            database,
            delivery,
            discount_floor,
            page_size,
        }
    }

    /// Crawl every category and replace each subscriber's notification results.
    ///
    /// A failing category or subscriber is logged and skipped. Only an unreachable
    /// catalog root or subscriber list fails the whole run.
    pub async fn run(&self) -> Result<SweepReport, DealError> {
        info!("Starting notification sweep (floor {}%)", self.discount_floor);

        let categories = self.catalog.fetch_categories().await?;
        let mut report = SweepReport {
            categories: categories.len(),
            ..SweepReport::default()
        };

        let mut seen = HashSet::new();
        let mut merged = Vec::new();

        for category in categories.iter() {
            let criteria = SearchCriteria {
                category: category.clone(),
                min_discount: self.discount_floor,
                min_price: None,
                max_price: None,
            };

            let outcome = self
                .crawler
                .find_deals(&criteria, PriceBandPolicy::Independent)
                .await;

            if let Some(e) = &outcome.interruption {
                warn!("Category '{}' only partly crawled: {}", category.name, e);
                report.failed_categories += 1;
            }

            // the same product can be listed under several categories
            merged.extend(
                outcome
                    .deals
                    .into_iter()
                    .filter(|deal| seen.insert(deal.link.clone())),
            );
        }

        let ranked = RankedDeals::rank(merged);
        report.deals = ranked.len();

        let subscribers = self.database.list_subscribed_users().await?;
        info!(
            "Sweep found {} deals; notifying {} subscribers",
            ranked.len(),
            subscribers.len()
        );

        let first_page = paginate(ranked.as_slice(), 1, self.page_size);
        let text = messages::daily_deals(self.discount_floor, &first_page.deals);
        let controls = first_page.controls(Namespace::Notification);

        for chat in subscribers {
            let owner = OwnerKey::notification(chat);

            if let Err(e) = self.cache.store(&owner, &ranked).await {
                error!("Failed to store sweep results for {}: {}", owner, e);
                report.failed_deliveries += 1;
                continue;
            }

            if ranked.is_empty() {
                continue;
            }

            match self.delivery.send(chat, &text, controls.clone()).await {
                Ok(_) => report.delivered += 1,
                Err(e) => {
                    warn!("Failed to deliver sweep results to {}: {}", chat, e);
                    report.failed_deliveries += 1;
                }
            }
        }

        info!(
            "Notification sweep finished: {} categories ({} incomplete), {} deals, {} delivered, {} failed",
            report.categories,
            report.failed_categories,
            report.deals,
            report.delivered,
            report.failed_deliveries
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::page_url;
    use crate::models::ChatId;
    use crate::scrapers::CompiledSelectors;
    use crate::testing::{FakeDelivery, FakeFetcher, ROOT_URL, Sent, end_page, listing_page, site_config};

    const ROOT: &str = r#"<li class="level-top"><a href="https://shop/ropes">Ropes</a></li>
                          <li class="level-top"><a href="https://shop/shoes">Shoes</a></li>"#;

    async fn sweep(fetcher: FakeFetcher, delivery: Arc<FakeDelivery>, subscribers: &[i64]) -> (NotificationSweep, PageCache) {
        let config = Arc::new(site_config());
        let selectors = Arc::new(CompiledSelectors::compile(&config.selectors).unwrap());
        let fetcher: Arc<FakeFetcher> = Arc::new(fetcher);

        let database = Database::in_memory().await.unwrap();
        for chat in subscribers {
            database.set_subscription(ChatId(*chat), None, true).await.unwrap();
        }
        let cache = PageCache::new(database.clone(), 5);

        let sweep = NotificationSweep::new(
            Arc::new(Catalog::new(fetcher.clone(), config.clone(), selectors.clone())),
            Arc::new(ListingCrawler::new(fetcher, config, selectors)),
            cache.clone(),
            database,
            delivery,
            50,
            5,
        );
        (sweep, cache)
    }

    #[tokio::test]
    async fn test_partial_category_failure_still_delivers() {
        let fetcher = FakeFetcher::new()
            .page(ROOT_URL, ROOT)
            .page(
                &page_url("https://shop/ropes", 0),
                listing_page(&[
                    ("https://shop/rope-a", 40.0, 100.0),
                    ("https://shop/rope-b", 30.0, 100.0),
                    ("https://shop/rope-c", 90.0, 100.0),
                ]),
            )
            .page(&page_url("https://shop/ropes", 1), end_page())
            .page(&page_url("https://shop/shoes", 0), listing_page(&[("https://shop/shoe-a", 45.0, 100.0)]))
            .timeout(&page_url("https://shop/shoes", 1));

        let delivery = Arc::new(FakeDelivery::default());
        let (sweep, cache) = sweep(fetcher, delivery.clone(), &[1, 2]).await;

        let report = sweep.run().await.unwrap();
        assert_eq!(
            report,
            SweepReport {
                categories: 2,
                failed_categories: 1,
                deals: 3,
                delivered: 2,
                failed_deliveries: 0,
            }
        );

        for chat in [ChatId(1), ChatId(2)] {
            let page = cache.page(&OwnerKey::notification(chat), 1).await.unwrap();
            let links: Vec<&str> = page.deals.iter().map(|d| d.link.as_str()).collect();
            assert_eq!(links, vec!["https://shop/rope-b", "https://shop/rope-a", "https://shop/shoe-a"]);
        }

        let sent = delivery.sent();
        assert_eq!(sent.len(), 2);
        for message in sent {
            let Sent::New { text, controls, .. } = message else {
                panic!("sweep must send new messages");
            };
            assert!(text.contains("https://shop/shoe-a"));
            assert!(controls.is_none());
        }
    }

    #[tokio::test]
    async fn test_duplicate_listings_are_merged() {
        let fetcher = FakeFetcher::new()
            .page(ROOT_URL, ROOT)
            .page(&page_url("https://shop/ropes", 0), listing_page(&[("https://shop/same", 20.0, 100.0)]))
            .page(&page_url("https://shop/ropes", 1), end_page())
            .page(&page_url("https://shop/shoes", 0), listing_page(&[("https://shop/same", 20.0, 100.0)]))
            .page(&page_url("https://shop/shoes", 1), end_page());

        let (sweep, _) = sweep(fetcher, Arc::new(FakeDelivery::default()), &[1]).await;
        assert_eq!(sweep.run().await.unwrap().deals, 1);
    }

    #[tokio::test]
    async fn test_unreachable_subscriber_does_not_stop_others() {
        let fetcher = FakeFetcher::new()
            .page(ROOT_URL, ROOT)
            .page(&page_url("https://shop/ropes", 0), listing_page(&[("https://shop/a", 20.0, 100.0)]))
            .page(&page_url("https://shop/ropes", 1), end_page())
            .page(&page_url("https://shop/shoes", 0), end_page());

        let delivery = Arc::new(FakeDelivery {
            unreachable: HashSet::from([ChatId(1)]),
            ..FakeDelivery::default()
        });
        let (sweep, _) = sweep(fetcher, delivery.clone(), &[1, 2, 3]).await;

        let report = sweep.run().await.unwrap();
        assert_eq!(report.delivered, 2);
        assert_eq!(report.failed_deliveries, 1);
        assert!(delivery.texts_to(ChatId(1)).is_empty());
        assert_eq!(delivery.texts_to(ChatId(3)).len(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_catalog_fails_run() {
        let (sweep, _) = sweep(FakeFetcher::new(), Arc::new(FakeDelivery::default()), &[1]).await;
        assert!(matches!(sweep.run().await, Err(DealError::UpstreamUnavailable(_))));
    }
}
