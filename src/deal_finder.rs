use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, error, info, warn};

use crate::cache::PageCache;
use crate::catalog::Catalog;
use crate::config::Settings;
use crate::conversation::sessions::Sessions;
use crate::conversation::{Conversation, Effect};
use crate::crawler::ListingCrawler;
use crate::database::Database;
use crate::error::DealError;
use crate::filter::PriceBandPolicy;
use crate::messages;
use crate::models::{ChatId, Namespace, OwnerKey, RankedDeals, SearchCriteria};
use crate::pagination::{PageToken, paginate};
use crate::scrapers::{CompiledSelectors, bananafingers};
use crate::sweep::NotificationSweep;
use crate::traits::{Delivery, MessageRef, PageFetcher};

/// Handles inbound chat messages and page requests for every chat
#[derive(Clone)]
pub struct DealFinder {
    catalog: Arc<Catalog>,
    crawler: Arc<ListingCrawler>,
    cache: PageCache,
    database: Database,
    sessions: Arc<Sessions>,
    delivery: Arc<dyn Delivery>,
    policy: PriceBandPolicy,
    page_size: usize,
}

impl DealFinder {
    pub fn new(
        settings: &Settings,
        fetcher: Arc<dyn PageFetcher>,
        database: Database,
        delivery: Arc<dyn Delivery>,
    ) -> Result<Self> {
        let config = Arc::new(bananafingers::site_config(settings));
        let selectors = Arc::new(CompiledSelectors::compile(&config.selectors)?);

        Ok(Self {
            catalog: Arc::new(Catalog::new(fetcher.clone(), config.clone(), selectors.clone())),
            crawler: Arc::new(ListingCrawler::new(fetcher, config, selectors)),
            cache: PageCache::new(database.clone(), settings.page_size),
            database,
            sessions: Arc::new(Sessions::new()),
            delivery,
            policy: settings.price_band_policy,
            page_size: settings.page_size,
        })
    }

    /// The periodic sweep, sharing this finder's crawler, cache and delivery
    pub fn sweep(&self, discount_floor: u8) -> NotificationSweep {
        NotificationSweep::new(
            self.catalog.clone(),
            self.crawler.clone(),
            self.cache.clone(),
            self.database.clone(),
            self.delivery.clone(),
            discount_floor,
            self.page_size,
        )
    }

    pub async fn handle_message(&self, chat: ChatId, username: Option<&str>, text: &str) -> Result<()> {
        info!("Chat {} ({}): {}", chat, username.unwrap_or("-"), text);

        let result = self.route(chat, username, text).await;
        self.sessions.release(chat).await;
        result
    }

    async fn route(&self, chat: ChatId, username: Option<&str>, text: &str) -> Result<()> {
        match command(text) {
            Some("/start") => {
                self.delivery.send(chat, messages::GREETING, None).await?;
            }
            Some("/categories") => self.start_search(chat).await?,
            Some("/cancel") => {
                let session = self.sessions.session(chat).await;
                *session.lock().await = Conversation::Idle;
                self.delivery.send(chat, messages::CANCELLED, None).await?;
            }
            Some("/subscribe") => self.subscribe(chat, username, true).await?,
            Some("/unsubscribe") => self.subscribe(chat, username, false).await?,
            Some(_) => {
                self.delivery.send(chat, messages::IDLE_HINT, None).await?;
            }
            None => self.continue_dialog(chat, text).await?,
        }

        Ok(())
    }

    /// Serve a `products-…` callback from the cached results, editing the message
    /// that carried the button
    pub async fn handle_page_request(&self, chat: ChatId, message: MessageRef, data: &str) -> Result<()> {
        let token: PageToken = match data.parse() {
            Ok(token) => token,
            Err(e) => {
                warn!("Ignoring page request from {}: {}", chat, e);
                return Ok(());
            }
        };

        let owner = OwnerKey {
            chat,
            namespace: token.namespace,
        };

        match self.cache.page(&owner, token.page_number).await {
            Ok(page) => {
                let text = if page.deals.is_empty() {
                    messages::NO_PRODUCTS.to_string()
                } else {
                    messages::deals(&page.deals)
                };
                self.delivery
                    .edit(chat, message, &text, page.controls(token.namespace))
                    .await?;
            }
            Err(DealError::CacheMiss(owner)) => {
                info!("Page request for {} without stored results", owner);
                self.delivery.send(chat, messages::NOTHING_TO_PAGE, None).await?;
            }
            Err(e) => return Err(e.into()),
        }

        Ok(())
    }

    async fn subscribe(&self, chat: ChatId, username: Option<&str>, subscribed: bool) -> Result<()> {
        let reply = match self.database.set_subscription(chat, username, subscribed).await {
            Ok(()) if subscribed => messages::SUBSCRIBED,
            Ok(()) => messages::UNSUBSCRIBED,
            Err(e) => {
                error!("Failed to update subscription for {}: {}", chat, e);
                messages::SOMETHING_WENT_WRONG
            }
        };

        self.delivery.send(chat, reply, None).await?;
        Ok(())
    }

    async fn start_search(&self, chat: ChatId) -> Result<()> {
        let session = self.sessions.session(chat).await;
        let mut state = session.lock().await;

        match self.catalog.fetch_categories().await {
            Ok(categories) => {
                let (next, effect) = Conversation::start(categories);
                *state = next;
                self.apply(chat, effect).await
            }
            Err(e) => {
                error!("Cannot start search for {}: {}", chat, e);
                *state = Conversation::Idle;
                self.delivery.send(chat, messages::CATALOG_UNAVAILABLE, None).await?;
                Ok(())
            }
        }
    }

    async fn continue_dialog(&self, chat: ChatId, text: &str) -> Result<()> {
        let session = self.sessions.session(chat).await;
        // held until the effect (crawl included) is done
        let mut state = session.lock().await;

        let (next, effect) = std::mem::take(&mut *state).advance(text);
        debug!("Chat {} now {:?}", chat, next.stage());
        *state = next;

        self.apply(chat, effect).await
    }

    async fn apply(&self, chat: ChatId, effect: Effect) -> Result<()> {
        match effect {
            Effect::Prompt(prompt) => {
                self.delivery.send(chat, &messages::prompt(&prompt), None).await?;
            }
            Effect::Reject { error, prompt } => {
                info!("Rejected input from {}: {}", chat, error);
                self.delivery
                    .send(chat, &messages::rejected(&error, &prompt), None)
                    .await?;
            }
            Effect::Search(criteria) => self.search(chat, &criteria).await?,
            Effect::Ignored => {
                self.delivery.send(chat, messages::IDLE_HINT, None).await?;
            }
        }

        Ok(())
    }

    async fn search(&self, chat: ChatId, criteria: &SearchCriteria) -> Result<()> {
        self.delivery.send(chat, messages::PLEASE_WAIT, None).await?;

        let outcome = self.crawler.find_deals(criteria, self.policy).await;
        info!(
            "Search for {} scanned {} items and kept {} deals",
            chat,
            outcome.scanned,
            outcome.deals.len()
        );
        let ranked = RankedDeals::rank(outcome.deals);
        let owner = OwnerKey::interactive(chat);

        let stored = match self.cache.store(&owner, &ranked).await {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to store results for {}: {}", owner, e);
                false
            }
        };

        let partial = outcome.interruption.is_some();

        if ranked.is_empty() {
            let text = if partial {
                format!("{}\n\n{}", messages::PARTIAL_RESULTS, messages::NO_PRODUCTS)
            } else {
                messages::NO_PRODUCTS.to_string()
            };
            self.delivery.send(chat, &text, None).await?;
            return Ok(());
        }

        let page = paginate(ranked.as_slice(), 1, self.page_size);
        let mut text = messages::deals(&page.deals);
        if partial {
            text = format!("{}\n\n{}", messages::PARTIAL_RESULTS, text);
        }

        let controls = if stored {
            page.controls(Namespace::Interactive)
        } else {
            None
        };

        self.delivery.send(chat, &text, controls).await?;
        Ok(())
    }
}

/// The command name of a `/command` message, without any `@botname` suffix
fn command(text: &str) -> Option<&str> {
    let word = text.split_whitespace().next()?;
    if !word.starts_with('/') {
        return None;
    }

    word.split('@').next()
}
