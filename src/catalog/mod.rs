use std::sync::Arc;

use tracing::{error, info};

use crate::error::DealError;
use crate::models::Category;
use crate::scrapers::CompiledSelectors;
use crate::traits::{PageFetcher, ScraperConfig};

/// The catalog's category menu, in the order the site presents it
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryIndex(Vec<Category>);

impl CategoryIndex {
    pub fn new(categories: Vec<Category>) -> Self {
        Self(categories)
    }

    /// Exact, case-sensitive lookup by the name shown to the user
    pub fn get(&self, name: &str) -> Option<&Category> {
        self.0.iter().find(|c| c.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|c| c.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Category> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// Reads the category menu from the catalog root page
pub struct Catalog {
    fetcher: Arc<dyn PageFetcher>,
    config: Arc<ScraperConfig>,
    selectors: Arc<CompiledSelectors>,
}

impl Catalog {
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

    /// Fetch the current category menu.
    ///
    /// A root page without any category entries is treated as a failure, not as an
    /// empty catalog. Nothing is retried.
    pub async fn fetch_categories(&self) -> Result<CategoryIndex, DealError> {
        let html = self.fetcher.fetch(&self.config.catalog_url).await.map_err(|e| {
            error!("Failed to fetch {} catalog root: {}", self.config.name, e);
            DealError::UpstreamUnavailable(format!("{}: {e}", self.config.catalog_url))
        })?;

        let categories = self.selectors.parse_categories(&html, &self.config.catalog_url);

        if categories.is_empty() {
            error!("No categories found on {}", self.config.catalog_url);
            return Err(DealError::UpstreamUnavailable(format!(
                "no categories found on {}",
                self.config.catalog_url
            )));
        }

        info!("Found {} categories on {}", categories.len(), self.config.name);
        Ok(CategoryIndex::new(categories))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeFetcher, site_config};

    fn catalog(fetcher: FakeFetcher) -> Catalog {
        let config = site_config();
        let selectors = CompiledSelectors::compile(&config.selectors).unwrap();
        Catalog::new(Arc::new(fetcher), Arc::new(config), Arc::new(selectors))
    }

    #[tokio::test]
    async fn test_fetch_categories() {
        let fetcher = FakeFetcher::new().page(
            crate::testing::ROOT_URL,
            r#"<li class="level-top"><a href="https://shop/carabiners">Carabiners</a></li>
               <li class="level-top"><a href="https://shop/ropes">Ropes</a></li>"#,
        );

        let index = catalog(fetcher).fetch_categories().await.unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.names().collect::<Vec<_>>(), vec!["carabiners", "ropes"]);
        assert_eq!(index.get("ropes").unwrap().listing_url, "https://shop/ropes");
        assert!(index.get("Ropes").is_none());
    }

    #[tokio::test]
    async fn test_no_markers_is_upstream_unavailable() {
        let fetcher = FakeFetcher::new().page(crate::testing::ROOT_URL, "<html><body>Maintenance</body></html>");
        let result = catalog(fetcher).fetch_categories().await;
        assert!(matches!(result, Err(DealError::UpstreamUnavailable(_))));
    }

    #[tokio::test]
    async fn test_fetch_failure_is_upstream_unavailable() {
        let result = catalog(FakeFetcher::new()).fetch_categories().await;
        assert!(matches!(result, Err(DealError::UpstreamUnavailable(_))));
    }
}
