use tracing::info;

use crate::database::{CacheRecord, Database};
use crate::error::DealError;
use crate::models::{Deal, OwnerKey, RankedDeals};
use crate::pagination::{Page, paginate};

/// Latest ranked result list per chat and namespace, served page by page without
/// crawling again
#[derive(Clone)]
pub struct PageCache {
    database: Database,
    page_size: usize,
}

impl PageCache {
    pub fn new(database: Database, page_size: usize) -> Self {
        Self {
            database,
            page_size,
        }
    }

    /// Replace whatever was stored for `owner`
    pub async fn store(&self, owner: &OwnerKey, deals: &RankedDeals) -> Result<(), DealError> {
        let record = CacheRecord {
            deals_json: serde_json::to_string(deals.as_slice())?,
            page_size: self.page_size,
        };

        self.database.save_cache_record(owner, &record).await?;
        info!("Stored {} deals for {}", deals.len(), owner);
        Ok(())
    }

    /// Page `page_number` (1-based) of the stored list.
    ///
    /// Pages past the end are empty; a missing entry is [`DealError::CacheMiss`].
    pub async fn page(&self, owner: &OwnerKey, page_number: usize) -> Result<Page, DealError> {
        let record = self
            .database
            .load_cache_record(owner)
            .await?
            .ok_or(DealError::CacheMiss(*owner))?;

        let deals: Vec<Deal> = serde_json::from_str(&record.deals_json)?;
        Ok(paginate(&deals, page_number, record.page_size))
    }
}
