//! Error taxonomy for the discovery and delivery pipeline

use thiserror::Error;

use crate::models::OwnerKey;

/// Failure of a single HTTP page fetch
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if let Some(status) = e.status() {
            Self::Status(status.as_u16())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

/// Rejected user input. Always recoverable by re-prompting.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("unknown category \"{0}\"")]
    UnknownCategory(String),

    #[error("the minimum discount must be a whole number")]
    DiscountNotANumber,

    #[error("the minimum discount must be between 0 and 100, got {0}")]
    DiscountOutOfRange(i64),

    #[error("expected two prices separated by a space, got {0} value(s)")]
    PriceRangeTokenCount(usize),

    #[error("prices must be whole numbers")]
    PriceNotANumber,

    #[error("the price range must be non-negative with the minimum first")]
    PriceRangeOrder,

    #[error("malformed pagination token \"{0}\"")]
    PageToken(String),
}

#[derive(Debug, Error)]
pub enum DealError {
    #[error("catalog unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("crawl of {url} interrupted on page {page_index} after {yielded} items: {reason}")]
    CrawlInterrupted {
        url: String,
        page_index: u32,
        yielded: usize,
        reason: String,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("no stored results for {0}")]
    CacheMiss(OwnerKey),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("corrupt cache record: {0}")]
    CorruptRecord(#[from] serde_json::Error),
}
