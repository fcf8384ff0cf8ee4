//! Page slicing and the callback token that carries a page request

use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::models::{Deal, Namespace};
use crate::traits::PageControls;

const TOKEN_PREFIX: &str = "products-";
const NOTIFICATION_PREFIX: &str = "notification-";

/// A request for one 1-based page of a namespace's results.
///
/// Encoded as `products-<page>` or `products-notification-<page>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageToken {
    pub namespace: Namespace,
    pub page_number: usize,
}

impl PageToken {
    pub fn new(namespace: Namespace, page_number: usize) -> Self {
        Self {
            namespace,
            page_number,
        }
    }

    /// Whether callback data belongs to the pagination protocol at all
    pub fn matches(data: &str) -> bool {
        data.starts_with(TOKEN_PREFIX)
    }
}

impl fmt::Display for PageToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.namespace {
            Namespace::Interactive => write!(f, "{TOKEN_PREFIX}{}", self.page_number),
            Namespace::Notification => {
                write!(f, "{TOKEN_PREFIX}{NOTIFICATION_PREFIX}{}", self.page_number)
            }
        }
    }
}

impl FromStr for PageToken {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ValidationError::PageToken(s.to_string());

        let rest = s.strip_prefix(TOKEN_PREFIX).ok_or_else(malformed)?;
        let (namespace, number) = match rest.strip_prefix(NOTIFICATION_PREFIX) {
            Some(number) => (Namespace::Notification, number),
            None => (Namespace::Interactive, rest),
        };

        let page_number: usize = number.parse().map_err(|_| malformed())?;
        if page_number == 0 {
            return Err(malformed());
        }

        Ok(Self::new(namespace, page_number))
    }
}

/// One slice of a ranked list plus its navigation flags
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub deals: Vec<Deal>,
    pub page_number: usize,
    pub has_prev: bool,
    pub has_next: bool,
}

impl Page {
    /// Buttons for the neighbouring pages, `None` when there is nowhere to go
    pub fn controls(&self, namespace: Namespace) -> Option<PageControls> {
        let controls = PageControls {
            prev: self
                .has_prev
                .then(|| PageToken::new(namespace, self.page_number - 1)),
            next: self
                .has_next
                .then(|| PageToken::new(namespace, self.page_number + 1)),
        };

        (!controls.is_empty()).then_some(controls)
    }
}

/// Slice a ranked list into the requested 1-based page.
///
/// Never fails: pages past the end (or page 0) come back empty.
pub fn paginate(deals: &[Deal], page_number: usize, page_size: usize) -> Page {
    let end = page_number.saturating_mul(page_size);
    let slice = if page_number == 0 {
        &deals[..0]
    } else {
        let start = (page_number - 1).saturating_mul(page_size).min(deals.len());
        &deals[start..end.min(deals.len())]
    };

    Page {
        deals: slice.to_vec(),
        page_number,
        has_prev: page_number > 1,
        has_next: end < deals.len(),
    }
}
