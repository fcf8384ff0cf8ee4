//! Turns raw listing items into deals.
//!
//! An item becomes a [`Deal`] only when it is in stock, carries both prices, is
//! actually reduced, meets the discount floor and falls inside the price band.

use std::str::FromStr;

use crate::models::{Deal, RawItem, SearchCriteria};

/// How a partially specified price band is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PriceBandPolicy {
    /// Each supplied bound is enforced on its own
    #[default]
    Independent,
    /// The band only applies when both bounds are supplied
    BothRequired,
}

impl FromStr for PriceBandPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "independent" => Ok(Self::Independent),
            "both-required" => Ok(Self::BothRequired),
            other => Err(anyhow::anyhow!(
                "unknown price band policy '{other}' (expected 'independent' or 'both-required')"
            )),
        }
    }
}

/// Why an item was left out of the results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    OutOfStock,
    MissingPrice,
    NotReduced,
    BelowDiscountFloor,
    OutsidePriceBand,
}

/// Percentage off the list price, rounded half away from zero.
///
/// Worked out in whole pence so a price pair that is exactly half a percent off
/// (£10.30 from £20.00 is 48.5%) does not fall to the lower value through float error.
pub fn discount_pct(current_price: f64, old_price: f64) -> u8 {
    let old = pence(old_price);
    if old == 0 {
        return 0;
    }
    let saved = old.saturating_sub(pence(current_price));

    ((saved * 200 + old) / (2 * old)).min(100) as u8
}

fn pence(price: f64) -> u64 {
    (price * 100.0).round().max(0.0) as u64
}

pub fn accept(
    item: &RawItem,
    criteria: &SearchCriteria,
    policy: PriceBandPolicy,
) -> Result<Deal, Rejection> {
    if !item.in_stock {
        return Err(Rejection::OutOfStock);
    }

    let (Some(current_price), Some(old_price)) = (item.current_price, item.list_price) else {
        return Err(Rejection::MissingPrice);
    };

    if !(current_price > 0.0 && old_price > current_price) {
        return Err(Rejection::NotReduced);
    }

    let discount_pct = discount_pct(current_price, old_price);
    if discount_pct < criteria.min_discount {
        return Err(Rejection::BelowDiscountFloor);
    }

    if !in_price_band(current_price, criteria, policy) {
        return Err(Rejection::OutsidePriceBand);
    }

    Ok(Deal {
        link: item.detail_url.clone(),
        current_price,
        old_price,
        discount_pct,
    })
}

fn in_price_band(price: f64, criteria: &SearchCriteria, policy: PriceBandPolicy) -> bool {
    match (policy, criteria.min_price, criteria.max_price) {
        (_, Some(min), Some(max)) => min <= price && price <= max,
        (PriceBandPolicy::BothRequired, _, _) => true,
        (PriceBandPolicy::Independent, Some(min), None) => min <= price,
        (PriceBandPolicy::Independent, None, Some(max)) => price <= max,
        (PriceBandPolicy::Independent, None, None) => true,
    }
}
