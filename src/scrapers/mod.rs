//! HTML extraction for catalog sites described by a [`ScraperConfig`]

use anyhow::Result;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};

use crate::models::{Category, RawItem};
use crate::traits::SiteSelectors;

pub mod bananafingers;

/// A site's selectors, parsed once and reused for every page
#[derive(Debug)]
pub struct CompiledSelectors {
    category_item: Selector,
    category_link: Selector,
    product: Selector,
    link: Selector,
    price: Selector,
    old_price: Selector,
    out_of_stock: Option<Selector>,
}

impl CompiledSelectors {
    pub fn compile(selectors: &SiteSelectors) -> Result<Self> {
        let parse = |what: &str, css: &str| {
            Selector::parse(css)
                .map_err(|e| anyhow::anyhow!("Failed to parse {} selector: {:?}", what, e))
        };

        Ok(Self {
            category_item: parse("category item", &selectors.category_item)?,
            category_link: parse("category link", &selectors.category_link)?,
            product: parse("product", &selectors.product_container)?,
            link: parse("link", &selectors.link)?,
            price: parse("price", &selectors.price)?,
            old_price: parse("old price", &selectors.old_price)?,
            out_of_stock: selectors
                .out_of_stock
                .as_ref()
                .map(|s| parse("out of stock", s))
                .transpose()?,
        })
    }

    /// Extract the category menu in document order.
    ///
    /// Names are trimmed and lower-cased. A repeated name keeps its first position and
    /// takes the later URL. Links are made absolute against `page_url`.
    pub fn parse_categories(&self, html: &str, page_url: &str) -> Vec<Category> {
        let document = Html::parse_document(html);
        let base = Url::parse(page_url).ok();
        let mut categories: Vec<Category> = Vec::new();

        for item in document.select(&self.category_item) {
            let Some(anchor) = item.select(&self.category_link).next() else {
                continue;
            };
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };

            let name = text_of(anchor).to_lowercase();
            if name.is_empty() {
                continue;
            }
            let href = absolute(base.as_ref(), href);

            match categories.iter_mut().find(|c| c.name == name) {
                Some(existing) => existing.listing_url = href,
                None => categories.push(Category {
                    name,
                    listing_url: href,
                }),
            }
        }

        categories
    }

    /// Extract every product tile of one listing page
    pub fn parse_listing(&self, html: &str, page_url: &str) -> Vec<RawItem> {
        let document = Html::parse_document(html);
        let base = Url::parse(page_url).ok();

        document
            .select(&self.product)
            .filter_map(|product| {
                let href = product.select(&self.link).next()?.value().attr("href")?;

                let in_stock = self
                    .out_of_stock
                    .as_ref()
                    .is_none_or(|sel| product.select(sel).next().is_none());

                Some(RawItem {
                    detail_url: absolute(base.as_ref(), href),
                    current_price: product.select(&self.price).next().and_then(|el| parse_price(&text_of(el))),
                    list_price: product.select(&self.old_price).next().and_then(|el| parse_price(&text_of(el))),
                    in_stock,
                })
            })
            .collect()
    }
}

/// Resolve a possibly relative `href`; left as found when there is no usable base
fn absolute(base: Option<&Url>, href: &str) -> String {
    base.and_then(|base| base.join(href).ok())
        .map_or_else(|| href.to_string(), |url| url.to_string())
}

fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Read a displayed price such as `£1,049.95`, ignoring currency symbols and separators
pub fn parse_price(text: &str) -> Option<f64> {
    let digits: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    digits.parse().ok()
}
