//! User-facing texts

use crate::conversation::Prompt;
use crate::error::ValidationError;
use crate::models::Deal;

pub const GREETING: &str = "Hello! I'm a bot that will help you find the best deals on climbing gear. \
                            Type /categories to select a category.";
pub const IDLE_HINT: &str = "Type /categories to start a new search.";
pub const PLEASE_WAIT: &str = "Please wait...";
pub const NO_PRODUCTS: &str = "No products found.";
pub const PARTIAL_RESULTS: &str = "The shop stopped answering part way through, so these results may be incomplete.";
pub const CATALOG_UNAVAILABLE: &str = "The shop is not reachable right now. Please try again later.";
pub const NOTHING_TO_PAGE: &str = "There are no results to page through. Type /categories to start a new search.";
pub const CANCELLED: &str = "Search cancelled.";
pub const SUBSCRIBED: &str = "You have been subscribed to daily notification.";
pub const UNSUBSCRIBED: &str = "You have been unsubscribed from daily notification.";
pub const SOMETHING_WENT_WRONG: &str = "Something went wrong. Please try again later.";

pub fn prompt(prompt: &Prompt) -> String {
    match prompt {
        Prompt::ChooseCategory(names) => {
            let mut text = String::from("Please select a category:\n");
            for name in names {
                text.push_str("\n• ");
                text.push_str(name);
            }
            text
        }
        Prompt::EnterDiscount => "Please enter the minimum sale (0-100).".to_string(),
        Prompt::EnterPriceRange => "Please enter the price range. (1 10)".to_string(),
    }
}

pub fn rejected(error: &ValidationError, next: &Prompt) -> String {
    let problem = match error {
        ValidationError::UnknownCategory(_) => "Invalid category.",
        ValidationError::DiscountNotANumber | ValidationError::DiscountOutOfRange(_) => "Invalid minimum sale.",
        _ => "Invalid price range.",
    };

    format!("{problem} ({error})\n\n{}", prompt(next))
}

pub fn deals(deals: &[Deal]) -> String {
    deals
        .iter()
        .map(|deal| {
            format!(
                "{}\nPrice: £{:.2}\nOld price: £{:.2}\nSale: {}%\n",
                deal.link, deal.current_price, deal.old_price, deal.discount_pct
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn daily_deals(floor: u8, page: &[Deal]) -> String {
    format!("Today's deals with at least {floor}% off:\n\n{}", deals(page))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_deals() {
        let text = deals(&[
            Deal {
                link: "https://shop/a".to_string(),
                current_price: 20.0,
                old_price: 40.0,
                discount_pct: 50,
            },
            Deal {
                link: "https://shop/b".to_string(),
                current_price: 49.95,
                old_price: 60.0,
                discount_pct: 17,
            },
        ]);

        assert_eq!(
            text,
            "https://shop/a\nPrice: £20.00\nOld price: £40.00\nSale: 50%\n\n\
             https://shop/b\nPrice: £49.95\nOld price: £60.00\nSale: 17%\n"
        );
    }

    #[test]
    fn test_prompt_lists_categories() {
        let text = prompt(&Prompt::ChooseCategory(vec!["ropes".to_string(), "shoes".to_string()]));
        assert!(text.ends_with("• ropes\n• shoes"));
    }
}
