//! The search dialog: category, then minimum discount, then price range.
//!
//! Every step is a pure transition `(state, input) -> (state, effect)`. Invalid input
//! leaves the state untouched and asks again; the caller only ever sees prompts, a
//! finished [`SearchCriteria`], or nothing.

use crate::catalog::CategoryIndex;
use crate::error::ValidationError;
use crate::models::{Category, SearchCriteria};

pub mod sessions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    AwaitingCategory,
    AwaitingDiscount,
    AwaitingPriceRange,
}

/// Per-chat dialog state, carrying what has been collected so far
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Conversation {
    #[default]
    Idle,
    AwaitingCategory {
        categories: CategoryIndex,
    },
    AwaitingDiscount {
        category: Category,
    },
    AwaitingPriceRange {
        category: Category,
        min_discount: u8,
    },
}

/// What the user is asked for next
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    ChooseCategory(Vec<String>),
    EnterDiscount,
    EnterPriceRange,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Prompt(Prompt),
    /// Input was rejected; show the error and ask again
    Reject {
        error: ValidationError,
        prompt: Prompt,
    },
    /// All constraints collected: crawl and deliver the first page
    Search(SearchCriteria),
    /// Free text while no dialog is running
    Ignored,
}

impl Conversation {
    /// Begin (or restart) a search with a fresh category snapshot
    pub fn start(categories: CategoryIndex) -> (Self, Effect) {
        let prompt = Prompt::ChooseCategory(categories.names().map(str::to_string).collect());
        (Self::AwaitingCategory { categories }, Effect::Prompt(prompt))
    }

    pub fn stage(&self) -> Stage {
        match self {
            Self::Idle => Stage::Idle,
            Self::AwaitingCategory { .. } => Stage::AwaitingCategory,
            Self::AwaitingDiscount { .. } => Stage::AwaitingDiscount,
            Self::AwaitingPriceRange { .. } => Stage::AwaitingPriceRange,
        }
    }

    pub fn advance(self, input: &str) -> (Self, Effect) {
        let input = input.trim();

        match self {
            Self::Idle => (Self::Idle, Effect::Ignored),

            Self::AwaitingCategory { categories } => match categories.get(input).cloned() {
                Some(category) => (
                    Self::AwaitingDiscount { category },
                    Effect::Prompt(Prompt::EnterDiscount),
                ),
                None => {
                    let prompt = Prompt::ChooseCategory(categories.names().map(str::to_string).collect());
                    (
                        Self::AwaitingCategory { categories },
                        Effect::Reject {
                            error: ValidationError::UnknownCategory(input.to_string()),
                            prompt,
                        },
                    )
                }
            },

            Self::AwaitingDiscount { category } => match parse_discount(input) {
                Ok(min_discount) => (
                    Self::AwaitingPriceRange {
                        category,
                        min_discount,
                    },
                    Effect::Prompt(Prompt::EnterPriceRange),
                ),
                Err(error) => (
                    Self::AwaitingDiscount { category },
                    Effect::Reject {
                        error,
                        prompt: Prompt::EnterDiscount,
                    },
                ),
            },

            Self::AwaitingPriceRange {
                category,
                min_discount,
            } => match parse_price_range(input) {
                Ok((min, max)) => (
                    Self::Idle,
                    Effect::Search(SearchCriteria {
                        category,
                        min_discount,
                        min_price: Some(min as f64),
                        max_price: Some(max as f64),
                    }),
                ),
                Err(error) => (
                    Self::AwaitingPriceRange {
                        category,
                        min_discount,
                    },
                    Effect::Reject {
                        error,
                        prompt: Prompt::EnterPriceRange,
                    },
                ),
            },
        }
    }
}

fn parse_discount(input: &str) -> Result<u8, ValidationError> {
    let value: i64 = input.parse().map_err(|_| ValidationError::DiscountNotANumber)?;

    u8::try_from(value)
        .ok()
        .filter(|v| *v <= 100)
        .ok_or(ValidationError::DiscountOutOfRange(value))
}

fn parse_price_range(input: &str) -> Result<(i64, i64), ValidationError> {
    let tokens: Vec<&str> = input.split_whitespace().collect();
    let [min, max] = tokens.as_slice() else {
        return Err(ValidationError::PriceRangeTokenCount(tokens.len()));
    };

    let min: i64 = min.parse().map_err(|_| ValidationError::PriceNotANumber)?;
    let max: i64 = max.parse().map_err(|_| ValidationError::PriceNotANumber)?;

    if min < 0 || max < 0 || min > max {
        return Err(ValidationError::PriceRangeOrder);
    }

    Ok((min, max))
}
