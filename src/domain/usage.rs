//! Token usage and the cost model
//!
//! Cost is always derived from a [`UsageSummary`] and a [`PriceTable`];
//! it is never stored apart from the counts it came from.

use nutype::nutype;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::ops::Add;
use thiserror::Error;

const TOKENS_PER_MILLION: i64 = 1_000_000;

/// Errors raised while reading provider token counts
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsageError {
    #[error("negative {category} token count: {value}")]
    NegativeTokens { category: TokenCategory, value: i64 },
}

/// The four separately priced token kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
pub enum TokenCategory {
    #[display("input")]
    Input,
    #[display("output")]
    Output,
    #[display("cache-write")]
    CacheWrite,
    #[display("cache-read")]
    CacheRead,
}

/// Token counts reported by the provider at the end of a stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSummary {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_write_tokens: u64,
    pub cache_read_tokens: u64,
}

impl UsageSummary {
    pub fn new(
        input_tokens: u64,
        output_tokens: u64,
        cache_write_tokens: u64,
        cache_read_tokens: u64,
    ) -> Self {
        Self {
            input_tokens,
            output_tokens,
            cache_write_tokens,
            cache_read_tokens,
        }
    }

    /// Build a summary from signed provider counts, rejecting negatives
    pub fn from_signed(
        input_tokens: i64,
        output_tokens: i64,
        cache_write_tokens: i64,
        cache_read_tokens: i64,
    ) -> Result<Self, UsageError> {
        let check = |category: TokenCategory, value: i64| {
            u64::try_from(value).map_err(|_| UsageError::NegativeTokens { category, value })
        };

        Ok(Self {
            input_tokens: check(TokenCategory::Input, input_tokens)?,
            output_tokens: check(TokenCategory::Output, output_tokens)?,
            cache_write_tokens: check(TokenCategory::CacheWrite, cache_write_tokens)?,
            cache_read_tokens: check(TokenCategory::CacheRead, cache_read_tokens)?,
        })
    }

    pub fn tokens(&self, category: TokenCategory) -> u64 {
        match category {
            TokenCategory::Input => self.input_tokens,
            TokenCategory::Output => self.output_tokens,
            TokenCategory::CacheWrite => self.cache_write_tokens,
            TokenCategory::CacheRead => self.cache_read_tokens,
        }
    }

    pub fn total_tokens(&self) -> u64 {
        self.input_tokens
            .saturating_add(self.output_tokens)
            .saturating_add(self.cache_write_tokens)
            .saturating_add(self.cache_read_tokens)
    }
}

impl Add for UsageSummary {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            input_tokens: self.input_tokens.saturating_add(rhs.input_tokens),
            output_tokens: self.output_tokens.saturating_add(rhs.output_tokens),
            cache_write_tokens: self.cache_write_tokens.saturating_add(rhs.cache_write_tokens),
            cache_read_tokens: self.cache_read_tokens.saturating_add(rhs.cache_read_tokens),
        }
    }
}

/// Price per million tokens in USD
#[nutype(
    validate(predicate = |price| *price >= Decimal::ZERO),
    derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, AsRef)
)]
pub struct PricePerMillionTokens(Decimal);

/// Monetary cost in USD, fractional cents preserved
#[nutype(
    validate(predicate = |cost| *cost >= Decimal::ZERO),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        PartialOrd,
        Serialize,
        Deserialize,
        AsRef,
        Display
    )
)]
pub struct Cost(Decimal);

/// Static per-category price table
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceTable {
    pub input: PricePerMillionTokens,
    pub output: PricePerMillionTokens,
    pub cache_write: PricePerMillionTokens,
    pub cache_read: PricePerMillionTokens,
}

impl PriceTable {
    /// Default rates: cache reads discounted, cache writes carry the indexing premium
    pub fn standard() -> Self {
        Self {
            input: price(300, 2),
            output: price(1500, 2),
            cache_write: price(375, 2),
            cache_read: price(30, 2),
        }
    }

    pub fn rate(&self, category: TokenCategory) -> PricePerMillionTokens {
        match category {
            TokenCategory::Input => self.input,
            TokenCategory::Output => self.output,
            TokenCategory::CacheWrite => self.cache_write,
            TokenCategory::CacheRead => self.cache_read,
        }
    }

    /// Sum of `tokens / 1,000,000 * rate` over every category
    pub fn cost(&self, usage: &UsageSummary) -> Cost {
        let per_million = Decimal::from(TOKENS_PER_MILLION);
        let total: Decimal = [
            TokenCategory::Input,
            TokenCategory::Output,
            TokenCategory::CacheWrite,
            TokenCategory::CacheRead,
        ]
        .into_iter()
        .map(|category| {
            Decimal::from(usage.tokens(category)) * *self.rate(category).as_ref() / per_million
        })
        .sum();

        // every term is a product of non-negative values
        Cost::try_new(total.normalize()).unwrap_or_else(|_| Cost::zero())
    }
}

impl Default for PriceTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl Cost {
    pub fn zero() -> Self {
        Self::try_new(Decimal::ZERO).expect("zero is a valid cost")
    }
}

fn price(mantissa: i64, scale: u32) -> PricePerMillionTokens {
    PricePerMillionTokens::try_new(Decimal::new(mantissa, scale))
        .expect("static prices are non-negative")
}
