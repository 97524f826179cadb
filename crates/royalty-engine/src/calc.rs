//! Royalty calculation for flat, tiered and category rate structures.

use crate::rate::{
    parse_percentage, parse_threshold_lower_bound, parse_threshold_upper_bound, ParseError,
};
use royalty_core::{CategoryBreakdown, RateStructure, Tier, ValidationError};
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors produced by royalty calculation. None of them yield a partial royalty.
#[derive(Debug, Error, PartialEq)]
pub enum CalcError {
    /// A rate string had no percentage in it.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// Category rates were used without per-category sales.
    #[error("category breakdown required for category-specific rates")]
    MissingBreakdown,
    /// A breakdown category matched none of the contract's rate keys.
    #[error("no rate found for category: {0}")]
    NoMatchingCategory(String),
    /// Input amounts or periods failed validation.
    #[error("invalid input: {0}")]
    Invalid(#[from] ValidationError),
    /// The royalty does not fit in a `Decimal`.
    #[error("royalty calculation overflowed")]
    Overflow,
}

/// A tier with its bounds and rate read out of the contract text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bracket {
    pub lower: Decimal,
    /// `None` for the open-ended top bracket.
    pub upper: Option<Decimal>,
    pub rate: Decimal,
}

impl Bracket {
    pub fn parse(tier: &Tier) -> Result<Self, ParseError> {
        Ok(Self {
            lower: parse_threshold_lower_bound(&tier.threshold)?,
            upper: parse_threshold_upper_bound(&tier.threshold)?,
            rate: parse_percentage(&tier.rate)?,
        })
    }

    /// Sales the bracket can absorb; an upper bound below the lower one gives zero.
    pub fn width(&self) -> Option<Decimal> {
        self.upper.map(|u| (u - self.lower).max(Decimal::ZERO))
    }

    fn schedule_order(&self, other: &Self) -> Ordering {
        self.lower
            .cmp(&other.lower)
            .then_with(|| match (self.upper, other.upper) {
                (Some(a), Some(b)) => a.cmp(&b),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
            .then_with(|| self.rate.cmp(&other.rate))
    }
}

/// Compute the royalty owed on `net_sales` under `rate_structure`.
///
/// `breakdown` is only read for category rates, where it is required.
pub fn calculate_royalty(
    rate_structure: &RateStructure,
    net_sales: Decimal,
    breakdown: Option<&CategoryBreakdown>,
) -> Result<Decimal, CalcError> {
    if net_sales < Decimal::ZERO {
        return Err(ValidationError::NegativeMoney("net sales").into());
    }
    match rate_structure {
        RateStructure::Flat(rate) => flat_royalty(rate, net_sales),
        RateStructure::Tiered(tiers) => tiered_royalty(tiers, net_sales),
        RateStructure::Category(rates) => {
            let breakdown = breakdown.ok_or(CalcError::MissingBreakdown)?;
            let breakdown_total = breakdown
                .values()
                .try_fold(Decimal::ZERO, |acc, v| acc.checked_add(*v));
            match breakdown_total {
                Some(total) if total == net_sales => {}
                Some(total) => {
                    warn!(%net_sales, breakdown_total = %total, "category breakdown does not sum to net sales")
                }
                None => warn!(%net_sales, "category breakdown total overflows"),
            }
            category_royalty(rates, breakdown)
        }
    }
}

/// Royalty at a single percentage.
pub fn flat_royalty(rate: &str, net_sales: Decimal) -> Result<Decimal, CalcError> {
    net_sales
        .checked_mul(parse_percentage(rate)?)
        .ok_or(CalcError::Overflow)
}

/// `acc + amount * rate`, failing instead of panicking on overflow.
fn add_product(acc: Decimal, amount: Decimal, rate: Decimal) -> Result<Decimal, CalcError> {
    amount
        .checked_mul(rate)
        .and_then(|p| acc.checked_add(p))
        .ok_or(CalcError::Overflow)
}

/// Royalty under marginal brackets, like progressive tax brackets.
///
/// Every tier rate is parsed before any sales are placed, so a malformed rate
/// fails the calculation even when sales never reach that tier.
pub fn tiered_royalty(tiers: &[Tier], net_sales: Decimal) -> Result<Decimal, CalcError> {
    let mut brackets = tiers
        .iter()
        .map(Bracket::parse)
        .collect::<Result<Vec<_>, _>>()?;
    brackets.sort_by(|a, b| a.schedule_order(b));

    let mut remaining = net_sales;
    let mut royalty = Decimal::ZERO;
    for b in &brackets {
        if remaining <= Decimal::ZERO {
            break;
        }
        let tier_sales = match b.width() {
            Some(width) => remaining.min(width),
            None => remaining,
        };
        royalty = add_product(royalty, tier_sales, b.rate)?;
        remaining -= tier_sales;
        debug!(lower = %b.lower, rate = %b.rate, %tier_sales, "tier applied");
    }
    if remaining > Decimal::ZERO {
        debug!(%remaining, "sales above the highest bounded tier carry no royalty");
    }
    Ok(royalty)
}

/// Royalty summed per breakdown category at each category's matched rate.
pub fn category_royalty(
    rates: &BTreeMap<String, String>,
    breakdown: &CategoryBreakdown,
) -> Result<Decimal, CalcError> {
    let mut royalty = Decimal::ZERO;
    for (category, sales) in breakdown {
        if *sales < Decimal::ZERO {
            return Err(ValidationError::NegativeCategorySales(category.clone()).into());
        }
        let (key, rate_text) = match_category_rate(category, rates)
            .ok_or_else(|| CalcError::NoMatchingCategory(category.clone()))?;
        let rate = parse_percentage(rate_text)?;
        debug!(%category, key, %rate, %sales, "category matched");
        royalty = add_product(royalty, *sales, rate)?;
    }
    Ok(royalty)
}

/// Find the rate key for a breakdown category.
///
/// Matching is case-insensitive. An exact key wins; otherwise any key that
/// contains the category or is contained by it qualifies, and the longest
/// such key wins, ties going to the first key in sorted order.
pub fn match_category_rate<'a>(
    category: &str,
    rates: &'a BTreeMap<String, String>,
) -> Option<(&'a str, &'a str)> {
    let needle = category.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }
    let mut best: Option<(&'a String, &'a String, usize)> = None;
    for (key, rate) in rates {
        let k = key.trim().to_lowercase();
        if k.is_empty() {
            continue;
        }
        if k == needle {
            return Some((key.as_str(), rate.as_str()));
        }
        if (needle.contains(&k) || k.contains(&needle))
            && best.map_or(true, |(_, _, len)| k.len() > len)
        {
            best = Some((key, rate, k.len()));
        }
    }
    best.map(|(key, rate, _)| (key.as_str(), rate.as_str()))
}
