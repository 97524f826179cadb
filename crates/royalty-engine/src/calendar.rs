//! Contract-year arithmetic.

use chrono::{Datelike, Months, NaiveDate};
use royalty_core::SalesPeriod;

/// First day of `contract_year` (1-based). `None` for year 0 or out-of-range dates.
pub fn contract_year_start(contract_start: NaiveDate, contract_year: u32) -> Option<NaiveDate> {
    let years = contract_year.checked_sub(1)?;
    contract_start.checked_add_months(Months::new(years.checked_mul(12)?))
}

/// Half-open window `[start, end)` covered by `contract_year`.
pub fn contract_year_window(
    contract_start: NaiveDate,
    contract_year: u32,
) -> Option<(NaiveDate, NaiveDate)> {
    let start = contract_year_start(contract_start, contract_year)?;
    let end = contract_year_start(contract_start, contract_year.checked_add(1)?)?;
    Some((start, end))
}

/// Contract year a date falls in. Dates before the start count as year 1.
pub fn contract_year_for(contract_start: NaiveDate, on: NaiveDate) -> u32 {
    let span = u32::try_from(on.year() - contract_start.year()).unwrap_or(0);
    let mut year = span + 1;
    while year > 1 {
        match contract_year_start(contract_start, year) {
            Some(start) if start <= on => break,
            _ => year -= 1,
        }
    }
    year
}

/// Periods whose end date falls inside `contract_year`.
pub fn periods_in_contract_year(
    periods: &[SalesPeriod],
    contract_start: NaiveDate,
    contract_year: u32,
) -> Vec<SalesPeriod> {
    let Some((start, end)) = contract_year_window(contract_start, contract_year) else {
        return Vec::new();
    };
    periods
        .iter()
        .filter(|p| p.period_end >= start && p.period_end < end)
        .cloned()
        .collect()
}
