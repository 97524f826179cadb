//! Year-to-date aggregation.

use crate::advance::calculate_advance_remaining;
use chrono::{DateTime, Utc};
use royalty_core::{Contract, ContractId, GuaranteePeriod, RoyaltySummary, SalesPeriod};
use rust_decimal::Decimal;
use tracing::debug;

/// Fold sales periods into a year-to-date summary stamped with the current time.
///
/// Every supplied period is summed; scoping to the contract year is up to the
/// caller (see [`crate::calendar::periods_in_contract_year`]).
pub fn calculate_ytd_summary(
    contract_id: &ContractId,
    contract_year: u32,
    periods: &[SalesPeriod],
    minimum_guarantee: Decimal,
    guarantee_period: GuaranteePeriod,
    advance_payment: Option<Decimal>,
) -> RoyaltySummary {
    calculate_ytd_summary_at(
        contract_id,
        contract_year,
        periods,
        minimum_guarantee,
        guarantee_period,
        advance_payment,
        Utc::now(),
    )
}

/// Same as [`calculate_ytd_summary`] with an explicit timestamp.
///
/// The shortfall is measured against the full annual guarantee;
/// `guarantee_period` is carried through for display only.
pub fn calculate_ytd_summary_at(
    contract_id: &ContractId,
    contract_year: u32,
    periods: &[SalesPeriod],
    minimum_guarantee: Decimal,
    guarantee_period: GuaranteePeriod,
    advance_payment: Option<Decimal>,
    now: DateTime<Utc>,
) -> RoyaltySummary {
    let (total_sales, total_royalties) = periods
        .iter()
        .fold((Decimal::ZERO, Decimal::ZERO), |(sales, royalties), p| {
            (sales + p.net_sales, royalties + p.royalty_calculated)
        });
    let shortfall = (minimum_guarantee - total_royalties).max(Decimal::ZERO);
    let advance_remaining =
        calculate_advance_remaining(advance_payment, total_royalties, contract_year);
    debug!(
        %contract_id,
        contract_year,
        periods = periods.len(),
        %total_royalties,
        %shortfall,
        "ytd summary"
    );
    RoyaltySummary {
        contract_id: contract_id.clone(),
        contract_year,
        total_sales_ytd: total_sales,
        total_royalties_ytd: total_royalties,
        minimum_guarantee_ytd: minimum_guarantee,
        guarantee_period,
        shortfall,
        advance_remaining,
        period_count: periods.len(),
        calculated_at: now,
    }
}

/// Summarize a contract's periods using the contract's own terms.
pub fn summarize_contract(
    contract: &Contract,
    contract_year: u32,
    periods: &[SalesPeriod],
    now: DateTime<Utc>,
) -> RoyaltySummary {
    calculate_ytd_summary_at(
        &contract.id,
        contract_year,
        periods,
        contract.minimum_guarantee,
        contract.guarantee_period,
        contract.advance_payment,
        now,
    )
}
