//! Recording sales reports as periods, and reconciling reported royalties.

use crate::calc::{calculate_royalty, CalcError};
use crate::minimum::apply_minimum;
use royalty_core::{validate_sales_report, Contract, SalesPeriod, SalesReport};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Turn a licensee's report into a sales period with its royalty computed.
///
/// This is the only place a period's royalty is calculated; the returned row
/// is stored as-is and never recomputed.
pub fn record_sales_period(
    contract: &Contract,
    report: &SalesReport,
) -> Result<SalesPeriod, CalcError> {
    validate_sales_report(report)?;
    let royalty = calculate_royalty(
        &contract.rate_structure,
        report.net_sales,
        report.category_breakdown.as_ref(),
    )?;
    let outcome = apply_minimum(royalty, &contract.minimum());
    info!(
        contract_id = %contract.id,
        rate = contract.rate_structure.kind(),
        net_sales = %report.net_sales,
        royalty = %outcome.royalty,
        minimum_applied = outcome.minimum_applied,
        "sales period recorded"
    );
    Ok(SalesPeriod {
        id: None,
        contract_id: contract.id.clone(),
        period_start: report.period_start,
        period_end: report.period_end,
        net_sales: report.net_sales,
        category_breakdown: report.category_breakdown.clone(),
        licensee_reported_royalty: report.licensee_reported_royalty,
        royalty_calculated: outcome.royalty,
        minimum_applied: outcome.minimum_applied,
    })
}

/// How a licensee's reported royalty compares with the calculated one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationStatus {
    /// Within a cent.
    Match,
    /// Licensee reported less than is owed.
    Underpaid,
    /// Licensee reported more than is owed.
    Overpaid,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub reported: Decimal,
    pub calculated: Decimal,
    /// `calculated - reported`; positive when the licensee owes more.
    pub difference: Decimal,
    pub status: ReconciliationStatus,
}

/// Compare the reported royalty of a period with the calculated one.
pub fn reconcile_period(period: &SalesPeriod) -> Option<Reconciliation> {
    let reported = period.licensee_reported_royalty?;
    let calculated = period.royalty_calculated;
    let difference = calculated - reported;
    let cent = Decimal::new(1, 2);
    let status = if difference.abs() < cent {
        ReconciliationStatus::Match
    } else if difference > Decimal::ZERO {
        ReconciliationStatus::Underpaid
    } else {
        ReconciliationStatus::Overpaid
    };
    Some(Reconciliation {
        reported,
        calculated,
        difference,
        status,
    })
}
