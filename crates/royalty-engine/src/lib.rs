#![deny(warnings)]

//! Royalty calculation engine.
//!
//! Pure functions over contract terms and sales figures:
//! - Rate text parsing (percentages, tier thresholds)
//! - Flat, tiered (marginal) and category royalties
//! - Per-period minimum guarantee floors
//! - Advance recoupment and year-to-date summaries
//!
//! Nothing here holds state or performs I/O; contract and period data arrive
//! as arguments and results are returned to the caller to store.

pub mod advance;
pub mod calc;
pub mod calendar;
pub mod minimum;
pub mod period;
pub mod rate;
pub mod summary;

pub use advance::calculate_advance_remaining;
pub use calc::{calculate_royalty, match_category_rate, Bracket, CalcError};
pub use calendar::{contract_year_for, contract_year_window, periods_in_contract_year};
pub use minimum::{
    apply_minimum, apply_minimum_guarantee, calculate_royalty_with_minimum, period_floor,
    MinimumOutcome,
};
pub use period::{record_sales_period, reconcile_period, Reconciliation, ReconciliationStatus};
pub use rate::{
    parse_percentage, parse_threshold_lower_bound, parse_threshold_upper_bound, ParseError,
};
pub use summary::{calculate_ytd_summary, calculate_ytd_summary_at, summarize_contract};
