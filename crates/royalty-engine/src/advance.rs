//! Advance-payment recoupment.

use rust_decimal::Decimal;

/// Advance credit left after recouping year-to-date royalties.
///
/// Advances are recouped only in contract year 1; any other year, or a
/// missing or non-positive advance, leaves nothing to recoup.
pub fn calculate_advance_remaining(
    advance_payment: Option<Decimal>,
    total_royalties_ytd: Decimal,
    contract_year: u32,
) -> Decimal {
    match advance_payment {
        Some(advance) if advance > Decimal::ZERO && contract_year == 1 => {
            (advance - total_royalties_ytd).max(Decimal::ZERO)
        }
        _ => Decimal::ZERO,
    }
}
