//! Per-period minimum guarantee floors.

use crate::calc::{calculate_royalty, CalcError};
use royalty_core::{CategoryBreakdown, GuaranteePeriod, MinimumGuarantee, RateStructure};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Royalty for one period after the guarantee floor is enforced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinimumOutcome {
    pub royalty: Decimal,
    /// True when the floor replaced the calculated royalty.
    pub minimum_applied: bool,
}

/// Share of the annual guarantee owed for one measurement period.
pub fn period_floor(minimum_guarantee: Decimal, period: GuaranteePeriod) -> Decimal {
    minimum_guarantee / Decimal::from(period.periods_per_year())
}

/// Raise `royalty` to the period floor when it falls short.
///
/// A guarantee of zero or less means the contract has none. The annual
/// true-up is not done here; see the YTD summary's shortfall.
pub fn apply_minimum_guarantee(
    royalty: Decimal,
    minimum_guarantee: Decimal,
    period: GuaranteePeriod,
) -> MinimumOutcome {
    apply_minimum(
        royalty,
        &MinimumGuarantee {
            annual_amount: minimum_guarantee,
            period,
        },
    )
}

/// [`apply_minimum_guarantee`] for a contract's guarantee terms.
pub fn apply_minimum(royalty: Decimal, guarantee: &MinimumGuarantee) -> MinimumOutcome {
    if !guarantee.is_active() {
        return MinimumOutcome {
            royalty,
            minimum_applied: false,
        };
    }
    let period = guarantee.period;
    let floor = period_floor(guarantee.annual_amount, period);
    if royalty < floor {
        info!(%royalty, %floor, %period, "minimum guarantee applied");
        MinimumOutcome {
            royalty: floor,
            minimum_applied: true,
        }
    } else {
        MinimumOutcome {
            royalty,
            minimum_applied: false,
        }
    }
}

/// Calculate a period royalty and enforce the minimum guarantee on it.
pub fn calculate_royalty_with_minimum(
    rate_structure: &RateStructure,
    net_sales: Decimal,
    minimum_guarantee: Decimal,
    period: GuaranteePeriod,
    breakdown: Option<&CategoryBreakdown>,
) -> Result<MinimumOutcome, CalcError> {
    let royalty = calculate_royalty(rate_structure, net_sales, breakdown)?;
    Ok(apply_minimum_guarantee(royalty, minimum_guarantee, period))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn quarterly_floor_applies() {
        let out = apply_minimum_guarantee(dec!(9000), dec!(40000), GuaranteePeriod::Quarterly);
        assert_eq!(
            out,
            MinimumOutcome {
                royalty: dec!(10000),
                minimum_applied: true
            }
        );
    }

    #[test]
    fn royalty_at_or_above_floor_is_kept() {
        let out = apply_minimum_guarantee(dec!(10000), dec!(40000), GuaranteePeriod::Quarterly);
        assert!(!out.minimum_applied);
        assert_eq!(out.royalty, dec!(10000));
        let out = apply_minimum_guarantee(dec!(12500.5), dec!(120000), GuaranteePeriod::Monthly);
        assert!(!out.minimum_applied);
        assert_eq!(out.royalty, dec!(12500.5));
    }

    #[test]
    fn negative_guarantee_means_none() {
        let out = apply_minimum_guarantee(dec!(100), dec!(-40000), GuaranteePeriod::Quarterly);
        assert_eq!(
            out,
            MinimumOutcome {
                royalty: dec!(100),
                minimum_applied: false
            }
        );
        let terms = MinimumGuarantee {
            annual_amount: dec!(-1),
            period: GuaranteePeriod::Monthly,
        };
        assert!(!terms.is_active());
        assert!(!apply_minimum(Decimal::ZERO, &terms).minimum_applied);
    }

    #[test]
    fn outcome_serializes_money_as_strings() {
        let out = MinimumOutcome {
            royalty: dec!(10000.50),
            minimum_applied: true,
        };
        let json = serde_json::to_string(&out).unwrap();
        assert_eq!(json, r#"{"royalty":"10000.50","minimum_applied":true}"#);
        let back: MinimumOutcome = serde_json::from_str(&json).unwrap();
        assert_eq!(back, out);
    }

    #[test]
    fn floors_per_period() {
        assert_eq!(period_floor(dec!(120000), GuaranteePeriod::Monthly), dec!(10000));
        assert_eq!(period_floor(dec!(120000), GuaranteePeriod::Quarterly), dec!(30000));
        assert_eq!(period_floor(dec!(120000), GuaranteePeriod::SemiAnnually), dec!(60000));
        assert_eq!(period_floor(dec!(120000), GuaranteePeriod::Annually), dec!(120000));
        assert_eq!(
            period_floor(dec!(120000), GuaranteePeriod::parse_lossy("weekly")),
            dec!(120000)
        );
    }

    #[test]
    fn with_minimum_chains_calculation() {
        let rs = RateStructure::Flat("5%".into());
        let out = calculate_royalty_with_minimum(
            &rs,
            dec!(100000),
            dec!(40000),
            GuaranteePeriod::Quarterly,
            None,
        )
        .unwrap();
        assert_eq!(out.royalty, dec!(10000));
        assert!(out.minimum_applied);

        let bad = RateStructure::Flat("five percent".into());
        assert!(calculate_royalty_with_minimum(
            &bad,
            dec!(1),
            dec!(40000),
            GuaranteePeriod::Quarterly,
            None
        )
        .is_err());
    }

    proptest! {
        #[test]
        fn zero_guarantee_never_applies(cents in 0i64..10_000_000_000, p in 0usize..4) {
            let periods = [
                GuaranteePeriod::Monthly,
                GuaranteePeriod::Quarterly,
                GuaranteePeriod::SemiAnnually,
                GuaranteePeriod::Annually,
            ];
            let royalty = Decimal::new(cents, 2);
            let out = apply_minimum_guarantee(royalty, Decimal::ZERO, periods[p]);
            prop_assert!(!out.minimum_applied);
            prop_assert_eq!(out.royalty, royalty);
        }

        #[test]
        fn result_never_below_floor(cents in 0i64..10_000_000_000, min in 1i64..1_000_000_000) {
            let minimum = Decimal::new(min, 2);
            let out = apply_minimum_guarantee(Decimal::new(cents, 2), minimum, GuaranteePeriod::Monthly);
            prop_assert!(out.royalty >= period_floor(minimum, GuaranteePeriod::Monthly));
        }
    }
}
