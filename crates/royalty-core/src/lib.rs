#![deny(warnings)]

//! Core domain models and invariants for the royalty engine.
//!
//! This crate defines the serializable contract, sales-period and summary
//! types shared by the calculation engine, the row store and the CLI, with
//! validation helpers that reject malformed input at the boundary.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Unique identifier for a licensing contract.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContractId(pub String);

impl fmt::Display for ContractId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Sales per product category, keyed by the licensee's category name.
pub type CategoryBreakdown = BTreeMap<String, Decimal>;

/// One bracket of a tiered rate schedule.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tier {
    /// Bracket bounds in currency notation, e.g. "$0-$2,000,000" or "$5,000,000+".
    pub threshold: String,
    /// Marginal rate for the bracket, e.g. "7%".
    pub rate: String,
}

/// How a contract prices net sales.
///
/// Stored contracts carry the rate as an untyped value: a percentage string,
/// a list of tiers, or a mapping of category name to percentage string. Each
/// shape maps to one variant; anything else fails to deserialize.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RateStructure {
    /// A single percentage applied to all net sales, e.g. "8% of Net Sales".
    Flat(String),
    /// Marginal brackets, processed in ascending threshold order.
    Tiered(Vec<Tier>),
    /// Per-category percentages keyed by category name.
    Category(BTreeMap<String, String>),
}

impl RateStructure {
    /// Short name of the variant, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            RateStructure::Flat(_) => "flat",
            RateStructure::Tiered(_) => "tiered",
            RateStructure::Category(_) => "category",
        }
    }
}

/// Measurement period for a minimum guarantee.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum GuaranteePeriod {
    Monthly,
    Quarterly,
    SemiAnnually,
    /// Also the reading of any unrecognized period name.
    #[default]
    Annually,
}

impl GuaranteePeriod {
    /// Number of measurement periods in a contract year.
    pub fn periods_per_year(self) -> u32 {
        match self {
            GuaranteePeriod::Monthly => 12,
            GuaranteePeriod::Quarterly => 4,
            GuaranteePeriod::SemiAnnually => 2,
            GuaranteePeriod::Annually => 1,
        }
    }

    /// Canonical wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            GuaranteePeriod::Monthly => "monthly",
            GuaranteePeriod::Quarterly => "quarterly",
            GuaranteePeriod::SemiAnnually => "semi_annually",
            GuaranteePeriod::Annually => "annually",
        }
    }

    /// Reads a period name; unknown names fall back to annually.
    pub fn parse_lossy(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "monthly" => GuaranteePeriod::Monthly,
            "quarterly" => GuaranteePeriod::Quarterly,
            "semi_annually" => GuaranteePeriod::SemiAnnually,
            _ => GuaranteePeriod::Annually,
        }
    }
}

impl From<String> for GuaranteePeriod {
    fn from(s: String) -> Self {
        GuaranteePeriod::parse_lossy(&s)
    }
}

impl From<GuaranteePeriod> for String {
    fn from(p: GuaranteePeriod) -> Self {
        p.as_str().to_string()
    }
}

impl fmt::Display for GuaranteePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Annual minimum guarantee with its measurement granularity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinimumGuarantee {
    /// Annual floor in currency units; zero means no guarantee.
    pub annual_amount: Decimal,
    pub period: GuaranteePeriod,
}

impl MinimumGuarantee {
    /// True when the contract carries a positive guarantee.
    pub fn is_active(&self) -> bool {
        self.annual_amount > Decimal::ZERO
    }
}

/// A licensing contract as supplied by the row store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub id: ContractId,
    /// Licensee display name.
    #[serde(default)]
    pub licensee: String,
    pub rate_structure: RateStructure,
    /// Annual minimum guarantee amount (>= 0).
    #[serde(default)]
    pub minimum_guarantee: Decimal,
    #[serde(default)]
    pub guarantee_period: GuaranteePeriod,
    /// Upfront payment recoupable against year-1 royalties.
    #[serde(default)]
    pub advance_payment: Option<Decimal>,
    /// First day of contract year 1, when known.
    #[serde(default)]
    pub contract_start: Option<NaiveDate>,
}

impl Contract {
    pub fn minimum(&self) -> MinimumGuarantee {
        MinimumGuarantee {
            annual_amount: self.minimum_guarantee,
            period: self.guarantee_period,
        }
    }
}

/// A licensee's sales report for one period, before any calculation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SalesReport {
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    /// Royalty base for the period (>= 0).
    pub net_sales: Decimal,
    #[serde(default)]
    pub category_breakdown: Option<CategoryBreakdown>,
    /// Royalty the licensee says it owes, if reported.
    #[serde(default)]
    pub licensee_reported_royalty: Option<Decimal>,
}

/// A recorded sales period with its royalty computed at insertion time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SalesPeriod {
    /// Row id assigned by the store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub contract_id: ContractId,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub net_sales: Decimal,
    #[serde(default)]
    pub category_breakdown: Option<CategoryBreakdown>,
    #[serde(default)]
    pub licensee_reported_royalty: Option<Decimal>,
    pub royalty_calculated: Decimal,
    #[serde(default)]
    pub minimum_applied: bool,
}

/// Year-to-date royalty position of a contract. Always derived, never stored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoyaltySummary {
    pub contract_id: ContractId,
    /// 1-based contract year.
    pub contract_year: u32,
    pub total_sales_ytd: Decimal,
    pub total_royalties_ytd: Decimal,
    /// Full annual guarantee the year is measured against.
    pub minimum_guarantee_ytd: Decimal,
    /// Guarantee granularity, for display.
    pub guarantee_period: GuaranteePeriod,
    /// Amount still owed to reach the annual guarantee (>= 0).
    pub shortfall: Decimal,
    /// Unrecouped advance credit (>= 0, zero outside year 1).
    pub advance_remaining: Decimal,
    /// Number of sales periods aggregated.
    pub period_count: usize,
    pub calculated_at: DateTime<Utc>,
}

/// Validation errors for domain invariants.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// Monetary amount below zero.
    #[error("{0} must not be negative")]
    NegativeMoney(&'static str),
    /// Category breakdown entry below zero.
    #[error("sales for category {0:?} must not be negative")]
    NegativeCategorySales(String),
    /// Period ends before it starts.
    #[error("period end {end} is before period start {start}")]
    InvalidPeriodRange { start: NaiveDate, end: NaiveDate },
    /// Tiered rate structure without tiers.
    #[error("tiered rate structure has no tiers")]
    EmptyTiers,
    /// Category rate structure without categories.
    #[error("category rate structure has no categories")]
    EmptyCategoryRates,
    /// Category name that is empty after trimming.
    #[error("category names must not be blank")]
    BlankCategory,
    /// Contract without an identifier.
    #[error("contract id must not be blank")]
    BlankContractId,
}

/// Validate the shape of a rate structure. Rate text is checked by the parser.
pub fn validate_rate_structure(rs: &RateStructure) -> Result<(), ValidationError> {
    match rs {
        RateStructure::Flat(_) => Ok(()),
        RateStructure::Tiered(tiers) => {
            if tiers.is_empty() {
                return Err(ValidationError::EmptyTiers);
            }
            Ok(())
        }
        RateStructure::Category(rates) => {
            if rates.is_empty() {
                return Err(ValidationError::EmptyCategoryRates);
            }
            if rates.keys().any(|k| k.trim().is_empty()) {
                return Err(ValidationError::BlankCategory);
            }
            Ok(())
        }
    }
}

/// Validate a contract record.
pub fn validate_contract(c: &Contract) -> Result<(), ValidationError> {
    if c.id.0.trim().is_empty() {
        return Err(ValidationError::BlankContractId);
    }
    validate_rate_structure(&c.rate_structure)?;
    if c.minimum_guarantee < Decimal::ZERO {
        return Err(ValidationError::NegativeMoney("minimum guarantee"));
    }
    if matches!(c.advance_payment, Some(a) if a < Decimal::ZERO) {
        return Err(ValidationError::NegativeMoney("advance payment"));
    }
    Ok(())
}

/// Validate a category breakdown.
pub fn validate_breakdown(b: &CategoryBreakdown) -> Result<(), ValidationError> {
    for (name, sales) in b {
        if name.trim().is_empty() {
            return Err(ValidationError::BlankCategory);
        }
        if *sales < Decimal::ZERO {
            return Err(ValidationError::NegativeCategorySales(name.clone()));
        }
    }
    Ok(())
}

fn validate_period_fields(
    start: NaiveDate,
    end: NaiveDate,
    net_sales: Decimal,
    breakdown: Option<&CategoryBreakdown>,
    reported: Option<Decimal>,
) -> Result<(), ValidationError> {
    if end < start {
        return Err(ValidationError::InvalidPeriodRange { start, end });
    }
    if net_sales < Decimal::ZERO {
        return Err(ValidationError::NegativeMoney("net sales"));
    }
    if let Some(b) = breakdown {
        validate_breakdown(b)?;
    }
    if matches!(reported, Some(r) if r < Decimal::ZERO) {
        return Err(ValidationError::NegativeMoney("reported royalty"));
    }
    Ok(())
}

/// Validate a sales report before a royalty is computed for it.
pub fn validate_sales_report(r: &SalesReport) -> Result<(), ValidationError> {
    validate_period_fields(
        r.period_start,
        r.period_end,
        r.net_sales,
        r.category_breakdown.as_ref(),
        r.licensee_reported_royalty,
    )
}

/// Validate a recorded sales period, including its computed royalty.
pub fn validate_sales_period(p: &SalesPeriod) -> Result<(), ValidationError> {
    validate_period_fields(
        p.period_start,
        p.period_end,
        p.net_sales,
        p.category_breakdown.as_ref(),
        p.licensee_reported_royalty,
    )?;
    if p.royalty_calculated < Decimal::ZERO {
        return Err(ValidationError::NegativeMoney("calculated royalty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn contract(rs: RateStructure) -> Contract {
        Contract {
            id: ContractId("c-1".to_string()),
            licensee: "Acme Apparel".to_string(),
            rate_structure: rs,
            minimum_guarantee: dec!(40000),
            guarantee_period: GuaranteePeriod::Quarterly,
            advance_payment: Some(dec!(15000)),
            contract_start: Some(date(2024, 1, 1)),
        }
    }

    fn report(net: Decimal) -> SalesReport {
        SalesReport {
            period_start: date(2024, 1, 1),
            period_end: date(2024, 3, 31),
            net_sales: net,
            category_breakdown: None,
            licensee_reported_royalty: None,
        }
    }

    #[test]
    fn rate_structure_reads_each_stored_shape() {
        let flat: RateStructure = serde_json::from_str(r#""8% of Net Sales""#).unwrap();
        assert_eq!(flat, RateStructure::Flat("8% of Net Sales".to_string()));

        let tiered: RateStructure = serde_json::from_str(
            r#"[{"threshold":"$0-$1,000,000","rate":"5%"},{"threshold":"$1,000,000+","rate":"7%"}]"#,
        )
        .unwrap();
        match tiered {
            RateStructure::Tiered(t) => {
                assert_eq!(t.len(), 2);
                assert_eq!(t[1].threshold, "$1,000,000+");
            }
            other => panic!("expected tiered, got {other:?}"),
        }

        let cat: RateStructure =
            serde_json::from_str(r#"{"apparel":"10%","accessories":"8%"}"#).unwrap();
        assert_eq!(cat.kind(), "category");
    }

    #[test]
    fn rate_structure_rejects_unknown_shapes() {
        assert!(serde_json::from_str::<RateStructure>("0.08").is_err());
        assert!(serde_json::from_str::<RateStructure>("true").is_err());
        assert!(serde_json::from_str::<RateStructure>(r#"[{"rate":"5%"}]"#).is_err());
        assert!(serde_json::from_str::<RateStructure>(r#"{"apparel":10}"#).is_err());
    }

    #[test]
    fn guarantee_period_names() {
        assert_eq!(GuaranteePeriod::parse_lossy("Quarterly"), GuaranteePeriod::Quarterly);
        assert_eq!(
            GuaranteePeriod::parse_lossy("semi_annually").periods_per_year(),
            2
        );
        assert_eq!(GuaranteePeriod::parse_lossy("fortnightly"), GuaranteePeriod::Annually);
        let p: GuaranteePeriod = serde_json::from_str(r#""monthly""#).unwrap();
        assert_eq!(p.periods_per_year(), 12);
        assert_eq!(serde_json::to_string(&p).unwrap(), r#""monthly""#);
    }

    #[test]
    fn contract_defaults_for_missing_terms() {
        let c: Contract = serde_json::from_str(r#"{"id":"c-9","rate_structure":"6%"}"#).unwrap();
        assert_eq!(c.minimum_guarantee, Decimal::ZERO);
        assert_eq!(c.guarantee_period, GuaranteePeriod::Annually);
        assert_eq!(c.advance_payment, None);
        assert!(!c.minimum().is_active());
        validate_contract(&c).unwrap();
    }

    #[test]
    fn money_crosses_as_decimal_strings() {
        let c = contract(RateStructure::Flat("5%".to_string()));
        let s = serde_json::to_string(&c).unwrap();
        assert!(s.contains(r#""minimum_guarantee":"40000""#), "{s}");
        let back: Contract = serde_json::from_str(&s).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn contract_validation() {
        validate_contract(&contract(RateStructure::Flat("5%".into()))).unwrap();
        assert_eq!(
            validate_contract(&contract(RateStructure::Tiered(vec![]))),
            Err(ValidationError::EmptyTiers)
        );
        assert_eq!(
            validate_contract(&contract(RateStructure::Category(BTreeMap::new()))),
            Err(ValidationError::EmptyCategoryRates)
        );
        let mut blank = BTreeMap::new();
        blank.insert("  ".to_string(), "5%".to_string());
        assert_eq!(
            validate_contract(&contract(RateStructure::Category(blank))),
            Err(ValidationError::BlankCategory)
        );
        let mut c = contract(RateStructure::Flat("5%".into()));
        c.advance_payment = Some(dec!(-1));
        assert_eq!(
            validate_contract(&c),
            Err(ValidationError::NegativeMoney("advance payment"))
        );
        c.advance_payment = None;
        c.id = ContractId(" ".into());
        assert_eq!(validate_contract(&c), Err(ValidationError::BlankContractId));
    }

    #[test]
    fn report_validation() {
        validate_sales_report(&report(dec!(0))).unwrap();
        assert!(validate_sales_report(&report(dec!(-0.01))).is_err());

        let mut r = report(dec!(100));
        r.period_end = date(2023, 12, 31);
        assert!(matches!(
            validate_sales_report(&r),
            Err(ValidationError::InvalidPeriodRange { .. })
        ));

        let mut r = report(dec!(100));
        let mut b = CategoryBreakdown::new();
        b.insert("Apparel".into(), dec!(-5));
        r.category_breakdown = Some(b);
        assert_eq!(
            validate_sales_report(&r),
            Err(ValidationError::NegativeCategorySales("Apparel".into()))
        );
    }

    #[test]
    fn sales_period_roundtrip_keeps_exact_amounts() {
        let p = SalesPeriod {
            id: None,
            contract_id: ContractId("c-1".into()),
            period_start: date(2024, 1, 1),
            period_end: date(2024, 3, 31),
            net_sales: dec!(1234567.89),
            category_breakdown: None,
            licensee_reported_royalty: Some(dec!(61728.39)),
            royalty_calculated: dec!(61728.3945),
            minimum_applied: false,
        };
        validate_sales_period(&p).unwrap();
        let s = serde_json::to_string(&p).unwrap();
        assert!(!s.contains("\"id\""));
        let back: SalesPeriod = serde_json::from_str(&s).unwrap();
        assert_eq!(back.royalty_calculated, dec!(61728.3945));
    }

    proptest! {
        #[test]
        fn non_negative_sales_always_validate(cents in 0i64..10_000_000_000) {
            let r = report(Decimal::new(cents, 2));
            prop_assert!(validate_sales_report(&r).is_ok());
        }

        #[test]
        fn negative_sales_never_validate(cents in 1i64..10_000_000_000) {
            let r = report(Decimal::new(-cents, 2));
            prop_assert!(validate_sales_report(&r).is_err());
        }
    }
}
