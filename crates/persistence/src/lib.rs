#![deny(warnings)]

//! Persistence layer: SQLite row store for contracts and sales periods.
//!
//! Money is stored as TEXT decimal strings, rate structures and category
//! breakdowns as JSON TEXT. A sales period's royalty is computed once, when
//! the report is recorded, and read back verbatim afterwards.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use royalty_core::{
    validate_contract, validate_sales_period, CategoryBreakdown, Contract, ContractId, GuaranteePeriod, RateStructure,
    RoyaltySummary, SalesPeriod, SalesReport,
};
use rust_decimal::Decimal;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use sqlx::Row;
use std::str::FromStr;
use tracing::{debug, info};

/// Returns the default SQLite URL used for local data.
pub fn default_sqlite_url() -> &'static str {
    "sqlite://./data/royalties.db"
}

/// Open (creating if missing) the database at `url` and apply migrations.
pub async fn init_db(url: &str) -> Result<SqlitePool> {
    let opts = SqliteConnectOptions::from_str(url)
        .with_context(|| format!("invalid sqlite url {url}"))?
        .create_if_missing(true)
        .foreign_keys(true);
    // every connection to an in-memory database is a separate database
    let max = if url.contains(":memory:") { 1 } else { 5 };
    let pool = SqlitePoolOptions::new()
        .max_connections(max)
        .connect_with(opts)
        .await
        .with_context(|| format!("connecting to {url}"))?;
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("running migrations")?;
    info!(url, "database ready");
    Ok(pool)
}

/// Contracts and sales periods backed by a SQLite pool.
#[derive(Clone, Debug)]
pub struct RoyaltyStore {
    pool: SqlitePool,
}

impl RoyaltyStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str) -> Result<Self> {
        Ok(Self::new(init_db(url).await?))
    }

    /// Insert a contract, replacing the terms of an existing one with the same id.
    pub async fn upsert_contract(&self, contract: &Contract) -> Result<()> {
        validate_contract(contract)
            .with_context(|| format!("contract {} is invalid", contract.id))?;
        let rate_json = serde_json::to_string(&contract.rate_structure)?;
        sqlx::query(
            "INSERT INTO contracts \
             (id, licensee, rate_structure, minimum_guarantee, guarantee_period, advance_payment, contract_start) \
             VALUES (?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET \
             licensee = excluded.licensee, rate_structure = excluded.rate_structure, \
             minimum_guarantee = excluded.minimum_guarantee, guarantee_period = excluded.guarantee_period, \
             advance_payment = excluded.advance_payment, contract_start = excluded.contract_start",
        )
        .bind(contract.id.0.as_str())
        .bind(contract.licensee.as_str())
        .bind(rate_json)
        .bind(contract.minimum_guarantee.to_string())
        .bind(contract.guarantee_period.as_str())
        .bind(contract.advance_payment.map(|d| d.to_string()))
        .bind(contract.contract_start.map(|d| d.to_string()))
        .execute(&self.pool)
        .await
        .with_context(|| format!("storing contract {}", contract.id))?;
        debug!(contract_id = %contract.id, "contract stored");
        Ok(())
    }

    pub async fn get_contract(&self, id: &ContractId) -> Result<Option<Contract>> {
        let mut conn = self.pool.acquire().await?;
        fetch_contract(&mut conn, id).await
    }

    /// Store an already-calculated period and return its row id.
    ///
    /// Rows that fail period validation are rejected before touching the table.
    pub async fn insert_sales_period(&self, period: &SalesPeriod) -> Result<i64> {
        let mut conn = self.pool.acquire().await?;
        insert_period(&mut conn, period).await
    }

    /// All periods of a contract, oldest first.
    pub async fn list_sales_periods(&self, id: &ContractId) -> Result<Vec<SalesPeriod>> {
        let rows = sqlx::query(
            "SELECT id, contract_id, period_start, period_end, net_sales, category_breakdown, \
             licensee_reported_royalty, royalty_calculated, minimum_applied \
             FROM sales_periods WHERE contract_id = ? ORDER BY period_start, id",
        )
        .bind(id.0.as_str())
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("listing periods of {id}"))?;
        rows.iter().map(period_from_row).collect()
    }

    /// Delete one period. Returns false when no such row exists.
    pub async fn delete_sales_period(&self, period_id: i64) -> Result<bool> {
        let res = sqlx::query("DELETE FROM sales_periods WHERE id = ?")
            .bind(period_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    /// Calculate a licensee report against its contract and store the result.
    pub async fn record_sales_report(
        &self,
        contract_id: &ContractId,
        report: &SalesReport,
    ) -> Result<SalesPeriod> {
        let mut tx = self.pool.begin().await?;
        let contract = fetch_contract(&mut tx, contract_id)
            .await?
            .ok_or_else(|| anyhow!("contract {contract_id} not found"))?;
        let mut period = royalty_engine::record_sales_period(&contract, report)
            .with_context(|| format!("calculating royalty for {contract_id}"))?;
        period.id = Some(insert_period(&mut tx, &period).await?);
        tx.commit().await?;
        Ok(period)
    }

    /// Year-to-date summary of a contract.
    ///
    /// Periods are scoped to `contract_year` when the contract start is known;
    /// otherwise every stored period is aggregated.
    pub async fn contract_summary(
        &self,
        contract_id: &ContractId,
        contract_year: u32,
        now: DateTime<Utc>,
    ) -> Result<RoyaltySummary> {
        let contract = self
            .get_contract(contract_id)
            .await?
            .ok_or_else(|| anyhow!("contract {contract_id} not found"))?;
        let periods = self.list_sales_periods(contract_id).await?;
        let periods = match contract.contract_start {
            Some(start) => {
                royalty_engine::periods_in_contract_year(&periods, start, contract_year)
            }
            None => periods,
        };
        Ok(royalty_engine::summarize_contract(
            &contract,
            contract_year,
            &periods,
            now,
        ))
    }
}

async fn fetch_contract(conn: &mut SqliteConnection, id: &ContractId) -> Result<Option<Contract>> {
    let row = sqlx::query(
        "SELECT id, licensee, rate_structure, minimum_guarantee, guarantee_period, \
         advance_payment, contract_start FROM contracts WHERE id = ?",
    )
    .bind(id.0.as_str())
    .fetch_optional(conn)
    .await
    .with_context(|| format!("loading contract {id}"))?;
    row.as_ref().map(contract_from_row).transpose()
}

async fn insert_period(conn: &mut SqliteConnection, p: &SalesPeriod) -> Result<i64> {
    validate_sales_period(p)
        .with_context(|| format!("period for {} is invalid", p.contract_id))?;
    let breakdown = p
        .category_breakdown
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    let res = sqlx::query(
        "INSERT INTO sales_periods \
         (contract_id, period_start, period_end, net_sales, category_breakdown, \
          licensee_reported_royalty, royalty_calculated, minimum_applied, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(p.contract_id.0.as_str())
    .bind(p.period_start.to_string())
    .bind(p.period_end.to_string())
    .bind(p.net_sales.to_string())
    .bind(breakdown)
    .bind(p.licensee_reported_royalty.map(|d| d.to_string()))
    .bind(p.royalty_calculated.to_string())
    .bind(p.minimum_applied as i64)
    .bind(Utc::now().to_rfc3339())
    .execute(conn)
    .await
    .with_context(|| format!("storing period for {}", p.contract_id))?;
    Ok(res.last_insert_rowid())
}

fn contract_from_row(row: &SqliteRow) -> Result<Contract> {
    let rate_json: String = row.try_get("rate_structure")?;
    let rate_structure: RateStructure =
        serde_json::from_str(&rate_json).context("stored rate structure")?;
    let period: String = row.try_get("guarantee_period")?;
    Ok(Contract {
        id: ContractId(row.try_get("id")?),
        licensee: row.try_get("licensee")?,
        rate_structure,
        minimum_guarantee: decimal(row, "minimum_guarantee")?,
        guarantee_period: GuaranteePeriod::parse_lossy(&period),
        advance_payment: opt_decimal(row, "advance_payment")?,
        contract_start: opt_date(row, "contract_start")?,
    })
}

fn period_from_row(row: &SqliteRow) -> Result<SalesPeriod> {
    let breakdown: Option<String> = row.try_get("category_breakdown")?;
    let category_breakdown = breakdown
        .map(|s| serde_json::from_str::<CategoryBreakdown>(&s))
        .transpose()
        .context("stored category breakdown")?;
    let applied: i64 = row.try_get("minimum_applied")?;
    Ok(SalesPeriod {
        id: Some(row.try_get("id")?),
        contract_id: ContractId(row.try_get("contract_id")?),
        period_start: date(row, "period_start")?,
        period_end: date(row, "period_end")?,
        net_sales: decimal(row, "net_sales")?,
        category_breakdown,
        licensee_reported_royalty: opt_decimal(row, "licensee_reported_royalty")?,
        royalty_calculated: decimal(row, "royalty_calculated")?,
        minimum_applied: applied != 0,
    })
}

fn decimal(row: &SqliteRow, col: &str) -> Result<Decimal> {
    let s: String = row.try_get(col)?;
    Decimal::from_str(&s).with_context(|| format!("column {col}: bad decimal {s:?}"))
}

fn opt_decimal(row: &SqliteRow, col: &str) -> Result<Option<Decimal>> {
    let s: Option<String> = row.try_get(col)?;
    s.map(|s| Decimal::from_str(&s).with_context(|| format!("column {col}: bad decimal {s:?}")))
        .transpose()
}

fn date(row: &SqliteRow, col: &str) -> Result<NaiveDate> {
    let s: String = row.try_get(col)?;
    NaiveDate::from_str(&s).with_context(|| format!("column {col}: bad date {s:?}"))
}

fn opt_date(row: &SqliteRow, col: &str) -> Result<Option<NaiveDate>> {
    let s: Option<String> = row.try_get(col)?;
    s.map(|s| NaiveDate::from_str(&s).with_context(|| format!("column {col}: bad date {s:?}")))
        .transpose()
}
