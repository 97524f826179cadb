#![deny(warnings)]

//! Headless CLI for calculating royalties from contract and sales files, and
//! for recording reports into the row store.

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use royalty_core::{validate_contract, CategoryBreakdown, Contract, ContractId, SalesReport};
use royalty_engine::{MinimumOutcome, Reconciliation};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: royalty [--config FILE] <command> [options]
commands:
  calc            --contract FILE --net-sales AMOUNT [--breakdown FILE]
  summary         --contract FILE --reports FILE [--year N]
  import-contract --contract FILE
  record          --contract-id ID --report FILE
  db-summary      --contract-id ID [--year N]";

#[derive(Debug, Default, PartialEq)]
struct Args {
    command: Option<String>,
    config: Option<PathBuf>,
    contract: Option<PathBuf>,
    contract_id: Option<String>,
    net_sales: Option<String>,
    breakdown: Option<PathBuf>,
    reports: Option<PathBuf>,
    report: Option<PathBuf>,
    year: Option<u32>,
}

fn parse_args_from<I: IntoIterator<Item = String>>(args: I) -> Result<Args> {
    let mut out = Args::default();
    let mut it = args.into_iter();
    while let Some(arg) = it.next() {
        let mut value = || it.next().ok_or_else(|| anyhow!("{arg} needs a value"));
        match arg.as_str() {
            "--config" => out.config = Some(value()?.into()),
            "--contract" => out.contract = Some(value()?.into()),
            "--contract-id" => out.contract_id = Some(value()?),
            "--net-sales" => out.net_sales = Some(value()?),
            "--breakdown" => out.breakdown = Some(value()?.into()),
            "--reports" => out.reports = Some(value()?.into()),
            "--report" => out.report = Some(value()?.into()),
            "--year" => {
                let v = value()?;
                out.year = Some(v.parse().with_context(|| format!("bad --year {v:?}"))?);
            }
            other if other.starts_with("--") => bail!("unknown option {other}\n{USAGE}"),
            _ if out.command.is_none() => out.command = Some(arg),
            other => bail!("unexpected argument {other}\n{USAGE}"),
        }
    }
    Ok(out)
}

/// Settings read from `--config` (YAML); every field is optional.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
struct CliConfig {
    database_url: String,
    log_filter: String,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            database_url: persistence::default_sqlite_url().to_string(),
            log_filter: "info".to_string(),
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<CliConfig> {
    let mut cfg = match path {
        Some(p) => read_input::<CliConfig>(p)?,
        None => CliConfig::default(),
    };
    if let Ok(url) = std::env::var("ROYALTY_DATABASE_URL") {
        cfg.database_url = url;
    }
    Ok(cfg)
}

/// Read a YAML or JSON file.
fn read_input<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_yaml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn read_contract(path: &Path) -> Result<Contract> {
    let contract: Contract = read_input(path)?;
    validate_contract(&contract).with_context(|| format!("contract in {}", path.display()))?;
    Ok(contract)
}

fn required<'a, T>(v: &'a Option<T>, flag: &str) -> Result<&'a T> {
    v.as_ref().ok_or_else(|| anyhow!("missing {flag}\n{USAGE}"))
}

#[derive(Debug, Serialize)]
struct CalcOutput {
    contract_id: ContractId,
    net_sales: Decimal,
    #[serde(flatten)]
    outcome: MinimumOutcome,
}

fn calc_output(
    contract: &Contract,
    net_sales: Decimal,
    breakdown: Option<&CategoryBreakdown>,
) -> Result<CalcOutput> {
    let outcome = royalty_engine::calculate_royalty_with_minimum(
        &contract.rate_structure,
        net_sales,
        contract.minimum_guarantee,
        contract.guarantee_period,
        breakdown,
    )?;
    Ok(CalcOutput {
        contract_id: contract.id.clone(),
        net_sales,
        outcome,
    })
}

#[derive(Debug, Serialize)]
struct PeriodLine {
    period_start: chrono::NaiveDate,
    period_end: chrono::NaiveDate,
    royalty_calculated: Decimal,
    minimum_applied: bool,
    reconciliation: Option<Reconciliation>,
}

#[derive(Debug, Serialize)]
struct SummaryOutput {
    summary: royalty_core::RoyaltySummary,
    periods: Vec<PeriodLine>,
}

/// Record every report against the contract in memory and summarize the year.
fn summarize_reports(
    contract: &Contract,
    reports: &[SalesReport],
    contract_year: u32,
    now: DateTime<Utc>,
) -> Result<SummaryOutput> {
    let recorded = reports
        .iter()
        .map(|r| royalty_engine::record_sales_period(contract, r))
        .collect::<Result<Vec<_>, _>>()?;
    let scoped = match contract.contract_start {
        Some(start) => royalty_engine::periods_in_contract_year(&recorded, start, contract_year),
        None => recorded,
    };
    let summary = royalty_engine::summarize_contract(contract, contract_year, &scoped, now);
    let periods = scoped
        .iter()
        .map(|p| PeriodLine {
            period_start: p.period_start,
            period_end: p.period_end,
            royalty_calculated: p.royalty_calculated,
            minimum_applied: p.minimum_applied,
            reconciliation: royalty_engine::reconcile_period(p),
        })
        .collect();
    Ok(SummaryOutput { summary, periods })
}

/// Contract year for `now`: the explicit one, else from the start date, else 1.
fn resolve_year(explicit: Option<u32>, contract: &Contract, now: DateTime<Utc>) -> u32 {
    explicit.unwrap_or_else(|| {
        contract
            .contract_start
            .map(|start| royalty_engine::contract_year_for(start, now.date_naive()))
            .unwrap_or(1)
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(args: Args, cfg: &CliConfig) -> Result<()> {
    let now = Utc::now();
    match args.command.as_deref() {
        Some("calc") => {
            let contract = read_contract(required(&args.contract, "--contract")?)?;
            let raw = required(&args.net_sales, "--net-sales")?;
            let net_sales = Decimal::from_str(raw.replace(',', "").trim())
                .with_context(|| format!("bad --net-sales {raw:?}"))?;
            let breakdown = args
                .breakdown
                .as_deref()
                .map(read_input::<CategoryBreakdown>)
                .transpose()?;
            print_json(&calc_output(&contract, net_sales, breakdown.as_ref())?)
        }
        Some("summary") => {
            let contract = read_contract(required(&args.contract, "--contract")?)?;
            let reports: Vec<SalesReport> = read_input(required(&args.reports, "--reports")?)?;
            let year = resolve_year(args.year, &contract, now);
            print_json(&summarize_reports(&contract, &reports, year, now)?)
        }
        Some("import-contract") => {
            let contract = read_contract(required(&args.contract, "--contract")?)?;
            let store = persistence::RoyaltyStore::connect(&cfg.database_url).await?;
            store.upsert_contract(&contract).await?;
            info!(contract_id = %contract.id, "contract imported");
            print_json(&contract)
        }
        Some("record") => {
            let id = ContractId(required(&args.contract_id, "--contract-id")?.clone());
            let report: SalesReport = read_input(required(&args.report, "--report")?)?;
            let store = persistence::RoyaltyStore::connect(&cfg.database_url).await?;
            let period = store.record_sales_report(&id, &report).await?;
            let reconciliation = royalty_engine::reconcile_period(&period);
            print_json(&serde_json::json!({
                "period": period,
                "reconciliation": reconciliation,
            }))
        }
        Some("db-summary") => {
            let id = ContractId(required(&args.contract_id, "--contract-id")?.clone());
            let store = persistence::RoyaltyStore::connect(&cfg.database_url).await?;
            let contract = store
                .get_contract(&id)
                .await?
                .ok_or_else(|| anyhow!("contract {id} not found"))?;
            let year = resolve_year(args.year, &contract, now);
            print_json(&store.contract_summary(&id, year, now).await?)
        }
        Some(other) => bail!("unknown command {other}\n{USAGE}"),
        None => bail!("{USAGE}"),
    }
}

/// Stderr log subscriber; `filter` alone decides which levels are emitted.
fn log_subscriber(filter: EnvFilter) -> impl tracing::Subscriber + Send + Sync {
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish()
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args_from(std::env::args().skip(1))?;
    let cfg = load_config(args.config.as_deref())?;

    // Logging setup
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.log_filter));
    tracing::subscriber::set_global_default(log_subscriber(filter))
        .context("installing log subscriber")?;

    info!(command = ?args.command, "starting CLI");
    run(args, &cfg).await
}
