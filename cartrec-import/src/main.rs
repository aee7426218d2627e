//! cartrec-import - tenant import runner
//!
//! Runs one import job for one tenant against its storefront database and
//! prints the terminal summary as JSON. Progress snapshots are written to
//! the `import_jobs` table while the job runs, so another process can poll
//! them by job id.

use anyhow::{bail, Result};
use chrono::{NaiveDate, TimeZone, Utc};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use cartrec_import::config::AppConfig;
use cartrec_import::import::progress::{DbProgressSink, ProgressReporter};
use cartrec_import::import::{run_commerce_import, run_leads_import, ImportType, LeadsPeriod};
use cartrec_import::recovery::RecoveryPolicy;
use cartrec_import::source::{mysql::MySqlSource, DateRange};
use cartrec_import::{db, Error};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ImportKind {
    All,
    Carts,
    Orders,
    Leads,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PeriodArg {
    Yesterday,
    #[value(name = "7days")]
    SevenDays,
    #[value(name = "30days")]
    ThirtyDays,
    CurrentMonth,
}

impl From<PeriodArg> for LeadsPeriod {
    fn from(arg: PeriodArg) -> Self {
        match arg {
            PeriodArg::Yesterday => LeadsPeriod::Yesterday,
            PeriodArg::SevenDays => LeadsPeriod::SevenDays,
            PeriodArg::ThirtyDays => LeadsPeriod::ThirtyDays,
            PeriodArg::CurrentMonth => LeadsPeriod::CurrentMonth,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "cartrec-import", version, about = "Storefront import runner")]
struct Cli {
    /// Tenant slug to import
    #[arg(long)]
    tenant: String,

    /// What to import
    #[arg(long, value_enum, default_value_t = ImportKind::All)]
    import_type: ImportKind,

    /// First day of the import range (defaults to 30 days ago)
    #[arg(long)]
    start_date: Option<NaiveDate>,

    /// Last day of the import range (defaults to today)
    #[arg(long)]
    end_date: Option<NaiveDate>,

    /// Named period for lead imports, instead of explicit dates
    #[arg(long, value_enum, conflicts_with_all = ["start_date", "end_date"])]
    leads_period: Option<PeriodArg>,

    /// Path to the TOML config file
    #[arg(long, env = "CARTREC_CONFIG")]
    config: Option<PathBuf>,
}

impl Cli {
    fn validate(&self) -> Result<()> {
        if self.leads_period.is_some() && self.import_type != ImportKind::Leads {
            bail!("--leads-period only applies to --import-type leads");
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    cli.validate()?;
    let config = AppConfig::load(cli.config.as_deref())?;

    info!("Starting cartrec-import {}", env!("CARGO_PKG_VERSION"));
    info!("Database: {}", config.database_path.display());

    let pool = db::init_database_pool(&config.database_path).await?;

    let Some(tenant) = db::tenants::load_tenant_by_slug(&pool, &cli.tenant).await? else {
        bail!("Tenant '{}' not found", cli.tenant);
    };
    if !tenant.active {
        bail!("Tenant '{}' is inactive", cli.tenant);
    }

    let now = Utc::now();
    let range = match (cli.leads_period, cli.start_date, cli.end_date) {
        (Some(period), _, _) => LeadsPeriod::from(period).date_range(now),
        (None, start, end) => {
            let start = start
                .map(|d| Utc.from_utc_datetime(&d.and_hms_opt(0, 0, 0).unwrap_or_default()))
                .unwrap_or(now - chrono::Duration::days(30));
            let end = end
                .map(|d| Utc.from_utc_datetime(&d.and_hms_opt(23, 59, 59).unwrap_or_default()))
                .unwrap_or(now);
            if end < start {
                bail!("--end-date is before --start-date");
            }
            DateRange::new(start, end)
        }
    };

    let job_id = Uuid::new_v4();
    info!(job_id = %job_id, tenant = %tenant.slug, "Import job created");

    let sink = DbProgressSink::new(pool.clone(), tenant.id);
    let mut reporter = ProgressReporter::new(&sink, job_id);

    reporter.connecting("Connecting to storefront database").await;
    let source = match MySqlSource::connect(&tenant).await {
        Ok(source) => source,
        Err(e) => {
            reporter.fail(&e.to_string()).await;
            return Err(e.into());
        }
    };

    let result = match cli.import_type {
        ImportKind::Leads => run_leads_import(&pool, &tenant, &source, range, &mut reporter).await,
        kind => {
            let import_type = match kind {
                ImportKind::Carts => ImportType::Carts,
                ImportKind::Orders => ImportType::Orders,
                _ => ImportType::All,
            };
            let policy = RecoveryPolicy {
                window_days: config.recovery_window_days,
            };
            run_commerce_import(
                &pool,
                &tenant,
                &source,
                range,
                import_type,
                policy,
                &mut reporter,
            )
            .await
        }
    };

    match result {
        Ok(summary) => {
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        Err(e) => {
            reporter.fail(&e.to_string()).await;
            match e {
                Error::Source(msg) => bail!("Import aborted: {msg}"),
                other => Err(other.into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leads_period_requires_a_leads_import() {
        let cli = Cli::parse_from([
            "cartrec-import",
            "--tenant",
            "acme",
            "--leads-period",
            "yesterday",
        ]);
        assert!(cli.validate().is_err());

        let cli = Cli::parse_from([
            "cartrec-import",
            "--tenant",
            "acme",
            "--import-type",
            "leads",
            "--leads-period",
            "yesterday",
        ]);
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn leads_period_conflicts_with_explicit_dates() {
        let parsed = Cli::try_parse_from([
            "cartrec-import",
            "--tenant",
            "acme",
            "--import-type",
            "leads",
            "--leads-period",
            "7days",
            "--start-date",
            "2024-01-01",
        ]);
        assert!(parsed.is_err());
    }
}
