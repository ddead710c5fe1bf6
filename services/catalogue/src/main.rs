//! Strata Catalogue
//!
//! Applies migrations and runs the consistency audit over the catalogue.

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{error, info};

use strata_catalogue::ConsistencyAuditor;
use strata_database::{initialize_database, postgres_health_check, AuditRepository, DatabaseConfig};
use strata_utils::{init_logging, AppConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load().context("Failed to load configuration")?;
    init_logging(&config.logging)?;
    info!("Starting Strata Catalogue");

    let database = DatabaseConfig {
        postgres_url: config.database.postgres_url.clone(),
        max_connections: config.database.max_connections,
        connection_timeout: Duration::from_secs(config.database.connection_timeout_seconds),
        run_migrations: config.database.run_migrations,
    };
    let pool = initialize_database(&database).await?;
    let version = postgres_health_check(&pool).await?;
    info!(%version, "Catalogue database ready");

    if !config.audit.enabled {
        return Ok(());
    }

    let auditor = ConsistencyAuditor::new(
        AuditRepository::new(pool.clone()),
        config.audit.max_findings_per_check,
    );
    let report = auditor.run().await?;

    for finding in &report.findings {
        info!(code = finding.code, records = ?finding.records, "{}", finding.message);
    }
    println!("{}", serde_json::to_string_pretty(&report)?);

    if config.audit.fail_on_findings && !report.is_clean() {
        error!(findings = report.findings.len(), "Consistency audit failed");
        std::process::exit(1);
    }
    Ok(())
}
