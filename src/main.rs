//! Database Clone Tool
//!
//! Copies a live SQL Server database onto the same instance under a new name,
//! reusing a recent verified backup when one exists.

// dbclone/src/main.rs
mod clone;
mod config;
mod engine;
mod errors;
mod logging;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use config::{AppConfig, EnvOverrides, RequestOverrides};
use engine::sqlcmd::{SqlcmdConnection, SqlcmdEngine};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "dbclone")]
#[command(about = "Clone a database onto the same SQL Server instance", long_about = None)]
struct Cli {
    /// Database to copy
    source: String,
    /// Name of the copy (default: <source>_COPY_<yyyyMMddHHmmss>)
    #[arg(long)]
    target: Option<String>,
    /// Directory, on the server, receiving a fresh backup
    #[arg(long)]
    dump_dir: Option<String>,
    /// Third-party backup tool whose recent backups force a fresh copy
    #[arg(long)]
    backup_tool: Option<String>,
    /// Maximum age, in days, of a backup that may be reused
    #[arg(long)]
    max_age_days: Option<u32>,
    /// Path to config.json
    #[arg(long, default_value = "config.json")]
    config: PathBuf,
    /// Print the run report as JSON on stdout (logs go to stderr)
    #[arg(long)]
    json: bool,
}

/// Main entry point for the clone tool. The exit status is the clone result code.
fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    match run_app(cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("❌ Error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_app(cli: Cli) -> Result<u8> {
    let env = EnvOverrides::from_env();
    let app_config = AppConfig::load_from_json(&cli.config, &env).context(format!(
        "Failed to load application configuration from {}",
        cli.config.display()
    ))?;
    let _log_guard = logging::init_logger(app_config.log_file.as_deref());

    let request = app_config
        .build_clone_request(RequestOverrides {
            source_database: cli.source,
            target_database: cli.target,
            dump_directory: cli.dump_dir,
            backup_tool: cli.backup_tool,
            max_backup_age_days: cli.max_age_days,
        })
        .context("Invalid clone request")?;

    let connection = SqlcmdConnection::from_url(
        &app_config.server_url,
        app_config.trust_server_certificate,
    )?;
    let sql_engine = SqlcmdEngine::new(app_config.sqlcmd_path.clone(), connection)
        .context("Failed to set up the sqlcmd engine binding")?;

    let now = clone::engine_now(&sql_engine, Local::now().naive_local());
    let report = clone::run_clone_flow(&sql_engine, &sql_engine, &request, now);

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize clone report")?
        );
    } else {
        info!(
            "Result: {} | source: {} | target: {} | method: {} | artifact: {}",
            report.result,
            report.source,
            report.target.as_deref().unwrap_or("-"),
            report
                .method
                .map_or_else(|| "-".to_string(), |m| m.to_string()),
            report.artifact.as_deref().unwrap_or("-")
        );
    }
    Ok(report.code)
}
