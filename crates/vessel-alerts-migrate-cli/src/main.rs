//! vessel-alerts-migrate CLI - migrate a vessel-alerting snapshot into PostgreSQL.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;
use vessel_alerts_migrate::{Config, MigrateError, MigrationResult, Orchestrator};

#[derive(Parser)]
#[command(name = "vessel-alerts-migrate")]
#[command(about = "Migrate a vessel-alerting JSON snapshot into PostgreSQL")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Migrate the snapshot in one transaction
    Run {
        /// Override the snapshot path from the config file
        #[arg(long)]
        input: Option<PathBuf>,

        /// Override target schema
        #[arg(long)]
        target_schema: Option<String>,

        /// Dry run: migrate into memory and report, without connecting
        #[arg(long)]
        dry_run: bool,

        /// Create missing target tables before migrating
        #[arg(long)]
        init_schema: bool,
    },

    /// Create the target tables if they do not exist
    InitSchema,

    /// Test the database connection
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), MigrateError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format).map_err(MigrateError::Config)?;

    let mut config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::Run {
            input,
            target_schema,
            dry_run,
            init_schema,
        } => {
            // Apply overrides
            if let Some(path) = input {
                config.source.path = path;
            }
            if let Some(schema) = target_schema {
                config.target.schema = schema;
            }
            if init_schema {
                config.migration.init_schema = true;
            }
            config.validate()?;

            let orchestrator = Orchestrator::new(config);
            let snapshot = orchestrator.load_snapshot()?;
            let result = if dry_run {
                orchestrator.dry_run(&snapshot).await?
            } else {
                orchestrator.run(&snapshot).await?
            };

            if cli.output_json {
                println!("{}", result.to_json()?);
            } else {
                print_summary(&result);
            }
        }

        Commands::InitSchema => {
            let schema = config.target.schema.clone();
            Orchestrator::new(config).init_schema().await?;
            println!("Target tables ready in schema '{}'", schema);
        }

        Commands::HealthCheck => {
            let target = config.target.describe();
            let result = Orchestrator::new(config).health_check().await;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Health Check Results:");
                println!(
                    "  Target (PostgreSQL {}): {} ({}ms)",
                    target,
                    if result.target_connected { "OK" } else { "FAILED" },
                    result.target_latency_ms
                );
                if let Some(ref err) = result.target_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "\n  Overall: {}",
                    if result.healthy { "HEALTHY" } else { "UNHEALTHY" }
                );
            }

            if !result.healthy {
                return Err(MigrateError::pool(
                    result.target_error.unwrap_or_default(),
                    format!("health check of {}", target),
                ));
            }
        }
    }

    Ok(())
}

fn print_summary(result: &MigrationResult) {
    let status_msg = if result.dry_run {
        "Dry run completed!"
    } else {
        "Migration completed!"
    };
    println!("\n{}", status_msg);
    println!("  Run ID: {}", result.run_id);
    println!("  Duration: {:.2}s", result.duration_seconds);
    println!("  Snapshot sha256: {}", result.snapshot_digest);
    println!("  Vessels: {}", result.row_counts.vessels);
    println!("  Geofences: {}", result.row_counts.geofences);
    println!("  Alert rules: {}", result.row_counts.alert_rules);
    println!("  Message types: {}", result.row_counts.message_types);
    println!("  Last updated: {}", result.last_updated.to_rfc3339());
    if !result.skipped.is_empty() {
        println!("  Skipped: {}", result.skipped.len());
        for entry in &result.skipped {
            println!("    - {}", entry);
        }
    }
}

/// Logs go to stderr so stdout carries only the result.
fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let installed = if format == "json" {
        subscriber.json().try_init()
    } else {
        subscriber.try_init()
    };
    installed.map_err(|e| e.to_string())
}
