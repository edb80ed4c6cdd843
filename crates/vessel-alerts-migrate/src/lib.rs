//! # vessel-alerts-migrate
//!
//! One-shot migration of a vessel-alerting JSON snapshot into PostgreSQL.
//!
//! The snapshot lists vessels ("platforms") with their geofences, message
//! types and alert triggers. A run upserts message types and vessels, replaces
//! each vessel's geofences and alert rules, and records the snapshot's
//! `last_updated` timestamp:
//!
//! - **All-or-nothing**: the whole migration is one transaction
//! - **Idempotent**: re-running the same snapshot yields the same rows
//! - **Dry run**: the same pipeline against an in-memory target
//!
//! ## Example
//!
//! ```rust,no_run
//! use vessel_alerts_migrate::{Config, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> vessel_alerts_migrate::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let orchestrator = Orchestrator::new(config);
//!     let snapshot = orchestrator.load_snapshot()?;
//!     let result = orchestrator.run(&snapshot).await?;
//!     println!("Migrated {} vessels", result.row_counts.vessels);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod pipeline;
pub mod source;
pub mod target;

// Re-exports for convenient access
pub use config::{Config, MigrationConfig, SourceConfig, TargetConfig};
pub use error::{MigrateError, Result};
pub use orchestrator::{HealthCheckResult, MigrationResult, Orchestrator, RunPhase};
pub use pipeline::{PipelineStats, Skipped};
pub use source::{load_snapshot, Snapshot, SnapshotOptions};
pub use target::{MemoryTarget, PgConnection, RowCounts, TargetSession, TargetWriter};
