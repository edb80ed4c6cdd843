//! Migration orchestrator - main workflow coordinator.
//!
//! A run moves through [`RunPhase`]s in a fixed order:
//! load the snapshot, connect, migrate inside one transaction, commit, report.
//! Load and connect failures happen before any transaction exists. Any
//! failure while migrating or committing rolls the transaction back, so the
//! target is either fully migrated or untouched.

use crate::config::Config;
use crate::error::{MigrateError, Result};
use crate::pipeline::{run_pipeline, PipelineStats, Skipped};
use crate::source::{load_snapshot, Snapshot, SnapshotOptions};
use crate::target::{
    MemoryTarget, PgConnection, PgWriter, RowCounts, TargetSession, TargetWriter,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use tracing::{error, info, warn};

/// Phases of a migration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Load,
    Connect,
    Migrate,
    Commit,
    Report,
    Failed,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunPhase::Load => "Loading snapshot",
            RunPhase::Connect => "Connecting to target",
            RunPhase::Migrate => "Migrating",
            RunPhase::Commit => "Committing",
            RunPhase::Report => "Reporting",
            RunPhase::Failed => "Failed",
        };
        f.write_str(s)
    }
}

fn enter(phase: RunPhase) {
    info!("Phase: {}", phase);
}

/// Migration orchestrator.
pub struct Orchestrator {
    config: Config,
}

/// Result of a migration run.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationResult {
    /// Unique run identifier.
    pub run_id: String,

    /// Final status.
    pub status: String,

    /// True when the run wrote to a scratch in-memory target.
    pub dry_run: bool,

    /// Target backend name.
    pub backend: String,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// When the migration started.
    pub started_at: DateTime<Utc>,

    /// When the migration completed.
    pub completed_at: DateTime<Utc>,

    /// SHA-256 of the snapshot file.
    pub snapshot_digest: String,

    /// Vessel upserts issued.
    pub vessels_processed: usize,

    /// Distinct message types upserted.
    pub message_types_migrated: usize,

    /// Geofence rows inserted.
    pub geofences_inserted: usize,

    /// Alert rule rows inserted.
    pub alert_rules_inserted: usize,

    /// Timestamp written to the metadata row.
    pub last_updated: DateTime<Utc>,

    /// Table row counts at commit time.
    pub row_counts: RowCounts,

    /// Snapshot entries that were not migrated.
    pub skipped: Vec<Skipped>,
}

impl MigrationResult {
    fn new(
        run_id: String,
        started_at: DateTime<Utc>,
        backend: &str,
        dry_run: bool,
        snapshot: &Snapshot,
        stats: PipelineStats,
        row_counts: RowCounts,
    ) -> Self {
        let completed_at = Utc::now();
        Self {
            run_id,
            status: "completed".to_string(),
            dry_run,
            backend: backend.to_string(),
            duration_seconds: (completed_at - started_at).num_milliseconds() as f64 / 1000.0,
            started_at,
            completed_at,
            snapshot_digest: snapshot.digest.clone(),
            vessels_processed: stats.vessels,
            message_types_migrated: stats.message_types,
            geofences_inserted: stats.geofences,
            alert_rules_inserted: stats.alert_rules,
            last_updated: stats.last_updated,
            row_counts,
            skipped: stats.skipped,
        }
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Result of a connectivity check.
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheckResult {
    pub target_connected: bool,
    pub target_latency_ms: u64,
    pub target_error: Option<String>,
    pub healthy: bool,
}

impl Orchestrator {
    /// Create a new orchestrator. No connection is opened until a run starts.
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Load the configured snapshot file.
    pub fn load_snapshot(&self) -> Result<Snapshot> {
        enter(RunPhase::Load);
        load_snapshot(
            &self.config.source.path,
            SnapshotOptions::from(&self.config.migration),
        )
    }

    /// Migrate a snapshot into PostgreSQL as one transaction.
    pub async fn run(&self, snapshot: &Snapshot) -> Result<MigrationResult> {
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        info!("Starting migration run: {}", run_id);

        match self.run_on_postgres(snapshot).await {
            Ok((stats, counts)) => {
                let result = MigrationResult::new(
                    run_id, started_at, "postgres", false, snapshot, stats, counts,
                );
                report(&result);
                Ok(result)
            }
            Err(e) => {
                error!("Migration run {} {}: {}", run_id, RunPhase::Failed, e);
                Err(e)
            }
        }
    }

    async fn run_on_postgres(&self, snapshot: &Snapshot) -> Result<(PipelineStats, RowCounts)> {
        enter(RunPhase::Connect);
        let conn = PgConnection::connect(&self.config.target).await?;
        let mut client = conn.client().await?;

        let session = PgWriter::begin(&mut client, conn.schema()).await?;
        migrate_in_session(session, snapshot, self.config.migration.init_schema).await
    }

    /// Run the pipeline against a scratch in-memory target.
    pub async fn dry_run(&self, snapshot: &Snapshot) -> Result<MigrationResult> {
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        info!("Starting dry run: {}", run_id);

        let mut target = MemoryTarget::new();
        let (stats, counts) = migrate_in_session(target.session(), snapshot, false).await?;

        let result =
            MigrationResult::new(run_id, started_at, "memory", true, snapshot, stats, counts);
        report(&result);
        Ok(result)
    }

    /// Create the target tables if they do not exist.
    pub async fn init_schema(&self) -> Result<()> {
        enter(RunPhase::Connect);
        let conn = PgConnection::connect(&self.config.target).await?;
        let mut client = conn.client().await?;

        let mut session = PgWriter::begin(&mut client, conn.schema()).await?;
        if let Err(e) = session.init_schema().await {
            if let Err(rb) = session.rollback().await {
                error!("Rollback failed: {}", rb);
            }
            return Err(MigrateError::migration("init_schema", e.to_string()));
        }
        session
            .commit()
            .await
            .map_err(|e| MigrateError::migration("commit", e.to_string()))
    }

    /// Check that the target database is reachable.
    pub async fn health_check(&self) -> HealthCheckResult {
        let start = Instant::now();
        let outcome = PgConnection::connect(&self.config.target).await;
        let latency = start.elapsed().as_millis() as u64;

        let (connected, error) = match outcome {
            Ok(_) => (true, None),
            Err(e) => (false, Some(e.to_string())),
        };

        HealthCheckResult {
            target_connected: connected,
            target_latency_ms: latency,
            target_error: error,
            healthy: connected,
        }
    }
}

/// Run the pipeline inside `session` and commit, or roll back on any error.
///
/// Row counts are read inside the transaction after the last stage, so they
/// are exactly what the commit publishes.
pub async fn migrate_in_session<S: TargetSession>(
    mut session: S,
    snapshot: &Snapshot,
    init_schema: bool,
) -> Result<(PipelineStats, RowCounts)> {
    enter(RunPhase::Migrate);
    let outcome = async {
        if init_schema {
            session
                .init_schema()
                .await
                .map_err(|e| MigrateError::migration("init_schema", e.to_string()))?;
        }
        let stats = run_pipeline(&mut session, snapshot).await?;
        let counts = session
            .row_counts()
            .await
            .map_err(|e| MigrateError::migration("row_counts", e.to_string()))?;
        Ok::<_, MigrateError>((stats, counts))
    }
    .await;

    match outcome {
        Ok(done) => {
            enter(RunPhase::Commit);
            session
                .commit()
                .await
                .map_err(|e| MigrateError::migration("commit", e.to_string()))?;
            Ok(done)
        }
        Err(e) => {
            warn!("Rolling back migration transaction");
            if let Err(rb) = session.rollback().await {
                error!("Rollback failed: {}", rb);
            }
            Err(e)
        }
    }
}

fn report(result: &MigrationResult) {
    enter(RunPhase::Report);
    info!(
        "Migration {}: {} vessels, {} geofences, {} alert rules, {} message types in {:.2}s",
        result.status,
        result.row_counts.vessels,
        result.row_counts.geofences,
        result.row_counts.alert_rules,
        result.row_counts.message_types,
        result.duration_seconds
    );
    if !result.skipped.is_empty() {
        warn!("{} snapshot entries skipped", result.skipped.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{AlertTrigger, GeofenceRow, MessageTypeRecord, VesselRecord};
    use crate::target::MemorySession;
    use async_trait::async_trait;

    const SNAPSHOT: &str = r#"{
        "last_updated": "2024-05-01T00:00:00Z",
        "platforms": [{
            "name": "Vessel-A",
            "imei": "1234",
            "geofences": {"keep_out_points": [{"name": "Buoy", "lat": 1, "lon": 2}]},
            "message_types": [{
                "name": "GPS",
                "alert_triggers": [{"field": "speed", "comparator": ">", "value_threshold": 50}]
            }]
        }]
    }"#;

    fn snapshot() -> Snapshot {
        Snapshot::from_json_str(SNAPSHOT, SnapshotOptions::default()).unwrap()
    }

    /// Memory session whose metadata write fails.
    struct BrokenMetadata<'a>(MemorySession<'a>);

    #[async_trait]
    impl TargetWriter for BrokenMetadata<'_> {
        async fn init_schema(&mut self) -> Result<()> {
            self.0.init_schema().await
        }

        async fn upsert_message_type(&mut self, name: &str, record: &MessageTypeRecord) -> Result<i32> {
            self.0.upsert_message_type(name, record).await
        }

        async fn upsert_vessel(&mut self, imei: &str, vessel: &VesselRecord) -> Result<i32> {
            self.0.upsert_vessel(imei, vessel).await
        }

        async fn delete_geofences(&mut self, vessel_id: i32) -> Result<u64> {
            self.0.delete_geofences(vessel_id).await
        }

        async fn insert_geofence(&mut self, vessel_id: i32, row: &GeofenceRow) -> Result<()> {
            self.0.insert_geofence(vessel_id, row).await
        }

        async fn delete_alert_rules(&mut self, vessel_id: i32) -> Result<u64> {
            self.0.delete_alert_rules(vessel_id).await
        }

        async fn insert_alert_rule(
            &mut self,
            vessel_id: i32,
            message_type_id: i32,
            trigger: &AlertTrigger,
        ) -> Result<()> {
            self.0
                .insert_alert_rule(vessel_id, message_type_id, trigger)
                .await
        }

        async fn upsert_metadata(&mut self, _last_updated: DateTime<Utc>) -> Result<()> {
            Err(MigrateError::Config("metadata table missing".into()))
        }

        async fn row_counts(&mut self) -> Result<RowCounts> {
            self.0.row_counts().await
        }

        fn backend_type(&self) -> &'static str {
            "broken"
        }
    }

    #[async_trait]
    impl TargetSession for BrokenMetadata<'_> {
        async fn commit(self) -> Result<()> {
            self.0.commit().await
        }

        async fn rollback(self) -> Result<()> {
            self.0.rollback().await
        }
    }

    #[tokio::test]
    async fn test_session_commits_on_success() {
        let mut target = MemoryTarget::new();
        let (stats, counts) = migrate_in_session(target.session(), &snapshot(), false)
            .await
            .unwrap();

        assert_eq!(stats.alert_rules, 1);
        assert_eq!(counts, target.tables().counts());
        assert_eq!(
            counts,
            RowCounts {
                vessels: 1,
                geofences: 1,
                alert_rules: 1,
                message_types: 1
            }
        );
    }

    #[tokio::test]
    async fn test_failure_rolls_back_everything() {
        let mut target = MemoryTarget::new();
        migrate_in_session(target.session(), &snapshot(), false)
            .await
            .unwrap();
        let before = target.tables().clone();

        let mut changed = snapshot();
        changed.vessels[0].at_sea = false;
        let err = migrate_in_session(BrokenMetadata(target.session()), &changed, false)
            .await
            .unwrap_err();

        match &err {
            MigrateError::Migration { stage, .. } => assert_eq!(stage, "metadata"),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(err.exit_code(), crate::error::EXIT_MIGRATION_ERROR);
        assert_eq!(target.tables(), &before);
    }

    #[tokio::test]
    async fn test_dry_run_reports_counts() {
        let config = Config::from_yaml(
            "source:\n  path: snapshot.json\ntarget:\n  host: localhost\n  database: alerts\n  user: postgres\n",
        )
        .unwrap();
        let orchestrator = Orchestrator::new(config);
        let input = snapshot();
        let result = orchestrator.dry_run(&input).await.unwrap();

        assert!(result.dry_run);
        assert_eq!(result.backend, "memory");
        assert_eq!(result.status, "completed");
        assert_eq!(result.snapshot_digest, input.digest);
        assert_eq!(result.row_counts.geofences, 1);
        assert_eq!(result.vessels_processed, 1);

        let json: serde_json::Value = serde_json::from_str(&result.to_json().unwrap()).unwrap();
        assert_eq!(json["row_counts"]["alert_rules"], 1);
        assert_eq!(json["dry_run"], true);
    }

    #[test]
    fn test_load_snapshot_missing_file_is_io_error() {
        let config = Config::from_yaml(
            "source:\n  path: /nonexistent/snapshot.json\ntarget:\n  host: localhost\n  database: alerts\n  user: postgres\n",
        )
        .unwrap();
        let err = Orchestrator::new(config).load_snapshot().unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_IO_ERROR);
    }
}
