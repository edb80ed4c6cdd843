//! PostgreSQL target.

use super::schema::{qualify_table, schema_ddl};
use super::{RowCounts, SslMode, TargetSession, TargetWriter, TlsBuilder};
use crate::config::TargetConfig;
use crate::error::{MigrateError, Result};
use crate::source::{AlertTrigger, GeofenceRow, MessageTypeRecord, VesselRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod, Transaction};
use std::time::{Duration, Instant};
use tokio_postgres::types::Json;
use tokio_postgres::NoTls;
use tracing::{debug, info};

/// Connection to the target database.
///
/// The run needs exactly one connection, so the pool is capped at one.
/// Dropping the value closes the pool on every exit path.
pub struct PgConnection {
    pool: Pool,
    config: TargetConfig,
}

impl PgConnection {
    /// Connect and verify the connection with `SELECT 1`.
    pub async fn connect(config: &TargetConfig) -> Result<Self> {
        let pg_config = config.pg_config();
        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let mgr = match TlsBuilder::new(SslMode::parse(&config.ssl_mode)?).build()? {
            Some(tls) => Manager::from_config(pg_config, tls, mgr_config),
            None => Manager::from_config(pg_config, NoTls, mgr_config),
        };

        let pool = Pool::builder(mgr)
            .max_size(1)
            .build()
            .map_err(|e| MigrateError::pool(e.to_string(), "building PostgreSQL pool"))?;

        let conn = Self {
            pool,
            config: config.clone(),
        };
        conn.ping().await?;

        info!("Connected to PostgreSQL: {}", config.describe());
        Ok(conn)
    }

    /// Check out the connection.
    pub async fn client(&self) -> Result<Object> {
        self.pool.get().await.map_err(|e| {
            MigrateError::pool(
                e.to_string(),
                format!("connecting to {}", self.config.describe()),
            )
        })
    }

    /// Round-trip a trivial query and return its latency.
    pub async fn ping(&self) -> Result<Duration> {
        let start = Instant::now();
        let client = self.client().await?;
        client.simple_query("SELECT 1").await?;
        Ok(start.elapsed())
    }

    /// Schema holding the target tables.
    pub fn schema(&self) -> &str {
        &self.config.schema
    }
}

impl Drop for PgConnection {
    fn drop(&mut self) {
        self.pool.close();
        debug!("Database connection closed");
    }
}

/// Writer bound to one open PostgreSQL transaction.
pub struct PgWriter<'a> {
    tx: Transaction<'a>,
    schema: String,
}

impl<'a> PgWriter<'a> {
    /// Open a transaction on a checked-out connection.
    pub async fn begin(client: &'a mut Object, schema: &str) -> Result<Self> {
        let tx = client.transaction().await?;
        debug!("Transaction opened");
        Ok(Self {
            tx,
            schema: schema.to_string(),
        })
    }

    fn table(&self, name: &str) -> String {
        qualify_table(&self.schema, name)
    }

    async fn count(&self, table: &str) -> Result<i64> {
        let row = self
            .tx
            .query_one(&format!("SELECT COUNT(*) FROM {}", self.table(table)), &[])
            .await?;
        Ok(row.get(0))
    }
}

#[async_trait]
impl TargetWriter for PgWriter<'_> {
    async fn init_schema(&mut self) -> Result<()> {
        self.tx.batch_execute(&schema_ddl(&self.schema)).await?;
        info!("Ensured target tables exist in schema '{}'", self.schema);
        Ok(())
    }

    async fn upsert_message_type(&mut self, name: &str, record: &MessageTypeRecord) -> Result<i32> {
        let sql = format!(
            "INSERT INTO {} (name, schema_path, expected_interval_mins, late_threshold_mins)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (name) DO UPDATE SET
                schema_path = EXCLUDED.schema_path,
                expected_interval_mins = EXCLUDED.expected_interval_mins,
                late_threshold_mins = EXCLUDED.late_threshold_mins
             RETURNING id",
            self.table("message_types")
        );
        let row = self
            .tx
            .query_one(
                &sql,
                &[
                    &name,
                    &record.schema_path,
                    &record.expected_interval_mins,
                    &record.late_threshold_mins,
                ],
            )
            .await?;
        Ok(row.get(0))
    }

    async fn upsert_vessel(&mut self, imei: &str, vessel: &VesselRecord) -> Result<i32> {
        // escalation_threshold and repeat_interval_mins are deliberately absent
        // from the update list: they keep their first-insert values.
        let sql = format!(
            "INSERT INTO {} (
                name, imei, at_sea_status, emergency_alert_active,
                latest_position, escalation_threshold, repeat_interval_mins
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (imei) DO UPDATE SET
                name = EXCLUDED.name,
                at_sea_status = EXCLUDED.at_sea_status,
                emergency_alert_active = EXCLUDED.emergency_alert_active,
                latest_position = EXCLUDED.latest_position
             RETURNING id",
            self.table("vessels")
        );
        let position = vessel.latest_position.as_ref().map(Json);
        let row = self
            .tx
            .query_one(
                &sql,
                &[
                    &vessel.name,
                    &imei,
                    &vessel.at_sea,
                    &vessel.emergency.is_active,
                    &position,
                    &vessel.emergency.escalation_threshold,
                    &vessel.emergency.repeat_interval_mins,
                ],
            )
            .await?;
        Ok(row.get(0))
    }

    async fn delete_geofences(&mut self, vessel_id: i32) -> Result<u64> {
        let sql = format!("DELETE FROM {} WHERE vessel_id = $1", self.table("geofences"));
        Ok(self.tx.execute(&sql, &[&vessel_id]).await?)
    }

    async fn insert_geofence(&mut self, vessel_id: i32, row: &GeofenceRow) -> Result<()> {
        let sql = format!(
            "INSERT INTO {} (vessel_id, geofence_type, geometry, is_muted)
             VALUES ($1, $2, $3, $4)",
            self.table("geofences")
        );
        self.tx
            .execute(
                &sql,
                &[
                    &vessel_id,
                    &row.kind.as_str(),
                    &Json(&row.geometry),
                    &row.muted,
                ],
            )
            .await?;
        Ok(())
    }

    async fn delete_alert_rules(&mut self, vessel_id: i32) -> Result<u64> {
        let sql = format!("DELETE FROM {} WHERE vessel_id = $1", self.table("alert_rules"));
        Ok(self.tx.execute(&sql, &[&vessel_id]).await?)
    }

    async fn insert_alert_rule(
        &mut self,
        vessel_id: i32,
        message_type_id: i32,
        trigger: &AlertTrigger,
    ) -> Result<()> {
        let sql = format!(
            "INSERT INTO {} (
                vessel_id, message_type_id, name, field_name, operator, threshold,
                consecutivity_enabled, consecutivity_count,
                time_enabled, time_window_mins, time_count,
                is_muted, enabled
             )
             VALUES ($1, $2, $3, $4, $5, $6::DOUBLE PRECISION, $7, $8, $9, $10, $11, $12, TRUE)",
            self.table("alert_rules")
        );
        self.tx
            .execute(
                &sql,
                &[
                    &vessel_id,
                    &message_type_id,
                    &trigger.name,
                    &trigger.field,
                    &trigger.comparator,
                    &trigger.threshold,
                    &trigger.consecutivity.enabled,
                    &trigger.consecutivity.count,
                    &trigger.time_window.enabled,
                    &trigger.time_window.window_mins,
                    &trigger.time_window.count,
                    &trigger.muted,
                ],
            )
            .await?;
        Ok(())
    }

    async fn upsert_metadata(&mut self, last_updated: DateTime<Utc>) -> Result<()> {
        let sql = format!(
            "INSERT INTO {} (id, last_updated)
             VALUES (1, $1)
             ON CONFLICT (id) DO UPDATE SET last_updated = EXCLUDED.last_updated",
            self.table("system_metadata")
        );
        self.tx.execute(&sql, &[&last_updated]).await?;
        Ok(())
    }

    async fn row_counts(&mut self) -> Result<RowCounts> {
        Ok(RowCounts {
            vessels: self.count("vessels").await?,
            geofences: self.count("geofences").await?,
            alert_rules: self.count("alert_rules").await?,
            message_types: self.count("message_types").await?,
        })
    }

    fn backend_type(&self) -> &'static str {
        "postgres"
    }
}

#[async_trait]
impl TargetSession for PgWriter<'_> {
    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        debug!("Transaction committed");
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        debug!("Transaction rolled back");
        Ok(())
    }
}
