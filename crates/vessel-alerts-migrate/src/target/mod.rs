//! Target database operations.
//!
//! The pipeline talks to the target through [`TargetWriter`], one call per
//! row-level statement. A [`TargetSession`] is a writer bound to a single
//! transaction: everything written through it becomes visible on
//! [`TargetSession::commit`] or disappears on [`TargetSession::rollback`].
//!
//! - **PostgreSQL**: [`PgWriter`] over a deadpool-postgres connection
//! - **Memory**: [`MemoryTarget`] for dry runs and tests

mod memory;
mod pg;
mod schema;
mod tls;

pub use memory::{
    AlertRuleRow, MemorySession, MemoryTables, MemoryTarget, MessageTypeRow, StoredGeofence,
    VesselRow,
};
pub use pg::{PgConnection, PgWriter};
pub use schema::schema_ddl;
pub use tls::{SslMode, TlsBuilder};

use crate::error::Result;
use crate::source::{AlertTrigger, GeofenceRow, MessageTypeRecord, VesselRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Row-level write operations issued by the migration pipeline.
#[async_trait]
pub trait TargetWriter: Send {
    /// Create the target tables if they do not exist.
    async fn init_schema(&mut self) -> Result<()>;

    /// Insert a message type, or overwrite schema path and both intervals
    /// when the name already exists. Returns the row id.
    async fn upsert_message_type(&mut self, name: &str, record: &MessageTypeRecord) -> Result<i32>;

    /// Insert a vessel keyed by IMEI. On conflict only name, at-sea flag,
    /// emergency flag and position are overwritten; escalation threshold and
    /// repeat interval keep their first-insert values. Returns the row id.
    async fn upsert_vessel(&mut self, imei: &str, vessel: &VesselRecord) -> Result<i32>;

    /// Delete every geofence owned by a vessel. Returns the number removed.
    async fn delete_geofences(&mut self, vessel_id: i32) -> Result<u64>;

    /// Insert one geofence for a vessel.
    async fn insert_geofence(&mut self, vessel_id: i32, row: &GeofenceRow) -> Result<()>;

    /// Delete every alert rule owned by a vessel. Returns the number removed.
    async fn delete_alert_rules(&mut self, vessel_id: i32) -> Result<u64>;

    /// Insert one alert rule. Rules are always written enabled.
    async fn insert_alert_rule(
        &mut self,
        vessel_id: i32,
        message_type_id: i32,
        trigger: &AlertTrigger,
    ) -> Result<()>;

    /// Upsert the singleton metadata row.
    async fn upsert_metadata(&mut self, last_updated: DateTime<Utc>) -> Result<()>;

    /// Current row count of each target table.
    async fn row_counts(&mut self) -> Result<RowCounts>;

    /// Backend name for logging.
    fn backend_type(&self) -> &'static str;
}

/// A writer bound to one all-or-nothing transaction.
#[async_trait]
pub trait TargetSession: TargetWriter + Sized {
    /// Make every write visible.
    async fn commit(self) -> Result<()>;

    /// Discard every write.
    async fn rollback(self) -> Result<()>;
}

/// Row counts of the target tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowCounts {
    pub vessels: i64,
    pub geofences: i64,
    pub alert_rules: i64,
    pub message_types: i64,
}
