//! In-memory target with the same upsert and delete semantics as PostgreSQL.
//!
//! Dry runs migrate into a scratch [`MemoryTarget`]; tests use it to observe
//! the rows a run would produce.

use super::{RowCounts, TargetSession, TargetWriter};
use crate::error::Result;
use crate::source::{
    AlertTrigger, GeofenceKind, GeofenceRow, Geometry, MessageTypeRecord, Position, VesselRecord,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq)]
pub struct MessageTypeRow {
    pub id: i32,
    pub name: String,
    pub schema_path: String,
    pub expected_interval_mins: i32,
    pub late_threshold_mins: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VesselRow {
    pub id: i32,
    pub name: Option<String>,
    pub imei: String,
    pub at_sea_status: bool,
    pub emergency_alert_active: bool,
    pub latest_position: Option<Position>,
    pub escalation_threshold: i32,
    pub repeat_interval_mins: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredGeofence {
    pub id: i32,
    pub vessel_id: i32,
    pub geofence_type: GeofenceKind,
    pub geometry: Geometry,
    pub is_muted: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlertRuleRow {
    pub id: i32,
    pub vessel_id: i32,
    pub message_type_id: i32,
    pub trigger: AlertTrigger,
    pub enabled: bool,
}

/// Table contents plus per-table id sequences.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryTables {
    pub message_types: Vec<MessageTypeRow>,
    pub vessels: Vec<VesselRow>,
    pub geofences: Vec<StoredGeofence>,
    pub alert_rules: Vec<AlertRuleRow>,
    pub last_updated: Option<DateTime<Utc>>,
    sequences: Sequences,
}

// Unlike PostgreSQL sequences, these roll back with the tables.
#[derive(Debug, Clone, Default, PartialEq)]
struct Sequences {
    message_types: i32,
    vessels: i32,
    geofences: i32,
    alert_rules: i32,
}

fn next(seq: &mut i32) -> i32 {
    *seq += 1;
    *seq
}

/// Committed in-memory tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryTarget {
    tables: MemoryTables,
}

impl MemoryTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed table contents.
    pub fn tables(&self) -> &MemoryTables {
        &self.tables
    }

    /// Start a transaction over a working copy of the tables.
    pub fn session(&mut self) -> MemorySession<'_> {
        let working = self.tables.clone();
        MemorySession {
            target: self,
            working,
        }
    }
}

impl MemoryTables {
    pub fn vessel_by_imei(&self, imei: &str) -> Option<&VesselRow> {
        self.vessels.iter().find(|v| v.imei == imei)
    }

    pub fn message_type_by_name(&self, name: &str) -> Option<&MessageTypeRow> {
        self.message_types.iter().find(|m| m.name == name)
    }

    pub fn geofences_for(&self, vessel_id: i32) -> Vec<&StoredGeofence> {
        self.geofences
            .iter()
            .filter(|g| g.vessel_id == vessel_id)
            .collect()
    }

    pub fn alert_rules_for(&self, vessel_id: i32) -> Vec<&AlertRuleRow> {
        self.alert_rules
            .iter()
            .filter(|r| r.vessel_id == vessel_id)
            .collect()
    }

    pub fn counts(&self) -> RowCounts {
        RowCounts {
            vessels: self.vessels.len() as i64,
            geofences: self.geofences.len() as i64,
            alert_rules: self.alert_rules.len() as i64,
            message_types: self.message_types.len() as i64,
        }
    }
}

/// An open in-memory transaction.
pub struct MemorySession<'a> {
    target: &'a mut MemoryTarget,
    working: MemoryTables,
}

impl MemorySession<'_> {
    /// Uncommitted table contents.
    pub fn working(&self) -> &MemoryTables {
        &self.working
    }
}

#[async_trait]
impl TargetWriter for MemorySession<'_> {
    async fn init_schema(&mut self) -> Result<()> {
        Ok(())
    }

    async fn upsert_message_type(&mut self, name: &str, record: &MessageTypeRecord) -> Result<i32> {
        let tables = &mut self.working;
        if let Some(row) = tables.message_types.iter_mut().find(|m| m.name == name) {
            row.schema_path = record.schema_path.clone();
            row.expected_interval_mins = record.expected_interval_mins;
            row.late_threshold_mins = record.late_threshold_mins;
            return Ok(row.id);
        }

        let id = next(&mut tables.sequences.message_types);
        tables.message_types.push(MessageTypeRow {
            id,
            name: name.to_string(),
            schema_path: record.schema_path.clone(),
            expected_interval_mins: record.expected_interval_mins,
            late_threshold_mins: record.late_threshold_mins,
        });
        Ok(id)
    }

    async fn upsert_vessel(&mut self, imei: &str, vessel: &VesselRecord) -> Result<i32> {
        let tables = &mut self.working;
        if let Some(row) = tables.vessels.iter_mut().find(|v| v.imei == imei) {
            row.name = vessel.name.clone();
            row.at_sea_status = vessel.at_sea;
            row.emergency_alert_active = vessel.emergency.is_active;
            row.latest_position = vessel.latest_position.clone();
            return Ok(row.id);
        }

        let id = next(&mut tables.sequences.vessels);
        tables.vessels.push(VesselRow {
            id,
            name: vessel.name.clone(),
            imei: imei.to_string(),
            at_sea_status: vessel.at_sea,
            emergency_alert_active: vessel.emergency.is_active,
            latest_position: vessel.latest_position.clone(),
            escalation_threshold: vessel.emergency.escalation_threshold,
            repeat_interval_mins: vessel.emergency.repeat_interval_mins,
        });
        Ok(id)
    }

    async fn delete_geofences(&mut self, vessel_id: i32) -> Result<u64> {
        let before = self.working.geofences.len();
        self.working.geofences.retain(|g| g.vessel_id != vessel_id);
        Ok((before - self.working.geofences.len()) as u64)
    }

    async fn insert_geofence(&mut self, vessel_id: i32, row: &GeofenceRow) -> Result<()> {
        let id = next(&mut self.working.sequences.geofences);
        self.working.geofences.push(StoredGeofence {
            id,
            vessel_id,
            geofence_type: row.kind,
            geometry: row.geometry.clone(),
            is_muted: row.muted,
        });
        Ok(())
    }

    async fn delete_alert_rules(&mut self, vessel_id: i32) -> Result<u64> {
        let before = self.working.alert_rules.len();
        self.working.alert_rules.retain(|r| r.vessel_id != vessel_id);
        Ok((before - self.working.alert_rules.len()) as u64)
    }

    async fn insert_alert_rule(
        &mut self,
        vessel_id: i32,
        message_type_id: i32,
        trigger: &AlertTrigger,
    ) -> Result<()> {
        let id = next(&mut self.working.sequences.alert_rules);
        self.working.alert_rules.push(AlertRuleRow {
            id,
            vessel_id,
            message_type_id,
            trigger: trigger.clone(),
            enabled: true,
        });
        Ok(())
    }

    async fn upsert_metadata(&mut self, last_updated: DateTime<Utc>) -> Result<()> {
        self.working.last_updated = Some(last_updated);
        Ok(())
    }

    async fn row_counts(&mut self) -> Result<RowCounts> {
        Ok(self.working.counts())
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}

#[async_trait]
impl TargetSession for MemorySession<'_> {
    async fn commit(self) -> Result<()> {
        self.target.tables = self.working;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        Ok(())
    }
}
