use std::collections::{HashMap, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{MigrateError, Result};
use crate::source::{MessageTypeRecord, Snapshot};
use crate::target::TargetWriter;

/// Pipeline stage, used to name the failing step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    MessageTypes,
    Vessels,
    Geofences,
    AlertRules,
    Metadata,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::MessageTypes => "message_types",
            Stage::Vessels => "vessels",
            Stage::Geofences => "geofences",
            Stage::AlertRules => "alert_rules",
            Stage::Metadata => "metadata",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A snapshot entry that was not migrated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Skipped {
    /// Vessel has no IMEI, so it has no upsert key.
    VesselWithoutImei { vessel: String },

    /// Vessel has no name, so geofences and rules cannot be attached.
    VesselWithoutName { imei: String },

    /// Message type has no name, so it cannot be upserted.
    MessageTypeWithoutName { vessel: String },

    /// Rules reference a message type with no migrated row.
    UnknownMessageType {
        vessel: String,
        message_type: String,
        triggers: usize,
    },
}

impl fmt::Display for Skipped {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Skipped::VesselWithoutImei { vessel } => {
                write!(f, "vessel '{}' has no IMEI", vessel)
            }
            Skipped::VesselWithoutName { imei } => {
                write!(f, "vessel with IMEI {} has no name", imei)
            }
            Skipped::MessageTypeWithoutName { vessel } => {
                write!(f, "vessel '{}' declares a message type without a name", vessel)
            }
            Skipped::UnknownMessageType {
                vessel,
                message_type,
                triggers,
            } => write!(
                f,
                "{} alert trigger(s) of vessel '{}': message type '{}' not found",
                triggers, vessel, message_type
            ),
        }
    }
}

fn skip(skipped: &mut Vec<Skipped>, entry: Skipped) {
    warn!("Skipping {}", entry);
    skipped.push(entry);
}

/// Message type name to row id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageTypeIds(HashMap<String, i32>);

impl MessageTypeIds {
    pub fn get(&self, name: &str) -> Option<i32> {
        self.0.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, i32)> for MessageTypeIds {
    fn from_iter<I: IntoIterator<Item = (String, i32)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Vessel row ids produced by the vessel stage.
///
/// `entries` is aligned with `Snapshot::vessels` and holds an id only for
/// entries that were upserted and carry a name. Geofences and rules attach
/// through it, so an entry that was skipped never resolves to another
/// vessel that happens to share its name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VesselIds {
    by_name: HashMap<String, i32>,
    entries: Vec<Option<i32>>,
    upserted: usize,
}

impl VesselIds {
    /// Row id by vessel name. When two vessels share a name the later one wins.
    pub fn get(&self, name: &str) -> Option<i32> {
        self.by_name.get(name).copied()
    }

    /// Row id for the snapshot entry at `index`.
    pub fn for_entry(&self, index: usize) -> Option<i32> {
        self.entries.get(index).copied().flatten()
    }

    /// Number of vessel upserts issued.
    pub fn upserted(&self) -> usize {
        self.upserted
    }
}

/// Upsert one row per distinct message type name, first definition wins.
pub async fn migrate_message_types<W: TargetWriter + ?Sized>(
    writer: &mut W,
    snapshot: &Snapshot,
    skipped: &mut Vec<Skipped>,
) -> Result<MessageTypeIds> {
    let mut seen = HashSet::new();
    let mut unique: Vec<(&str, &MessageTypeRecord)> = Vec::new();

    for vessel in &snapshot.vessels {
        for message_type in &vessel.message_types {
            match message_type.name.as_deref().filter(|n| !n.is_empty()) {
                Some(name) => {
                    if seen.insert(name) {
                        unique.push((name, message_type));
                    }
                }
                None => skip(
                    skipped,
                    Skipped::MessageTypeWithoutName {
                        vessel: vessel.label().to_string(),
                    },
                ),
            }
        }
    }

    let mut ids = HashMap::with_capacity(unique.len());
    for (name, record) in unique {
        let id = writer.upsert_message_type(name, record).await?;
        debug!("Message type '{}' -> id {}", name, id);
        ids.insert(name.to_string(), id);
    }

    info!("Migrated {} message types", ids.len());
    Ok(MessageTypeIds(ids))
}

/// Upsert every vessel keyed by IMEI.
pub async fn migrate_vessels<W: TargetWriter + ?Sized>(
    writer: &mut W,
    snapshot: &Snapshot,
    skipped: &mut Vec<Skipped>,
) -> Result<VesselIds> {
    let mut ids = VesselIds {
        entries: Vec::with_capacity(snapshot.vessels.len()),
        ..VesselIds::default()
    };

    for vessel in &snapshot.vessels {
        let Some(imei) = vessel.imei.as_deref().filter(|i| !i.is_empty()) else {
            skip(
                skipped,
                Skipped::VesselWithoutImei {
                    vessel: vessel.label().to_string(),
                },
            );
            ids.entries.push(None);
            continue;
        };

        let id = writer.upsert_vessel(imei, vessel).await?;
        ids.upserted += 1;
        debug!("Vessel '{}' ({}) -> id {}", vessel.label(), imei, id);

        match vessel.name.as_deref() {
            Some(name) => {
                ids.by_name.insert(name.to_string(), id);
                ids.entries.push(Some(id));
            }
            None => {
                skip(
                    skipped,
                    Skipped::VesselWithoutName {
                        imei: imei.to_string(),
                    },
                );
                ids.entries.push(None);
            }
        }
    }

    info!("Migrated {} vessels", ids.upserted);
    Ok(ids)
}

/// Replace the geofences of every resolvable vessel. Returns rows inserted.
pub async fn migrate_geofences<W: TargetWriter + ?Sized>(
    writer: &mut W,
    snapshot: &Snapshot,
    vessels: &VesselIds,
) -> Result<usize> {
    let mut inserted = 0;

    for (index, vessel) in snapshot.vessels.iter().enumerate() {
        // Unresolvable entries were already reported by the vessel stage.
        let Some(vessel_id) = vessels.for_entry(index) else {
            continue;
        };
        let name = vessel.label();

        let removed = writer.delete_geofences(vessel_id).await?;
        for row in vessel.geofences.rows() {
            writer.insert_geofence(vessel_id, &row).await?;
            inserted += 1;
        }
        debug!(
            "Vessel '{}': replaced {} geofences with {}",
            name,
            removed,
            vessel.geofences.len()
        );
    }

    info!("Migrated {} geofences", inserted);
    Ok(inserted)
}

/// Replace the alert rules of every resolvable vessel. Returns rows inserted.
pub async fn migrate_alert_rules<W: TargetWriter + ?Sized>(
    writer: &mut W,
    snapshot: &Snapshot,
    vessels: &VesselIds,
    message_types: &MessageTypeIds,
    skipped: &mut Vec<Skipped>,
) -> Result<usize> {
    let mut inserted = 0;

    for (index, vessel) in snapshot.vessels.iter().enumerate() {
        let Some(vessel_id) = vessels.for_entry(index) else {
            continue;
        };
        let name = vessel.label();

        writer.delete_alert_rules(vessel_id).await?;

        for message_type in &vessel.message_types {
            // Nameless message types were already reported by their stage.
            let Some(type_name) = message_type.name.as_deref().filter(|n| !n.is_empty()) else {
                continue;
            };
            let Some(message_type_id) = message_types.get(type_name) else {
                skip(
                    skipped,
                    Skipped::UnknownMessageType {
                        vessel: name.to_string(),
                        message_type: type_name.to_string(),
                        triggers: message_type.triggers.len(),
                    },
                );
                continue;
            };

            for trigger in &message_type.triggers {
                writer
                    .insert_alert_rule(vessel_id, message_type_id, trigger)
                    .await?;
                inserted += 1;
            }
        }
    }

    info!("Migrated {} alert rules", inserted);
    Ok(inserted)
}

/// Write the snapshot's `last_updated`, or now when the snapshot has none.
pub async fn update_metadata<W: TargetWriter + ?Sized>(
    writer: &mut W,
    snapshot: &Snapshot,
) -> Result<DateTime<Utc>> {
    let last_updated = snapshot.last_updated.unwrap_or_else(Utc::now);
    writer.upsert_metadata(last_updated).await?;
    info!("Updated system metadata (last_updated {})", last_updated);
    Ok(last_updated)
}

/// Counts produced by one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineStats {
    pub message_types: usize,
    pub vessels: usize,
    pub geofences: usize,
    pub alert_rules: usize,
    pub last_updated: DateTime<Utc>,
    pub skipped: Vec<Skipped>,
}

fn in_stage(stage: Stage) -> impl FnOnce(MigrateError) -> MigrateError {
    move |e| match e {
        MigrateError::Migration { .. } => e,
        other => MigrateError::migration(stage.as_str(), other.to_string()),
    }
}

/// Run all five stages in order.
pub async fn run_pipeline<W: TargetWriter + ?Sized>(
    writer: &mut W,
    snapshot: &Snapshot,
) -> Result<PipelineStats> {
    let mut skipped = Vec::new();
    info!(
        "Migrating {} vessels into {} target",
        snapshot.vessels.len(),
        writer.backend_type()
    );

    let message_types = migrate_message_types(writer, snapshot, &mut skipped)
        .await
        .map_err(in_stage(Stage::MessageTypes))?;
    let vessels = migrate_vessels(writer, snapshot, &mut skipped)
        .await
        .map_err(in_stage(Stage::Vessels))?;
    let geofences = migrate_geofences(writer, snapshot, &vessels)
        .await
        .map_err(in_stage(Stage::Geofences))?;
    let alert_rules = migrate_alert_rules(writer, snapshot, &vessels, &message_types, &mut skipped)
        .await
        .map_err(in_stage(Stage::AlertRules))?;
    let last_updated = update_metadata(writer, snapshot)
        .await
        .map_err(in_stage(Stage::Metadata))?;

    if !skipped.is_empty() {
        warn!("{} snapshot entries were skipped", skipped.len());
    }

    Ok(PipelineStats {
        message_types: message_types.len(),
        vessels: vessels.upserted(),
        geofences,
        alert_rules,
        last_updated,
        skipped,
    })
}
