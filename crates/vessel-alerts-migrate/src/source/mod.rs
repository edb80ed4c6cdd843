//! Snapshot loading and normalization.
//!
//! The snapshot is read in full and parsed before any database work starts.
//! A missing file or a document that does not match the expected shape is
//! fatal; there is no partial load.
//!
//! Normalization pairs every geofence with its mute flag here, so the
//! positional `mute_info` lists are consumed exactly once and nothing
//! downstream indexes into parallel sequences.

mod raw;
mod types;

pub use types::*;

use crate::error::{MigrateError, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use raw::{RawAlertTrigger, RawDocument, RawGeofences, RawMessageType, RawMute, RawPlatform};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::info;

/// Knobs applied while normalizing a snapshot.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotOptions {
    /// Radius for keep-out points that do not declare one.
    pub default_radius_meters: u32,
}

impl Default for SnapshotOptions {
    fn default() -> Self {
        Self {
            default_radius_meters: 1000,
        }
    }
}

impl From<&crate::config::MigrationConfig> for SnapshotOptions {
    fn from(config: &crate::config::MigrationConfig) -> Self {
        Self {
            default_radius_meters: config.default_radius_meters,
        }
    }
}

/// Load and normalize a snapshot file.
pub fn load_snapshot<P: AsRef<Path>>(path: P, options: SnapshotOptions) -> Result<Snapshot> {
    let path = path.as_ref();
    info!("Loading snapshot from {:?}", path);

    let bytes = std::fs::read(path)?;
    let snapshot = Snapshot::from_slice(&bytes, options)
        .map_err(|message| MigrateError::input(path.display().to_string(), message))?;

    info!(
        "Loaded {} vessels from snapshot (sha256 {})",
        snapshot.vessels.len(),
        &snapshot.digest[..12]
    );
    Ok(snapshot)
}

impl Snapshot {
    /// Parse a snapshot held in memory.
    pub fn from_json_str(json: &str, options: SnapshotOptions) -> Result<Self> {
        Self::from_slice(json.as_bytes(), options)
            .map_err(|message| MigrateError::input("<memory>", message))
    }

    fn from_slice(bytes: &[u8], options: SnapshotOptions) -> std::result::Result<Self, String> {
        let document: RawDocument = serde_json::from_slice(bytes).map_err(|e| e.to_string())?;

        let last_updated = document
            .last_updated
            .as_deref()
            .map(parse_timestamp)
            .transpose()?;

        let vessels = document
            .platforms
            .unwrap_or_default()
            .into_iter()
            .map(|p| normalize_platform(p, options))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Self {
            vessels,
            last_updated,
            digest: hex::encode(Sha256::digest(bytes)),
        })
    }
}

/// Accepts RFC 3339 or a naive ISO-8601 timestamp (taken as UTC).
fn parse_timestamp(raw: &str) -> std::result::Result<DateTime<Utc>, String> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc());
        }
    }
    Err(format!("last_updated is not an ISO-8601 timestamp: '{}'", raw))
}

fn normalize_platform(
    platform: RawPlatform,
    options: SnapshotOptions,
) -> std::result::Result<VesselRecord, String> {
    // An empty position object counts as no position.
    let latest_position = platform
        .latest_position
        .filter(|pos| !pos.is_empty())
        .map(|pos| Position {
            latitude: pos.get("latitude").cloned().unwrap_or(Value::Null),
            longitude: pos.get("longitude").cloned().unwrap_or(Value::Null),
            timestamp: pos.get("timestamp").cloned().unwrap_or(Value::Null),
        });

    let defaults = EmergencyPolicy::default();
    let emergency = platform
        .emergency_alert_status
        .map(|status| EmergencyPolicy {
            is_active: status.is_active.unwrap_or(defaults.is_active),
            escalation_threshold: status
                .n_repeats_until_escalation
                .unwrap_or(defaults.escalation_threshold),
            repeat_interval_mins: status
                .repeat_interval_mins
                .unwrap_or(defaults.repeat_interval_mins),
        })
        .unwrap_or(defaults);

    let message_types = platform
        .message_types
        .unwrap_or_default()
        .into_iter()
        .map(normalize_message_type)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| {
            format!(
                "vessel '{}': {}",
                platform.name.as_deref().unwrap_or("<unnamed>"),
                e
            )
        })?;

    Ok(VesselRecord {
        name: platform.name,
        imei: platform.imei.map(|imei| imei.into_string()),
        at_sea: platform.at_sea_status.unwrap_or(true),
        latest_position,
        emergency,
        geofences: platform
            .geofences
            .map(|g| normalize_geofences(g, options))
            .unwrap_or_default(),
        message_types,
    })
}

fn normalize_geofences(geofences: RawGeofences, options: SnapshotOptions) -> GeofenceSet {
    let mute_info = geofences.mute_info.unwrap_or_default();
    let zone_mutes = mute_info.keep_out.unwrap_or_default();
    let point_mutes = mute_info.keep_out_points.unwrap_or_default();

    let keep_in = geofences
        .keep_in_zone
        .filter(|ring| !ring.is_empty())
        .map(|ring| Muted {
            item: ring,
            muted: mute_info
                .keep_in
                .and_then(|m| m.is_muted)
                .unwrap_or(false),
        });

    let keep_out_zones = geofences
        .keep_out_zones
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(i, zone)| Muted {
            item: KeepOutZone {
                name: zone
                    .name
                    .unwrap_or_else(|| format!("Keep-out Zone {}", i + 1)),
                coordinates: zone.coordinates.unwrap_or_default(),
            },
            muted: RawMute::flag(zone_mutes.get(i)),
        })
        .collect();

    let keep_out_points = geofences
        .keep_out_points
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(i, point)| Muted {
            item: KeepOutPoint {
                name: point
                    .name
                    .unwrap_or_else(|| format!("Keep-out Point {}", i + 1)),
                lat: point.lat.unwrap_or(Value::Null),
                lon: point.lon.unwrap_or(Value::Null),
                radius_meters: point
                    .radius
                    .filter(|r| !r.is_null())
                    .unwrap_or_else(|| Value::from(options.default_radius_meters)),
            },
            muted: RawMute::flag(point_mutes.get(i)),
        })
        .collect();

    GeofenceSet {
        keep_in,
        keep_out_zones,
        keep_out_points,
    }
}

fn normalize_message_type(
    msg_type: RawMessageType,
) -> std::result::Result<MessageTypeRecord, String> {
    let triggers = msg_type
        .alert_triggers
        .unwrap_or_default()
        .into_iter()
        .map(normalize_trigger)
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(MessageTypeRecord {
        name: msg_type.name,
        schema_path: msg_type.decoding_schema_path.unwrap_or_default(),
        expected_interval_mins: msg_type.acceptable_time_between_messages.unwrap_or(30),
        late_threshold_mins: msg_type.acceptable_late_time_mins.unwrap_or(30),
        triggers,
    })
}

fn normalize_trigger(trigger: RawAlertTrigger) -> std::result::Result<AlertTrigger, String> {
    let threshold = trigger
        .value_threshold
        .map(parse_threshold)
        .transpose()
        .map_err(|e| {
            format!(
                "alert trigger '{}': {}",
                trigger.name.as_deref().unwrap_or("<unnamed>"),
                e
            )
        })?
        .flatten();
    let consecutivity = ConsecutivityPolicy::default();
    let time_window = TimeWindowPolicy::default();

    Ok(AlertTrigger {
        name: trigger.name,
        field: trigger.field,
        comparator: trigger.comparator,
        threshold,
        consecutivity: ConsecutivityPolicy {
            enabled: trigger.consecutivity_enabled.unwrap_or(consecutivity.enabled),
            count: trigger.consecutivity_trigger_count.unwrap_or(consecutivity.count),
        },
        time_window: TimeWindowPolicy {
            enabled: trigger.time_enabled.unwrap_or(time_window.enabled),
            window_mins: trigger
                .time_trigger_period_mins
                .unwrap_or(time_window.window_mins),
            count: trigger.time_trigger_count.unwrap_or(time_window.count),
        },
        muted: trigger.is_muted.unwrap_or(false),
    })
}

/// Thresholds are numeric; numeric strings are accepted as well.
fn parse_threshold(value: Value) -> std::result::Result<Option<f64>, String> {
    let parsed = match &value {
        Value::Null => return Ok(None),
        Value::Number(n) => n.as_f64(),
        Value::String(s) if s.trim().is_empty() => return Ok(None),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|t| t.is_finite())
        .map(Some)
        .ok_or_else(|| format!("value_threshold is not a number: {}", value))
}
