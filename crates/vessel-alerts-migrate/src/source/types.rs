//! Normalized snapshot records consumed by the migration pipeline.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// A loaded and normalized snapshot document.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Vessels ("platforms") in document order.
    pub vessels: Vec<VesselRecord>,

    /// Top-level `last_updated` of the document, if present.
    pub last_updated: Option<DateTime<Utc>>,

    /// Hex SHA-256 of the raw document bytes.
    pub digest: String,
}

/// One vessel entry from the snapshot.
#[derive(Debug, Clone)]
pub struct VesselRecord {
    pub name: Option<String>,
    pub imei: Option<String>,
    pub at_sea: bool,
    pub latest_position: Option<Position>,
    pub emergency: EmergencyPolicy,
    pub geofences: GeofenceSet,
    pub message_types: Vec<MessageTypeRecord>,
}

impl VesselRecord {
    /// Label for log lines.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("<unnamed>")
    }
}

/// Last reported position, passed through verbatim.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Position {
    pub latitude: Value,
    pub longitude: Value,
    pub timestamp: Value,
}

/// Emergency alert settings of a vessel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmergencyPolicy {
    pub is_active: bool,
    pub escalation_threshold: i32,
    pub repeat_interval_mins: i32,
}

impl Default for EmergencyPolicy {
    fn default() -> Self {
        Self {
            is_active: false,
            escalation_threshold: 3,
            repeat_interval_mins: 5,
        }
    }
}

/// A geofence paired with its mute flag.
#[derive(Debug, Clone, PartialEq)]
pub struct Muted<T> {
    pub item: T,
    pub muted: bool,
}

/// Named polygon the vessel must stay out of.
#[derive(Debug, Clone, PartialEq)]
pub struct KeepOutZone {
    pub name: String,
    pub coordinates: Vec<Value>,
}

/// Named circular region the vessel must stay out of.
#[derive(Debug, Clone, PartialEq)]
pub struct KeepOutPoint {
    pub name: String,
    pub lat: Value,
    pub lon: Value,
    pub radius_meters: Value,
}

/// All geofences declared for one vessel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeofenceSet {
    /// Coordinate ring of the keep-in zone.
    pub keep_in: Option<Muted<Vec<Value>>>,
    pub keep_out_zones: Vec<Muted<KeepOutZone>>,
    pub keep_out_points: Vec<Muted<KeepOutPoint>>,
}

impl GeofenceSet {
    /// Rows to insert, keep-in first, then zones, then points.
    pub fn rows(&self) -> Vec<GeofenceRow> {
        let mut rows = Vec::with_capacity(self.len());

        if let Some(keep_in) = &self.keep_in {
            rows.push(GeofenceRow {
                kind: GeofenceKind::KeepIn,
                geometry: Geometry::Polygon {
                    coordinates: vec![keep_in.item.clone()],
                    name: None,
                },
                muted: keep_in.muted,
            });
        }

        for zone in &self.keep_out_zones {
            rows.push(GeofenceRow {
                kind: GeofenceKind::KeepOutZone,
                geometry: Geometry::Polygon {
                    coordinates: vec![zone.item.coordinates.clone()],
                    name: Some(zone.item.name.clone()),
                },
                muted: zone.muted,
            });
        }

        for point in &self.keep_out_points {
            rows.push(GeofenceRow {
                kind: GeofenceKind::KeepOutPoint,
                geometry: Geometry::Point {
                    coordinates: [point.item.lat.clone(), point.item.lon.clone()],
                    radius_meters: point.item.radius_meters.clone(),
                    name: point.item.name.clone(),
                },
                muted: point.muted,
            });
        }

        rows
    }

    pub fn len(&self) -> usize {
        usize::from(self.keep_in.is_some()) + self.keep_out_zones.len() + self.keep_out_points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Stored `geofence_type` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeofenceKind {
    KeepIn,
    KeepOutZone,
    KeepOutPoint,
}

impl GeofenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeofenceKind::KeepIn => "keep_in",
            GeofenceKind::KeepOutZone => "keep_out_zone",
            GeofenceKind::KeepOutPoint => "keep_out_point",
        }
    }
}

/// GeoJSON-like geometry stored in the `geometry` JSONB column.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Polygon {
        coordinates: Vec<Vec<Value>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    Point {
        coordinates: [Value; 2],
        radius_meters: Value,
        name: String,
    },
}

/// A geofence row ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct GeofenceRow {
    pub kind: GeofenceKind,
    pub geometry: Geometry,
    pub muted: bool,
}

/// A message type declared on a vessel, with its alert triggers.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageTypeRecord {
    pub name: Option<String>,
    pub schema_path: String,
    pub expected_interval_mins: i32,
    pub late_threshold_mins: i32,
    pub triggers: Vec<AlertTrigger>,
}

/// Fire after `count` consecutive matching messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsecutivityPolicy {
    pub enabled: bool,
    pub count: i32,
}

impl Default for ConsecutivityPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            count: 3,
        }
    }
}

/// Fire after `count` matching messages within `window_mins`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindowPolicy {
    pub enabled: bool,
    pub window_mins: i32,
    pub count: i32,
}

impl Default for TimeWindowPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            window_mins: 0,
            count: 100,
        }
    }
}

/// A threshold rule on one telemetry field.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertTrigger {
    pub name: Option<String>,
    pub field: Option<String>,
    pub comparator: Option<String>,
    pub threshold: Option<f64>,
    pub consecutivity: ConsecutivityPolicy,
    pub time_window: TimeWindowPolicy,
    pub muted: bool,
}
