//! Wire shape of the snapshot document.
//!
//! Every field is optional and `null` is treated the same as a missing key;
//! defaults are applied during normalization, not here.

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Default, Deserialize)]
pub(super) struct RawDocument {
    #[serde(default)]
    pub platforms: Option<Vec<RawPlatform>>,
    #[serde(default)]
    pub last_updated: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct RawPlatform {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub imei: Option<RawImei>,
    #[serde(default)]
    pub at_sea_status: Option<bool>,
    #[serde(default)]
    pub latest_position: Option<serde_json::Map<String, Value>>,
    #[serde(default)]
    pub emergency_alert_status: Option<RawEmergencyStatus>,
    #[serde(default)]
    pub geofences: Option<RawGeofences>,
    #[serde(default)]
    pub message_types: Option<Vec<RawMessageType>>,
}

/// IMEIs appear both quoted and as bare integers in exported snapshots.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(super) enum RawImei {
    Text(String),
    Number(serde_json::Number),
}

impl RawImei {
    pub fn into_string(self) -> String {
        match self {
            RawImei::Text(s) => s,
            RawImei::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct RawEmergencyStatus {
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub n_repeats_until_escalation: Option<i32>,
    #[serde(default)]
    pub repeat_interval_mins: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct RawGeofences {
    #[serde(default)]
    pub keep_in_zone: Option<Vec<Value>>,
    #[serde(default)]
    pub keep_out_zones: Option<Vec<RawKeepOutZone>>,
    #[serde(default)]
    pub keep_out_points: Option<Vec<RawKeepOutPoint>>,
    #[serde(default)]
    pub mute_info: Option<RawMuteInfo>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct RawKeepOutZone {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub coordinates: Option<Vec<Value>>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct RawKeepOutPoint {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub lat: Option<Value>,
    #[serde(default)]
    pub lon: Option<Value>,
    #[serde(default)]
    pub radius: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct RawMuteInfo {
    #[serde(default)]
    pub keep_in: Option<RawMute>,
    #[serde(default)]
    pub keep_out: Option<Vec<Option<RawMute>>>,
    #[serde(default)]
    pub keep_out_points: Option<Vec<Option<RawMute>>>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct RawMute {
    #[serde(default)]
    pub is_muted: Option<bool>,
}

impl RawMute {
    pub fn flag(mute: Option<&Option<RawMute>>) -> bool {
        mute.and_then(|m| m.as_ref())
            .and_then(|m| m.is_muted)
            .unwrap_or(false)
    }
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct RawMessageType {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub decoding_schema_path: Option<String>,
    #[serde(default)]
    pub acceptable_time_between_messages: Option<i32>,
    #[serde(default)]
    pub acceptable_late_time_mins: Option<i32>,
    #[serde(default)]
    pub alert_triggers: Option<Vec<RawAlertTrigger>>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct RawAlertTrigger {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub comparator: Option<String>,
    #[serde(default)]
    pub value_threshold: Option<Value>,
    #[serde(default)]
    pub consecutivity_enabled: Option<bool>,
    #[serde(default)]
    pub consecutivity_trigger_count: Option<i32>,
    #[serde(default)]
    pub time_enabled: Option<bool>,
    #[serde(default)]
    pub time_trigger_period_mins: Option<i32>,
    #[serde(default)]
    pub time_trigger_count: Option<i32>,
    #[serde(default)]
    pub is_muted: Option<bool>,
}
