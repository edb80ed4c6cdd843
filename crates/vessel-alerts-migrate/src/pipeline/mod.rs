//! Migration pipeline.
//!
//! The migration is five stages run in dependency order against one
//! [`TargetWriter`](crate::target::TargetWriter):
//!
//! 1. [`migrate_message_types`] returns [`MessageTypeIds`]
//! 2. [`migrate_vessels`] returns [`VesselIds`]
//! 3. [`migrate_geofences`] consumes `VesselIds`
//! 4. [`migrate_alert_rules`] consumes `VesselIds` and `MessageTypeIds`
//! 5. [`update_metadata`]
//!
//! Each stage takes the identifier maps it depends on as arguments, so a
//! stage cannot run before the one producing its inputs.
//!
//! Soft anomalies (a vessel without an IMEI, a rule under an unresolvable
//! message type) are logged, recorded as [`Skipped`] and do not stop the run.
//! Any writer error aborts the pipeline as [`MigrateError::Migration`]
//! naming the stage.
//!
//! [`MigrateError::Migration`]: crate::error::MigrateError::Migration

mod stages;


pub use stages::{
    migrate_alert_rules, migrate_geofences, migrate_message_types, migrate_vessels,
    run_pipeline, update_metadata, MessageTypeIds, PipelineStats, Skipped, Stage, VesselIds,
};
