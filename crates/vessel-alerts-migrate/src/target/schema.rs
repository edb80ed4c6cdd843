//! DDL for the target tables.

/// Quote a PostgreSQL identifier.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Fully qualify a table name.
pub(crate) fn qualify_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(table))
}

/// Idempotent DDL creating the schema and all five target tables.
pub fn schema_ddl(schema: &str) -> String {
    let message_types = qualify_table(schema, "message_types");
    let vessels = qualify_table(schema, "vessels");
    let geofences = qualify_table(schema, "geofences");
    let alert_rules = qualify_table(schema, "alert_rules");
    let system_metadata = qualify_table(schema, "system_metadata");

    format!(
        "CREATE SCHEMA IF NOT EXISTS {schema};

        CREATE TABLE IF NOT EXISTS {message_types} (
            id SERIAL PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            schema_path TEXT NOT NULL DEFAULT '',
            expected_interval_mins INTEGER NOT NULL DEFAULT 30,
            late_threshold_mins INTEGER NOT NULL DEFAULT 30,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        );

        CREATE TABLE IF NOT EXISTS {vessels} (
            id SERIAL PRIMARY KEY,
            name TEXT,
            imei TEXT NOT NULL UNIQUE,
            at_sea_status BOOLEAN NOT NULL DEFAULT TRUE,
            emergency_alert_active BOOLEAN NOT NULL DEFAULT FALSE,
            latest_position JSONB,
            escalation_threshold INTEGER NOT NULL DEFAULT 3,
            repeat_interval_mins INTEGER NOT NULL DEFAULT 5,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        );

        CREATE TABLE IF NOT EXISTS {geofences} (
            id SERIAL PRIMARY KEY,
            vessel_id INTEGER NOT NULL REFERENCES {vessels}(id) ON DELETE CASCADE,
            geofence_type TEXT NOT NULL
                CHECK (geofence_type IN ('keep_in', 'keep_out_zone', 'keep_out_point')),
            geometry JSONB NOT NULL,
            is_muted BOOLEAN NOT NULL DEFAULT FALSE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        );
        CREATE INDEX IF NOT EXISTS idx_geofences_vessel ON {geofences}(vessel_id);

        CREATE TABLE IF NOT EXISTS {alert_rules} (
            id SERIAL PRIMARY KEY,
            vessel_id INTEGER NOT NULL REFERENCES {vessels}(id) ON DELETE CASCADE,
            message_type_id INTEGER NOT NULL REFERENCES {message_types}(id),
            name TEXT,
            field_name TEXT,
            operator TEXT,
            threshold DOUBLE PRECISION,
            consecutivity_enabled BOOLEAN NOT NULL DEFAULT TRUE,
            consecutivity_count INTEGER NOT NULL DEFAULT 3,
            time_enabled BOOLEAN NOT NULL DEFAULT FALSE,
            time_window_mins INTEGER NOT NULL DEFAULT 0,
            time_count INTEGER NOT NULL DEFAULT 100,
            is_muted BOOLEAN NOT NULL DEFAULT FALSE,
            enabled BOOLEAN NOT NULL DEFAULT TRUE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        );
        CREATE INDEX IF NOT EXISTS idx_alert_rules_vessel ON {alert_rules}(vessel_id);

        CREATE TABLE IF NOT EXISTS {system_metadata} (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            last_updated TIMESTAMPTZ NOT NULL
        );",
        schema = quote_ident(schema),
    )
}
