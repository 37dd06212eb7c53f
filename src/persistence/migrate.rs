//! Startup schema migration.
//!
//! Creates every table and the uniqueness/geospatial indexes the data
//! model depends on. Runs once at boot; any failure aborts startup with
//! a non-zero exit.

use sqlx::PgPool;

use crate::error::GatewayError;

const STATEMENTS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS profiles ( \
        id UUID PRIMARY KEY, \
        account_number TEXT NOT NULL, \
        api_token TEXT NOT NULL, \
        metadata JSONB NOT NULL DEFAULT '{}'::jsonb, \
        latitude DOUBLE PRECISION, \
        longitude DOUBLE PRECISION, \
        timezone TEXT NOT NULL DEFAULT '', \
        score_coefficient JSONB, \
        individual_metric JSONB NOT NULL DEFAULT '{}'::jsonb, \
        metric JSONB NOT NULL DEFAULT '{}'::jsonb, \
        points_of_interest JSONB NOT NULL DEFAULT '[]'::jsonb, \
        last_nudge JSONB NOT NULL DEFAULT '{}'::jsonb \
    )",
    "CREATE UNIQUE INDEX IF NOT EXISTS profiles_account_number_idx \
        ON profiles (account_number)",
    "CREATE UNIQUE INDEX IF NOT EXISTS profiles_api_token_idx ON profiles (api_token)",
    "CREATE INDEX IF NOT EXISTS profiles_location_idx ON profiles (latitude, longitude)",
    "CREATE INDEX IF NOT EXISTS profiles_poi_idx ON profiles USING GIN (points_of_interest)",
    //
    "CREATE TABLE IF NOT EXISTS poi ( \
        id UUID PRIMARY KEY, \
        longitude DOUBLE PRECISION NOT NULL, \
        latitude DOUBLE PRECISION NOT NULL, \
        address TEXT NOT NULL DEFAULT '', \
        alias TEXT NOT NULL DEFAULT '', \
        country TEXT NOT NULL DEFAULT '', \
        state TEXT NOT NULL DEFAULT '', \
        county TEXT NOT NULL DEFAULT '', \
        place_type TEXT NOT NULL DEFAULT '', \
        autonomy_score DOUBLE PRECISION NOT NULL DEFAULT 0, \
        autonomy_score_delta DOUBLE PRECISION NOT NULL DEFAULT 0, \
        metric JSONB NOT NULL DEFAULT '{}'::jsonb, \
        resource_ratings JSONB NOT NULL DEFAULT '{}'::jsonb, \
        resources JSONB NOT NULL DEFAULT '[]'::jsonb, \
        rating_version BIGINT NOT NULL DEFAULT 0 \
    )",
    "CREATE UNIQUE INDEX IF NOT EXISTS poi_coordinates_idx ON poi (longitude, latitude)",
    "CREATE INDEX IF NOT EXISTS poi_location_idx ON poi (latitude, longitude)",
    //
    "CREATE TABLE IF NOT EXISTS symptom_reports ( \
        id BIGSERIAL PRIMARY KEY, \
        profile_id TEXT NOT NULL, \
        account_number TEXT NOT NULL, \
        official_symptoms JSONB NOT NULL DEFAULT '[]'::jsonb, \
        customized_symptoms JSONB NOT NULL DEFAULT '[]'::jsonb, \
        longitude DOUBLE PRECISION NOT NULL, \
        latitude DOUBLE PRECISION NOT NULL, \
        ts BIGINT NOT NULL \
    )",
    "CREATE UNIQUE INDEX IF NOT EXISTS symptom_reports_profile_ts_idx \
        ON symptom_reports (profile_id, ts)",
    "CREATE INDEX IF NOT EXISTS symptom_reports_location_idx \
        ON symptom_reports (latitude, longitude)",
    "CREATE INDEX IF NOT EXISTS symptom_reports_ts_idx ON symptom_reports (ts)",
    //
    "CREATE TABLE IF NOT EXISTS behavior_reports ( \
        id BIGSERIAL PRIMARY KEY, \
        profile_id TEXT NOT NULL, \
        account_number TEXT NOT NULL, \
        official_behaviors JSONB NOT NULL DEFAULT '[]'::jsonb, \
        customized_behaviors JSONB NOT NULL DEFAULT '[]'::jsonb, \
        longitude DOUBLE PRECISION NOT NULL, \
        latitude DOUBLE PRECISION NOT NULL, \
        ts BIGINT NOT NULL \
    )",
    "CREATE UNIQUE INDEX IF NOT EXISTS behavior_reports_profile_ts_idx \
        ON behavior_reports (profile_id, ts)",
    "CREATE INDEX IF NOT EXISTS behavior_reports_location_idx \
        ON behavior_reports (latitude, longitude)",
    "CREATE INDEX IF NOT EXISTS behavior_reports_ts_idx ON behavior_reports (ts)",
    //
    "CREATE TABLE IF NOT EXISTS symptoms ( \
        id TEXT PRIMARY KEY, \
        name TEXT NOT NULL, \
        descr TEXT NOT NULL DEFAULT '', \
        source TEXT NOT NULL DEFAULT 'customized' \
    )",
    "CREATE INDEX IF NOT EXISTS symptoms_source_idx ON symptoms (source)",
    "CREATE TABLE IF NOT EXISTS behaviors ( \
        id TEXT PRIMARY KEY, \
        name TEXT NOT NULL, \
        descr TEXT NOT NULL DEFAULT '', \
        source TEXT NOT NULL DEFAULT 'customized' \
    )",
    "CREATE INDEX IF NOT EXISTS behaviors_source_idx ON behaviors (source)",
    //
    "CREATE TABLE IF NOT EXISTS confirm_cds ( \
        id BIGSERIAL PRIMARY KEY, \
        name TEXT NOT NULL, \
        country TEXT NOT NULL DEFAULT '', \
        state TEXT NOT NULL DEFAULT '', \
        county TEXT NOT NULL DEFAULT '', \
        cases DOUBLE PRECISION NOT NULL DEFAULT 0, \
        active DOUBLE PRECISION NOT NULL DEFAULT 0, \
        report_ts BIGINT NOT NULL \
    )",
    "CREATE UNIQUE INDEX IF NOT EXISTS confirm_cds_name_ts_idx \
        ON confirm_cds (name, report_ts)",
    "CREATE INDEX IF NOT EXISTS confirm_cds_region_idx \
        ON confirm_cds (country, state, county, report_ts)",
    //
    "CREATE TABLE IF NOT EXISTS score_history ( \
        owner TEXT NOT NULL, \
        type TEXT NOT NULL, \
        date TEXT NOT NULL, \
        score DOUBLE PRECISION NOT NULL DEFAULT 0, \
        update_times DOUBLE PRECISION NOT NULL DEFAULT 0, \
        ts BIGINT NOT NULL DEFAULT 0, \
        PRIMARY KEY (owner, type, date) \
    )",
    //
    "CREATE TABLE IF NOT EXISTS help_requests ( \
        id UUID PRIMARY KEY, \
        requester TEXT NOT NULL, \
        subject TEXT NOT NULL DEFAULT '', \
        needs TEXT NOT NULL DEFAULT '', \
        meeting_place TEXT NOT NULL DEFAULT '', \
        contact_info TEXT NOT NULL DEFAULT '', \
        state TEXT NOT NULL DEFAULT 'PENDING', \
        helper TEXT NOT NULL DEFAULT '', \
        created_at BIGINT NOT NULL \
    )",
    "CREATE INDEX IF NOT EXISTS help_requests_state_idx ON help_requests (state, created_at)",
];

/// Applies the schema, creating anything that does not yet exist.
///
/// # Errors
///
/// Returns the first DDL failure; the caller treats it as fatal.
pub async fn run(pool: &PgPool) -> Result<(), GatewayError> {
    for statement in STATEMENTS {
        sqlx::query(statement).execute(pool).await?;
    }
    tracing::info!(statements = STATEMENTS.len(), "schema migration complete");
    Ok(())
}
