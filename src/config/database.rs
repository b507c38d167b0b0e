//! Database configuration module for the licensing core.
//!
//! This module handles `SQLite` database connection and table creation using `SeaORM`.
//! It provides functions for establishing database connections and creating all necessary tables
//! based on the entity definitions. The module uses `SeaORM`'s `Schema::create_table_from_entity`
//! method to automatically generate SQL statements from the entity models, ensuring that the
//! database schema matches the Rust struct definitions without requiring manual SQL.

use crate::entities::{
    ActivationKey, KeyVerification, Merchant, Notification, Subscription, SweepRun,
};
use crate::errors::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Schema};
use std::time::Duration;

/// Storage-level backstop for the "at most one ACTIVE key per merchant"
/// invariant. Application code pre-checks before inserting, but only this
/// partial unique index closes the race between concurrent inserts.
const ACTIVE_KEY_INDEX: &str = "CREATE UNIQUE INDEX IF NOT EXISTS idx_activation_keys_one_active \
     ON activation_keys (merchant_id) WHERE status = 'ACTIVE'";

/// Audit lookups are always per-key, most recent first.
const VERIFICATION_INDEX: &str = "CREATE INDEX IF NOT EXISTS idx_key_verifications_key \
     ON key_verifications (key_id, verified_at)";

/// The 24h notification dedupe check filters on exactly these columns.
const NOTIFICATION_DEDUPE_INDEX: &str = "CREATE INDEX IF NOT EXISTS idx_notifications_dedupe \
     ON notifications (merchant_id, kind, title, created_at)";

/// Gets the database URL from environment variable or returns default `SQLite` path.
///
/// This function looks for `DATABASE_URL` in the environment and falls back to
/// a default local `SQLite` file if not found.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite://data/storekey.sqlite?mode=rwc".to_string())
}

/// Establishes a connection to the `SQLite` database using the `DATABASE_URL` environment variable.
///
/// Falls back to a default local `SQLite` file if no environment variable is set.
/// Connection and acquire timeouts are bounded so a wedged database surfaces
/// as a retryable error instead of blocking callers indefinitely.
pub async fn create_connection() -> Result<DatabaseConnection> {
    let mut options = ConnectOptions::new(get_database_url());
    options
        .connect_timeout(Duration::from_secs(5))
        .acquire_timeout(Duration::from_secs(5));

    Database::connect(options).await.map_err(Into::into)
}

/// Creates all necessary database tables using `SeaORM`'s schema generation from entity definitions.
///
/// This function uses the `DeriveEntityModel` macros to automatically generate proper SQL
/// statements for table creation, ensuring the database schema matches the Rust struct definitions.
/// Safe to call on every startup: tables and indexes are created only if missing.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    // Use SeaORM's proper table creation using Schema::create_table_from_entity
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let mut statements = vec![
        schema.create_table_from_entity(Merchant),
        schema.create_table_from_entity(Subscription),
        schema.create_table_from_entity(ActivationKey),
        schema.create_table_from_entity(KeyVerification),
        schema.create_table_from_entity(Notification),
        schema.create_table_from_entity(SweepRun),
    ];

    for statement in &mut statements {
        db.execute(builder.build(statement.if_not_exists())).await?;
    }

    // Schema generation covers tables and plain unique columns; the partial
    // index and the secondary lookup indexes need raw SQL.
    db.execute_unprepared(ACTIVE_KEY_INDEX).await?;
    db.execute_unprepared(VERIFICATION_INDEX).await?;
    db.execute_unprepared(NOTIFICATION_DEDUPE_INDEX).await?;

    Ok(())
}
