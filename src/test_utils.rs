//! Shared test utilities for storekey.
//!
//! This module provides common helper functions for setting up test databases
//! and seeding merchants, subscriptions, and activation keys with sensible
//! defaults.

use crate::{
    core::keys,
    entities,
    entities::{
        activation_key::KeyStatus, merchant::MerchantStatus, subscription::SubscriptionStatus,
    },
    errors::{Error, Result},
};
use chrono::{Duration, Utc};
use sea_orm::{DatabaseConnection, DbErr, Set, prelude::*};

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates a test merchant with sensible defaults.
///
/// # Arguments
/// * `db` - Database connection
/// * `name` - Store name
///
/// # Defaults
/// * `email`: derived from the store name
/// * `status`: ACTIVE
pub async fn create_test_merchant(
    db: &DatabaseConnection,
    name: &str,
) -> Result<entities::merchant::Model> {
    entities::merchant::ActiveModel {
        name: Set(name.to_string()),
        email: Set(format!(
            "{}@example.com",
            name.to_lowercase().replace(' ', ".")
        )),
        status: Set(MerchantStatus::Active),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Creates a test subscription with sensible defaults.
///
/// # Arguments
/// * `db` - Database connection
/// * `merchant_id` - Owning merchant ID
///
/// # Defaults
/// * `plan_type`: "starter"
/// * `billing_cycle`: "monthly"
/// * `status`: ACTIVE
/// * period: started 7 days ago, ends 30 days from now
pub async fn create_test_subscription(
    db: &DatabaseConnection,
    merchant_id: i64,
) -> Result<entities::subscription::Model> {
    let now = Utc::now();
    create_test_subscription_with_period(
        db,
        merchant_id,
        now - Duration::days(7),
        now + Duration::days(30),
    )
    .await
}

/// Creates a test subscription with a custom billing period.
/// Use this to place a merchant before, inside, or past the grace window.
pub async fn create_test_subscription_with_period(
    db: &DatabaseConnection,
    merchant_id: i64,
    period_start: DateTimeUtc,
    period_end: DateTimeUtc,
) -> Result<entities::subscription::Model> {
    entities::subscription::ActiveModel {
        merchant_id: Set(merchant_id),
        plan_type: Set("starter".to_string()),
        billing_cycle: Set("monthly".to_string()),
        status: Set(SubscriptionStatus::Active),
        period_start: Set(period_start),
        period_end: Set(period_end),
        last_payment_date: Set(Some(period_start)),
        next_payment_date: Set(Some(period_end)),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Creates a merchant with an ACTIVE subscription over the given period and
/// issues its activation key. The key expires with the period, so a period
/// in the past produces an already-lapsed license.
pub async fn create_licensed_merchant_with_period(
    db: &DatabaseConnection,
    name: &str,
    period_start: DateTimeUtc,
    period_end: DateTimeUtc,
) -> Result<(
    entities::merchant::Model,
    entities::subscription::Model,
    entities::activation_key::Model,
)> {
    let merchant = create_test_merchant(db, name).await?;
    let subscription =
        create_test_subscription_with_period(db, merchant.id, period_start, period_end).await?;
    let key = keys::create(db, merchant.id, None).await?;
    Ok((merchant, subscription, key))
}

/// Fetches the current subscription row for a merchant.
pub async fn current_subscription(
    db: &DatabaseConnection,
    merchant_id: i64,
) -> Result<entities::subscription::Model> {
    entities::Subscription::find()
        .filter(entities::SubscriptionColumn::MerchantId.eq(merchant_id))
        .one(db)
        .await?
        .ok_or(Error::NoSubscription { merchant_id })
}

/// Fetches the current merchant row.
pub async fn current_merchant(
    db: &DatabaseConnection,
    merchant_id: i64,
) -> Result<entities::merchant::Model> {
    entities::Merchant::find_by_id(merchant_id)
        .one(db)
        .await?
        .ok_or(Error::MerchantNotFound { merchant_id })
}

/// Fetches an activation key row by ID.
pub async fn current_key(
    db: &DatabaseConnection,
    key_id: i64,
) -> Result<entities::activation_key::Model> {
    entities::ActivationKey::find_by_id(key_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::from(DbErr::RecordNotFound(format!("activation key {key_id}"))))
}

/// Overwrites a key's status directly, bypassing the transition rules.
/// Use this to stage states the public operations would not produce.
pub async fn set_key_status(
    db: &DatabaseConnection,
    key_id: i64,
    status: KeyStatus,
) -> Result<()> {
    let mut key: entities::activation_key::ActiveModel = current_key(db, key_id).await?.into();
    key.status = Set(status);
    key.update(db).await?;
    Ok(())
}

/// Moves a subscription's period end, simulating the payment webhook that
/// extends a billing period. Status is left for the state machine to settle.
pub async fn extend_subscription(
    db: &DatabaseConnection,
    merchant_id: i64,
    new_period_end: DateTimeUtc,
) -> Result<()> {
    let mut subscription: entities::subscription::ActiveModel =
        current_subscription(db, merchant_id).await?.into();
    subscription.period_end = Set(new_period_end);
    subscription.next_payment_date = Set(Some(new_period_end));
    subscription.update(db).await?;
    Ok(())
}

/// Deletes a merchant row out from under its dependent rows, staging the
/// integrity failure the sweep and delivery paths have to survive. The
/// schema's foreign keys would reject the delete, so enforcement is toggled
/// off around it.
pub async fn delete_merchant_row(db: &DatabaseConnection, merchant_id: i64) -> Result<()> {
    db.execute_unprepared("PRAGMA foreign_keys = OFF").await?;
    let deleted = entities::Merchant::delete_by_id(merchant_id).exec(db).await;
    db.execute_unprepared("PRAGMA foreign_keys = ON").await?;
    deleted?;
    Ok(())
}

/// Sets up a complete test environment with one licensed merchant.
/// Returns (db, merchant, subscription, key) for common test scenarios.
pub async fn setup_licensed_merchant() -> Result<(
    DatabaseConnection,
    entities::merchant::Model,
    entities::subscription::Model,
    entities::activation_key::Model,
)> {
    let now = Utc::now();
    setup_licensed_merchant_with_period(now - Duration::days(7), now + Duration::days(30)).await
}

/// Sets up a complete test environment with one licensed merchant whose
/// subscription covers the given period.
pub async fn setup_licensed_merchant_with_period(
    period_start: DateTimeUtc,
    period_end: DateTimeUtc,
) -> Result<(
    DatabaseConnection,
    entities::merchant::Model,
    entities::subscription::Model,
    entities::activation_key::Model,
)> {
    let db = setup_test_db().await?;
    let (merchant, subscription, key) =
        create_licensed_merchant_with_period(&db, "Test Store", period_start, period_end).await?;
    Ok((db, merchant, subscription, key))
}
