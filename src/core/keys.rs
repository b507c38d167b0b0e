//! Activation key business logic - Issuance, regeneration, and lookups.
//!
//! Keys require an existing subscription and inherit its period end as their
//! expiry. The table keeps every key a merchant ever held; regeneration
//! revokes the current key and issues a replacement inside one transaction,
//! guarded by a compare-and-swap on the old key's status so two concurrent
//! regenerations can never both leave an ACTIVE key behind. The partial
//! unique index on `activation_keys (merchant_id) WHERE status = 'ACTIVE'`
//! backstops the same invariant at the storage level.

use crate::{
    core::{audit, notify},
    entities::{
        ActivationKey, Subscription, activation_key,
        activation_key::KeyStatus,
        subscription,
    },
    errors::{Error, Result},
    keycodec,
};
use chrono::Utc;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};

/// Issues the first activation key for a merchant.
///
/// Fails with [`Error::NoSubscription`] when the merchant has no subscription
/// to bind the key to, and with [`Error::ActiveKeyExists`] when a usable key
/// is already out there; callers wanting a replacement use [`regenerate`].
pub async fn create(
    db: &DatabaseConnection,
    merchant_id: i64,
    notes: Option<String>,
) -> Result<activation_key::Model> {
    let subscription = find_subscription(db, merchant_id).await?;

    let existing = ActivationKey::find()
        .filter(activation_key::Column::MerchantId.eq(merchant_id))
        .filter(activation_key::Column::Status.eq(KeyStatus::Active))
        .one(db)
        .await?;
    if existing.is_some() {
        return Err(Error::ActiveKeyExists { merchant_id });
    }

    // The partial unique index rejects a concurrent insert that slipped
    // past the check above.
    let key = insert_key(db, &subscription, notes).await?;

    audit::record_best_effort(
        db,
        audit::AuditEntry::lifecycle_event(key.id, "created", merchant_id),
    )
    .await;

    Ok(key)
}

/// Revokes the merchant's current key and issues a replacement atomically.
///
/// The revocation is a compare-and-swap on the observed status; losing the
/// race to a concurrent regeneration surfaces as [`Error::KeyConflict`],
/// which is safe to retry. The replacement insert and the merchant
/// notification ride in the same transaction, so either the whole swap
/// happened or none of it did.
pub async fn regenerate(
    db: &DatabaseConnection,
    merchant_id: i64,
    reason: &str,
) -> Result<activation_key::Model> {
    let current = get_current(db, merchant_id)
        .await?
        .ok_or(Error::KeyNotFound { merchant_id })?;
    let subscription = find_subscription(db, merchant_id).await?;

    use sea_orm::sea_query::Expr;

    let txn = db.begin().await?;

    let revoked = ActivationKey::update_many()
        .col_expr(
            activation_key::Column::Status,
            Expr::value(KeyStatus::Revoked),
        )
        .col_expr(
            activation_key::Column::Notes,
            Expr::value(Some(reason.to_string())),
        )
        .filter(activation_key::Column::Id.eq(current.id))
        .filter(activation_key::Column::Status.eq(current.status))
        .exec(&txn)
        .await?;
    if revoked.rows_affected == 0 {
        // Someone else revoked or expired the key between our read and now
        return Err(Error::KeyConflict { merchant_id });
    }

    let replacement = insert_key(&txn, &subscription, None).await?;

    notify::queue(
        &txn,
        merchant_id,
        "key_regenerated",
        "Activation key regenerated",
        &format!(
            "A new activation key was issued for your store. Reason: {reason}. \
             Update your storefront configuration with the new key."
        ),
        Some("/admin/license".to_string()),
    )
    .await?;

    txn.commit().await?;

    audit::record_best_effort(
        db,
        audit::AuditEntry::lifecycle_event(replacement.id, "regenerated", merchant_id),
    )
    .await;

    Ok(replacement)
}

/// Returns the merchant's current key: the newest one not yet revoked.
///
/// The current key is usually ACTIVE but can be EXPIRED or SUSPENDED while a
/// lapsed subscription waits for payment; operators still need to see it.
pub async fn get_current<C>(db: &C, merchant_id: i64) -> Result<Option<activation_key::Model>>
where
    C: ConnectionTrait,
{
    ActivationKey::find()
        .filter(activation_key::Column::MerchantId.eq(merchant_id))
        .filter(activation_key::Column::Status.ne(KeyStatus::Revoked))
        .order_by_desc(activation_key::Column::CreatedAt)
        .order_by_desc(activation_key::Column::Id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds a key record by its exact key string.
pub async fn find_by_key<C>(db: &C, key: &str) -> Result<Option<activation_key::Model>>
where
    C: ConnectionTrait,
{
    ActivationKey::find()
        .filter(activation_key::Column::Key.eq(key))
        .one(db)
        .await
        .map_err(Into::into)
}

async fn find_subscription(
    db: &DatabaseConnection,
    merchant_id: i64,
) -> Result<subscription::Model> {
    Subscription::find()
        .filter(subscription::Column::MerchantId.eq(merchant_id))
        .one(db)
        .await?
        .ok_or(Error::NoSubscription { merchant_id })
}

/// Inserts a fresh ACTIVE key bound to the subscription's current period.
async fn insert_key<C>(
    db: &C,
    subscription: &subscription::Model,
    notes: Option<String>,
) -> Result<activation_key::Model>
where
    C: ConnectionTrait,
{
    let key = activation_key::ActiveModel {
        merchant_id: Set(subscription.merchant_id),
        key: Set(keycodec::generate(
            subscription.merchant_id,
            &subscription.plan_type,
        )),
        status: Set(KeyStatus::Active),
        expires_at: Set(subscription.period_end),
        is_used: Set(false),
        used_at: Set(None),
        used_by: Set(None),
        store_url: Set(None),
        store_domain: Set(None),
        verification_count: Set(0),
        last_verified_at: Set(None),
        notes: Set(notes),
        created_at: Set(Utc::now()),
        ..Default::default()
    };

    key.insert(db).await.map_err(Into::into)
}
