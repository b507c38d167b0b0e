//! Verification pipeline - The ordered checks behind every storefront call.
//!
//! `verify` runs five short-circuiting checks (format, lookup, key status,
//! key expiry, subscription status) and then the success path. Denials are
//! structured [`VerifyOutcome`] values, never errors, so external storefronts
//! get a stable contract; only dependency failures surface as `Err`. Every
//! attempt, anonymous or not, leaves one audit record.
//!
//! The success path is the one concurrency-sensitive spot in the crate:
//! `verification_count` is incremented with a database-side expression so
//! parallel calls against the same key cannot lose updates.

use crate::{
    core::{audit, keys},
    entities::{
        ActivationKey, Merchant, Subscription, activation_key,
        activation_key::{KeyEvent, KeyStatus},
        merchant::MerchantStatus,
        subscription,
        subscription::SubscriptionStatus,
    },
    errors::{Error, Result},
    keycodec,
};
use chrono::Utc;
use sea_orm::{ActiveEnum, prelude::*, sea_query::Expr};
use serde::{Deserialize, Serialize};

/// Context an external storefront sends along with the key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyRequest {
    /// The activation key string being presented
    pub key: String,
    /// Caller IP address
    pub ip_address: Option<String>,
    /// Caller user agent
    pub user_agent: Option<String>,
    /// Full URL of the calling store
    pub store_url: Option<String>,
    /// Domain of the calling store
    pub store_domain: Option<String>,
}

/// Why a verification was denied.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DenialCode {
    /// The key string does not match the required format
    InvalidFormat,
    /// No key record matches the string
    KeyNotFound,
    /// The key exists but is not ACTIVE
    KeyInactive,
    /// The key's expiry date has passed
    KeyExpired,
    /// The key is fine but its subscription is not ACTIVE. Often transient
    /// while a cascade is in flight; callers should treat it as retryable.
    SubscriptionInactive,
}

/// Key fields echoed back to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct KeySummary {
    /// The key string
    pub key: String,
    /// Current key status
    pub status: KeyStatus,
    /// When the key expires
    pub expires_at: DateTimeUtc,
    /// Successful verifications so far
    pub verification_count: i64,
}

/// Merchant fields echoed back to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct MerchantSummary {
    /// Merchant id
    pub id: i64,
    /// Store display name
    pub name: String,
    /// Current merchant status
    pub status: MerchantStatus,
}

/// Subscription fields echoed back to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionSummary {
    /// Plan identifier
    pub plan_type: String,
    /// Billing cadence
    pub billing_cycle: String,
    /// Current subscription status
    pub status: SubscriptionStatus,
    /// End of the current paid period
    pub period_end: DateTimeUtc,
}

/// Store registration echoed back to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct StoreSummary {
    /// Registered store URL
    pub url: Option<String>,
    /// Registered store domain
    pub domain: Option<String>,
}

/// Structured result of a verification call.
///
/// Denials carry a [`DenialCode`] plus whatever state context the caller
/// needs for UX (current key status, expiry, subscription status); the
/// success shape carries full key, merchant, subscription, and store
/// summaries.
#[derive(Debug, Clone, Serialize)]
pub struct VerifyOutcome {
    /// Whether the key verified successfully
    pub valid: bool,
    /// Denial reason, present on failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<DenialCode>,
    /// Human-readable denial message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Key state, when the key resolved to a record
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<KeySummary>,
    /// Merchant info, on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merchant: Option<MerchantSummary>,
    /// Subscription info, on success or subscription denials
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription: Option<SubscriptionSummary>,
    /// Store registration info, on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store: Option<StoreSummary>,
}

impl VerifyOutcome {
    fn denied(code: DenialCode, error: impl Into<String>) -> Self {
        Self {
            valid: false,
            code: Some(code),
            error: Some(error.into()),
            key: None,
            merchant: None,
            subscription: None,
            store: None,
        }
    }

    fn with_key(mut self, key: &activation_key::Model) -> Self {
        self.key = Some(KeySummary {
            key: key.key.clone(),
            status: key.status,
            expires_at: key.expires_at,
            verification_count: key.verification_count,
        });
        self
    }

    fn with_subscription(mut self, subscription: &subscription::Model) -> Self {
        self.subscription = Some(SubscriptionSummary {
            plan_type: subscription.plan_type.clone(),
            billing_cycle: subscription.billing_cycle.clone(),
            status: subscription.status,
            period_end: subscription.period_end,
        });
        self
    }
}

/// Verifies an activation key against the full licensing state.
///
/// Checks run in a fixed order and short-circuit on the first failure:
/// 1. Format check; malformed input never reaches the database.
/// 2. Lookup by exact key string.
/// 3. Key status must be ACTIVE.
/// 4. Key expiry; an overdue key is transitioned to EXPIRED here.
/// 5. The linked subscription must exist and be ACTIVE. The key's own status
///    is deliberately left untouched on this branch: a cascade that has not
///    landed yet is not the same thing as a revoked key.
///
/// On success the key's usage counters and last-seen store details are
/// updated, `is_used`/`used_at` are set exactly once, and the caller gets
/// merchant, subscription, and store summaries.
///
/// # Errors
/// Only dependency failures (database, snapshot serialization) are returned
/// as `Err`; every domain-level denial is an `Ok` outcome.
pub async fn verify(db: &DatabaseConnection, request: &VerifyRequest) -> Result<VerifyOutcome> {
    let now = Utc::now();

    // 1. Format check, before any storage lookup
    if !keycodec::is_valid_format(&request.key) {
        let outcome = VerifyOutcome::denied(DenialCode::InvalidFormat, "Invalid activation key format");
        audit_attempt(db, request, None, &outcome).await?;
        return Ok(outcome);
    }

    // 2. Lookup by exact key string
    let Some(key) = keys::find_by_key(db, &request.key).await? else {
        let outcome = VerifyOutcome::denied(DenialCode::KeyNotFound, "Activation key not found");
        audit_attempt(db, request, None, &outcome).await?;
        return Ok(outcome);
    };

    // 3. Key must be ACTIVE; a key already marked expired reports as expired
    if key.status != KeyStatus::Active {
        let (code, error) = if key.status == KeyStatus::Expired {
            (
                DenialCode::KeyExpired,
                format!("Activation key expired at {}", key.expires_at),
            )
        } else {
            (
                DenialCode::KeyInactive,
                format!("Activation key is {}", key.status.to_value()),
            )
        };
        let outcome = VerifyOutcome::denied(code, error).with_key(&key);
        audit_attempt(db, request, Some(key.id), &outcome).await?;
        return Ok(outcome);
    }

    // 4. Key expiry; transition the row so later calls fail fast on status
    if key.expires_at < now {
        expire_key(db, &key).await?;
        let expired = activation_key::Model {
            status: activation_key::transition(key.status, KeyEvent::Expire),
            ..key.clone()
        };
        let outcome = VerifyOutcome::denied(
            DenialCode::KeyExpired,
            format!("Activation key expired at {}", key.expires_at),
        )
        .with_key(&expired);
        audit_attempt(db, request, Some(key.id), &outcome).await?;
        return Ok(outcome);
    }

    // 5. Linked subscription must be ACTIVE; the key is left untouched here
    let subscription = Subscription::find()
        .filter(subscription::Column::MerchantId.eq(key.merchant_id))
        .one(db)
        .await?;
    let subscription = match subscription {
        Some(subscription) if subscription.status == SubscriptionStatus::Active => subscription,
        Some(subscription) => {
            let outcome = VerifyOutcome::denied(
                DenialCode::SubscriptionInactive,
                format!("Subscription is {}", subscription.status.to_value()),
            )
            .with_key(&key)
            .with_subscription(&subscription);
            audit_attempt(db, request, Some(key.id), &outcome).await?;
            return Ok(outcome);
        }
        None => {
            let outcome = VerifyOutcome::denied(
                DenialCode::SubscriptionInactive,
                "No subscription found for this key",
            )
            .with_key(&key);
            audit_attempt(db, request, Some(key.id), &outcome).await?;
            return Ok(outcome);
        }
    };

    // 6. Success: bump counters atomically, then re-read the fresh row.
    // These writes are part of the verification contract; if they fail the
    // caller must see a failure, not a false success.
    record_usage(db, &key, request, now).await?;
    let key = ActivationKey::find_by_id(key.id)
        .one(db)
        .await?
        .ok_or(Error::KeyNotFound {
            merchant_id: key.merchant_id,
        })?;

    let merchant = Merchant::find_by_id(key.merchant_id)
        .one(db)
        .await?
        .ok_or(Error::MerchantNotFound {
            merchant_id: key.merchant_id,
        })?;

    let outcome = VerifyOutcome {
        valid: true,
        code: None,
        error: None,
        key: None,
        merchant: Some(MerchantSummary {
            id: merchant.id,
            name: merchant.name.clone(),
            status: merchant.status,
        }),
        subscription: None,
        store: Some(StoreSummary {
            url: key.store_url.clone(),
            domain: key.store_domain.clone(),
        }),
    }
    .with_key(&key)
    .with_subscription(&subscription);
    audit_attempt(db, request, Some(key.id), &outcome).await?;

    Ok(outcome)
}

/// Marks a key EXPIRED once its expiry date has passed.
///
/// Guarded on the observed status so a concurrent regeneration is not
/// overwritten; losing that race is fine, the row already moved on.
async fn expire_key(db: &DatabaseConnection, key: &activation_key::Model) -> Result<()> {
    let target = activation_key::transition(key.status, KeyEvent::Expire);
    ActivationKey::update_many()
        .col_expr(activation_key::Column::Status, Expr::value(target))
        .filter(activation_key::Column::Id.eq(key.id))
        .filter(activation_key::Column::Status.eq(key.status))
        .exec(db)
        .await?;
    Ok(())
}

/// Applies the success-path writes: atomic counter increment, last-seen
/// details (last write wins), and the set-once first-use fields.
async fn record_usage(
    db: &DatabaseConnection,
    key: &activation_key::Model,
    request: &VerifyRequest,
    now: DateTimeUtc,
) -> Result<()> {
    // UPDATE activation_keys SET verification_count = verification_count + 1, ...
    ActivationKey::update_many()
        .col_expr(
            activation_key::Column::VerificationCount,
            Expr::col(activation_key::Column::VerificationCount).add(1),
        )
        .col_expr(activation_key::Column::LastVerifiedAt, Expr::value(Some(now)))
        .col_expr(
            activation_key::Column::UsedBy,
            Expr::value(request.ip_address.clone()),
        )
        .col_expr(
            activation_key::Column::StoreUrl,
            Expr::value(request.store_url.clone()),
        )
        .col_expr(
            activation_key::Column::StoreDomain,
            Expr::value(request.store_domain.clone()),
        )
        .filter(activation_key::Column::Id.eq(key.id))
        .exec(db)
        .await?;

    // First use only; the filter makes the write a no-op afterwards
    ActivationKey::update_many()
        .col_expr(activation_key::Column::IsUsed, Expr::value(true))
        .col_expr(activation_key::Column::UsedAt, Expr::value(Some(now)))
        .filter(activation_key::Column::Id.eq(key.id))
        .filter(activation_key::Column::IsUsed.eq(false))
        .exec(db)
        .await?;

    Ok(())
}

/// Writes the audit record for one attempt, best-effort.
async fn audit_attempt(
    db: &DatabaseConnection,
    request: &VerifyRequest,
    key_id: Option<i64>,
    outcome: &VerifyOutcome,
) -> Result<()> {
    let entry = audit::AuditEntry {
        key_id,
        ip_address: request.ip_address.clone(),
        user_agent: request.user_agent.clone(),
        store_url: request.store_url.clone(),
        success: outcome.valid,
        error_message: outcome.error.clone(),
        request_snapshot: serde_json::to_value(request)?,
        response_snapshot: Some(serde_json::to_value(outcome)?),
    };
    audit::record_best_effort(db, entry).await;
    Ok(())
}
