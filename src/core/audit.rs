//! Verification audit business logic - Append-only trail of verification attempts.
//!
//! Provides the single write path into the `key_verifications` table plus the
//! read-side accessor operators use to inspect a key's history. Audit writes
//! are best-effort by contract: a failed insert is logged and swallowed so it
//! can never fail the operation it was auditing.

use crate::{
    entities::{KeyVerification, key_verification},
    errors::Result,
};
use chrono::Utc;
use sea_orm::{QueryOrder, QuerySelect, Set, prelude::*};
use tracing::warn;

/// One verification attempt, ready to be persisted.
///
/// `key_id` is None for anonymous attempts where the presented key string
/// never resolved to a record.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    /// Key the attempt resolved to, if any
    pub key_id: Option<i64>,
    /// Caller IP address
    pub ip_address: Option<String>,
    /// Caller user agent
    pub user_agent: Option<String>,
    /// Store URL the caller claimed
    pub store_url: Option<String>,
    /// Whether the attempt succeeded
    pub success: bool,
    /// Denial reason for failed attempts
    pub error_message: Option<String>,
    /// JSON snapshot of the inbound request
    pub request_snapshot: serde_json::Value,
    /// JSON snapshot of the outcome, if one was produced
    pub response_snapshot: Option<serde_json::Value>,
}

impl AuditEntry {
    /// Builds an entry describing a lifecycle event (key issued, regenerated)
    /// rather than a storefront verification attempt.
    #[must_use]
    pub fn lifecycle_event(key_id: i64, event: &str, merchant_id: i64) -> Self {
        Self {
            key_id: Some(key_id),
            ip_address: None,
            user_agent: None,
            store_url: None,
            success: true,
            error_message: None,
            request_snapshot: serde_json::json!({
                "event": event,
                "merchant_id": merchant_id,
            }),
            response_snapshot: None,
        }
    }
}

/// Persists one audit record and returns the stored row.
pub async fn record<C>(db: &C, entry: AuditEntry) -> Result<key_verification::Model>
where
    C: ConnectionTrait,
{
    let record = key_verification::ActiveModel {
        key_id: Set(entry.key_id),
        ip_address: Set(entry.ip_address),
        user_agent: Set(entry.user_agent),
        store_url: Set(entry.store_url),
        success: Set(entry.success),
        error_message: Set(entry.error_message),
        request_snapshot: Set(entry.request_snapshot),
        response_snapshot: Set(entry.response_snapshot),
        verified_at: Set(Utc::now()),
        ..Default::default()
    };

    record.insert(db).await.map_err(Into::into)
}

/// Persists one audit record, logging and swallowing any failure.
///
/// The audit trail must never take down the operation it documents, so every
/// caller on a primary path goes through this instead of [`record`].
pub async fn record_best_effort<C>(db: &C, entry: AuditEntry)
where
    C: ConnectionTrait,
{
    let key_id = entry.key_id;
    if let Err(e) = record(db, entry).await {
        warn!(?key_id, error = %e, "Failed to write verification audit record");
    }
}

/// Returns the most recent audit records for a key, newest first.
///
/// This backs the operator-facing verification history view. `limit` bounds
/// the page size; ties on `verified_at` fall back to insertion order.
pub async fn list_verifications(
    db: &DatabaseConnection,
    key_id: i64,
    limit: u64,
) -> Result<Vec<key_verification::Model>> {
    KeyVerification::find()
        .filter(key_verification::Column::KeyId.eq(key_id))
        .order_by_desc(key_verification::Column::VerifiedAt)
        .order_by_desc(key_verification::Column::Id)
        .limit(limit)
        .all(db)
        .await
        .map_err(Into::into)
}
