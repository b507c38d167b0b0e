//! Notification business logic - Outbox queueing, dedupe, and delivery.
//!
//! State transitions queue notifications through [`queue`] inside the same
//! transaction as their status writes; actual delivery happens later from
//! [`deliver_pending`] against whatever [`Notifier`] the process wires in.
//! Dedupe is computed from persisted rows, never in-memory state, so
//! concurrent sweep workers and restarts all see the same window.

use crate::{
    entities::{Merchant, Notification, merchant, notification},
    errors::Result,
};
use chrono::{Duration, Utc};
use sea_orm::{QueryOrder, QuerySelect, Set, prelude::*};
use std::future::Future;
use tracing::{info, warn};

/// Rolling window within which a `(merchant_id, kind, title)` triple is
/// queued at most once.
pub const DEDUPE_WINDOW_HOURS: i64 = 24;

/// Notifications picked up per delivery pass.
const DELIVERY_BATCH_SIZE: u64 = 50;

/// Outbound delivery collaborator (mail, webhook, chat).
///
/// Implementations are fire-and-forget from the state machine's point of
/// view: a failed send is recorded on the outbox row and retried on the next
/// pass, and can never roll back the transition that queued the row.
pub trait Notifier {
    /// Delivers one notification to one merchant. The error string is stored
    /// verbatim in the outbox row's `last_error` column.
    fn send(
        &self,
        merchant: &merchant::Model,
        notification: &notification::Model,
    ) -> impl Future<Output = std::result::Result<(), String>> + Send;
}

/// Dispatcher that writes notifications to the process log.
///
/// The default wiring for deployments where real delivery is handled by an
/// external system reading the outbox table directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(
        &self,
        merchant: &merchant::Model,
        notification: &notification::Model,
    ) -> impl Future<Output = std::result::Result<(), String>> + Send {
        info!(
            merchant_id = merchant.id,
            email = %merchant.email,
            kind = %notification.kind,
            title = %notification.title,
            "Notification delivered to log"
        );
        std::future::ready(Ok(()))
    }
}

/// Queues a notification unless an identical one is already inside the
/// dedupe window.
///
/// Returns the stored row, or None when the dedupe check suppressed the
/// write. Designed to run inside the same transaction as the state change
/// that triggered it.
pub async fn queue<C>(
    db: &C,
    merchant_id: i64,
    kind: &str,
    title: &str,
    message: &str,
    link: Option<String>,
) -> Result<Option<notification::Model>>
where
    C: ConnectionTrait,
{
    let window_start = Utc::now() - Duration::hours(DEDUPE_WINDOW_HOURS);

    let duplicate = Notification::find()
        .filter(notification::Column::MerchantId.eq(merchant_id))
        .filter(notification::Column::Kind.eq(kind))
        .filter(notification::Column::Title.eq(title))
        .filter(notification::Column::CreatedAt.gt(window_start))
        .one(db)
        .await?;

    if duplicate.is_some() {
        return Ok(None);
    }

    let stored = notification::ActiveModel {
        merchant_id: Set(merchant_id),
        kind: Set(kind.to_string()),
        title: Set(title.to_string()),
        message: Set(message.to_string()),
        link: Set(link),
        created_at: Set(Utc::now()),
        delivered_at: Set(None),
        attempts: Set(0),
        last_error: Set(None),
        ..Default::default()
    }
    .insert(db)
    .await?;

    Ok(Some(stored))
}

/// Delivers queued notifications through the given dispatcher, oldest first.
///
/// Each row is attempted once per pass; a failure is recorded on the row and
/// does not stop the rest of the batch. Returns the number delivered.
pub async fn deliver_pending<N>(db: &DatabaseConnection, notifier: &N) -> Result<usize>
where
    N: Notifier,
{
    let pending = Notification::find()
        .filter(notification::Column::DeliveredAt.is_null())
        .order_by_asc(notification::Column::CreatedAt)
        .limit(DELIVERY_BATCH_SIZE)
        .all(db)
        .await?;

    let mut delivered = 0;
    for row in pending {
        let merchant = Merchant::find_by_id(row.merchant_id).one(db).await?;

        let outcome = match merchant {
            Some(ref merchant) => notifier.send(merchant, &row).await,
            None => Err(format!("merchant {} not found", row.merchant_id)),
        };

        let mut active: notification::ActiveModel = row.clone().into();
        active.attempts = Set(row.attempts + 1);
        match outcome {
            Ok(()) => {
                active.delivered_at = Set(Some(Utc::now()));
                active.last_error = Set(None);
                delivered += 1;
            }
            Err(error) => {
                warn!(
                    notification_id = row.id,
                    merchant_id = row.merchant_id,
                    error = %error,
                    "Notification delivery failed"
                );
                active.last_error = Set(Some(error));
            }
        }
        active.update(db).await?;
    }

    Ok(delivered)
}
