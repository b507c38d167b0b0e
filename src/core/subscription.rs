//! Subscription state machine - Time-driven transitions and status cascades.
//!
//! The machine owns exactly two statuses, ACTIVE and OVERDUE; EXPIRED and
//! CANCELLED are settled states only a payment event can leave. Evaluation is
//! pure ([`evaluate`]), the cascade mapping is pure ([`cascade_effects`]),
//! and [`apply_transition`] applies both inside one transaction: subscription
//! row, merchant status, key status, and the notification intent commit
//! together or not at all.

use crate::{
    core::{keys, notify},
    entities::{
        ActivationKey, Merchant, Subscription, activation_key,
        activation_key::KeyEvent,
        merchant,
        merchant::MerchantStatus,
        subscription,
        subscription::SubscriptionStatus,
    },
    errors::{Error, Result},
};
use chrono::Duration;
use sea_orm::{Set, TransactionTrait, prelude::*, sea_query::Expr};
use tracing::info;

/// What a subscription status change does to the records hanging off it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeEffects {
    /// New merchant status, if the cascade touches the merchant
    pub merchant_status: Option<MerchantStatus>,
    /// Event fed to the key state machine, if the cascade touches the key
    pub key_event: Option<KeyEvent>,
    /// Notification queued for the merchant
    pub notification: Option<NotificationSpec>,
}

/// Static description of a transition notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationSpec {
    /// Machine-readable category
    pub kind: &'static str,
    /// Subject line; part of the dedupe identity
    pub title: &'static str,
    /// Body text
    pub message: &'static str,
    /// Optional call-to-action link
    pub link: Option<&'static str>,
}

/// Result of one per-merchant evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionOutcome {
    /// Status before evaluation
    pub previous: SubscriptionStatus,
    /// Status after evaluation
    pub current: SubscriptionStatus,
    /// Whether anything was written
    pub changed: bool,
}

/// Computes the status a subscription should have at `now`.
///
/// `period_end` itself still counts as paid, and the boundary instant of the
/// grace window still counts as overdue rather than expired.
#[must_use]
pub fn evaluate(
    period_end: DateTimeUtc,
    grace_period_days: i64,
    now: DateTimeUtc,
) -> SubscriptionStatus {
    if now <= period_end {
        SubscriptionStatus::Active
    } else if now <= period_end + Duration::days(grace_period_days) {
        SubscriptionStatus::Overdue
    } else {
        SubscriptionStatus::Expired
    }
}

/// Maps a target subscription status to its cascade, as data.
///
/// Total over every status so callers outside the time-driven machine (a
/// payment webhook applying a provider-side cancellation, say) use the same
/// mapping. Notably OVERDUE leaves the key alone: the merchant keeps a
/// working store during the grace period, and recovery only ever restores a
/// SUSPENDED key, never an expired or revoked one.
#[must_use]
pub fn cascade_effects(target: SubscriptionStatus) -> CascadeEffects {
    match target {
        SubscriptionStatus::Active => CascadeEffects {
            merchant_status: Some(MerchantStatus::Active),
            key_event: Some(KeyEvent::Restore),
            notification: Some(NotificationSpec {
                kind: "subscription_recovered",
                title: "Subscription active again",
                message: "Your payment was confirmed and your subscription is active again. \
                          Your store's activation key works as before.",
                link: None,
            }),
        },
        SubscriptionStatus::Overdue => CascadeEffects {
            merchant_status: Some(MerchantStatus::Overdue),
            key_event: None,
            notification: Some(NotificationSpec {
                kind: "grace_period",
                title: "Subscription payment overdue",
                message: "We could not confirm your latest subscription payment. Your store \
                          keeps working during the grace period; please settle the payment to \
                          avoid suspension.",
                link: Some("/admin/billing"),
            }),
        },
        SubscriptionStatus::Expired => CascadeEffects {
            merchant_status: Some(MerchantStatus::Suspended),
            key_event: Some(KeyEvent::Expire),
            notification: Some(NotificationSpec {
                kind: "subscription_expired",
                title: "Subscription expired",
                message: "The grace period has ended and your subscription is now expired. \
                          Your store's activation key was deactivated; renew to restore \
                          service.",
                link: Some("/admin/billing"),
            }),
        },
        SubscriptionStatus::Cancelled => CascadeEffects {
            merchant_status: Some(MerchantStatus::Suspended),
            key_event: Some(KeyEvent::Expire),
            notification: Some(NotificationSpec {
                kind: "subscription_cancelled",
                title: "Subscription cancelled",
                message: "Your subscription was cancelled. Your store's activation key was \
                          deactivated; you can resubscribe at any time.",
                link: Some("/admin/billing"),
            }),
        },
    }
}

/// Loads a merchant's subscription and applies one evaluation step.
pub async fn evaluate_for_merchant(
    db: &DatabaseConnection,
    merchant_id: i64,
    grace_period_days: i64,
    now: DateTimeUtc,
) -> Result<TransitionOutcome> {
    let subscription = Subscription::find()
        .filter(subscription::Column::MerchantId.eq(merchant_id))
        .one(db)
        .await?
        .ok_or(Error::NoSubscription { merchant_id })?;

    apply_transition(db, &subscription, grace_period_days, now).await
}

/// Evaluates one subscription against `now` and writes the transition.
///
/// Writes happen only when the target status differs from the current one,
/// so re-evaluating a consistent merchant is a no-op and produces no
/// duplicate notifications. The subscription update, the merchant and key
/// cascades, and the notification intent share one transaction.
pub async fn apply_transition(
    db: &DatabaseConnection,
    subscription: &subscription::Model,
    grace_period_days: i64,
    now: DateTimeUtc,
) -> Result<TransitionOutcome> {
    let previous = subscription.status;

    // Settled statuses belong to payment events, not the clock
    if !previous.is_sweepable() {
        return Ok(TransitionOutcome {
            previous,
            current: previous,
            changed: false,
        });
    }

    let target = evaluate(subscription.period_end, grace_period_days, now);
    if target == previous {
        return Ok(TransitionOutcome {
            previous,
            current: target,
            changed: false,
        });
    }

    let effects = cascade_effects(target);
    let txn = db.begin().await?;

    let mut row: subscription::ActiveModel = subscription.clone().into();
    row.status = Set(target);
    match target {
        SubscriptionStatus::Overdue => {
            if subscription.overdue_at.is_none() {
                row.overdue_at = Set(Some(now));
            }
            row.grace_period_end =
                Set(Some(subscription.period_end + Duration::days(grace_period_days)));
        }
        SubscriptionStatus::Active => {
            // Recovery closes the overdue episode
            row.overdue_at = Set(None);
            row.grace_period_end = Set(None);
        }
        // Expiry keeps the overdue bookkeeping as history
        SubscriptionStatus::Expired | SubscriptionStatus::Cancelled => {}
    }
    row.update(&txn).await?;

    if let Some(status) = effects.merchant_status {
        let updated = Merchant::update_many()
            .col_expr(merchant::Column::Status, Expr::value(status))
            .filter(merchant::Column::Id.eq(subscription.merchant_id))
            .exec(&txn)
            .await?;
        if updated.rows_affected == 0 {
            return Err(Error::MerchantNotFound {
                merchant_id: subscription.merchant_id,
            });
        }
    }

    if let Some(event) = effects.key_event {
        apply_key_event(&txn, subscription.merchant_id, event).await?;
    }

    if let Some(spec) = effects.notification {
        notify::queue(
            &txn,
            subscription.merchant_id,
            spec.kind,
            spec.title,
            spec.message,
            spec.link.map(str::to_string),
        )
        .await?;
    }

    txn.commit().await?;

    info!(
        merchant_id = subscription.merchant_id,
        from = ?previous,
        to = ?target,
        "Subscription transitioned"
    );

    Ok(TransitionOutcome {
        previous,
        current: target,
        changed: true,
    })
}

/// Feeds one event to the merchant's current key, writing only on change.
///
/// Guarded on the observed status; a concurrent expiry or regeneration
/// winning the race just means the event no longer applies.
async fn apply_key_event<C>(db: &C, merchant_id: i64, event: KeyEvent) -> Result<()>
where
    C: ConnectionTrait,
{
    let Some(key) = keys::get_current(db, merchant_id).await? else {
        return Ok(());
    };

    let next = activation_key::transition(key.status, event);
    if next == key.status {
        return Ok(());
    }

    ActivationKey::update_many()
        .col_expr(activation_key::Column::Status, Expr::value(next))
        .filter(activation_key::Column::Id.eq(key.id))
        .filter(activation_key::Column::Status.eq(key.status))
        .exec(db)
        .await?;

    Ok(())
}
