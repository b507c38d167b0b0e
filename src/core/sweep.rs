//! Sweep business logic - Scheduled batch evaluation and renewal reminders.
//!
//! The sweep re-evaluates every subscription the state machine still owns
//! (ACTIVE and OVERDUE) against a single instant, tallies what moved, and
//! records one summary row per run. A failure on one merchant is logged and
//! skipped, never aborting the batch, and re-running a sweep against
//! unchanged data writes nothing, so an interrupted run can simply be
//! restarted.

use crate::{
    config::licensing::LicensingConfig,
    core::{notify, subscription as subscription_core},
    entities::{Subscription, subscription, subscription::SubscriptionStatus, sweep_run},
    errors::Result,
};
use chrono::Utc;
use sea_orm::{Set, prelude::*};
use tracing::{info, warn};

/// Tallies from one sweep run.
#[derive(Debug, Clone, Copy)]
pub struct SweepReport {
    /// Subscriptions examined
    pub checked: usize,
    /// Subscriptions whose status changed
    pub updated: usize,
    /// Transitions into EXPIRED
    pub expired: usize,
    /// Transitions into OVERDUE
    pub overdue: usize,
    /// Merchants skipped after an evaluation error
    pub warnings: usize,
    /// When the run started
    pub started_at: DateTimeUtc,
    /// When the run finished
    pub finished_at: DateTimeUtc,
}

/// Re-evaluates all sweepable subscriptions against the current time.
///
/// Every subscription is evaluated against the same instant, taken at the
/// start of the run. Merchants are processed independently; an error on one
/// is logged, counted as a warning, and the batch moves on. One summary row
/// is appended to `sweep_runs` when the batch completes; like the
/// verification audit, that write is best-effort and never fails the sweep.
pub async fn sweep(db: &DatabaseConnection, licensing: &LicensingConfig) -> Result<SweepReport> {
    let started_at = Utc::now();

    let subscriptions = Subscription::find()
        .filter(subscription::Column::Status.is_in([
            SubscriptionStatus::Active,
            SubscriptionStatus::Overdue,
        ]))
        .all(db)
        .await?;

    let mut checked = 0;
    let mut updated = 0;
    let mut expired = 0;
    let mut overdue = 0;
    let mut warnings = 0;

    for subscription in subscriptions {
        checked += 1;
        match subscription_core::apply_transition(
            db,
            &subscription,
            licensing.grace_period_days,
            started_at,
        )
        .await
        {
            Ok(outcome) if outcome.changed => {
                updated += 1;
                match outcome.current {
                    SubscriptionStatus::Expired => expired += 1,
                    SubscriptionStatus::Overdue => overdue += 1,
                    SubscriptionStatus::Active | SubscriptionStatus::Cancelled => {}
                }
            }
            Ok(_) => {}
            Err(e) => {
                warn!(
                    merchant_id = subscription.merchant_id,
                    error = %e,
                    "Skipping merchant after sweep evaluation failure"
                );
                warnings += 1;
            }
        }
    }

    let finished_at = Utc::now();
    let report = SweepReport {
        checked,
        updated,
        expired,
        overdue,
        warnings,
        started_at,
        finished_at,
    };

    // The transitions above are already committed; the summary is audit
    // data and must not turn a completed sweep into an error
    let summary = sweep_run::ActiveModel {
        started_at: Set(report.started_at),
        finished_at: Set(report.finished_at),
        checked: Set(clamp_count(report.checked)),
        updated: Set(clamp_count(report.updated)),
        expired: Set(clamp_count(report.expired)),
        overdue: Set(clamp_count(report.overdue)),
        warnings: Set(clamp_count(report.warnings)),
        ..Default::default()
    }
    .insert(db)
    .await;
    if let Err(e) = summary {
        warn!(error = %e, "Failed to record sweep run summary");
    }

    info!(
        checked = report.checked,
        updated = report.updated,
        expired = report.expired,
        overdue = report.overdue,
        warnings = report.warnings,
        "Sweep finished"
    );

    Ok(report)
}

/// Queues renewal reminders for subscriptions approaching their period end.
///
/// A reminder fires when the whole-day distance to `period_end` exactly
/// matches a configured threshold; the 24h notification dedupe absorbs
/// repeated runs within the same day. Returns how many reminders were
/// actually queued.
pub async fn send_renewal_reminders(
    db: &DatabaseConnection,
    licensing: &LicensingConfig,
) -> Result<usize> {
    let today = Utc::now().date_naive();

    let subscriptions = Subscription::find()
        .filter(subscription::Column::Status.eq(SubscriptionStatus::Active))
        .all(db)
        .await?;

    let mut queued = 0;
    for subscription in subscriptions {
        let days_left = (subscription.period_end.date_naive() - today).num_days();
        if !licensing.reminder_days.contains(&days_left) {
            continue;
        }

        let title = if days_left == 1 {
            "Subscription renews in 1 day".to_string()
        } else {
            format!("Subscription renews in {days_left} days")
        };
        let message = format!(
            "Your current billing period ends on {}. Make sure your payment method is up \
             to date to avoid any interruption.",
            subscription.period_end.format("%Y-%m-%d")
        );

        match notify::queue(
            db,
            subscription.merchant_id,
            "renewal_reminder",
            &title,
            &message,
            Some("/admin/billing".to_string()),
        )
        .await
        {
            Ok(Some(_)) => queued += 1,
            Ok(None) => {}
            Err(e) => {
                warn!(
                    merchant_id = subscription.merchant_id,
                    error = %e,
                    "Failed to queue renewal reminder"
                );
            }
        }
    }

    Ok(queued)
}

/// Sweep tallies are small; a count that somehow exceeds i32 is clamped
/// rather than wrapped when persisted.
fn clamp_count(count: usize) -> i32 {
    i32::try_from(count).unwrap_or(i32::MAX)
}
