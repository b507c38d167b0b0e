//! Subscription entity - The billing record driving the licensing lifecycle.
//!
//! Subscriptions are created by external payment confirmation. This core
//! mutates only the status and derived date fields (`overdue_at`,
//! `grace_period_end`); period dates come from payment events. Rows are never
//! deleted.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a subscription.
#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionStatus {
    /// Paid up, inside the current billing period
    #[sea_orm(string_value = "ACTIVE")]
    Active,
    /// Past `period_end` but still inside the grace period
    #[sea_orm(string_value = "OVERDUE")]
    Overdue,
    /// Grace period elapsed without payment
    #[sea_orm(string_value = "EXPIRED")]
    Expired,
    /// Cancelled by the merchant or the payment provider
    #[sea_orm(string_value = "CANCELLED")]
    Cancelled,
}

impl SubscriptionStatus {
    /// Returns true for statuses the sweep still needs to re-evaluate.
    /// Expired and cancelled subscriptions are settled and skipped.
    #[must_use]
    pub fn is_sweepable(self) -> bool {
        matches!(self, Self::Active | Self::Overdue)
    }
}

/// Subscription database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "subscriptions")]
pub struct Model {
    /// Unique identifier for the subscription
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning merchant; exactly one subscription per merchant
    #[sea_orm(unique)]
    pub merchant_id: i64,
    /// Plan identifier (e.g., `"starter"`, `"professional"`)
    pub plan_type: String,
    /// Billing cadence (e.g., `"monthly"`, `"yearly"`)
    pub billing_cycle: String,
    /// Current lifecycle status, owned by the state machine
    pub status: SubscriptionStatus,
    /// Start of the paid period
    pub period_start: DateTimeUtc,
    /// End of the paid period; the state machine evaluates against this
    pub period_end: DateTimeUtc,
    /// Set the first time the subscription goes overdue, cleared on recovery
    pub overdue_at: Option<DateTimeUtc>,
    /// `period_end` plus the configured grace period, while overdue
    pub grace_period_end: Option<DateTimeUtc>,
    /// When the most recent payment was received
    pub last_payment_date: Option<DateTimeUtc>,
    /// When the next payment is expected
    pub next_payment_date: Option<DateTimeUtc>,
    /// When the subscription row was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Subscription and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each subscription belongs to one merchant
    #[sea_orm(
        belongs_to = "super::merchant::Entity",
        from = "Column::MerchantId",
        to = "super::merchant::Column::Id"
    )]
    Merchant,
}

impl Related<super::merchant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Merchant.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
