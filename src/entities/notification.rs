//! Notification entity - Outbox rows queued for the external dispatcher.
//!
//! State transitions persist a notification in the same transaction as the
//! status write; delivery happens asynchronously from this table, so a
//! dispatcher failure can never roll back or block a transition. The table
//! doubles as the dedupe window: before queueing, writers check for an
//! existing row with the same `(merchant_id, kind, title)` created within the
//! last 24 hours.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Notification outbox database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "notifications")]
pub struct Model {
    /// Unique identifier for the notification
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Merchant the notification is addressed to
    pub merchant_id: i64,
    /// Machine-readable category (e.g., `"grace_period"`, `"renewal_reminder"`)
    pub kind: String,
    /// Subject line; part of the dedupe identity
    pub title: String,
    /// Body text
    pub message: String,
    /// Optional call-to-action link
    pub link: Option<String>,
    /// When the notification was queued
    pub created_at: DateTimeUtc,
    /// When delivery succeeded; None while still pending
    pub delivered_at: Option<DateTimeUtc>,
    /// Delivery attempts so far
    pub attempts: i32,
    /// Most recent delivery failure, for operator inspection
    pub last_error: Option<String>,
}

/// Defines relationships between Notification and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each notification belongs to one merchant
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
