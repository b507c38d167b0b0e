//! Merchant entity - Represents the store owner whose deployment is licensed.
//!
//! Merchants are created and managed by the surrounding platform; this core
//! only reads them and cascades status changes into the `status` column.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a merchant account.
#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MerchantStatus {
    /// Account in good standing
    #[sea_orm(string_value = "ACTIVE")]
    Active,
    /// Signed up but not yet licensed
    #[sea_orm(string_value = "PENDING")]
    Pending,
    /// Locked out after subscription expiry
    #[sea_orm(string_value = "SUSPENDED")]
    Suspended,
    /// Payment missed, inside the grace period
    #[sea_orm(string_value = "OVERDUE")]
    Overdue,
}

/// Merchant database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "merchants")]
pub struct Model {
    /// Unique identifier for the merchant
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name of the store
    pub name: String,
    /// Contact address notifications are sent to
    pub email: String,
    /// Current account status, kept in sync by subscription cascades
    pub status: MerchantStatus,
    /// When the merchant account was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Merchant and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each merchant has exactly one subscription
    #[sea_orm(has_one = "super::subscription::Entity")]
    Subscription,
    /// One merchant accumulates many activation keys over time
    #[sea_orm(has_many = "super::activation_key::Entity")]
    ActivationKeys,
    /// One merchant receives many notifications
    #[sea_orm(has_many = "super::notification::Entity")]
    Notifications,
}

impl Related<super::subscription::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Subscription.def()
    }
}

impl Related<super::activation_key::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ActivationKeys.def()
    }
}

impl Related<super::notification::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Notifications.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
