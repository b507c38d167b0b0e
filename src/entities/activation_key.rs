//! Activation key entity - The credential storefronts present for verification.
//!
//! Keys are superseded, never deleted: regeneration revokes the current key
//! and issues a fresh one, so the table is a full history of every credential
//! a merchant ever held. The status state machine is expressed as a single
//! total [`transition`] function instead of scattered status comparisons.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle status of an activation key.
#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KeyStatus {
    /// Verifiable credential in good standing
    #[sea_orm(string_value = "ACTIVE")]
    Active,
    /// Past its expiry date; terminal except for regeneration
    #[sea_orm(string_value = "EXPIRED")]
    Expired,
    /// Temporarily unusable, restored when the subscription recovers
    #[sea_orm(string_value = "SUSPENDED")]
    Suspended,
    /// Superseded by regeneration; terminal
    #[sea_orm(string_value = "REVOKED")]
    Revoked,
}

/// Events that can move a key between statuses.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum KeyEvent {
    /// The key's expiry date passed, or its subscription fully expired
    Expire,
    /// Cascade from a suspended merchant account
    Suspend,
    /// Cascade from a recovered subscription
    Restore,
    /// Explicit regeneration superseding this key
    Revoke,
}

/// Total transition function for the key state machine.
///
/// Every `(status, event)` pair maps to a definite next status; illegal moves
/// return the current status unchanged, so callers only write when the result
/// differs. Revoked is terminal for every event, Expired for everything but
/// revocation.
#[must_use]
pub fn transition(status: KeyStatus, event: KeyEvent) -> KeyStatus {
    match (status, event) {
        (KeyStatus::Active | KeyStatus::Suspended, KeyEvent::Expire) => KeyStatus::Expired,
        (KeyStatus::Active | KeyStatus::Suspended, KeyEvent::Suspend) => KeyStatus::Suspended,
        (KeyStatus::Active | KeyStatus::Suspended, KeyEvent::Restore) => KeyStatus::Active,
        (KeyStatus::Active | KeyStatus::Suspended | KeyStatus::Expired, KeyEvent::Revoke) => {
            KeyStatus::Revoked
        }
        (KeyStatus::Expired, _) => KeyStatus::Expired,
        (KeyStatus::Revoked, _) => KeyStatus::Revoked,
    }
}

/// Activation key database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "activation_keys")]
pub struct Model {
    /// Unique identifier for the key record
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning merchant; at most one ACTIVE key per merchant
    pub merchant_id: i64,
    /// The key string itself (`SK-XXXX-...`); immutable once issued
    #[sea_orm(unique)]
    pub key: String,
    /// Current lifecycle status
    pub status: KeyStatus,
    /// Expiry instant, copied from the subscription's period end at issue time
    pub expires_at: DateTimeUtc,
    /// Whether the key has ever verified successfully
    pub is_used: bool,
    /// First successful verification; set once, never overwritten
    pub used_at: Option<DateTimeUtc>,
    /// Caller IP of the most recent successful verification
    pub used_by: Option<String>,
    /// Store URL reported by the most recent successful verification
    pub store_url: Option<String>,
    /// Store domain reported by the most recent successful verification
    pub store_domain: Option<String>,
    /// Total successful verifications; incremented atomically
    pub verification_count: i64,
    /// Most recent successful verification
    pub last_verified_at: Option<DateTimeUtc>,
    /// Free-form operator notes; regeneration stores its reason here
    pub notes: Option<String>,
    /// When the key was issued
    pub created_at: DateTimeUtc,
}

/// Defines relationships between `ActivationKey` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each key belongs to one merchant
    #[sea_orm(
        belongs_to = "super::merchant::Entity",
        from = "Column::MerchantId",
        to = "super::merchant::Column::Id"
    )]
    Merchant,
    /// One key accumulates many verification audit records
    #[sea_orm(has_many = "super::key_verification::Entity")]
    KeyVerifications,
}

impl Related<super::merchant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Merchant.def()
    }
}

impl Related<super::key_verification::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::KeyVerifications.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_key_transitions() {
        assert_eq!(transition(KeyStatus::Active, KeyEvent::Expire), KeyStatus::Expired);
        assert_eq!(transition(KeyStatus::Active, KeyEvent::Suspend), KeyStatus::Suspended);
        assert_eq!(transition(KeyStatus::Active, KeyEvent::Restore), KeyStatus::Active);
        assert_eq!(transition(KeyStatus::Active, KeyEvent::Revoke), KeyStatus::Revoked);
    }

    #[test]
    fn test_suspended_key_recovers_or_dies() {
        assert_eq!(transition(KeyStatus::Suspended, KeyEvent::Restore), KeyStatus::Active);
        assert_eq!(transition(KeyStatus::Suspended, KeyEvent::Expire), KeyStatus::Expired);
        assert_eq!(transition(KeyStatus::Suspended, KeyEvent::Revoke), KeyStatus::Revoked);
    }

    #[test]
    fn test_expired_is_terminal_except_revocation() {
        assert_eq!(transition(KeyStatus::Expired, KeyEvent::Restore), KeyStatus::Expired);
        assert_eq!(transition(KeyStatus::Expired, KeyEvent::Suspend), KeyStatus::Expired);
        assert_eq!(transition(KeyStatus::Expired, KeyEvent::Expire), KeyStatus::Expired);
        assert_eq!(transition(KeyStatus::Expired, KeyEvent::Revoke), KeyStatus::Revoked);
    }

    #[test]
    fn test_revoked_is_fully_terminal() {
        for event in [KeyEvent::Expire, KeyEvent::Suspend, KeyEvent::Restore, KeyEvent::Revoke] {
            assert_eq!(transition(KeyStatus::Revoked, event), KeyStatus::Revoked);
        }
    }
}
