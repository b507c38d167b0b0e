//! Key verification entity - Append-only audit trail of verification attempts.
//!
//! Every call to the verification pipeline leaves exactly one row here,
//! successful or not. `key_id` is null when the presented key string never
//! resolved to a record (malformed input or unknown key), so abuse against
//! nonexistent keys is still visible. Rows are never updated or deleted.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Verification audit database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "key_verifications")]
pub struct Model {
    /// Unique identifier for the audit record
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Verified key, or None when the key string resolved to no record
    pub key_id: Option<i64>,
    /// Caller IP address, as reported by the transport layer
    pub ip_address: Option<String>,
    /// Caller user agent
    pub user_agent: Option<String>,
    /// Store URL the caller claimed
    pub store_url: Option<String>,
    /// Whether the verification succeeded
    pub success: bool,
    /// Denial reason for failed attempts
    pub error_message: Option<String>,
    /// JSON snapshot of the inbound request
    pub request_snapshot: Json,
    /// JSON snapshot of the outcome returned to the caller
    pub response_snapshot: Option<Json>,
    /// When the attempt happened
    pub verified_at: DateTimeUtc,
}

/// Defines relationships between `KeyVerification` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each audit record optionally points at the key it verified
    #[sea_orm(
        belongs_to = "super::activation_key::Entity",
        from = "Column::KeyId",
        to = "super::activation_key::Column::Id"
    )]
    ActivationKey,
}

impl Related<super::activation_key::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ActivationKey.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
