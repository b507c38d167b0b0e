//! Unified error types for the licensing core.
//!
//! Verification denials (bad format, unknown key, inactive key, ...) are
//! **not** errors: the pipeline returns them as structured
//! [`VerifyOutcome`](crate::core::verify::VerifyOutcome) values so external
//! storefronts get a stable contract. This enum covers everything else:
//! operator-facing operations, configuration, and the dependency layer.

use thiserror::Error;

/// Errors produced by licensing operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be loaded or parsed.
    #[error("Configuration error: {message}")]
    Config {
        /// Human-readable description of the problem
        message: String,
    },

    /// No activation key exists for the merchant.
    #[error("No activation key found for merchant {merchant_id}")]
    KeyNotFound {
        /// Merchant the lookup was scoped to
        merchant_id: i64,
    },

    /// The merchant row itself is missing.
    #[error("Merchant {merchant_id} not found")]
    MerchantNotFound {
        /// Merchant id that failed to resolve
        merchant_id: i64,
    },

    /// The merchant has no subscription, so no key can be issued.
    #[error("Merchant {merchant_id} has no subscription")]
    NoSubscription {
        /// Merchant the lookup was scoped to
        merchant_id: i64,
    },

    /// The merchant already holds an active key; regenerate instead.
    #[error("Merchant {merchant_id} already has an active key")]
    ActiveKeyExists {
        /// Merchant that owns the conflicting key
        merchant_id: i64,
    },

    /// A concurrent operation changed the key while we were revoking it.
    /// Safe to retry.
    #[error("Activation key for merchant {merchant_id} was modified concurrently")]
    KeyConflict {
        /// Merchant whose key was contended
        merchant_id: i64,
    },

    /// Storage layer failure. Retryable; transactional operations guarantee
    /// no partial mutation was committed.
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Snapshot (de)serialization failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error (configuration files).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns true for failures a caller may retry without operator
    /// intervention (the dependency class plus regenerate races).
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database(_) | Self::KeyConflict { .. })
    }
}

// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
