/// Verification attempt and lifecycle audit records
pub mod audit;

/// Activation key issuance, regeneration, and lookups
pub mod keys;

/// Outbox-style merchant notifications with 24h deduplication
pub mod notify;

/// Subscription state machine and its cascade into merchants and keys
pub mod subscription;

/// Scheduled batch evaluation and renewal reminders
pub mod sweep;

/// The activation key verification pipeline
pub mod verify;
