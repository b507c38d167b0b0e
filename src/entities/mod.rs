//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod activation_key;
pub mod key_verification;
pub mod merchant;
pub mod notification;
pub mod subscription;
pub mod sweep_run;

// Re-export specific types to avoid conflicts
pub use activation_key::{
    Column as ActivationKeyColumn, Entity as ActivationKey, Model as ActivationKeyModel,
};
pub use key_verification::{
    Column as KeyVerificationColumn, Entity as KeyVerification, Model as KeyVerificationModel,
};
pub use merchant::{Column as MerchantColumn, Entity as Merchant, Model as MerchantModel};
pub use notification::{
    Column as NotificationColumn, Entity as Notification, Model as NotificationModel,
};
pub use subscription::{
    Column as SubscriptionColumn, Entity as Subscription, Model as SubscriptionModel,
};
pub use sweep_run::{Column as SweepRunColumn, Entity as SweepRun, Model as SweepRunModel};
