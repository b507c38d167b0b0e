//! Sweep run entity - Append-only summary of each scheduler batch.
//!
//! One row per sweep, recording the tallies the run reported. Lets operators
//! confirm the scheduler is alive and see how many subscriptions moved
//! without digging through logs.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Sweep run summary database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sweep_runs")]
pub struct Model {
    /// Unique identifier for the run
    #[sea_orm(primary_key)]
    pub id: i64,
    /// When the sweep started
    pub started_at: DateTimeUtc,
    /// When the sweep finished
    pub finished_at: DateTimeUtc,
    /// Subscriptions examined
    pub checked: i32,
    /// Subscriptions whose status changed
    pub updated: i32,
    /// Transitions into EXPIRED during this run
    pub expired: i32,
    /// Transitions into OVERDUE during this run
    pub overdue: i32,
    /// Merchants skipped after an evaluation error
    pub warnings: i32,
}

/// `SweepRun` has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
