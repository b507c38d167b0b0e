/// Database configuration and connection management
pub mod database;

/// Licensing time parameters loaded from config.toml
pub mod licensing;
