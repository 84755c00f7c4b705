/// Database configuration and connection management
pub mod database;

/// Category seed loading from catalog.toml
pub mod catalog;

/// Attachment storage settings from environment variables
pub mod storage;
