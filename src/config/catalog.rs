//! Category seed configuration loaded from `catalog.toml`.
//!
//! The file lists the categories and subcategories the catalog starts with. Seeding is
//! additive: entries that already exist (matched by name) are left alone.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// Seed file read by [`load_default_config`]
pub const DEFAULT_CONFIG_PATH: &str = "catalog.toml";

/// Configuration structure representing the entire catalog.toml file
#[derive(Debug, Deserialize)]
pub struct CatalogConfig {
    /// Categories to seed
    #[serde(default)]
    pub categories: Vec<CategorySeed>,
}

/// One category and the subcategories it owns
#[derive(Debug, Deserialize, Clone)]
pub struct CategorySeed {
    /// Category name
    pub name: String,
    /// Names of the subcategories under this category
    #[serde(default)]
    pub subcategories: Vec<String>,
}

/// Loads catalog seed configuration from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - Required fields are missing
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CatalogConfig> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read {}: {e}", path.as_ref().display()),
    })?;

    parse_config(&contents)
}

/// Parses catalog seed configuration from TOML text
pub fn parse_config(contents: &str) -> Result<CatalogConfig> {
    toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse catalog.toml: {e}"),
    })
}

/// Loads catalog seed configuration from the default location (./catalog.toml)
pub fn load_default_config() -> Result<CatalogConfig> {
    load_config(DEFAULT_CONFIG_PATH)
}
