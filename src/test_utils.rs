//! Shared test utilities for the catalog.
//!
//! This module provides common helper functions for setting up test databases,
//! attachment storage in a temporary directory, and products with sensible defaults.

use crate::{
    core::{category, product::NewProduct},
    entities,
    errors::Result,
    storage::{AttachmentStore, FilesystemBackend},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sea_orm::DatabaseConnection;
use tempfile::TempDir;

/// Public base URL used by test stores
pub const TEST_PUBLIC_URL: &str = "http://localhost:8000/storage";

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates an attachment store writing into a fresh temporary directory.
///
/// Keep the returned `TempDir` alive for as long as the store is used.
pub fn setup_test_store() -> Result<(TempDir, AttachmentStore)> {
    let dir = TempDir::new()?;
    let store = AttachmentStore::new(FilesystemBackend::new(dir.path()), TEST_PUBLIC_URL);
    Ok((dir, store))
}

/// Categories and subcategories shared by product tests
#[derive(Debug)]
pub struct TestCatalog {
    /// "Agricultura"
    pub category: entities::category::Model,
    /// "Riego"
    pub other_category: entities::category::Model,
    /// "Fertilizantes", under `category`
    pub subcategory: entities::subcategory::Model,
    /// "Semillas", under `category`
    pub second_subcategory: entities::subcategory::Model,
    /// "Goteo", under `other_category`
    pub foreign_subcategory: entities::subcategory::Model,
}

/// Sets up a complete test environment: database, store and two small category trees.
pub async fn setup_with_catalog() -> Result<(DatabaseConnection, TempDir, AttachmentStore, TestCatalog)>
{
    let db = setup_test_db().await?;
    let (dir, store) = setup_test_store()?;

    let agro = category::create_category(&db, "Agricultura").await?;
    let riego = category::create_category(&db, "Riego").await?;
    let catalog = TestCatalog {
        subcategory: category::create_subcategory(&db, agro.id, "Fertilizantes").await?,
        second_subcategory: category::create_subcategory(&db, agro.id, "Semillas").await?,
        foreign_subcategory: category::create_subcategory(&db, riego.id, "Goteo").await?,
        category: agro,
        other_category: riego,
    };

    Ok((db, dir, store, catalog))
}

/// Builds a valid product request with sensible defaults.
///
/// # Defaults
/// * `benefits`: `["b1", "b2"]`
/// * `price`: 2.5
/// * `stock`: 10
/// * no image, no pdf
#[must_use]
pub fn new_product(name: &str, category_id: i64, subcategory_ids: Vec<i64>) -> NewProduct {
    NewProduct {
        name: name.to_string(),
        characteristics: "c".to_string(),
        description: None,
        benefits: vec!["b1".to_string(), "b2".to_string()],
        compatibility: "x".to_string(),
        price: 2.5,
        stock: 10,
        category_id,
        subcategory_ids,
        image: None,
        pdf: None,
    }
}

/// A `data:image/png;base64,` payload around `bytes`
#[must_use]
pub fn png_payload(bytes: &[u8]) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(bytes))
}

/// A `data:application/pdf;base64,` payload around `bytes`
#[must_use]
pub fn pdf_payload(bytes: &[u8]) -> String {
    format!("data:application/pdf;base64,{}", STANDARD.encode(bytes))
}

/// Number of regular files below `dir`, at any depth.
#[must_use]
pub fn count_files(dir: &std::path::Path) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(std::result::Result::ok)
                .map(|entry| {
                    let path = entry.path();
                    if path.is_dir() {
                        count_files(&path)
                    } else {
                        1
                    }
                })
                .sum()
        })
        .unwrap_or(0)
}
