//! Category business logic - Creating and looking up categories and subcategories.
//!
//! Products are classified against these rows; the seeding path in `main` and the test
//! fixtures are the main writers.

use crate::{
    config::catalog::CatalogConfig,
    entities::{Category, Subcategory, category, subcategory},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::info;

/// A category together with its subcategories, ordered by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryTree {
    /// The category row
    pub category: category::Model,
    /// Subcategories owned by `category`
    pub subcategories: Vec<subcategory::Model>,
}

/// Creates a category, trimming whitespace from the name.
///
/// # Errors
/// Returns an error if:
/// - The name is empty or whitespace-only
/// - A category with the same name already exists
/// - The database insert operation fails
pub async fn create_category<C>(db: &C, name: &str) -> Result<category::Model>
where
    C: ConnectionTrait,
{
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::validation("name", "Category name cannot be empty"));
    }
    if get_category_by_name(db, name).await?.is_some() {
        return Err(Error::Conflict {
            resource: "category",
            name: name.to_string(),
        });
    }

    category::ActiveModel {
        name: Set(name.to_string()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Creates a subcategory under an existing category.
///
/// # Errors
/// Returns an error if the name is blank, the category does not exist, or the insert fails.
pub async fn create_subcategory<C>(
    db: &C,
    category_id: i64,
    name: &str,
) -> Result<subcategory::Model>
where
    C: ConnectionTrait,
{
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::validation(
            "name",
            "Subcategory name cannot be empty",
        ));
    }
    if Category::find_by_id(category_id).one(db).await?.is_none() {
        return Err(Error::NotFound {
            resource: "category",
            id: category_id,
        });
    }

    subcategory::ActiveModel {
        name: Set(name.to_string()),
        category_id: Set(category_id),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Finds a category by exact name.
pub async fn get_category_by_name<C>(db: &C, name: &str) -> Result<Option<category::Model>>
where
    C: ConnectionTrait,
{
    Category::find()
        .filter(category::Column::Name.eq(name))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Lists every category with its subcategories, both ordered alphabetically.
pub async fn list_categories_with_subcategories(
    db: &DatabaseConnection,
) -> Result<Vec<CategoryTree>> {
    let categories = Category::find()
        .order_by_asc(category::Column::Name)
        .all(db)
        .await?;
    let mut subcategories = Subcategory::find()
        .order_by_asc(subcategory::Column::Name)
        .all(db)
        .await?;

    Ok(categories
        .into_iter()
        .map(|category| {
            let (owned, rest): (Vec<_>, Vec<_>) = subcategories
                .drain(..)
                .partition(|s| s.category_id == category.id);
            subcategories = rest;
            CategoryTree {
                category,
                subcategories: owned,
            }
        })
        .collect())
}

/// Inserts the categories and subcategories from `config` that do not exist yet.
///
/// Runs in one transaction; returns how many rows were created.
pub async fn seed_catalog(db: &DatabaseConnection, config: &CatalogConfig) -> Result<usize> {
    let txn = db.begin().await?;
    let mut created = 0;

    for seed in &config.categories {
        let category = match get_category_by_name(&txn, seed.name.trim()).await? {
            Some(existing) => existing,
            None => {
                created += 1;
                create_category(&txn, &seed.name).await?
            }
        };

        let mut existing: Vec<String> = Subcategory::find()
            .filter(subcategory::Column::CategoryId.eq(category.id))
            .all(&txn)
            .await?
            .into_iter()
            .map(|s| s.name)
            .collect();

        for name in &seed.subcategories {
            if !existing.iter().any(|e| e == name.trim()) {
                let sub = create_subcategory(&txn, category.id, name).await?;
                existing.push(sub.name);
                created += 1;
            }
        }
    }

    txn.commit().await?;
    info!(created, "catalog seed applied");
    Ok(created)
}
