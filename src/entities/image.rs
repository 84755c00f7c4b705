//! Image entity - An attachment slot exclusively owned by one owner row.
//!
//! The owner is stored as an explicit (`owner_kind`, `owner_id`) pair. Products are the only
//! owner kind today; the pair keeps the table usable for other owners without a schema change.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Kind of row owning an image
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum OwnerKind {
    /// Owned by a row of `products`
    #[sea_orm(string_value = "product")]
    Product,
}

/// Image database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "images")]
pub struct Model {
    /// Unique identifier; stable for the life of the owner
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Public URL of the stored file, `None` while the slot is empty
    pub url: Option<String>,
    /// Owner table
    pub owner_kind: OwnerKind,
    /// Owner row id
    pub owner_id: i64,
}

/// Owner integrity is enforced in `core::attachment`, not by a foreign key
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
