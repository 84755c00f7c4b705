//! Subcategory entity - Second-level grouping, owned by exactly one category.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Subcategory database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "subcategories")]
pub struct Model {
    /// Unique identifier for the subcategory
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name
    pub name: String,
    /// Owning category
    pub category_id: i64,
}

/// Defines relationships between Subcategory and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each subcategory belongs to one category
    #[sea_orm(
        belongs_to = "super::category::Entity",
        from = "Column::CategoryId",
        to = "super::category::Column::Id"
    )]
    Category,
    /// Link rows to products
    #[sea_orm(has_many = "super::product_subcategory::Entity")]
    ProductLinks,
}

impl Related<super::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        super::product_subcategory::Relation::Product.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::product_subcategory::Relation::Subcategory.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
