//! Join table between products and subcategories.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Product ↔ subcategory link
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "product_subcategory")]
pub struct Model {
    /// Linked product
    #[sea_orm(primary_key, auto_increment = false)]
    pub product_id: i64,
    /// Linked subcategory
    #[sea_orm(primary_key, auto_increment = false)]
    pub subcategory_id: i64,
}

/// Each link points at one product and one subcategory
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Linked product
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
    /// Linked subcategory
    #[sea_orm(
        belongs_to = "super::subcategory::Entity",
        from = "Column::SubcategoryId",
        to = "super::subcategory::Column::Id"
    )]
    Subcategory,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl Related<super::subcategory::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Subcategory.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
