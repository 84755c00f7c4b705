//! Product entity - A catalog item with optional PDF datasheet and a permanent image slot.
//!
//! `benefits` holds an ordered list packed by [`crate::core::codec`]; read it through
//! `codec::decode`, never directly. `status` mirrors `stock != 0` and is only written by
//! the product write operations.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Product database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    /// Unique identifier for the product
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Unique display name
    #[sea_orm(unique)]
    pub name: String,
    /// `name` folded to lowercase; the name filter matches against this
    pub search_name: String,
    /// Technical characteristics, free text
    #[sea_orm(column_type = "Text")]
    pub characteristics: String,
    /// Optional marketing description
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    /// Encoded list of benefits
    #[sea_orm(column_type = "Text")]
    pub benefits: String,
    /// Compatibility notes, free text
    #[sea_orm(column_type = "Text")]
    pub compatibility: String,
    /// Unit price, always positive
    pub price: f64,
    /// Units in stock
    pub stock: i32,
    /// Visible to the public; true iff `stock != 0`
    pub status: bool,
    /// Selected category
    pub category_id: i64,
    /// Attached datasheet, if any
    pub pdf_id: Option<i64>,
    /// When the product was created
    pub created_at: DateTime,
    /// When the product was last modified
    pub updated_at: DateTime,
}

/// Defines relationships between Product and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each product belongs to one category
    #[sea_orm(
        belongs_to = "super::category::Entity",
        from = "Column::CategoryId",
        to = "super::category::Column::Id"
    )]
    Category,
    /// A product may reference one PDF
    #[sea_orm(
        belongs_to = "super::pdf::Entity",
        from = "Column::PdfId",
        to = "super::pdf::Column::Id"
    )]
    Pdf,
    /// Link rows to subcategories
    #[sea_orm(has_many = "super::product_subcategory::Entity")]
    SubcategoryLinks,
}

impl Related<super::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl Related<super::pdf::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Pdf.def()
    }
}

impl Related<super::subcategory::Entity> for Entity {
    fn to() -> RelationDef {
        super::product_subcategory::Relation::Subcategory.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::product_subcategory::Relation::Product.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
