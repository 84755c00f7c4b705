//! PDF entity - A stored datasheet referenced by at most one product through `products.pdf_id`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// PDF database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "pdfs")]
pub struct Model {
    /// Unique identifier for the PDF
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Public URL of the stored file
    pub url: Option<String>,
    /// When the current file was stored
    pub uploaded_at: DateTime,
}

/// Defines relationships between Pdf and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Products pointing at this PDF
    #[sea_orm(has_many = "super::product::Entity")]
    Products,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Products.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
