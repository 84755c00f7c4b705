//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod category;
pub mod image;
pub mod pdf;
pub mod product;
pub mod product_subcategory;
pub mod subcategory;

// Re-export specific types to avoid conflicts
pub use category::{Column as CategoryColumn, Entity as Category, Model as CategoryModel};
pub use image::{Column as ImageColumn, Entity as Image, Model as ImageModel, OwnerKind};
pub use pdf::{Column as PdfColumn, Entity as Pdf, Model as PdfModel};
pub use product::{Column as ProductColumn, Entity as Product, Model as ProductModel};
pub use product_subcategory::{
    Column as ProductSubcategoryColumn, Entity as ProductSubcategory,
    Model as ProductSubcategoryModel,
};
pub use subcategory::{
    Column as SubcategoryColumn, Entity as Subcategory, Model as SubcategoryModel,
};
