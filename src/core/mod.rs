/// Attachment records - image slots, PDF rows and deferred file cleanup
pub mod attachment;
/// Read side - product views, filtering and pagination
pub mod catalog;
/// Categories and subcategories, including seeding
pub mod category;
/// Packing of list-valued product fields into a single column
pub mod codec;
/// Write side - creating, updating and deleting products
pub mod product;
