//! Catalog reads - Reshapes stored products and their relations into the public view.
//!
//! [`project`] is a pure function over already-loaded rows; [`get_product`] and
//! [`list_products`] load those rows and apply it.

use crate::{
    core::{attachment, codec, product::linked_subcategory_ids},
    entities::{
        Category, Pdf, Product, ProductSubcategory, Subcategory, category, image, pdf, product,
        product_subcategory, subcategory,
    },
    errors::Result,
};
use sea_orm::{
    ItemsAndPagesNumber, PaginatorTrait, QueryOrder,
    prelude::*,
    sea_query::{Expr, LikeExpr},
};
use serde::Serialize;

/// Category name shown for products without any subcategory link
pub const NO_CATEGORY: &str = "Uncategorized";

/// Page size used when the caller does not ask for one
pub const DEFAULT_PER_PAGE: u64 = 15;

/// Largest page size a caller may ask for
pub const MAX_PER_PAGE: u64 = 100;

/// `{id, name}` of a subcategory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubcategoryView {
    /// Subcategory id
    pub id: i64,
    /// Subcategory name
    pub name: String,
}

/// The product's category with the subcategories the product is linked to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryView {
    /// Category id, `None` for the placeholder
    pub id: Option<i64>,
    /// Category name, or [`NO_CATEGORY`]
    pub name: String,
    /// Linked subcategories
    pub sub_categories: Vec<SubcategoryView>,
}

/// `{id, url}` of an attachment; both may be null for an image slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttachmentView {
    /// Attachment row id
    pub id: Option<i64>,
    /// Public URL of the stored file
    pub url: Option<String>,
}

/// Public representation of a product
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductView {
    /// Product id
    pub id: i64,
    /// Display name
    pub name: String,
    /// Technical characteristics
    pub characteristics: String,
    /// Optional marketing description
    pub description: Option<String>,
    /// Decoded benefit list
    pub benefits: Vec<String>,
    /// Compatibility notes
    pub compatibility: String,
    /// Unit price
    pub price: f64,
    /// Units in stock
    pub stock: i32,
    /// Whether the product is publicly visible
    pub status: bool,
    /// Category and linked subcategories
    pub category: CategoryView,
    /// Image slot, always present
    pub image: AttachmentView,
    /// Datasheet, if any
    pub pdf: Option<AttachmentView>,
    /// Ids of the linked subcategories, ascending
    pub selected_subcategory_ids: Vec<i64>,
}

/// A product row with everything [`project`] needs
#[derive(Debug, Clone, PartialEq)]
pub struct ProductRelations {
    /// The product row
    pub product: product::Model,
    /// Linked subcategories, ordered by id
    pub subcategories: Vec<subcategory::Model>,
    /// Category of the first linked subcategory
    pub category: Option<category::Model>,
    /// Image slot
    pub image: Option<image::Model>,
    /// Referenced PDF
    pub pdf: Option<pdf::Model>,
}

/// Builds the public view of a product.
#[must_use]
pub fn project(relations: ProductRelations) -> ProductView {
    let ProductRelations {
        product,
        subcategories,
        category,
        image,
        pdf,
    } = relations;

    let selected_subcategory_ids = subcategories.iter().map(|s| s.id).collect();
    let sub_categories = subcategories
        .into_iter()
        .map(|s| SubcategoryView {
            id: s.id,
            name: s.name,
        })
        .collect();
    let category = match category {
        Some(c) => CategoryView {
            id: Some(c.id),
            name: c.name,
            sub_categories,
        },
        None => CategoryView {
            id: None,
            name: NO_CATEGORY.to_string(),
            sub_categories,
        },
    };

    ProductView {
        id: product.id,
        benefits: codec::decode(Some(&product.benefits)),
        name: product.name,
        characteristics: product.characteristics,
        description: product.description,
        compatibility: product.compatibility,
        price: product.price,
        stock: product.stock,
        status: product.status,
        category,
        image: AttachmentView {
            id: image.as_ref().map(|i| i.id),
            url: image.and_then(|i| i.url),
        },
        pdf: pdf.map(|p| AttachmentView {
            id: Some(p.id),
            url: p.url,
        }),
        selected_subcategory_ids,
    }
}

/// Loads the subcategories, category, image slot and PDF of `product`.
pub async fn load_relations<C>(db: &C, product: product::Model) -> Result<ProductRelations>
where
    C: ConnectionTrait,
{
    let ids = linked_subcategory_ids(db, product.id).await?;
    let subcategories = if ids.is_empty() {
        Vec::new()
    } else {
        Subcategory::find()
            .filter(subcategory::Column::Id.is_in(ids))
            .order_by_asc(subcategory::Column::Id)
            .all(db)
            .await?
    };

    let category = match subcategories.first() {
        Some(first) => Category::find_by_id(first.category_id).one(db).await?,
        None => None,
    };
    let image = attachment::find_image(db, product.id).await?;
    let pdf = match product.pdf_id {
        Some(id) => Pdf::find_by_id(id).one(db).await?,
        None => None,
    };

    Ok(ProductRelations {
        product,
        subcategories,
        category,
        image,
        pdf,
    })
}

/// Fetches the public view of one product, visible or not.
pub async fn get_product(db: &DatabaseConnection, product_id: i64) -> Result<Option<ProductView>> {
    match Product::find_by_id(product_id).one(db).await? {
        Some(product) => Ok(Some(project(load_relations(db, product).await?))),
        None => Ok(None),
    }
}

/// Which products a caller may see
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Visibility {
    /// Anonymous callers: only products with `status = true`
    #[default]
    Public,
    /// Authenticated callers: every product
    Everything,
}

/// Filters and paging for [`list_products`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductQuery {
    /// Case-insensitive substring of the product name
    pub name: Option<String>,
    /// Exact name of a linked subcategory
    pub subcategory: Option<String>,
    /// Exact name of the category of a linked subcategory
    pub category: Option<String>,
    /// Caller visibility
    pub visibility: Visibility,
    /// 1-based page number
    pub page: u64,
    /// Requested page size, clamped to `1..=MAX_PER_PAGE`
    pub per_page: Option<u64>,
}

impl Default for ProductQuery {
    fn default() -> Self {
        Self {
            name: None,
            subcategory: None,
            category: None,
            visibility: Visibility::Public,
            page: 1,
            per_page: None,
        }
    }
}

impl ProductQuery {
    /// Effective page size
    #[must_use]
    pub fn page_size(&self) -> u64 {
        self.per_page
            .unwrap_or(DEFAULT_PER_PAGE)
            .clamp(1, MAX_PER_PAGE)
    }
}

/// One page of products
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductPage {
    /// Products on this page
    pub items: Vec<ProductView>,
    /// 1-based page number
    pub current_page: u64,
    /// Page size used
    pub per_page: u64,
    /// Matching products across all pages
    pub total: u64,
    /// Number of the last page, at least 1
    pub last_page: u64,
}

/// Case-folds a product name for storage in `search_name` and for matching against it.
///
/// Folding happens in Rust on both sides; SQLite's `lower()` only folds ASCII.
#[must_use]
pub fn fold_name(name: &str) -> String {
    name.to_lowercase()
}

/// Escapes `LIKE` wildcards so `text` matches literally under `ESCAPE '\'`.
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn filter_text(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

/// Ids of products linked to any of `subcategory_ids`.
async fn products_linked_to(db: &DatabaseConnection, subcategory_ids: Vec<i64>) -> Result<Vec<i64>> {
    let mut ids: Vec<i64> = ProductSubcategory::find()
        .filter(product_subcategory::Column::SubcategoryId.is_in(subcategory_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|link| link.product_id)
        .collect();
    ids.sort_unstable();
    ids.dedup();
    Ok(ids)
}

/// Lists products matching `query`, ordered by id.
pub async fn list_products(db: &DatabaseConnection, query: &ProductQuery) -> Result<ProductPage> {
    let mut select = Product::find();

    if let Some(name) = filter_text(query.name.as_ref()) {
        let pattern = format!("%{}%", escape_like(&fold_name(name)));
        select = select.filter(
            Expr::col((Product, product::Column::SearchName))
                .like(LikeExpr::new(pattern).escape('\\')),
        );
    }

    if let Some(name) = filter_text(query.subcategory.as_ref()) {
        let subcategory_ids = Subcategory::find()
            .filter(subcategory::Column::Name.eq(name))
            .all(db)
            .await?
            .into_iter()
            .map(|s| s.id)
            .collect();
        let product_ids = products_linked_to(db, subcategory_ids).await?;
        select = select.filter(product::Column::Id.is_in(product_ids));
    }

    if let Some(name) = filter_text(query.category.as_ref()) {
        let category_ids: Vec<i64> = Category::find()
            .filter(category::Column::Name.eq(name))
            .all(db)
            .await?
            .into_iter()
            .map(|c| c.id)
            .collect();
        let subcategory_ids = Subcategory::find()
            .filter(subcategory::Column::CategoryId.is_in(category_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|s| s.id)
            .collect();
        let product_ids = products_linked_to(db, subcategory_ids).await?;
        select = select.filter(product::Column::Id.is_in(product_ids));
    }

    if query.visibility == Visibility::Public {
        select = select.filter(product::Column::Status.eq(true));
    }

    let per_page = query.page_size();
    let current_page = query.page.max(1);
    let paginator = select
        .order_by_asc(product::Column::Id)
        .paginate(db, per_page);
    let ItemsAndPagesNumber {
        number_of_items,
        number_of_pages,
    } = paginator.num_items_and_pages().await?;
    let rows = paginator.fetch_page(current_page - 1).await?;

    let mut items = Vec::with_capacity(rows.len());
    for row in rows {
        items.push(project(load_relations(db, row).await?));
    }

    Ok(ProductPage {
        items,
        current_page,
        per_page,
        total: number_of_items,
        last_page: number_of_pages.max(1),
    })
}
