//! Product business logic - Creating, updating and deleting catalog products.
//!
//! Each write runs in one database transaction together with its subcategory links and
//! attachment rows; attachment files are settled through [`StagedFiles`] once the
//! transaction outcome is known. Field rules mirror the request validator of the public API:
//! names up to 256 characters, free-text fields up to 10 000, prices in `(0, 999 999.99]`,
//! stock in `0..=10 000`.

use crate::{
    core::{
        attachment::{self, AttachmentChange, StagedFiles},
        catalog::fold_name,
        codec,
    },
    entities::{Category, Pdf, Product, ProductSubcategory, Subcategory, product, product_subcategory},
    errors::{Error, Result},
    storage::AttachmentStore,
};
use sea_orm::{PaginatorTrait, QueryOrder, Set, SqlErr, TransactionTrait, prelude::*};
use tracing::{info, instrument};

const MAX_NAME_CHARS: usize = 256;
const MAX_TEXT_CHARS: usize = 10_000;
const MAX_PRICE: f64 = 999_999.99;
const MAX_STOCK: i32 = 10_000;

/// A complete request to create a product
#[derive(Debug, Clone, PartialEq)]
pub struct NewProduct {
    /// Unique display name
    pub name: String,
    /// Technical characteristics
    pub characteristics: String,
    /// Optional marketing description
    pub description: Option<String>,
    /// Ordered benefits, at least one
    pub benefits: Vec<String>,
    /// Compatibility notes
    pub compatibility: String,
    /// Unit price
    pub price: f64,
    /// Units in stock
    pub stock: i32,
    /// Selected category
    pub category_id: i64,
    /// Subcategories of `category_id`, at least one
    pub subcategory_ids: Vec<i64>,
    /// Optional `data:image/...;base64,` payload
    pub image: Option<String>,
    /// Optional `data:application/pdf;base64,` payload
    pub pdf: Option<String>,
}

/// A partial update; `None` fields and blank strings are left untouched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductChanges {
    /// New name
    pub name: Option<String>,
    /// New characteristics
    pub characteristics: Option<String>,
    /// New description
    pub description: Option<String>,
    /// Replacement benefit list; an empty list is ignored
    pub benefits: Option<Vec<String>>,
    /// New compatibility notes
    pub compatibility: Option<String>,
    /// New price
    pub price: Option<f64>,
    /// New stock; also recomputes `status`
    pub stock: Option<i32>,
    /// New category; existing links must belong to it unless `subcategory_ids` replaces them
    pub category_id: Option<i64>,
    /// Replacement subcategory set; an empty list is ignored
    pub subcategory_ids: Option<Vec<i64>>,
    /// Image slot change
    pub image: AttachmentChange,
    /// PDF change
    pub pdf: AttachmentChange,
}

/// Trims `value` and checks it is non-empty and at most `max` characters.
fn required_text(field: &str, value: &str, max: usize) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::validation(field, "cannot be empty"));
    }
    if value.chars().count() > max {
        return Err(Error::validation(
            field,
            format!("cannot exceed {max} characters"),
        ));
    }
    Ok(value.to_string())
}

/// `Some(trimmed)` for a present, non-blank value.
fn supplied(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

fn validate_price(price: f64) -> Result<f64> {
    if !price.is_finite() || price <= 0.0 || price > MAX_PRICE {
        return Err(Error::validation(
            "price",
            format!("must be greater than 0 and at most {MAX_PRICE}"),
        ));
    }
    Ok(price)
}

fn validate_stock(stock: i32) -> Result<i32> {
    if !(0..=MAX_STOCK).contains(&stock) {
        return Err(Error::validation(
            "stock",
            format!("must be between 0 and {MAX_STOCK}"),
        ));
    }
    Ok(stock)
}

/// Removes duplicate ids, keeping first occurrences in order.
fn dedup_ids(ids: &[i64]) -> Vec<i64> {
    let mut unique = Vec::with_capacity(ids.len());
    for id in ids {
        if !unique.contains(id) {
            unique.push(*id);
        }
    }
    unique
}

/// Fails with `Conflict` if another product already uses `name`.
async fn ensure_name_available<C>(db: &C, name: &str, except: Option<i64>) -> Result<()>
where
    C: ConnectionTrait,
{
    let mut query = Product::find().filter(product::Column::Name.eq(name));
    if let Some(id) = except {
        query = query.filter(product::Column::Id.ne(id));
    }
    if query.count(db).await? > 0 {
        return Err(Error::Conflict {
            resource: "product",
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Turns a unique-index violation on `products.name` into `Conflict`.
///
/// Covers concurrent writers that both passed [`ensure_name_available`].
fn name_conflict(err: DbErr, name: &str) -> Error {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => Error::Conflict {
            resource: "product",
            name: name.to_string(),
        },
        _ => Error::Database(err),
    }
}

/// Checks that `category_id` exists and every subcategory in `subcategory_ids` exists and
/// belongs to it.
///
/// # Errors
/// Returns `ValidationFailed` on `category_id` or `subcategory_id` otherwise.
pub async fn ensure_category_consistency<C>(
    db: &C,
    category_id: i64,
    subcategory_ids: &[i64],
) -> Result<()>
where
    C: ConnectionTrait,
{
    if Category::find_by_id(category_id).one(db).await?.is_none() {
        return Err(Error::validation(
            "category_id",
            format!("category {category_id} does not exist"),
        ));
    }
    if subcategory_ids.is_empty() {
        return Err(Error::validation(
            "subcategory_id",
            "at least one subcategory is required",
        ));
    }

    let found = Subcategory::find()
        .filter(crate::entities::subcategory::Column::Id.is_in(subcategory_ids.to_vec()))
        .all(db)
        .await?;

    for id in subcategory_ids {
        match found.iter().find(|s| s.id == *id) {
            None => {
                return Err(Error::validation(
                    "subcategory_id",
                    format!("subcategory {id} does not exist"),
                ));
            }
            Some(sub) if sub.category_id != category_id => {
                return Err(Error::validation(
                    "subcategory_id",
                    format!(
                        "subcategory {id} belongs to category {}, not to the selected category {category_id}",
                        sub.category_id
                    ),
                ));
            }
            Some(_) => {}
        }
    }
    Ok(())
}

/// Ids of the subcategories linked to `product_id`, ascending.
pub async fn linked_subcategory_ids<C>(db: &C, product_id: i64) -> Result<Vec<i64>>
where
    C: ConnectionTrait,
{
    Ok(ProductSubcategory::find()
        .filter(product_subcategory::Column::ProductId.eq(product_id))
        .order_by_asc(product_subcategory::Column::SubcategoryId)
        .all(db)
        .await?
        .into_iter()
        .map(|link| link.subcategory_id)
        .collect())
}

/// Replaces the subcategory links of `product_id` with `subcategory_ids`.
async fn replace_links<C>(db: &C, product_id: i64, subcategory_ids: &[i64]) -> Result<()>
where
    C: ConnectionTrait,
{
    ProductSubcategory::delete_many()
        .filter(product_subcategory::Column::ProductId.eq(product_id))
        .exec(db)
        .await?;

    let links = subcategory_ids
        .iter()
        .map(|id| product_subcategory::ActiveModel {
            product_id: Set(product_id),
            subcategory_id: Set(*id),
        });
    ProductSubcategory::insert_many(links)
        .exec_without_returning(db)
        .await?;
    Ok(())
}

/// Validated, normalised create request
struct ProductFields {
    name: String,
    characteristics: String,
    description: Option<String>,
    benefits: String,
    compatibility: String,
    price: f64,
    stock: i32,
    category_id: i64,
    subcategory_ids: Vec<i64>,
}

impl ProductFields {
    fn validate(input: &NewProduct) -> Result<Self> {
        let subcategory_ids = dedup_ids(&input.subcategory_ids);
        if subcategory_ids.is_empty() {
            return Err(Error::validation(
                "subcategory_id",
                "at least one subcategory is required",
            ));
        }

        Ok(Self {
            name: required_text("name", &input.name, MAX_NAME_CHARS)?,
            characteristics: required_text(
                "characteristics",
                &input.characteristics,
                MAX_TEXT_CHARS,
            )?,
            description: supplied(input.description.as_ref())
                .map(|d| required_text("description", d, MAX_TEXT_CHARS))
                .transpose()?,
            benefits: codec::encode("benefits", &input.benefits)?,
            compatibility: required_text("compatibility", &input.compatibility, MAX_TEXT_CHARS)?,
            price: validate_price(input.price)?,
            stock: validate_stock(input.stock)?,
            category_id: input.category_id,
            subcategory_ids,
        })
    }
}

/// Creates a product with its subcategory links, image slot and optional PDF.
///
/// The image slot row is always created, empty if no image was supplied, so the product
/// has a stable image id from the start.
///
/// # Errors
/// Returns an error if:
/// - A field is invalid, the category does not exist, or a subcategory is unknown or belongs
///   to another category (`ValidationFailed`)
/// - Another product already has this name (`Conflict`)
/// - An attachment payload is malformed (`InvalidFormat`) or cannot be stored
///
/// Nothing is persisted and no file is left behind when any of these occur.
#[instrument(skip(db, store, input), fields(name = %input.name))]
pub async fn create_product(
    db: &DatabaseConnection,
    store: &AttachmentStore,
    input: NewProduct,
) -> Result<product::Model> {
    let fields = ProductFields::validate(&input)?;

    let txn = db.begin().await?;
    let mut staged = StagedFiles::new(store);
    let outcome = insert_product(&txn, &mut staged, fields, &input).await;
    let created = staged.settle(txn, outcome).await?;

    info!(product_id = created.id, "product created");
    Ok(created)
}

async fn insert_product<C>(
    db: &C,
    staged: &mut StagedFiles<'_>,
    fields: ProductFields,
    input: &NewProduct,
) -> Result<product::Model>
where
    C: ConnectionTrait,
{
    ensure_name_available(db, &fields.name, None).await?;
    ensure_category_consistency(db, fields.category_id, &fields.subcategory_ids).await?;

    let pdf_id = match supplied(input.pdf.as_ref()) {
        Some(payload) => Some(attachment::create_pdf(db, staged, payload).await?.id),
        None => None,
    };

    let now = chrono::Utc::now().naive_utc();
    let name = fields.name;
    let created = product::ActiveModel {
        search_name: Set(fold_name(&name)),
        name: Set(name.clone()),
        characteristics: Set(fields.characteristics),
        description: Set(fields.description),
        benefits: Set(fields.benefits),
        compatibility: Set(fields.compatibility),
        price: Set(fields.price),
        stock: Set(fields.stock),
        status: Set(fields.stock != 0),
        category_id: Set(fields.category_id),
        pdf_id: Set(pdf_id),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(|e| name_conflict(e, &name))?;

    replace_links(db, created.id, &fields.subcategory_ids).await?;
    attachment::open_image_slot(db, staged, created.id, supplied(input.image.as_ref())).await?;

    Ok(created)
}

/// Validated partial update
#[derive(Default)]
struct ChangedFields {
    name: Option<String>,
    characteristics: Option<String>,
    description: Option<String>,
    benefits: Option<String>,
    compatibility: Option<String>,
    price: Option<f64>,
    stock: Option<i32>,
    subcategory_ids: Option<Vec<i64>>,
}

impl ChangedFields {
    fn validate(changes: &ProductChanges) -> Result<Self> {
        Ok(Self {
            name: supplied(changes.name.as_ref())
                .map(|v| required_text("name", v, MAX_NAME_CHARS))
                .transpose()?,
            characteristics: supplied(changes.characteristics.as_ref())
                .map(|v| required_text("characteristics", v, MAX_TEXT_CHARS))
                .transpose()?,
            description: supplied(changes.description.as_ref())
                .map(|v| required_text("description", v, MAX_TEXT_CHARS))
                .transpose()?,
            benefits: changes
                .benefits
                .as_ref()
                .filter(|b| !b.is_empty())
                .map(|b| codec::encode("benefits", b))
                .transpose()?,
            compatibility: supplied(changes.compatibility.as_ref())
                .map(|v| required_text("compatibility", v, MAX_TEXT_CHARS))
                .transpose()?,
            price: changes.price.map(validate_price).transpose()?,
            stock: changes.stock.map(validate_stock).transpose()?,
            subcategory_ids: changes
                .subcategory_ids
                .as_ref()
                .filter(|ids| !ids.is_empty())
                .map(|ids| dedup_ids(ids)),
        })
    }
}

/// Applies a partial update to product `product_id`.
///
/// Only supplied, non-blank fields change. Supplying `stock` recomputes `status`; supplying
/// `subcategory_ids` replaces the whole link set after the category check; attachment changes
/// go through the image slot and PDF record of the product.
///
/// # Errors
/// Returns an error if:
/// - The product does not exist (`NotFound`)
/// - The new name is taken by another product (`Conflict`)
/// - A supplied field is invalid or the category check fails (`ValidationFailed`)
/// - An attachment payload is malformed (`InvalidFormat`) or cannot be stored
#[instrument(skip(db, store, changes))]
pub async fn update_product(
    db: &DatabaseConnection,
    store: &AttachmentStore,
    product_id: i64,
    changes: ProductChanges,
) -> Result<product::Model> {
    let fields = ChangedFields::validate(&changes)?;

    let txn = db.begin().await?;
    let mut staged = StagedFiles::new(store);
    let outcome = apply_changes(&txn, &mut staged, product_id, fields, changes).await;
    let updated = staged.settle(txn, outcome).await?;

    info!(product_id, "product updated");
    Ok(updated)
}

async fn apply_changes<C>(
    db: &C,
    staged: &mut StagedFiles<'_>,
    product_id: i64,
    fields: ChangedFields,
    changes: ProductChanges,
) -> Result<product::Model>
where
    C: ConnectionTrait,
{
    let current = Product::find_by_id(product_id)
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            resource: "product",
            id: product_id,
        })?;

    if let Some(name) = &fields.name {
        ensure_name_available(db, name, Some(product_id)).await?;
    }

    let category_id = changes.category_id.unwrap_or(current.category_id);
    if let Some(ids) = &fields.subcategory_ids {
        ensure_category_consistency(db, category_id, ids).await?;
        replace_links(db, product_id, ids).await?;
    } else if category_id != current.category_id {
        let linked = linked_subcategory_ids(db, product_id).await?;
        ensure_category_consistency(db, category_id, &linked).await?;
    }

    let pdf_id = attachment::sync_pdf(db, staged, &current, changes.pdf).await?;
    attachment::sync_image(db, staged, product_id, changes.image).await?;

    let final_name = fields.name.clone().unwrap_or_else(|| current.name.clone());
    let mut product: product::ActiveModel = current.into();
    if let Some(name) = fields.name {
        product.search_name = Set(fold_name(&name));
        product.name = Set(name);
    }
    if let Some(characteristics) = fields.characteristics {
        product.characteristics = Set(characteristics);
    }
    if let Some(description) = fields.description {
        product.description = Set(Some(description));
    }
    if let Some(benefits) = fields.benefits {
        product.benefits = Set(benefits);
    }
    if let Some(compatibility) = fields.compatibility {
        product.compatibility = Set(compatibility);
    }
    if let Some(price) = fields.price {
        product.price = Set(price);
    }
    if let Some(stock) = fields.stock {
        product.stock = Set(stock);
        product.status = Set(stock != 0);
    }
    product.category_id = Set(category_id);
    product.pdf_id = Set(pdf_id);
    product.updated_at = Set(chrono::Utc::now().naive_utc());

    product
        .update(db)
        .await
        .map_err(|e| name_conflict(e, &final_name))
}

/// Deletes a product together with its links, image slot and PDF, then removes their files.
///
/// # Errors
/// Returns `NotFound` if no product has this id, or a database error if the deletion fails.
/// Files are only removed after the deletion committed.
#[instrument(skip(db, store))]
pub async fn delete_product(
    db: &DatabaseConnection,
    store: &AttachmentStore,
    product_id: i64,
) -> Result<()> {
    let txn = db.begin().await?;
    let mut staged = StagedFiles::new(store);
    let outcome = remove_product(&txn, &mut staged, product_id).await;
    staged.settle(txn, outcome).await?;

    info!(product_id, "product deleted");
    Ok(())
}

async fn remove_product<C>(db: &C, staged: &mut StagedFiles<'_>, product_id: i64) -> Result<()>
where
    C: ConnectionTrait,
{
    let product = Product::find_by_id(product_id)
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            resource: "product",
            id: product_id,
        })?;

    attachment::remove_image_slots(db, staged, product_id).await?;

    let pdf_id = product.pdf_id;
    ProductSubcategory::delete_many()
        .filter(product_subcategory::Column::ProductId.eq(product_id))
        .exec(db)
        .await?;
    product.delete(db).await?;

    if let Some(pdf_id) = pdf_id {
        if let Some(row) = Pdf::find_by_id(pdf_id).one(db).await? {
            attachment::remove_pdf(db, staged, row).await?;
        }
    }
    Ok(())
}

/// Deletes a PDF row that no product references any more, along with its file.
///
/// # Errors
/// Returns `NotFound` if the PDF does not exist, and `ValidationFailed` if a product still
/// references it (delete or update that product instead).
#[instrument(skip(db, store))]
pub async fn purge_dangling_pdf(
    db: &DatabaseConnection,
    store: &AttachmentStore,
    pdf_id: i64,
) -> Result<()> {
    let txn = db.begin().await?;
    let mut staged = StagedFiles::new(store);
    let outcome = remove_dangling_pdf(&txn, &mut staged, pdf_id).await;
    staged.settle(txn, outcome).await?;

    info!(pdf_id, "dangling pdf purged");
    Ok(())
}

async fn remove_dangling_pdf<C>(db: &C, staged: &mut StagedFiles<'_>, pdf_id: i64) -> Result<()>
where
    C: ConnectionTrait,
{
    let row = Pdf::find_by_id(pdf_id).one(db).await?.ok_or(Error::NotFound {
        resource: "pdf",
        id: pdf_id,
    })?;

    if let Some(owner) = Product::find()
        .filter(product::Column::PdfId.eq(pdf_id))
        .one(db)
        .await?
    {
        return Err(Error::validation(
            "pdf_id",
            format!("pdf {pdf_id} is still attached to product {}", owner.id),
        ));
    }

    attachment::remove_pdf(db, staged, row).await
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::core::catalog::get_product;
    use crate::entities::{Image, pdf};
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_create_product_scenario() -> Result<()> {
        let (db, _dir, store, catalog) = setup_with_catalog().await?;

        let created = create_product(
            &db,
            &store,
            new_product("Tomate", catalog.category.id, vec![catalog.subcategory.id]),
        )
        .await?;

        assert!(created.status);
        let view = get_product(&db, created.id).await?.unwrap();
        assert_eq!(view.benefits, vec!["b1", "b2"]);
        assert!(view.status);
        assert_eq!(view.price, 2.5);
        assert_eq!(view.selected_subcategory_ids, vec![catalog.subcategory.id]);
        assert_eq!(view.category.id, Some(catalog.category.id));
        assert_eq!(view.category.name, "Agricultura");
        assert!(view.pdf.is_none());

        // The image slot exists from creation on, even without an image
        assert!(view.image.id.is_some());
        assert!(view.image.url.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn test_create_product_with_attachments() -> Result<()> {
        let (db, dir, store, catalog) = setup_with_catalog().await?;
        let mut input = new_product("Tomate", catalog.category.id, vec![catalog.subcategory.id]);
        input.image = Some(png_payload(b"image-bytes"));
        input.pdf = Some(pdf_payload(b"%PDF-1.4"));

        let created = create_product(&db, &store, input).await?;

        let view = get_product(&db, created.id).await?.unwrap();
        let image_url = view.image.url.unwrap();
        let pdf_url = view.pdf.unwrap().url.unwrap();
        assert!(image_url.starts_with(&format!("{TEST_PUBLIC_URL}/products/")));
        assert!(pdf_url.starts_with(&format!("{TEST_PUBLIC_URL}/pdf/")));
        assert!(store.exists(&image_url).await?);
        assert!(store.exists(&pdf_url).await?);
        assert_eq!(count_files(dir.path()), 2);

        Ok(())
    }

    #[tokio::test]
    async fn test_create_rejects_category_mismatch() -> Result<()> {
        let (db, dir, store, catalog) = setup_with_catalog().await?;
        let mut input = new_product(
            "Tomate",
            catalog.category.id,
            vec![catalog.subcategory.id, catalog.foreign_subcategory.id],
        );
        input.pdf = Some(pdf_payload(b"%PDF-1.4"));

        let result = create_product(&db, &store, input).await;

        assert!(matches!(
            result,
            Err(Error::ValidationFailed { ref field, .. }) if field == "subcategory_id"
        ));
        assert_eq!(Product::find().count(&db).await?, 0);
        assert_eq!(Pdf::find().count(&db).await?, 0);
        assert_eq!(count_files(dir.path()), 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_create_rejects_unknown_references() -> Result<()> {
        let (db, _dir, store, catalog) = setup_with_catalog().await?;

        let unknown_category =
            create_product(&db, &store, new_product("A", 999, vec![catalog.subcategory.id])).await;
        assert!(matches!(
            unknown_category,
            Err(Error::ValidationFailed { ref field, .. }) if field == "category_id"
        ));

        let unknown_sub =
            create_product(&db, &store, new_product("B", catalog.category.id, vec![999])).await;
        assert!(matches!(
            unknown_sub,
            Err(Error::ValidationFailed { ref field, .. }) if field == "subcategory_id"
        ));

        assert_eq!(Product::find().count(&db).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_create_duplicate_name_conflicts() -> Result<()> {
        let (db, _dir, store, catalog) = setup_with_catalog().await?;
        let sub = vec![catalog.subcategory.id];
        create_product(&db, &store, new_product("Tomate", catalog.category.id, sub.clone()))
            .await?;

        let result = create_product(&db, &store, new_product("Tomate", catalog.category.id, sub))
            .await;

        assert!(matches!(
            result,
            Err(Error::Conflict {
                resource: "product",
                ..
            })
        ));
        assert_eq!(Product::find().count(&db).await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_unique_index_violation_maps_to_conflict() -> Result<()> {
        let (db, _dir, store, catalog) = setup_with_catalog().await?;
        let existing = create_product(
            &db,
            &store,
            new_product("Tomate", catalog.category.id, vec![catalog.subcategory.id]),
        )
        .await?;

        // A writer that raced past the availability check lands on the unique index
        let now = chrono::Utc::now().naive_utc();
        let err = product::ActiveModel {
            name: Set(existing.name.clone()),
            search_name: Set(existing.search_name.clone()),
            characteristics: Set("c".to_string()),
            description: Set(None),
            benefits: Set("b1".to_string()),
            compatibility: Set("x".to_string()),
            price: Set(1.0),
            stock: Set(1),
            status: Set(true),
            category_id: Set(catalog.category.id),
            pdf_id: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap_err();

        let mapped = name_conflict(err, "Tomate");
        assert!(matches!(
            mapped,
            Error::Conflict {
                resource: "product",
                ref name
            } if name == "Tomate"
        ));
        assert_eq!(mapped.kind(), crate::errors::ErrorKind::Conflict);

        let other = name_conflict(DbErr::Custom("boom".to_string()), "Tomate");
        assert!(matches!(other, Error::Database(_)));

        Ok(())
    }

    #[tokio::test]
    async fn test_create_field_validation() -> Result<()> {
        let (db, _dir, store, catalog) = setup_with_catalog().await?;
        let base = new_product("Tomate", catalog.category.id, vec![catalog.subcategory.id]);

        let cases: Vec<(&str, NewProduct)> = vec![
            ("name", NewProduct { name: "   ".to_string(), ..base.clone() }),
            ("name", NewProduct { name: "n".repeat(257), ..base.clone() }),
            ("characteristics", NewProduct { characteristics: String::new(), ..base.clone() }),
            ("compatibility", NewProduct { compatibility: " ".to_string(), ..base.clone() }),
            ("benefits", NewProduct { benefits: Vec::new(), ..base.clone() }),
            ("benefits", NewProduct { benefits: vec!["a益b".to_string()], ..base.clone() }),
            ("price", NewProduct { price: 0.0, ..base.clone() }),
            ("price", NewProduct { price: f64::NAN, ..base.clone() }),
            ("price", NewProduct { price: 1_000_000.0, ..base.clone() }),
            ("stock", NewProduct { stock: -1, ..base.clone() }),
            ("stock", NewProduct { stock: 10_001, ..base.clone() }),
            ("subcategory_id", NewProduct { subcategory_ids: Vec::new(), ..base.clone() }),
        ];

        for (expected, input) in cases {
            let result = create_product(&db, &store, input).await;
            assert!(
                matches!(result, Err(Error::ValidationFailed { ref field, .. }) if field == expected),
                "expected validation failure on {expected}, got {result:?}"
            );
        }
        assert_eq!(Product::find().count(&db).await?, 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_create_with_bad_image_leaves_nothing_behind() -> Result<()> {
        let (db, dir, store, catalog) = setup_with_catalog().await?;
        let mut input = new_product("Tomate", catalog.category.id, vec![catalog.subcategory.id]);
        input.pdf = Some(pdf_payload(b"%PDF-1.4"));
        input.image = Some("iVBORw0KGgo=".to_string());

        let result = create_product(&db, &store, input).await;

        assert!(matches!(result, Err(Error::InvalidFormat { kind: "image", .. })));
        assert_eq!(Product::find().count(&db).await?, 0);
        assert_eq!(Pdf::find().count(&db).await?, 0);
        assert_eq!(Image::find().count(&db).await?, 0);
        // The PDF written before the image failed is removed again
        assert_eq!(count_files(dir.path()), 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_stock_drives_status() -> Result<()> {
        let (db, _dir, store, catalog) = setup_with_catalog().await?;
        let mut input = new_product("Tomate", catalog.category.id, vec![catalog.subcategory.id]);
        input.stock = 0;
        let created = create_product(&db, &store, input).await?;
        assert!(!created.status);

        let restocked = update_product(
            &db,
            &store,
            created.id,
            ProductChanges {
                stock: Some(3),
                ..Default::default()
            },
        )
        .await?;
        assert!(restocked.status);

        update_product(
            &db,
            &store,
            created.id,
            ProductChanges {
                stock: Some(0),
                ..Default::default()
            },
        )
        .await?;
        let view = get_product(&db, created.id).await?.unwrap();
        assert!(!view.status);
        assert_eq!(view.stock, 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_partial_update_only_touches_supplied_fields() -> Result<()> {
        let (db, _dir, store, catalog) = setup_with_catalog().await?;
        let created = create_product(
            &db,
            &store,
            new_product("Tomate", catalog.category.id, vec![catalog.subcategory.id]),
        )
        .await?;
        let before = get_product(&db, created.id).await?.unwrap();

        let updated = update_product(
            &db,
            &store,
            created.id,
            ProductChanges {
                price: Some(10.5),
                name: Some("   ".to_string()),
                benefits: Some(Vec::new()),
                subcategory_ids: Some(Vec::new()),
                ..Default::default()
            },
        )
        .await?;

        assert_eq!(updated.price, 10.5);
        let after = get_product(&db, created.id).await?.unwrap();
        assert_eq!(after.name, before.name);
        assert_eq!(after.characteristics, before.characteristics);
        assert_eq!(after.benefits, before.benefits);
        assert_eq!(after.stock, before.stock);
        assert_eq!(after.status, before.status);
        assert_eq!(after.category, before.category);
        assert_eq!(after.selected_subcategory_ids, before.selected_subcategory_ids);
        assert_eq!(after.image, before.image);

        Ok(())
    }

    #[tokio::test]
    async fn test_update_fields_and_subcategories() -> Result<()> {
        let (db, _dir, store, catalog) = setup_with_catalog().await?;
        let created = create_product(
            &db,
            &store,
            new_product("Tomate", catalog.category.id, vec![catalog.subcategory.id]),
        )
        .await?;

        update_product(
            &db,
            &store,
            created.id,
            ProductChanges {
                name: Some(" Tomate Cherry ".to_string()),
                description: Some("Dulce".to_string()),
                benefits: Some(vec!["b3".to_string()]),
                subcategory_ids: Some(vec![
                    catalog.second_subcategory.id,
                    catalog.subcategory.id,
                    catalog.second_subcategory.id,
                ]),
                ..Default::default()
            },
        )
        .await?;

        let view = get_product(&db, created.id).await?.unwrap();
        assert_eq!(view.name, "Tomate Cherry");
        assert_eq!(view.description.as_deref(), Some("Dulce"));
        assert_eq!(view.benefits, vec!["b3"]);
        assert_eq!(
            view.selected_subcategory_ids,
            vec![catalog.subcategory.id, catalog.second_subcategory.id]
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_update_rejects_mismatch_and_keeps_state() -> Result<()> {
        let (db, _dir, store, catalog) = setup_with_catalog().await?;
        let created = create_product(
            &db,
            &store,
            new_product("Tomate", catalog.category.id, vec![catalog.subcategory.id]),
        )
        .await?;

        let foreign_links = update_product(
            &db,
            &store,
            created.id,
            ProductChanges {
                price: Some(99.0),
                subcategory_ids: Some(vec![catalog.foreign_subcategory.id]),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(foreign_links, Err(Error::ValidationFailed { .. })));

        // Moving category without moving the links breaks the invariant too
        let category_only = update_product(
            &db,
            &store,
            created.id,
            ProductChanges {
                category_id: Some(catalog.other_category.id),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(category_only, Err(Error::ValidationFailed { .. })));

        let view = get_product(&db, created.id).await?.unwrap();
        assert_eq!(view.price, 2.5);
        assert_eq!(view.selected_subcategory_ids, vec![catalog.subcategory.id]);

        // Moving both together is fine
        update_product(
            &db,
            &store,
            created.id,
            ProductChanges {
                category_id: Some(catalog.other_category.id),
                subcategory_ids: Some(vec![catalog.foreign_subcategory.id]),
                ..Default::default()
            },
        )
        .await?;
        let moved = Product::find_by_id(created.id).one(&db).await?.unwrap();
        assert_eq!(moved.category_id, catalog.other_category.id);

        Ok(())
    }

    #[tokio::test]
    async fn test_update_rename_conflict_and_not_found() -> Result<()> {
        let (db, _dir, store, catalog) = setup_with_catalog().await?;
        let sub = vec![catalog.subcategory.id];
        create_product(&db, &store, new_product("Tomate", catalog.category.id, sub.clone()))
            .await?;
        let other =
            create_product(&db, &store, new_product("Lechuga", catalog.category.id, sub)).await?;

        let rename = update_product(
            &db,
            &store,
            other.id,
            ProductChanges {
                name: Some("Tomate".to_string()),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(rename, Err(Error::Conflict { .. })));

        // Keeping its own name is not a conflict
        update_product(
            &db,
            &store,
            other.id,
            ProductChanges {
                name: Some("Lechuga".to_string()),
                ..Default::default()
            },
        )
        .await?;

        let missing = update_product(&db, &store, 999, ProductChanges::default()).await;
        assert!(matches!(
            missing,
            Err(Error::NotFound {
                resource: "product",
                id: 999
            })
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_replace_attachments_keeps_ids() -> Result<()> {
        let (db, dir, store, catalog) = setup_with_catalog().await?;
        let mut input = new_product("Tomate", catalog.category.id, vec![catalog.subcategory.id]);
        input.image = Some(png_payload(b"old-image"));
        input.pdf = Some(pdf_payload(b"old-pdf"));
        let created = create_product(&db, &store, input).await?;
        let before = get_product(&db, created.id).await?.unwrap();

        update_product(
            &db,
            &store,
            created.id,
            ProductChanges {
                image: AttachmentChange::Replace(png_payload(b"new-image")),
                pdf: AttachmentChange::Replace(pdf_payload(b"new-pdf")),
                ..Default::default()
            },
        )
        .await?;

        let after = get_product(&db, created.id).await?.unwrap();
        let (old_pdf, new_pdf) = (before.pdf.unwrap(), after.pdf.unwrap());
        assert_eq!(after.image.id, before.image.id);
        assert_eq!(new_pdf.id, old_pdf.id);
        assert_ne!(after.image.url, before.image.url);
        assert_ne!(new_pdf.url, old_pdf.url);

        assert!(!store.exists(before.image.url.as_deref().unwrap()).await?);
        assert!(!store.exists(old_pdf.url.as_deref().unwrap()).await?);
        assert!(store.exists(after.image.url.as_deref().unwrap()).await?);
        assert!(store.exists(new_pdf.url.as_deref().unwrap()).await?);
        assert_eq!(count_files(dir.path()), 2);

        Ok(())
    }

    #[tokio::test]
    async fn test_failed_replace_keeps_old_files() -> Result<()> {
        let (db, dir, store, catalog) = setup_with_catalog().await?;
        let mut input = new_product("Tomate", catalog.category.id, vec![catalog.subcategory.id]);
        input.pdf = Some(pdf_payload(b"old-pdf"));
        let created = create_product(&db, &store, input).await?;
        let before = get_product(&db, created.id).await?.unwrap();

        let result = update_product(
            &db,
            &store,
            created.id,
            ProductChanges {
                pdf: AttachmentChange::Replace(pdf_payload(b"new-pdf")),
                image: AttachmentChange::Replace("data:image/tiff;base64,AAAA".to_string()),
                ..Default::default()
            },
        )
        .await;

        assert!(matches!(result, Err(Error::InvalidFormat { .. })));
        let after = get_product(&db, created.id).await?.unwrap();
        assert_eq!(after.pdf, before.pdf);
        assert!(store.exists(after.pdf.unwrap().url.as_deref().unwrap()).await?);
        assert_eq!(count_files(dir.path()), 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_attach_and_remove_attachments_on_update() -> Result<()> {
        let (db, dir, store, catalog) = setup_with_catalog().await?;
        let created = create_product(
            &db,
            &store,
            new_product("Tomate", catalog.category.id, vec![catalog.subcategory.id]),
        )
        .await?;
        let slot_id = get_product(&db, created.id).await?.unwrap().image.id;

        update_product(
            &db,
            &store,
            created.id,
            ProductChanges {
                image: AttachmentChange::Replace(png_payload(b"img")),
                pdf: AttachmentChange::Replace(pdf_payload(b"pdf")),
                ..Default::default()
            },
        )
        .await?;
        let attached = get_product(&db, created.id).await?.unwrap();
        assert_eq!(attached.image.id, slot_id);
        assert!(attached.image.url.is_some());
        assert!(attached.pdf.is_some());
        assert_eq!(count_files(dir.path()), 2);

        update_product(
            &db,
            &store,
            created.id,
            ProductChanges {
                image: AttachmentChange::Remove,
                pdf: AttachmentChange::Remove,
                ..Default::default()
            },
        )
        .await?;
        let removed = get_product(&db, created.id).await?.unwrap();
        assert_eq!(removed.image.id, slot_id);
        assert!(removed.image.url.is_none());
        assert!(removed.pdf.is_none());
        assert_eq!(Pdf::find().count(&db).await?, 0);
        assert_eq!(count_files(dir.path()), 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_delete_product_removes_rows_and_files() -> Result<()> {
        let (db, dir, store, catalog) = setup_with_catalog().await?;
        let mut input = new_product("Tomate", catalog.category.id, vec![catalog.subcategory.id]);
        input.image = Some(png_payload(b"img"));
        input.pdf = Some(pdf_payload(b"pdf"));
        let created = create_product(&db, &store, input).await?;
        assert_eq!(count_files(dir.path()), 2);

        delete_product(&db, &store, created.id).await?;

        assert!(get_product(&db, created.id).await?.is_none());
        assert_eq!(Product::find().count(&db).await?, 0);
        assert_eq!(Image::find().count(&db).await?, 0);
        assert_eq!(Pdf::find().count(&db).await?, 0);
        assert_eq!(ProductSubcategory::find().count(&db).await?, 0);
        assert_eq!(count_files(dir.path()), 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_delete_product_without_attachments() -> Result<()> {
        let (db, dir, store, catalog) = setup_with_catalog().await?;
        let created = create_product(
            &db,
            &store,
            new_product("Tomate", catalog.category.id, vec![catalog.subcategory.id]),
        )
        .await?;

        delete_product(&db, &store, created.id).await?;

        assert_eq!(Product::find().count(&db).await?, 0);
        assert_eq!(Image::find().count(&db).await?, 0);
        assert_eq!(count_files(dir.path()), 0);

        let again = delete_product(&db, &store, created.id).await;
        assert!(matches!(
            again,
            Err(Error::NotFound {
                resource: "product",
                ..
            })
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_purge_dangling_pdf() -> Result<()> {
        let (db, _dir, store, catalog) = setup_with_catalog().await?;
        let mut input = new_product("Tomate", catalog.category.id, vec![catalog.subcategory.id]);
        input.pdf = Some(pdf_payload(b"pdf"));
        let created = create_product(&db, &store, input).await?;
        let attached_pdf = created.pdf_id.unwrap();

        let still_attached = purge_dangling_pdf(&db, &store, attached_pdf).await;
        assert!(matches!(still_attached, Err(Error::ValidationFailed { .. })));

        let dangling = pdf::ActiveModel {
            url: Set(None),
            uploaded_at: Set(chrono::Utc::now().naive_utc()),
            ..Default::default()
        }
        .insert(&db)
        .await?;
        purge_dangling_pdf(&db, &store, dangling.id).await?;
        assert!(Pdf::find_by_id(dangling.id).one(&db).await?.is_none());

        let missing = purge_dangling_pdf(&db, &store, 999).await;
        assert!(matches!(
            missing,
            Err(Error::NotFound {
                resource: "pdf",
                id: 999
            })
        ));

        Ok(())
    }

    #[test]
    fn test_dedup_ids_keeps_first_occurrence() {
        assert_eq!(dedup_ids(&[3, 1, 3, 2, 1]), vec![3, 1, 2]);
    }
}
