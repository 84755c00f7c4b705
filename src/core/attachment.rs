//! Attachment records - Keeps a product's image slot and PDF reference in step with storage.
//!
//! File writes cannot take part in a database transaction, so every unit of work that touches
//! attachments goes through [`StagedFiles`]: files it writes are remembered so a rollback can
//! remove them again, and files it supersedes are only removed once the commit went through.
//! A replaced attachment therefore never loses its old file before the new reference is durable.

use crate::{
    entities::{Image, OwnerKind, Pdf, Product, image, pdf, product},
    errors::{Error, Result},
    storage::{AttachmentKind, AttachmentStore},
};
use sea_orm::{DatabaseTransaction, Set, prelude::*, sea_query::Expr};
use tracing::{debug, error, warn};

/// What a write request asks for one attachment slot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AttachmentChange {
    /// Leave the slot as it is
    #[default]
    Keep,
    /// Store this base64 data-URI payload and point the slot at it
    Replace(String),
    /// Drop the stored file
    Remove,
}

/// Files touched by one unit of work, settled when its transaction ends.
#[derive(Debug)]
pub struct StagedFiles<'a> {
    store: &'a AttachmentStore,
    written: Vec<String>,
    obsolete: Vec<String>,
}

impl<'a> StagedFiles<'a> {
    /// Starts an empty ledger against `store`.
    #[must_use]
    pub const fn new(store: &'a AttachmentStore) -> Self {
        Self {
            store,
            written: Vec::new(),
            obsolete: Vec::new(),
        }
    }

    /// Stores `payload` in the default folder for `kind` and records it as written.
    pub async fn save(&mut self, payload: &str, kind: AttachmentKind) -> Result<String> {
        let url = self
            .store
            .save(payload, kind, kind.default_folder())
            .await?;
        self.written.push(url.clone());
        Ok(url)
    }

    /// Marks a stored file for removal once the unit of work commits.
    pub fn retire(&mut self, url: Option<String>) {
        if let Some(url) = url {
            self.obsolete.push(url);
        }
    }

    /// Commits `txn` if `outcome` is `Ok`, otherwise rolls it back, then cleans up files.
    ///
    /// After a commit the retired files are deleted; after a rollback (or a failed commit)
    /// the files written by this unit of work are deleted instead.
    pub async fn settle<T>(self, txn: DatabaseTransaction, outcome: Result<T>) -> Result<T> {
        let outcome = match outcome {
            Ok(value) => txn.commit().await.map(|()| value).map_err(Error::from),
            Err(e) => {
                if let Err(rollback) = txn.rollback().await {
                    warn!(error = %rollback, "transaction rollback failed");
                }
                Err(e)
            }
        };

        match outcome {
            Ok(value) => {
                remove_files(self.store, &self.obsolete, "superseded").await;
                Ok(value)
            }
            Err(e) => {
                remove_files(self.store, &self.written, "rolled back").await;
                Err(e)
            }
        }
    }
}

/// Deletes `urls`, logging failures for operator follow-up.
///
/// Runs after the transaction has been decided, so a failure here cannot change the
/// outcome reported to the caller.
async fn remove_files(store: &AttachmentStore, urls: &[String], reason: &str) {
    for url in urls {
        match store.delete(url).await {
            Ok(()) => debug!(%url, reason, "attachment file removed"),
            Err(e) => error!(%url, reason, error = %e, "failed to remove attachment file; orphan left behind"),
        }
    }
}

/// Loads the image slot owned by `product_id`, if one exists.
pub async fn find_image<C>(db: &C, product_id: i64) -> Result<Option<image::Model>>
where
    C: ConnectionTrait,
{
    Image::find()
        .filter(image::Column::OwnerKind.eq(OwnerKind::Product))
        .filter(image::Column::OwnerId.eq(product_id))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Creates the image slot of a new product, filled if a payload was supplied.
///
/// The slot exists from creation on so that later updates mutate it in place and its id
/// stays stable.
pub async fn open_image_slot<C>(
    db: &C,
    staged: &mut StagedFiles<'_>,
    product_id: i64,
    payload: Option<&str>,
) -> Result<image::Model>
where
    C: ConnectionTrait,
{
    let url = match payload {
        Some(p) if !p.trim().is_empty() => Some(staged.save(p, AttachmentKind::Image).await?),
        _ => None,
    };

    image::ActiveModel {
        url: Set(url),
        owner_kind: Set(OwnerKind::Product),
        owner_id: Set(product_id),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Applies `change` to the image slot of `product_id`.
///
/// Replacing keeps the row id and queues the previous file for removal. Removing empties the
/// slot but keeps the row. A product without a slot (created before slots existed) gets one
/// on its first replacement.
pub async fn sync_image<C>(
    db: &C,
    staged: &mut StagedFiles<'_>,
    product_id: i64,
    change: AttachmentChange,
) -> Result<Option<image::Model>>
where
    C: ConnectionTrait,
{
    let existing = find_image(db, product_id).await?;

    match (existing, change) {
        (existing, AttachmentChange::Keep) => Ok(existing),
        (None, AttachmentChange::Remove) => Ok(None),
        (None, AttachmentChange::Replace(payload)) => {
            open_image_slot(db, staged, product_id, Some(&payload))
                .await
                .map(Some)
        }
        (Some(slot), AttachmentChange::Replace(payload)) => {
            let url = staged.save(&payload, AttachmentKind::Image).await?;
            staged.retire(slot.url.clone());
            let mut slot: image::ActiveModel = slot.into();
            slot.url = Set(Some(url));
            Ok(Some(slot.update(db).await?))
        }
        (Some(slot), AttachmentChange::Remove) => {
            staged.retire(slot.url.clone());
            let mut slot: image::ActiveModel = slot.into();
            slot.url = Set(None);
            Ok(Some(slot.update(db).await?))
        }
    }
}

/// Deletes every image row owned by `product_id`, queueing their files for removal.
pub async fn remove_image_slots<C>(
    db: &C,
    staged: &mut StagedFiles<'_>,
    product_id: i64,
) -> Result<()>
where
    C: ConnectionTrait,
{
    let slots = Image::find()
        .filter(image::Column::OwnerKind.eq(OwnerKind::Product))
        .filter(image::Column::OwnerId.eq(product_id))
        .all(db)
        .await?;

    for slot in slots {
        staged.retire(slot.url.clone());
        slot.delete(db).await?;
    }
    Ok(())
}

/// Stores a PDF payload and creates its row.
pub async fn create_pdf<C>(
    db: &C,
    staged: &mut StagedFiles<'_>,
    payload: &str,
) -> Result<pdf::Model>
where
    C: ConnectionTrait,
{
    let url = staged.save(payload, AttachmentKind::Pdf).await?;
    pdf::ActiveModel {
        url: Set(Some(url)),
        uploaded_at: Set(chrono::Utc::now().naive_utc()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Applies `change` to the PDF referenced by `product`, returning the PDF id the product
/// should reference afterwards.
///
/// Replacing an existing PDF updates its row in place. Removing clears `products.pdf_id`
/// before deleting the row.
pub async fn sync_pdf<C>(
    db: &C,
    staged: &mut StagedFiles<'_>,
    product: &product::Model,
    change: AttachmentChange,
) -> Result<Option<i64>>
where
    C: ConnectionTrait,
{
    let existing = match product.pdf_id {
        Some(id) => Pdf::find_by_id(id).one(db).await?,
        None => None,
    };

    match (existing, change) {
        (_, AttachmentChange::Keep) => Ok(product.pdf_id),
        (None, AttachmentChange::Remove) => Ok(None),
        (None, AttachmentChange::Replace(payload)) => {
            let row = create_pdf(db, staged, &payload).await?;
            Ok(Some(row.id))
        }
        (Some(row), AttachmentChange::Replace(payload)) => {
            let url = staged.save(&payload, AttachmentKind::Pdf).await?;
            staged.retire(row.url.clone());
            let mut row: pdf::ActiveModel = row.into();
            row.url = Set(Some(url));
            row.uploaded_at = Set(chrono::Utc::now().naive_utc());
            Ok(Some(row.update(db).await?.id))
        }
        (Some(row), AttachmentChange::Remove) => {
            Product::update_many()
                .col_expr(product::Column::PdfId, Expr::value(Option::<i64>::None))
                .filter(product::Column::Id.eq(product.id))
                .exec(db)
                .await?;
            remove_pdf(db, staged, row).await?;
            Ok(None)
        }
    }
}

/// Deletes a PDF row and queues its file for removal.
///
/// The caller must make sure no product references the row any more.
pub async fn remove_pdf<C>(db: &C, staged: &mut StagedFiles<'_>, row: pdf::Model) -> Result<()>
where
    C: ConnectionTrait,
{
    staged.retire(row.url.clone());
    row.delete(db).await?;
    Ok(())
}
