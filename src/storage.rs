//! Attachment storage for base64 data-URI payloads.
//!
//! Clients submit images and PDFs inline as `data:<mime>;base64,<body>`. The store checks
//! the media type against the attachment kind, decodes the body, writes it under a fresh
//! `<folder>/<uuid>.<ext>` path and hands back the public URL. Deleting goes the other way:
//! URL to relative path to file removal.
//!
//! ```rust,ignore
//! let store = AttachmentStore::new(FilesystemBackend::new("storage/public"), "http://localhost:8000/storage");
//! let url = store.save(payload, AttachmentKind::Pdf, "pdf").await?;
//! store.delete(&url).await?;
//! ```

use crate::config::storage::StorageConfig;
use crate::errors::{Error, Result};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Storage backend trait for different storage implementations.
///
/// Paths are relative to the backend's public root and use `/` separators.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Write data to the specified path, replacing any existing file.
    async fn write(&self, path: &str, data: &[u8]) -> Result<()>;

    /// Delete data at the specified path. Missing files are not an error.
    async fn delete(&self, path: &str) -> Result<()>;

    /// Check if data exists at the specified path.
    async fn exists(&self, path: &str) -> Result<bool>;
}

/// Filesystem storage backend rooted at a publicly served directory.
#[derive(Debug, Clone)]
pub struct FilesystemBackend {
    base_path: PathBuf,
}

impl FilesystemBackend {
    /// Create a new filesystem backend with the given base directory.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn full_path(&self, path: &str) -> PathBuf {
        self.base_path.join(path)
    }

    /// Validate that the storage root can write, read back, and delete files.
    ///
    /// Meant to run once at startup so permission problems show up before the first upload.
    pub async fn validate(&self) -> Result<()> {
        let probe = ".health-check/probe.bin";
        let data = b"storage-health-check";

        self.write(probe, data).await?;
        let read_back = fs::read(self.full_path(probe))
            .await
            .map_err(|source| storage_failure(probe, source))?;
        if read_back != data {
            return Err(storage_failure(
                probe,
                std::io::Error::other("read-back mismatch"),
            ));
        }
        self.delete(probe).await?;
        // Best-effort cleanup
        let _ = fs::remove_dir(self.base_path.join(".health-check")).await;

        Ok(())
    }
}

fn storage_failure(path: &str, source: std::io::Error) -> Error {
    warn!(storage_path = %path, error = %source, "attachment storage I/O failed");
    Error::StorageFailure {
        path: path.to_string(),
        source,
    }
}

#[async_trait]
impl StorageBackend for FilesystemBackend {
    async fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.full_path(path);
        debug!(storage_path = %path, full_path = %full_path.display(), size = data.len(), "storage: write");

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| storage_failure(path, e))?;
        }

        // Atomic write: temp file + rename
        let temp_path = full_path.with_extension("tmp");
        let written: std::io::Result<()> = async {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(data).await?;
            file.sync_all().await?;
            drop(file);
            fs::rename(&temp_path, &full_path).await
        }
        .await;

        if let Err(e) = written {
            if let Err(cleanup) = fs::remove_file(&temp_path).await {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    warn!(temp_path = %temp_path.display(), error = %cleanup, "failed to remove temp file");
                }
            }
            return Err(storage_failure(path, e));
        }

        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let full_path = self.full_path(path);
        match fs::remove_file(&full_path).await {
            Ok(()) => {
                debug!(storage_path = %path, "storage: delete");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(storage_path = %path, "storage: delete of missing file ignored");
                Ok(())
            }
            Err(e) => Err(storage_failure(path, e)),
        }
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        fs::try_exists(self.full_path(path))
            .await
            .map_err(|e| storage_failure(path, e))
    }
}

/// Kind of attachment a payload is submitted as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    /// Product picture
    Image,
    /// Product datasheet
    Pdf,
}

impl AttachmentKind {
    /// Folder used when the caller has no preference
    #[must_use]
    pub const fn default_folder(self) -> &'static str {
        match self {
            Self::Image => "products",
            Self::Pdf => "pdf",
        }
    }

    const fn label(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Pdf => "pdf",
        }
    }

    /// File extension for a media type, or `None` if this kind does not accept it
    fn extension_for(self, media_type: &str) -> Option<&'static str> {
        match (self, media_type) {
            (Self::Image, "image/png") => Some("png"),
            (Self::Image, "image/jpeg" | "image/jpg") => Some("jpg"),
            (Self::Image, "image/gif") => Some("gif"),
            (Self::Image, "image/webp") => Some("webp"),
            (Self::Pdf, "application/pdf") => Some("pdf"),
            _ => None,
        }
    }

    fn expected(self) -> &'static str {
        match self {
            Self::Image => "data:image/{png|jpeg|gif|webp};base64,",
            Self::Pdf => "data:application/pdf;base64,",
        }
    }
}

/// A payload that passed format checks, ready to be written
#[derive(Debug)]
struct DecodedPayload {
    extension: &'static str,
    bytes: Vec<u8>,
}

/// Checks the data-URI prefix for `kind` and decodes the base64 body.
fn decode_payload(payload: &str, kind: AttachmentKind) -> Result<DecodedPayload> {
    let invalid = |message: String| Error::InvalidFormat {
        kind: kind.label(),
        message,
    };

    let (media_type, body) = payload
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(";base64,"))
        .ok_or_else(|| invalid(format!("expected prefix {}", kind.expected())))?;
    let extension = kind
        .extension_for(&media_type.to_ascii_lowercase())
        .ok_or_else(|| {
            invalid(format!(
                "media type '{media_type}' not accepted, expected prefix {}",
                kind.expected()
            ))
        })?;

    let bytes = STANDARD
        .decode(body.trim())
        .map_err(|e| invalid(format!("body is not valid base64: {e}")))?;
    if bytes.is_empty() {
        return Err(invalid("body is empty".to_string()));
    }

    Ok(DecodedPayload { extension, bytes })
}

/// Rejects relative paths that could leave the storage root.
fn ensure_contained(relative: &str, kind: &'static str) -> Result<()> {
    let contained = !relative.is_empty()
        && Path::new(relative)
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    if contained {
        Ok(())
    } else {
        Err(Error::InvalidFormat {
            kind,
            message: format!("path '{relative}' escapes the storage root"),
        })
    }
}

/// Saves and deletes attachments, mapping between storage paths and public URLs.
#[derive(Clone)]
pub struct AttachmentStore {
    backend: Arc<dyn StorageBackend>,
    public_url: String,
}

impl std::fmt::Debug for AttachmentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttachmentStore")
            .field("public_url", &self.public_url)
            .finish_non_exhaustive()
    }
}

impl AttachmentStore {
    /// Creates a store writing through `backend`, serving files under `public_url`.
    pub fn new(backend: impl StorageBackend + 'static, public_url: impl Into<String>) -> Self {
        let public_url: String = public_url.into();
        Self {
            backend: Arc::new(backend),
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }

    /// Creates a filesystem-backed store from [`StorageConfig`].
    #[must_use]
    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(
            FilesystemBackend::new(config.root.clone()),
            config.public_url.clone(),
        )
    }

    /// Decodes `payload` and stores it under `folder`, returning its public URL.
    ///
    /// # Errors
    /// - `InvalidFormat` if the payload lacks the media-type prefix for `kind`, has an
    ///   unsupported media type, or its body is not base64. Nothing is written.
    /// - `StorageFailure` if the write fails.
    pub async fn save(&self, payload: &str, kind: AttachmentKind, folder: &str) -> Result<String> {
        let decoded = decode_payload(payload, kind)?;
        let folder = folder.trim_matches('/');
        ensure_contained(folder, kind.label())?;

        let relative = format!("{folder}/{}.{}", Uuid::new_v4(), decoded.extension);
        self.backend.write(&relative, &decoded.bytes).await?;

        let url = format!("{}/{relative}", self.public_url);
        info!(%url, size = decoded.bytes.len(), kind = kind.label(), "attachment stored");
        Ok(url)
    }

    /// Removes the file behind `url`.
    ///
    /// A missing file is success. So is a URL that does not point into this store, since
    /// there is nothing here to remove.
    pub async fn delete(&self, url: &str) -> Result<()> {
        let Some(relative) = self.relative_path(url) else {
            warn!(%url, "attachment url is outside this store; nothing deleted");
            return Ok(());
        };
        ensure_contained(relative, "attachment")?;
        self.backend.delete(relative).await
    }

    /// Whether the file behind `url` is present.
    pub async fn exists(&self, url: &str) -> Result<bool> {
        match self.relative_path(url) {
            Some(relative) => {
                ensure_contained(relative, "attachment")?;
                self.backend.exists(relative).await
            }
            None => Ok(false),
        }
    }

    fn relative_path<'a>(&self, url: &'a str) -> Option<&'a str> {
        url.strip_prefix(self.public_url.as_str())?
            .strip_prefix('/')
    }
}
