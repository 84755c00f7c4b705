//! Attachment storage settings read from the environment.

use std::path::PathBuf;

const DEFAULT_STORAGE_ROOT: &str = "storage/public";
const DEFAULT_PUBLIC_URL: &str = "http://localhost:8000/storage";

/// Where attachments are written and how they are addressed publicly
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// Directory that is served publicly
    pub root: PathBuf,
    /// URL under which `root` is served, without trailing slash
    pub public_url: String,
}

impl StorageConfig {
    /// Reads `STORAGE_ROOT` and `STORAGE_PUBLIC_URL`, falling back to local defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let root = std::env::var("STORAGE_ROOT").unwrap_or_else(|_| DEFAULT_STORAGE_ROOT.into());
        let public_url =
            std::env::var("STORAGE_PUBLIC_URL").unwrap_or_else(|_| DEFAULT_PUBLIC_URL.into());
        Self::new(root, public_url)
    }

    /// Builds a config, normalising the trailing slash off `public_url`.
    pub fn new(root: impl Into<PathBuf>, public_url: impl Into<String>) -> Self {
        let public_url: String = public_url.into();
        Self {
            root: root.into(),
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }
}
