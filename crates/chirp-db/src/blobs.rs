use std::path::PathBuf;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::{debug, info};

use crate::error::StoreError;

/// The hosted blob storage. Returns a URL the stored bytes can be fetched from.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn upload(&self, bytes: Vec<u8>) -> Result<String, StoreError>;
}

/// Content-addressed blobs on local disk.
///
/// Each blob is stored once at `{dir}/{sha256}` and served as
/// `{base_url}/{sha256}`.
pub struct DiskBlobStore {
    dir: PathBuf,
    base_url: String,
}

impl DiskBlobStore {
    pub async fn new(dir: PathBuf, base_url: impl Into<String>) -> Result<Self, StoreError> {
        fs::create_dir_all(&dir).await?;
        info!("Blob storage directory: {}", dir.display());
        Ok(Self {
            dir,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn blob_path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Read a stored blob back by its SHA-256 name. Anything that is not a
    /// 64-character hex digest is rejected before touching the filesystem.
    pub async fn read(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        if !is_blob_name(name) {
            return Err(StoreError::InvalidBlobName(name.to_string()));
        }
        Ok(fs::read(self.blob_path(name)).await?)
    }
}

fn is_blob_name(name: &str) -> bool {
    name.len() == 64 && name.bytes().all(|b| b.is_ascii_hexdigit())
}

#[async_trait]
impl BlobStore for DiskBlobStore {
    async fn upload(&self, bytes: Vec<u8>) -> Result<String, StoreError> {
        if bytes.is_empty() {
            return Err(StoreError::EmptyBlob);
        }

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let name = hex::encode(hasher.finalize());

        let path = self.blob_path(&name);
        if fs::try_exists(&path).await? {
            debug!("Blob {} already stored", name);
        } else {
            fs::write(&path, &bytes).await?;
            debug!("Stored blob {} ({} bytes)", name, bytes.len());
        }

        Ok(format!("{}/{}", self.base_url, name))
    }
}
