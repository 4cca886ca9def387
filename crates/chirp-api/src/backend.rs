use std::path::PathBuf;
use std::sync::Arc;

use chirp_db::{AuthProvider, BlobStore, Database, DiskBlobStore, DocumentStore, LocalAuth, SqliteStore, StoreError};
use tracing::info;

use crate::config::Config;

/// The three hosted collaborators every service talks to.
#[derive(Clone)]
pub struct Backend {
    pub store: Arc<dyn DocumentStore>,
    pub auth: Arc<dyn AuthProvider>,
    pub blobs: Arc<dyn BlobStore>,
}

impl Backend {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        auth: Arc<dyn AuthProvider>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        Self { store, auth, blobs }
    }

    pub async fn open(config: &Config) -> Result<Self, StoreError> {
        let db = Arc::new(Database::open(&config.db_path)?);
        let blobs = DiskBlobStore::new(config.blob_dir.clone(), config.blob_base_url.clone()).await?;
        info!("Backend ready (db: {})", config.db_path.display());
        Ok(Self::local(db, blobs))
    }

    /// Ephemeral backend: in-memory database, blobs under `blob_dir`.
    pub async fn open_in_memory(blob_dir: PathBuf) -> Result<Self, StoreError> {
        let db = Arc::new(Database::open_in_memory()?);
        let base_url = format!("file://{}", blob_dir.display());
        let blobs = DiskBlobStore::new(blob_dir, base_url).await?;
        Ok(Self::local(db, blobs))
    }

    fn local(db: Arc<Database>, blobs: DiskBlobStore) -> Self {
        Self {
            store: Arc::new(SqliteStore::new(db.clone())),
            auth: Arc::new(LocalAuth::new(db)),
            blobs: Arc::new(blobs),
        }
    }
}
