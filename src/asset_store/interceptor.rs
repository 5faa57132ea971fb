//! Write paths: optimize first, then hand the bytes to the inner store.

use super::TransformingStore;
use crate::error::Result;
use crate::file_manager::FileManager;
use crate::scratch::{ScratchFile, RAW_PREFIX};
use crate::storage::{AssetStore, StoredFile, WriteOptions};
use std::path::Path;
use tracing::debug;

impl<S: AssetStore> TransformingStore<S> {
    /// Optimize the file at `path` in place and delegate. No WebP on this path.
    pub(super) async fn write_local_file(
        &self,
        path: &Path,
        filename: Option<&str>,
        hash: Option<&str>,
        variant: Option<&str>,
        options: &WriteOptions,
    ) -> Result<StoredFile> {
        self.chain.optimize_path(path, filename).await?;
        self.inner.set_from_local_file(path, filename, hash, variant, options).await
    }

    pub(super) async fn write_buffer(
        &self,
        data: Vec<u8>,
        filename: &str,
        hash: Option<&str>,
        variant: Option<&str>,
        options: &WriteOptions,
    ) -> Result<StoredFile> {
        if filename.is_empty() {
            debug!("Buffer write without filename, passing through");
            return self.inner.set_from_bytes(data, filename, hash, variant, options).await;
        }

        let ext = FileManager::extension_of(filename);
        let raw = ScratchFile::with_contents(&self.scratch_dir, RAW_PREFIX, &ext, &data).await?;
        drop(data);

        self.chain.optimize_path(raw.path(), Some(filename)).await?;

        let hash_str = hash.unwrap_or_default();
        let public_id = self.file_id(filename, hash_str);
        if self.inner.public_filesystem().has(&public_id).await? {
            self.derive_webp(raw.path(), filename, hash_str, variant).await;
        } else {
            debug!("{} not public yet, no WebP sibling", public_id);
        }

        let data = tokio::fs::read(raw.path()).await?;
        drop(raw);

        self.inner.set_from_bytes(data, filename, hash, variant, options).await
    }
}
