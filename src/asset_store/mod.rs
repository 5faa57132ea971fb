//! # Transforming Asset Store
//!
//! Questo modulo avvolge un `AssetStore` esistente e aggiunge la pipeline di
//! trasformazione alle scritture e agli spostamenti tra store.
//!
//! ## Responsabilità:
//! - `interceptor`: ottimizza i file prima di delegare la scrittura allo store interno
//! - `mover`: sposta file e varianti tra store mantenendo aggiornati i sibling WebP
//! - Tutti gli accessor (filesystem, strategie, hashing) sono delegati allo store interno
//!
//! ## Flusso di una scrittura da buffer:
//! 1. Filename vuoto → delega diretta
//! 2. Scrive `raw_<id>.<ext>` nella scratch directory
//! 3. Esegue la catena di optimizer sul file scratch
//! 4. Se lo store pubblico contiene già il file → deriva il sibling WebP
//! 5. Rilegge i byte, elimina lo scratch e delega
//!
//! ## Esempio:
//! ```rust,ignore
//! let store = TransformingStore::new(LocalAssetStore::new(root), &config);
//! store.set_from_bytes(data, "Uploads/photo.jpg", None, None, &WriteOptions::default()).await?;
//! ```

mod interceptor;
mod mover;

use crate::config::Config;
use crate::error::{ConversionError, Result};
use crate::optimizer::OptimizerChain;
use crate::storage::{
    AssetStore, FileHashingService, FileId, Filesystem, MoveReport, NamingStrategy, ParsedFileId, StoredFile,
    WriteOptions,
};
use crate::webp::{Derivation, WebpDeriver};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// An `AssetStore` that optimizes on write and keeps WebP siblings in step
#[derive(Debug)]
pub struct TransformingStore<S> {
    inner: S,
    chain: OptimizerChain,
    deriver: WebpDeriver,
    scratch_dir: PathBuf,
    webp_enabled: bool,
}

impl<S: AssetStore> TransformingStore<S> {
    /// Wrap `inner`; WebP siblings go under `config.public_asset_root`, or
    /// under the inner store's public root when that is unset
    pub fn new(inner: S, config: &Config) -> Self {
        let public_root = config.resolve_public_asset_root(inner.public_asset_root());
        Self::with_parts(
            inner,
            OptimizerChain::from_config(config),
            WebpDeriver::from_config(config, public_root),
            config.scratch_dir(),
            config.webp_enabled,
        )
    }

    pub fn with_parts(
        inner: S,
        chain: OptimizerChain,
        deriver: WebpDeriver,
        scratch_dir: PathBuf,
        webp_enabled: bool,
    ) -> Self {
        Self {
            inner,
            chain,
            deriver,
            scratch_dir,
            webp_enabled,
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn chain(&self) -> &OptimizerChain {
        &self.chain
    }

    pub fn deriver(&self) -> &WebpDeriver {
        &self.deriver
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Derive the WebP sibling of `(filename, hash, variant)` from `source`.
    ///
    /// The sibling lands at `public_asset_root/<public url path>.webp`.
    pub async fn create_webp_image(
        &self,
        source: &Path,
        filename: &str,
        hash: &str,
        variant: Option<&str>,
    ) -> std::result::Result<Derivation, ConversionError> {
        if !self.webp_enabled {
            return Ok(Derivation::Skipped);
        }

        let url_path = self.public_url_path(filename, hash, variant);
        let destination = self.deriver.destination_for(&url_path);
        self.deriver.convert(source, &destination).await
    }

    /// `create_webp_image` with the error logged and dropped
    async fn derive_webp(&self, source: &Path, filename: &str, hash: &str, variant: Option<&str>) -> bool {
        match self.create_webp_image(source, filename, hash, variant).await {
            Ok(Derivation::Created(path)) => {
                debug!("Derived WebP sibling {}", path.display());
                true
            }
            Ok(Derivation::Skipped) => false,
            Ok(Derivation::NotSmaller { source_size, webp_size }) => {
                debug!(
                    "WebP sibling of {} not kept ({} >= {} bytes)",
                    filename, webp_size, source_size
                );
                false
            }
            Err(e) => {
                warn!("WebP derivation failed for {}: {}", filename, e);
                false
            }
        }
    }
}

#[async_trait]
impl<S: AssetStore> AssetStore for TransformingStore<S> {
    async fn set_from_local_file(
        &self,
        path: &Path,
        filename: Option<&str>,
        hash: Option<&str>,
        variant: Option<&str>,
        options: &WriteOptions,
    ) -> Result<StoredFile> {
        self.write_local_file(path, filename, hash, variant, options).await
    }

    async fn set_from_bytes(
        &self,
        data: Vec<u8>,
        filename: &str,
        hash: Option<&str>,
        variant: Option<&str>,
        options: &WriteOptions,
    ) -> Result<StoredFile> {
        self.write_buffer(data, filename, hash, variant, options).await
    }

    fn public_filesystem(&self) -> &dyn Filesystem {
        self.inner.public_filesystem()
    }

    fn protected_filesystem(&self) -> &dyn Filesystem {
        self.inner.protected_filesystem()
    }

    fn public_strategy(&self) -> &dyn NamingStrategy {
        self.inner.public_strategy()
    }

    fn protected_strategy(&self) -> &dyn NamingStrategy {
        self.inner.protected_strategy()
    }

    fn hashing_service(&self) -> &dyn FileHashingService {
        self.inner.hashing_service()
    }

    fn public_asset_root(&self) -> Option<&Path> {
        Some(self.deriver.public_root())
    }

    async fn on_variant_moved(
        &self,
        variant: &ParsedFileId,
        from: &dyn Filesystem,
        from_id: &FileId,
        to_id: &FileId,
        report: &mut MoveReport,
    ) -> Result<()> {
        self.sync_webp_sibling(variant, from, from_id, to_id, report).await;
        Ok(())
    }
}
