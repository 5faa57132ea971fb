//! WebP sibling upkeep for cross-store moves.
//!
//! The copy, delete, hash move and pruning come from
//! `AssetStore::move_between_stores`; this hook runs after each variant:
//!
//! ```text
//! origin not public → derive  public_asset_root/<url path>.webp from the new public copy
//! origin public     → remove  public_asset_root/<old FileId>.webp if present
//! ```

use super::TransformingStore;
use crate::storage::{AssetStore, FileId, Filesystem, MoveReport, ParsedFileId};
use crate::webp::webp_sibling_name;
use std::io::ErrorKind;
use tracing::{debug, warn};

impl<S: AssetStore> TransformingStore<S> {
    /// WebP upkeep for one variant that has just been moved
    pub(super) async fn sync_webp_sibling(
        &self,
        variant: &ParsedFileId,
        from: &dyn Filesystem,
        from_id: &FileId,
        to_id: &FileId,
        report: &mut MoveReport,
    ) {
        if from.visibility().is_public() {
            if self.remove_stale_webp(from_id).await {
                report.webp_removed += 1;
            }
        } else {
            let source = self.deriver.public_path(to_id);
            if self
                .derive_webp(&source, &variant.filename, &variant.hash, variant.variant())
                .await
            {
                report.webp_derived += 1;
            }
        }
    }

    /// Delete `public_asset_root/<id>.webp`; true when a file was removed
    async fn remove_stale_webp(&self, id: &FileId) -> bool {
        let sibling = self.deriver.public_root().join(webp_sibling_name(id.as_str()));
        match tokio::fs::remove_file(&sibling).await {
            Ok(()) => {
                debug!("Removed stale WebP sibling {}", sibling.display());
                true
            }
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => {
                warn!("Could not remove {}: {}", sibling.display(), e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::asset_store::TransformingStore;
    use crate::config::Config;
    use crate::storage::{AssetStore, FileId, LocalAssetStore, Visibility, WriteOptions};
    use crate::webp::gradient_png as png_bytes;
    use std::path::Path;
    use tempfile::TempDir;

    fn store(root: &Path) -> TransformingStore<LocalAssetStore> {
        let scratch = root.join("tmp");
        std::fs::create_dir_all(&scratch).unwrap();
        let config = Config {
            chains: Vec::new(),
            scratch_dir: Some(scratch),
            ..Config::default()
        };
        TransformingStore::new(LocalAssetStore::new(root), &config)
    }

    #[tokio::test]
    async fn test_publish_derives_sibling_per_variant() {
        let root = TempDir::new().unwrap();
        let store = store(root.path());
        let stored = store
            .set_from_bytes(png_bytes(1), "Uploads/sky.png", None, None, &WriteOptions::default())
            .await
            .unwrap();
        store
            .set_from_bytes(png_bytes(2), "Uploads/sky.png", Some(stored.hash.as_str()), Some("small"), &WriteOptions::default())
            .await
            .unwrap();

        let report = store.publish("Uploads/sky.png", &stored.hash).await.unwrap();

        assert_eq!(report.moved.len(), 2);
        assert_eq!(report.deleted.len(), 2);
        assert_eq!(report.webp_derived, 2);
        assert_eq!(report.webp_removed, 0);
        assert!(root.path().join("public/Uploads/sky.png.webp").exists());
        assert!(root.path().join("public/Uploads/sky__small.png.webp").exists());
        assert!(!root.path().join("protected/Uploads").join(&stored.hash[..10]).exists());
    }

    #[tokio::test]
    async fn test_protect_removes_stale_siblings() {
        let root = TempDir::new().unwrap();
        let store = store(root.path());
        let public = WriteOptions {
            visibility: Some(Visibility::Public),
            ..Default::default()
        };
        let stored = store
            .set_from_bytes(png_bytes(3), "Uploads/sea.png", None, None, &public)
            .await
            .unwrap();
        let sibling = root.path().join("public/Uploads/sea.png.webp");
        std::fs::write(&sibling, b"stale").unwrap();

        let report = store.protect("Uploads/sea.png", &stored.hash).await.unwrap();

        assert_eq!(report.moved.len(), 1);
        assert_eq!(report.webp_removed, 1);
        assert_eq!(report.webp_derived, 0);
        assert!(!sibling.exists());
        let protected_id = FileId::new(format!("Uploads/{}/sea.png", &stored.hash[..10]));
        assert!(store.protected_filesystem().has(&protected_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_protect_without_sibling_is_quiet() {
        let root = TempDir::new().unwrap();
        let store = store(root.path());
        let public = WriteOptions {
            visibility: Some(Visibility::Public),
            ..Default::default()
        };
        let stored = store
            .set_from_bytes(b"%PDF-1.4".to_vec(), "Docs/manual.pdf", None, None, &public)
            .await
            .unwrap();

        let report = store.protect("Docs/manual.pdf", &stored.hash).await.unwrap();
        assert_eq!(report.moved.len(), 1);
        assert_eq!(report.webp_removed, 0);
    }

    #[tokio::test]
    async fn test_move_of_unknown_file_is_empty() {
        let root = TempDir::new().unwrap();
        let store = store(root.path());

        let report = store.publish("Uploads/ghost.png", "a1b2c3d4e5").await.unwrap();
        assert!(report.moved.is_empty());
        assert!(store.inner().hashes().moves().await.is_empty());
    }
}
