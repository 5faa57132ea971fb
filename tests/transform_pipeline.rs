//! End-to-end behaviour of the transforming store over the local stores.

use asset_optimizer::storage::{HashedNaming, NamingStrategy, ParsedFileId};
use asset_optimizer::{
    AssetStore, Config, FileId, LocalAssetStore, OptimizerEntry, OptimizerTool, TransformingStore, Visibility,
    WriteOptions,
};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

struct Fixture {
    root: TempDir,
    store: TransformingStore<LocalAssetStore>,
}

impl Fixture {
    fn new(chains: Vec<OptimizerEntry>) -> Self {
        let root = TempDir::new().unwrap();
        std::fs::create_dir_all(root.path().join("tmp")).unwrap();
        let config = Config {
            chains,
            scratch_dir: Some(root.path().join("tmp")),
            ..Config::default()
        };
        let store = TransformingStore::new(LocalAssetStore::new(root.path()), &config);
        Self { root, store }
    }

    fn path(&self, relative: &str) -> PathBuf {
        self.root.path().join(relative)
    }

    fn scratch_entries(&self) -> Vec<String> {
        std::fs::read_dir(self.path("tmp"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect()
    }
}

fn public() -> WriteOptions {
    WriteOptions {
        visibility: Some(Visibility::Public),
        ..Default::default()
    }
}

/// Unfiltered gradient PNG; any WebP encoding of it is smaller
fn png_bytes(shade: u8) -> Vec<u8> {
    use image::codecs::png::{CompressionType, FilterType, PngEncoder};

    let img = image::RgbImage::from_fn(64, 64, |x, y| image::Rgb([(x * 4) as u8, (y * 4) as u8, shade]));
    let mut out = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_with_encoder(PngEncoder::new_with_quality(&mut out, CompressionType::Fast, FilterType::NoFilter))
        .unwrap();
    out
}

/// Pseudo-random photo-like JPEG
fn jpeg_bytes(seed: u32) -> Vec<u8> {
    let mut state = seed;
    let img = image::RgbImage::from_fn(48, 48, |_, _| {
        state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        let [r, g, b, _] = state.to_le_bytes();
        image::Rgb([r, g, b])
    });
    let mut out = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_with_encoder(image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, 80))
        .unwrap();
    out
}

/// A `sh` script optimizer for the given extensions; `$f` is the target
fn script_tool(dir: &Path, name: &str, body: &str, extensions: &[&str]) -> OptimizerEntry {
    let script = dir.join(name);
    std::fs::write(&script, format!("for f; do :; done\n{}\n", body)).unwrap();
    OptimizerEntry::new(
        OptimizerTool::Command {
            program: "sh".into(),
            extensions: extensions.iter().map(|e| e.to_string()).collect(),
        },
        vec![script.to_string_lossy().to_string()],
    )
}

#[tokio::test]
async fn buffer_without_filename_is_stored_untouched() {
    let fixture = Fixture::new(Vec::new());

    let stored = assert_ok!(
        fixture
            .store
            .set_from_bytes(b"raw bytes".to_vec(), "", None, None, &WriteOptions::default())
            .await
    );

    let id = HashedNaming.build_file_id(&ParsedFileId::new(stored.filename.as_str(), stored.hash.as_str()));
    assert_eq!(fixture.store.protected_filesystem().read(&id).await.unwrap(), b"raw bytes");
    assert!(fixture.scratch_entries().is_empty());
}

#[tokio::test]
async fn webp_sibling_only_for_files_already_public() {
    let fixture = Fixture::new(Vec::new());

    fixture
        .store
        .set_from_bytes(png_bytes(10), "Uploads/new.png", None, None, &public())
        .await
        .unwrap();
    assert!(!fixture.path("public/Uploads/new.png.webp").exists());

    fixture
        .store
        .set_from_bytes(png_bytes(20), "Uploads/new.png", None, None, &public())
        .await
        .unwrap();
    assert!(fixture.path("public/Uploads/new.png.webp").exists());
    assert!(fixture.scratch_entries().is_empty());
}

#[tokio::test]
async fn publishing_moves_every_variant() {
    let fixture = Fixture::new(Vec::new());
    let store = &fixture.store;

    let stored = store
        .set_from_bytes(png_bytes(1), "Gallery/cat.png", None, None, &WriteOptions::default())
        .await
        .unwrap();
    for variant in ["thumb", "wide", "square"] {
        store
            .set_from_bytes(png_bytes(2), "Gallery/cat.png", Some(stored.hash.as_str()), Some(variant), &WriteOptions::default())
            .await
            .unwrap();
    }

    let report = store.publish("Gallery/cat.png", &stored.hash).await.unwrap();

    assert_eq!(report.moved.len(), 4);
    assert_eq!(report.moved[0].1, FileId::new("Gallery/cat.png"));
    for (from_id, to_id) in &report.moved {
        assert!(!store.protected_filesystem().has(from_id).await.unwrap());
        assert!(store.public_filesystem().has(to_id).await.unwrap());
        assert!(fixture.root.path().join("public").join(format!("{}.webp", to_id)).exists());
    }
    assert_eq!(report.webp_derived, 4);
    assert_eq!(store.inner().hashes().moves().await.len(), 4);
    assert!(!fixture.path("protected/Gallery").join(&stored.hash[..10]).exists());
}

#[tokio::test]
async fn protecting_drops_public_siblings() {
    let fixture = Fixture::new(Vec::new());
    let store = &fixture.store;

    let stored = store
        .set_from_bytes(png_bytes(5), "Gallery/dog.png", None, None, &WriteOptions::default())
        .await
        .unwrap();
    store.publish("Gallery/dog.png", &stored.hash).await.unwrap();
    assert!(fixture.path("public/Gallery/dog.png.webp").exists());

    let report = store.protect("Gallery/dog.png", &stored.hash).await.unwrap();

    assert_eq!(report.webp_removed, 1);
    assert!(!fixture.path("public/Gallery/dog.png.webp").exists());
    assert!(!fixture.path("public/Gallery/dog.png").exists());
    let protected_id = FileId::new(format!("Gallery/{}/dog.png", &stored.hash[..10]));
    assert!(store.protected_filesystem().has(&protected_id).await.unwrap());
}

#[tokio::test]
async fn published_jpeg_siblings_are_never_larger() {
    let fixture = Fixture::new(Vec::new());
    let store = &fixture.store;

    let stored = store
        .set_from_bytes(jpeg_bytes(7), "Photos/beach.jpg", None, None, &WriteOptions::default())
        .await
        .unwrap();
    store
        .set_from_bytes(jpeg_bytes(11), "Photos/beach.jpg", Some(stored.hash.as_str()), Some("small"), &WriteOptions::default())
        .await
        .unwrap();

    let report = store.publish("Photos/beach.jpg", &stored.hash).await.unwrap();

    assert_eq!(report.moved.len(), 2);
    let mut siblings = 0;
    for (_, to_id) in &report.moved {
        let source = fixture.root.path().join("public").join(to_id.as_str());
        let sibling = fixture.root.path().join("public").join(format!("{}.webp", to_id));
        if sibling.exists() {
            siblings += 1;
            assert!(std::fs::metadata(&sibling).unwrap().len() < std::fs::metadata(&source).unwrap().len());
        }
    }
    assert_eq!(siblings, report.webp_derived);
    let leftovers: Vec<_> = std::fs::read_dir(fixture.path("public/Photos"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .filter(|name| name.ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

#[tokio::test]
async fn separator_in_filename_and_short_hash_still_move() {
    let fixture = Fixture::new(Vec::new());
    let store = &fixture.store;

    let stored = store
        .set_from_bytes(png_bytes(3), "Uploads/my__pic.png", None, None, &WriteOptions::default())
        .await
        .unwrap();
    let report = store.publish("Uploads/my__pic.png", &stored.hash).await.unwrap();
    assert_eq!(report.moved.len(), 1);
    assert_eq!(report.webp_derived, 1);
    assert!(fixture.path("public/Uploads/my__pic.png.webp").exists());

    store
        .set_from_bytes(b"short".to_vec(), "Docs/a.txt", Some("abc123"), None, &WriteOptions::default())
        .await
        .unwrap();
    let report = store.publish("Docs/a.txt", "abc123").await.unwrap();
    assert_eq!(report.moved.len(), 1);
    assert!(!fixture.path("protected/Docs/abc123").exists());
}

#[tokio::test]
async fn missing_optimizer_leaves_bytes_alone() {
    let fixture = Fixture::new(vec![OptimizerEntry::new(
        OptimizerTool::Command {
            program: "definitely-not-installed-optimizer".into(),
            extensions: vec!["txt".into()],
        },
        Vec::new(),
    )]);

    let stored = fixture
        .store
        .set_from_bytes(b"plain text".to_vec(), "notes.txt", None, None, &public())
        .await
        .unwrap();

    assert_eq!(stored.filename, "notes.txt");
    assert_eq!(
        fixture.store.public_filesystem().read(&FileId::new("notes.txt")).await.unwrap(),
        b"plain text"
    );
}

#[tokio::test]
async fn conflicting_write_surfaces_store_error() {
    let fixture = Fixture::new(Vec::new());
    let mut options = public();
    fixture
        .store
        .set_from_bytes(b"one".to_vec(), "a.txt", None, None, &options)
        .await
        .unwrap();

    options.conflict = asset_optimizer::ConflictResolution::Exception;
    assert_err!(
        fixture
            .store
            .set_from_bytes(b"two".to_vec(), "a.txt", None, None, &options)
            .await
    );
    assert!(fixture.scratch_entries().is_empty());
}

#[cfg(unix)]
mod external_tools {
    use super::*;

    #[tokio::test]
    async fn smaller_result_replaces_buffer() {
        let tools = TempDir::new().unwrap();
        let fixture = Fixture::new(vec![script_tool(tools.path(), "shrink.sh", "printf 'tiny' > \"$f\"", &["txt"])]);

        fixture
            .store
            .set_from_bytes(b"a considerably longer body".to_vec(), "notes.txt", None, None, &public())
            .await
            .unwrap();

        assert_eq!(
            fixture.store.public_filesystem().read(&FileId::new("notes.txt")).await.unwrap(),
            b"tiny"
        );
        assert!(fixture.scratch_entries().is_empty());
    }

    #[tokio::test]
    async fn larger_or_empty_results_are_discarded() {
        let tools = TempDir::new().unwrap();
        let fixture = Fixture::new(vec![
            script_tool(tools.path(), "grow.sh", "printf 'padding padding padding' >> \"$f\"", &["txt"]),
            script_tool(tools.path(), "empty.sh", ": > \"$f\"", &["md"]),
        ]);

        fixture
            .store
            .set_from_bytes(b"body".to_vec(), "grow.txt", None, None, &public())
            .await
            .unwrap();
        fixture
            .store
            .set_from_bytes(b"# title".to_vec(), "empty.md", None, None, &public())
            .await
            .unwrap();

        let fs = fixture.store.public_filesystem();
        assert_eq!(fs.read(&FileId::new("grow.txt")).await.unwrap(), b"body");
        assert_eq!(fs.read(&FileId::new("empty.md")).await.unwrap(), b"# title");
        assert!(fixture.scratch_entries().is_empty());
    }

    #[tokio::test]
    async fn failing_tool_does_not_stop_the_chain() {
        let tools = TempDir::new().unwrap();
        let fixture = Fixture::new(vec![
            script_tool(tools.path(), "fail.sh", "echo broken >&2; exit 3", &["txt"]),
            script_tool(tools.path(), "shrink.sh", "printf 'ok' > \"$f\"", &["txt"]),
        ]);

        fixture
            .store
            .set_from_bytes(b"needs shrinking".to_vec(), "log.txt", None, None, &public())
            .await
            .unwrap();

        assert_eq!(
            fixture.store.public_filesystem().read(&FileId::new("log.txt")).await.unwrap(),
            b"ok"
        );
    }

    #[tokio::test]
    async fn local_file_is_optimized_in_place() {
        let tools = TempDir::new().unwrap();
        let fixture = Fixture::new(vec![script_tool(tools.path(), "shrink.sh", "printf 'z' > \"$f\"", &["txt"])]);
        let upload = tools.path().join("upload.txt");
        std::fs::write(&upload, b"zzzzzzzz").unwrap();

        fixture
            .store
            .set_from_local_file(&upload, Some("docs/upload.txt"), None, None, &public())
            .await
            .unwrap();

        assert_eq!(std::fs::read(&upload).unwrap(), b"z");
        assert_eq!(
            fixture.store.public_filesystem().read(&FileId::new("docs/upload.txt")).await.unwrap(),
            b"z"
        );
        assert!(fixture.scratch_entries().is_empty());
    }
}
