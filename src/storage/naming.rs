//! # Naming Strategies
//!
//! Map a logical `(filename, hash, variant)` triple to a FileId and back.
//!
//! ```text
//! NaturalNaming: Uploads/photo.jpg              Uploads/photo__thumb64.jpg
//! HashedNaming:  Uploads/a1b2c3d4e5/photo.jpg   Uploads/a1b2c3d4e5/photo__thumb64.jpg
//! ```
//!
//! Variants share the directory of their canonical file, so enumerating the
//! variants of a file is a single directory listing.

use super::{FileId, Filesystem, ParsedFileId};
use crate::error::Result;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};

/// Separator between a file stem and its variant tag
pub const VARIANT_SEPARATOR: &str = "__";

/// Length of the hash folder used by `HashedNaming`
pub const HASH_FOLDER_LEN: usize = 10;

pub trait NamingStrategy: Send + Sync {
    fn build_file_id(&self, parsed: &ParsedFileId) -> FileId;

    /// Recover the logical identity from a FileId produced by this strategy
    fn parse_file_id(&self, id: &FileId) -> Option<ParsedFileId>;

    /// Canonical file then every variant of `parsed` present in `fs`.
    ///
    /// Candidates are matched by name against `parsed.filename` inside the
    /// directory this strategy builds for it, so the listing is taken lazily
    /// when the stream is first polled.
    fn find_variants<'a>(
        &'a self,
        parsed: &'a ParsedFileId,
        fs: &'a dyn Filesystem,
    ) -> BoxStream<'a, Result<ParsedFileId>> {
        let canonical = self.build_file_id(&ParsedFileId::new(parsed.filename.as_str(), parsed.hash.as_str()));
        let dir = canonical.dir().to_string();

        stream::once(async move { fs.list_files(&dir).await })
            .map_ok(move |ids| {
                let mut found: Vec<ParsedFileId> = ids
                    .into_iter()
                    .filter_map(|id| {
                        let variant = variant_of(canonical.file_name(), id.file_name())?;
                        let hash = if parsed.hash.is_empty() {
                            self.parse_file_id(&id).map(|p| p.hash).unwrap_or_default()
                        } else {
                            parsed.hash.clone()
                        };
                        Some(
                            ParsedFileId::new(parsed.filename.as_str(), hash)
                                .with_variant(variant.as_deref())
                                .with_file_id(id),
                        )
                    })
                    .collect();
                found.sort_by(|a, b| a.variant.cmp(&b.variant));
                stream::iter(found.into_iter().map(Ok))
            })
            .try_flatten()
            .boxed()
    }
}

/// Relation of a stored name to a canonical name: `None` when unrelated,
/// `Some(None)` for the canonical file, `Some(Some(tag))` for `stem__tag.ext`
fn variant_of(canonical: &str, candidate: &str) -> Option<Option<String>> {
    if candidate == canonical {
        return Some(None);
    }

    let (_, stem, ext) = split_filename(canonical);
    let rest = candidate.strip_prefix(stem)?.strip_prefix(VARIANT_SEPARATOR)?;
    let tag = match ext {
        Some(ext) => rest.strip_suffix(ext)?.strip_suffix('.')?,
        None => rest,
    };
    if tag.is_empty() || tag.contains('.') {
        return None;
    }
    Some(Some(tag.to_string()))
}

/// Split `dir/stem.ext` into its three parts
fn split_filename(filename: &str) -> (&str, &str, Option<&str>) {
    let (dir, name) = filename.rsplit_once('/').unwrap_or(("", filename));
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (dir, stem, Some(ext)),
        _ => (dir, name, None),
    }
}

fn join(parts: &[&str]) -> String {
    parts
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("/")
}

/// `stem__variant.ext`, or `stem.ext` for the canonical file
fn variant_file_name(stem: &str, ext: Option<&str>, variant: Option<&str>) -> String {
    let mut name = stem.to_string();
    if let Some(variant) = variant {
        name.push_str(VARIANT_SEPARATOR);
        name.push_str(variant);
    }
    if let Some(ext) = ext {
        name.push('.');
        name.push_str(ext);
    }
    name
}

/// Split a stored file name back into `(stem.ext, variant)`
fn parse_file_name(name: &str) -> (String, Option<String>) {
    let (_, stem, ext) = split_filename(name);
    let (stem, variant) = match stem.split_once(VARIANT_SEPARATOR) {
        Some((stem, variant)) if !stem.is_empty() && !variant.is_empty() => (stem, Some(variant.to_string())),
        _ => (stem, None),
    };
    let filename = match ext {
        Some(ext) => format!("{}.{}", stem, ext),
        None => stem.to_string(),
    };
    (filename, variant)
}

/// Public layout: the file lives at its own name
#[derive(Debug, Clone, Copy, Default)]
pub struct NaturalNaming;

impl NamingStrategy for NaturalNaming {
    fn build_file_id(&self, parsed: &ParsedFileId) -> FileId {
        let (dir, stem, ext) = split_filename(&parsed.filename);
        FileId::new(join(&[dir, &variant_file_name(stem, ext, parsed.variant())]))
    }

    fn parse_file_id(&self, id: &FileId) -> Option<ParsedFileId> {
        let (name, variant) = parse_file_name(id.file_name());
        let filename = join(&[id.dir(), &name]);
        Some(
            ParsedFileId::new(filename, "")
                .with_variant(variant.as_deref())
                .with_file_id(id.clone()),
        )
    }
}

/// Protected layout: a folder named after the hash prefix keeps versions apart
#[derive(Debug, Clone, Copy, Default)]
pub struct HashedNaming;

impl NamingStrategy for HashedNaming {
    fn build_file_id(&self, parsed: &ParsedFileId) -> FileId {
        let (dir, stem, ext) = split_filename(&parsed.filename);
        let hash_folder: String = parsed.hash.chars().take(HASH_FOLDER_LEN).collect();
        FileId::new(join(&[dir, &hash_folder, &variant_file_name(stem, ext, parsed.variant())]))
    }

    fn parse_file_id(&self, id: &FileId) -> Option<ParsedFileId> {
        let parent = id.dir();
        let (dir, hash_folder) = parent.rsplit_once('/').unwrap_or(("", parent));
        let is_hash = hash_folder.len() == HASH_FOLDER_LEN && hash_folder.chars().all(|c| c.is_ascii_hexdigit());
        if !is_hash {
            return None;
        }

        let (name, variant) = parse_file_name(id.file_name());
        Some(
            ParsedFileId::new(join(&[dir, &name]), hash_folder)
                .with_variant(variant.as_deref())
                .with_file_id(id.clone()),
        )
    }
}
