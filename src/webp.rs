//! # WebP Sibling Deriver
//!
//! Produces `<name>.<ext>.webp` next to a stored JPEG or PNG in the public
//! asset tree. The sibling is addressed purely by path: `photo.jpg` gets
//! `photo.jpg.webp`, never `photo.webp`.
//!
//! ## Capability gate
//!
//! Derivation needs three codecs at runtime: JPEG decode, PNG decode and WebP
//! encode. `CodecSupport::probe()` asks the `image` crate which formats were
//! compiled in; when any is missing `convert` returns `Derivation::Skipped`
//! without touching the filesystem.
//!
//! ## Encoder
//!
//! | cwebp resolved | Encoding                                             |
//! |----------------|------------------------------------------------------|
//! | yes            | `cwebp -q <webp_default_quality> -m 4 -mt src -o out` |
//! | no             | `image` crate lossless WebP encoder                  |
//!
//! The result is staged next to the destination and only kept when it is
//! non-empty and strictly smaller than the source; otherwise any existing
//! sibling is removed and `convert` returns `Derivation::NotSmaller`.
//!
//! ## Failure policy
//!
//! `convert` returns `Result<Derivation, ConversionError>`. Callers decide to
//! log and drop the error, so a bad image never blocks a store write.

use crate::args;
use crate::config::Config;
use crate::error::ConversionError;
use crate::file_manager::FileManager;
use crate::storage::FileId;
use crate::tool_resolver::ToolPathResolver;
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, ImageFormat, ImageReader};
use std::ffi::OsString;
use std::io::{BufWriter, ErrorKind};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Suffix appended to a stored file's full name
pub const WEBP_SUFFIX: &str = ".webp";

/// Binary used for lossy WebP encoding when installed
pub const CWEBP: &str = "cwebp";

/// WebP sibling of a stored path: `dir/photo.jpg` → `dir/photo.jpg.webp`
pub fn webp_sibling_name(path: &str) -> String {
    format!("{}{}", path, WEBP_SUFFIX)
}

/// WebP sibling of an on-disk path
pub fn webp_sibling_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(WEBP_SUFFIX);
    PathBuf::from(name)
}

/// Runtime codec availability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecSupport {
    pub decode_jpeg: bool,
    pub decode_png: bool,
    pub encode_webp: bool,
}

impl CodecSupport {
    /// Ask the image crate which codecs are compiled in
    pub fn probe() -> Self {
        Self {
            decode_jpeg: ImageFormat::Jpeg.reading_enabled(),
            decode_png: ImageFormat::Png.reading_enabled(),
            encode_webp: ImageFormat::WebP.writing_enabled(),
        }
    }

    pub fn none() -> Self {
        Self {
            decode_jpeg: false,
            decode_png: false,
            encode_webp: false,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.decode_jpeg && self.decode_png && self.encode_webp
    }
}

/// Result of a derivation attempt that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Derivation {
    Created(PathBuf),
    Skipped,
    /// The encoded sibling was not smaller than its source and was discarded
    NotSmaller { source_size: u64, webp_size: u64 },
}

/// Derives WebP siblings into the public asset tree
#[derive(Debug, Clone)]
pub struct WebpDeriver {
    support: CodecSupport,
    public_root: PathBuf,
    quality: u8,
    cwebp: Option<PathBuf>,
}

impl WebpDeriver {
    /// Deriver using the built-in lossless encoder
    pub fn new(public_root: impl Into<PathBuf>, quality: u8) -> Self {
        Self {
            support: CodecSupport::probe(),
            public_root: public_root.into(),
            quality,
            cwebp: None,
        }
    }

    /// Deriver writing under `public_root`, with `cwebp` resolved like the optimizer tools
    pub fn from_config(config: &Config, public_root: PathBuf) -> Self {
        let cwebp = ToolPathResolver::new(config.tools_dir.clone()).resolve_tool(CWEBP);
        match cwebp {
            Some(ref path) => debug!("WebP siblings encoded with {}", path.display()),
            None => debug!("{} not found, WebP siblings use the lossless encoder", CWEBP),
        }
        Self::new(public_root, config.webp_default_quality).with_cwebp(cwebp)
    }

    /// Override the probed codec support
    pub fn with_support(mut self, support: CodecSupport) -> Self {
        self.support = support;
        self
    }

    /// Override the `cwebp` binary (None = lossless encoder)
    pub fn with_cwebp(mut self, cwebp: Option<PathBuf>) -> Self {
        self.cwebp = cwebp;
        self
    }

    pub fn support(&self) -> CodecSupport {
        self.support
    }

    pub fn public_root(&self) -> &Path {
        &self.public_root
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    pub fn cwebp(&self) -> Option<&Path> {
        self.cwebp.as_deref()
    }

    /// On-disk location of a public file
    pub fn public_path(&self, url_path: &FileId) -> PathBuf {
        self.public_root.join(url_path.as_str())
    }

    /// Sibling location for a public file
    pub fn destination_for(&self, url_path: &FileId) -> PathBuf {
        webp_sibling_path(&self.public_path(url_path))
    }

    /// Encode `source` as WebP at `destination`
    pub async fn convert(&self, source: &Path, destination: &Path) -> Result<Derivation, ConversionError> {
        if !self.support.is_complete() {
            debug!("WebP codecs unavailable ({:?}), skipping {}", self.support, source.display());
            return Ok(Derivation::Skipped);
        }

        let ext = FileManager::extension_of(&source.to_string_lossy());
        if !matches!(ext.as_str(), "jpg" | "jpeg" | "png") {
            debug!("No WebP sibling for '{}' sources: {}", ext, source.display());
            return Ok(Derivation::Skipped);
        }

        let parent = destination.parent().unwrap_or_else(|| Path::new("."));
        tokio::fs::create_dir_all(parent).await?;
        let staged = tempfile::Builder::new()
            .prefix(".")
            .suffix(".webp.tmp")
            .tempfile_in(parent)?
            .into_temp_path();

        match self.cwebp {
            Some(ref cwebp) => self.run_cwebp(cwebp, source, &staged).await?,
            None => {
                debug!("Encoding {} losslessly", source.display());
                let (input, output) = (source.to_path_buf(), staged.to_path_buf());
                tokio::task::spawn_blocking(move || encode_lossless(&input, &output)).await??;
            }
        }

        let source_size = FileManager::file_size(source).await?;
        let webp_size = FileManager::file_size(&staged).await?;
        if webp_size == 0 || webp_size >= source_size {
            debug!(
                "Discarding WebP for {}: {} >= {}",
                source.display(),
                FileManager::format_size(webp_size),
                FileManager::format_size(source_size)
            );
            match tokio::fs::remove_file(destination).await {
                Err(e) if e.kind() != ErrorKind::NotFound => return Err(e.into()),
                _ => {}
            }
            return Ok(Derivation::NotSmaller { source_size, webp_size });
        }

        staged.persist(destination).map_err(|e| e.error)?;
        debug!(
            "WebP sibling {}: {} -> {} ({:.1}% saved)",
            destination.display(),
            FileManager::format_size(source_size),
            FileManager::format_size(webp_size),
            FileManager::calculate_reduction(source_size, webp_size)
        );
        Ok(Derivation::Created(destination.to_path_buf()))
    }

    async fn run_cwebp(&self, cwebp: &Path, source: &Path, output: &Path) -> Result<(), ConversionError> {
        let mut argv = args!["-q", self.quality, "-m", 4, "-mt"];
        argv.push(source.to_string_lossy().to_string());
        argv.push("-o".to_string());
        argv.push(output.to_string_lossy().to_string());
        debug!("Running {} {:?}", cwebp.display(), argv);

        let result = Command::new(cwebp)
            .args(&argv)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if result.status.success() {
            Ok(())
        } else {
            Err(ConversionError::Tool {
                tool: CWEBP.to_string(),
                message: format!("{}: {}", result.status, String::from_utf8_lossy(&result.stderr).trim()),
            })
        }
    }
}

/// Decode `source` and write it to `output` as lossless WebP
fn encode_lossless(source: &Path, output: &Path) -> Result<(), ConversionError> {
    let decoded = ImageReader::open(source)?.with_guessed_format()?.decode()?;
    let rgba = DynamicImage::ImageRgba8(decoded.to_rgba8());

    let file = std::fs::File::create(output)?;
    let mut writer = BufWriter::new(file);
    rgba.write_with_encoder(WebPEncoder::new_lossless(&mut writer))?;
    std::io::Write::flush(&mut writer)?;
    Ok(())
}

/// Gradient PNG stored without filtering, so any WebP encoding of it is smaller
#[cfg(test)]
pub(crate) fn gradient_png(shade: u8) -> Vec<u8> {
    use image::codecs::png::{CompressionType, FilterType, PngEncoder};

    let img = image::RgbImage::from_fn(64, 64, |x, y| image::Rgb([(x * 4) as u8, (y * 4) as u8, shade]));
    let mut out = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_with_encoder(PngEncoder::new_with_quality(&mut out, CompressionType::Fast, FilterType::NoFilter))
        .unwrap();
    out
}
