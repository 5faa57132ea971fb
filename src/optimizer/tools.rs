//! # Optimizer Tool Kinds
//!
//! Each configured chain entry names a tool kind plus its option arguments.
//! The kind knows which extensions it acts on and where the target file goes
//! on its command line; every tool rewrites the target in place.
//!
//! | Tool      | Extensions  | Command line                               |
//! |-----------|-------------|--------------------------------------------|
//! | jpegoptim | jpg, jpeg   | `jpegoptim <args> <file>`                  |
//! | pngquant  | png         | `pngquant <args> --output <file> <file>`   |
//! | optipng   | png         | `optipng <args> <file>`                    |
//! | gifsicle  | gif         | `gifsicle <args> -i <file> -o <file>`      |
//! | cwebp     | webp        | `cwebp <args> <file> -o <file>`            |
//! | svgo      | svg         | `svgo <args> --input <file> --output <file>` |
//! | command   | configured  | `<program> <args> <file>`                  |

use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::Path;

/// A known optimizer binary, or an arbitrary command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tool", rename_all = "lowercase")]
pub enum OptimizerTool {
    Jpegoptim,
    Pngquant,
    Optipng,
    Gifsicle,
    Cwebp,
    Svgo,
    Command {
        program: String,
        extensions: Vec<String>,
    },
}

impl OptimizerTool {
    /// Binary name handed to the tool resolver
    pub fn binary(&self) -> &str {
        match self {
            Self::Jpegoptim => "jpegoptim",
            Self::Pngquant => "pngquant",
            Self::Optipng => "optipng",
            Self::Gifsicle => "gifsicle",
            Self::Cwebp => "cwebp",
            Self::Svgo => "svgo",
            Self::Command { program, .. } => program,
        }
    }

    /// Whether this tool acts on files with the given lowercase extension
    pub fn handles(&self, ext: &str) -> bool {
        match self {
            Self::Jpegoptim => matches!(ext, "jpg" | "jpeg"),
            Self::Pngquant | Self::Optipng => ext == "png",
            Self::Gifsicle => ext == "gif",
            Self::Cwebp => ext == "webp",
            Self::Svgo => ext == "svg",
            Self::Command { extensions, .. } => extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)),
        }
    }

    /// Full argument vector: configured options plus the in-place target
    pub fn command_args(&self, options: &[String], target: &Path) -> Vec<OsString> {
        let mut argv: Vec<OsString> = options.iter().map(OsString::from).collect();
        let file = target.as_os_str().to_os_string();

        match self {
            Self::Jpegoptim | Self::Optipng | Self::Command { .. } => argv.push(file),
            Self::Pngquant => argv.extend([OsString::from("--output"), file.clone(), file]),
            Self::Gifsicle => argv.extend([OsString::from("-i"), file.clone(), OsString::from("-o"), file]),
            Self::Cwebp => argv.extend([file.clone(), OsString::from("-o"), file]),
            Self::Svgo => argv.extend([
                OsString::from("--input"),
                file.clone(),
                OsString::from("--output"),
                file,
            ]),
        }

        argv
    }
}

/// One link of the optimizer chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizerEntry {
    #[serde(flatten)]
    pub tool: OptimizerTool,
    #[serde(default)]
    pub args: Vec<String>,
}

impl OptimizerEntry {
    pub fn new(tool: OptimizerTool, args: Vec<String>) -> Self {
        Self { tool, args }
    }
}
