//! # Tool Path Resolver
//!
//! Finds optimizer binaries for the chain runner:
//! - An explicit tools directory (config `tools_dir`, or env `TOOLS_DIR`)
//! - The system `PATH`
//!
//! Absolute or relative paths with a directory component are used as given.

use std::env;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Resolves optimizer binary names to executable paths
#[derive(Debug, Clone, Default)]
pub struct ToolPathResolver {
    /// Directory searched before `PATH`
    tools_dir: Option<PathBuf>,
}

impl ToolPathResolver {
    /// Create a resolver, falling back to the `TOOLS_DIR` environment variable
    pub fn new(tools_dir: Option<PathBuf>) -> Self {
        let tools_dir = tools_dir.or_else(|| env::var_os("TOOLS_DIR").map(PathBuf::from));
        Self { tools_dir }
    }

    /// Resolve the path to a specific tool
    pub fn resolve_tool(&self, tool_name: &str) -> Option<PathBuf> {
        let given = Path::new(tool_name);
        if given.components().count() > 1 || given.is_absolute() {
            return given.is_file().then(|| given.to_path_buf());
        }

        if let Some(ref tools_dir) = self.tools_dir {
            let bundled = tools_dir.join(Self::with_exe_suffix(tool_name));
            if bundled.is_file() {
                debug!("Using bundled tool: {} -> {:?}", tool_name, bundled);
                return Some(bundled);
            }
        }

        let found = self.find_in_system_path(tool_name);
        match &found {
            Some(path) => debug!("Using system tool: {} -> {:?}", tool_name, path),
            None => debug!("Tool not found: {}", tool_name),
        }
        found
    }

    /// Find tool in system PATH
    fn find_in_system_path(&self, tool_name: &str) -> Option<PathBuf> {
        let tool_with_ext = Self::with_exe_suffix(tool_name);

        env::split_paths(&env::var_os("PATH")?)
            .map(|dir| dir.join(&tool_with_ext))
            .find(|path| path.is_file())
    }

    fn with_exe_suffix(tool_name: &str) -> String {
        if cfg!(windows) && !tool_name.ends_with(".exe") {
            format!("{}.exe", tool_name)
        } else {
            tool_name.to_string()
        }
    }

    /// Check if a specific tool is available
    pub fn is_tool_available(&self, tool_name: &str) -> bool {
        self.resolve_tool(tool_name).is_some()
    }

    /// Installation hint for a missing optimizer on Debian-like systems
    pub fn install_hint(tool_name: &str) -> String {
        match tool_name {
            "jpegoptim" => "sudo apt-get install jpegoptim".to_string(),
            "pngquant" => "sudo apt-get install pngquant".to_string(),
            "optipng" => "sudo apt-get install optipng".to_string(),
            "gifsicle" => "sudo apt-get install gifsicle".to_string(),
            "cwebp" => "sudo apt-get install webp".to_string(),
            "svgo" => "npm install -g svgo".to_string(),
            _ => format!("sudo apt-get install {}", tool_name),
        }
    }

    /// Get a report of tool availability for the given names
    pub fn tools_report<'a>(&self, tools: impl IntoIterator<Item = &'a str>) -> String {
        let mut report = String::from("Optimizer tool availability:\n");
        if let Some(ref dir) = self.tools_dir {
            report.push_str(&format!("Tools dir: {}\n", dir.display()));
        }

        for tool in tools {
            match self.resolve_tool(tool) {
                Some(path) => report.push_str(&format!("  ✅ {} -> {}\n", tool, path.display())),
                None => report.push_str(&format!(
                    "  ❌ {} (install with: {})\n",
                    tool,
                    Self::install_hint(tool)
                )),
            }
        }

        report
    }
}
