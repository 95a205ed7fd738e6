//! # Tool Path Resolver
//!
//! Finds the external binaries the adapters shell out to:
//! - `unar` for archive extraction
//! - `magick` / `convert` (ImageMagick 7 / 6) and `vips` for transcoding
//!
//! A `TOOLS_DIR` directory (flat, or with one subfolder per tool) takes
//! precedence over the system `PATH`.

use std::env;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::debug;

/// Tool path resolver shared by the extraction and transcoding adapters
pub struct ToolResolver {
    /// Directory with bundled tools, from `TOOLS_DIR`
    tools_dir: Option<PathBuf>,
}

impl ToolResolver {
    /// Get the singleton instance
    pub fn instance() -> &'static Self {
        static INSTANCE: OnceLock<ToolResolver> = OnceLock::new();
        INSTANCE.get_or_init(|| Self::new(env::var_os("TOOLS_DIR").map(PathBuf::from)))
    }

    pub fn new(tools_dir: Option<PathBuf>) -> Self {
        let tools_dir = tools_dir.filter(|dir| dir.is_dir());
        debug!("Tool resolver using bundled directory: {:?}", tools_dir);
        Self { tools_dir }
    }

    /// Resolve the path to a specific tool, bundled first then system PATH
    pub fn resolve(&self, tool_name: &str) -> Option<PathBuf> {
        let file_name = Self::executable_name(tool_name);

        if let Some(ref tools_dir) = self.tools_dir {
            let candidates = [
                tools_dir.join(&file_name),
                tools_dir.join(tool_name).join(&file_name),
            ];
            if let Some(found) = candidates.into_iter().find(|path| path.is_file()) {
                debug!("Using bundled tool: {} -> {:?}", tool_name, found);
                return Some(found);
            }
        }

        let found = env::var_os("PATH")
            .map(|paths| env::split_paths(&paths).collect::<Vec<_>>())
            .unwrap_or_default()
            .into_iter()
            .map(|dir| dir.join(&file_name))
            .find(|path| path.is_file());

        match found {
            Some(ref path) => debug!("Using system tool: {} -> {:?}", tool_name, path),
            None => debug!("Tool not found: {}", tool_name),
        }
        found
    }

    pub fn is_available(&self, tool_name: &str) -> bool {
        self.resolve(tool_name).is_some()
    }

    /// Install hint shown when a required tool is missing
    pub fn install_hint(tool_name: &str) -> String {
        match tool_name {
            "unar" => "sudo apt-get install unar  # macOS: brew install unar".to_string(),
            "magick" | "convert" => {
                "sudo apt-get install imagemagick  # needs AVIF/WebP delegates".to_string()
            }
            "vips" => "sudo apt-get install libvips-tools".to_string(),
            _ => format!("sudo apt-get install {}", tool_name),
        }
    }

    fn executable_name(tool_name: &str) -> String {
        if cfg!(windows) {
            format!("{}.exe", tool_name)
        } else {
            tool_name.to_string()
        }
    }

    /// Report of resolved tools, logged at startup in verbose mode
    pub fn report(&self, tools: &[&str]) -> String {
        tools
            .iter()
            .map(|tool| match self.resolve(tool) {
                Some(path) => format!("{} -> {}", tool, path.display()),
                None => format!("{} (missing, install with: {})", tool, Self::install_hint(tool)),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn tools_dir(&self) -> Option<&Path> {
        self.tools_dir.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_bundled_tool_takes_precedence() {
        let temp_dir = TempDir::new().unwrap();
        let name = ToolResolver::executable_name("fake-unar-tool");
        std::fs::create_dir_all(temp_dir.path().join("fake-unar-tool")).unwrap();
        let nested = temp_dir.path().join("fake-unar-tool").join(&name);
        std::fs::write(&nested, b"#!/bin/sh\n").unwrap();

        let resolver = ToolResolver::new(Some(temp_dir.path().to_path_buf()));
        assert_eq!(resolver.resolve("fake-unar-tool"), Some(nested));
    }

    #[test]
    fn test_missing_tool() {
        let resolver = ToolResolver::new(None);
        assert!(!resolver.is_available("definitely-not-a-real-tool-4096"));
        assert!(resolver.report(&["definitely-not-a-real-tool-4096"]).contains("missing"));
    }

    #[test]
    fn test_nonexistent_tools_dir_is_ignored() {
        let resolver = ToolResolver::new(Some(PathBuf::from("/nonexistent/tools")));
        assert!(resolver.tools_dir().is_none());
    }
}
