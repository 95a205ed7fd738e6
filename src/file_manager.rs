//! # File Management Module
//!
//! Questo modulo gestisce la discovery dei file e le operazioni sui file.
//!
//! ## Responsabilità:
//! - Discovery ricorsiva di tutti i file regolari sotto una directory
//! - Filtro delle estensioni convertibili (jpg, jpeg, png)
//! - Dimensione e rimozione dei file, con errori tipizzati
//! - Formattazione human-readable delle dimensioni
//!
//! ## Ordine di traversata:
//! Per ogni directory i file vengono aggiunti prima di scendere nelle
//! sottodirectory, che vengono espanse nell'ordine in cui sono state lette.
//! I symlink non vengono seguiti e non contano come file regolari.
//!
//! ## Esempio:
//! ```ignore
//! let files = FileManager::list_files(Path::new("/path/to/images"))?;
//! for file in files.iter().filter(|f| FileManager::is_convertible(f)) {
//!     // convert
//! }
//! ```

use crate::error::{RecompressError, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use walkdir::WalkDir;

/// Extensions dispatched to the conversion unit. Matching is case-sensitive.
pub const CONVERTIBLE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Manages file operations and discovery
pub struct FileManager;

impl FileManager {
    /// List every regular file under `root`, recursively.
    ///
    /// Fails with [`RecompressError::Walk`] as soon as any directory cannot be
    /// read; no partial listing is returned.
    pub fn list_files(root: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        // Stable sort: files ahead of directories, read order kept otherwise
        let walker = WalkDir::new(root)
            .min_depth(1)
            .follow_links(false)
            .sort_by(|a, b| a.file_type().is_dir().cmp(&b.file_type().is_dir()));

        for entry in walker {
            let entry = entry.map_err(|source| RecompressError::Walk {
                root: root.to_path_buf(),
                source,
            })?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }

        Ok(files)
    }

    /// Check if a file has one of the convertible extensions
    pub fn is_convertible(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| CONVERTIBLE_EXTENSIONS.contains(&ext))
            .unwrap_or(false)
    }

    pub async fn file_size(path: &Path) -> Result<u64> {
        Ok(fs::metadata(path).await?.len())
    }

    /// Delete a file, reporting failure as a cleanup error
    pub async fn remove(path: &Path) -> Result<()> {
        fs::remove_file(path)
            .await
            .map_err(|source| RecompressError::Cleanup {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Get human-readable file size
    pub fn format_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, b"data").unwrap();
    }

    #[test]
    fn test_list_files_recurses_without_duplicates() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let expected = [
            root.join("top.jpg"),
            root.join("a/one.png"),
            root.join("a/b/two.txt"),
            root.join("a/b/c/d/e/deep.jpeg"),
            root.join("z/last.jpg"),
        ];
        for path in &expected {
            touch(path);
        }
        std::fs::create_dir_all(root.join("empty/dir")).unwrap();

        let files = FileManager::list_files(root).unwrap();
        assert_eq!(files.len(), expected.len());

        let unique: HashSet<_> = files.iter().cloned().collect();
        assert_eq!(unique.len(), files.len());
        for path in &expected {
            assert!(unique.contains(path), "missing {}", path.display());
        }
    }

    #[test]
    fn test_list_files_puts_files_before_subdirectories() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        touch(&root.join("aaa/nested.jpg"));
        touch(&root.join("zzz.jpg"));

        let files = FileManager::list_files(root).unwrap();
        assert_eq!(files, vec![root.join("zzz.jpg"), root.join("aaa/nested.jpg")]);
    }

    #[test]
    fn test_list_files_missing_root_is_walk_error() {
        let temp_dir = TempDir::new().unwrap();
        let err = FileManager::list_files(&temp_dir.path().join("gone")).unwrap_err();
        assert!(matches!(err, RecompressError::Walk { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_list_files_unreadable_subdirectory_fails_whole_walk() {
        use std::fs::Permissions;
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        touch(&root.join("first.jpg"));
        touch(&root.join("a/locked/inner.jpg"));
        touch(&root.join("z/after.png"));
        let locked = root.join("a/locked");
        std::fs::set_permissions(&locked, Permissions::from_mode(0o000)).unwrap();

        // Permission bits are not enforced for root
        if std::fs::read_dir(&locked).is_ok() {
            std::fs::set_permissions(&locked, Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let result = FileManager::list_files(root);
        std::fs::set_permissions(&locked, Permissions::from_mode(0o755)).unwrap();

        match result {
            Err(RecompressError::Walk { root: walked, .. }) => assert_eq!(walked, root),
            other => panic!("expected Walk error, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_list_files_skips_symlinks() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        touch(&root.join("real.jpg"));
        std::os::unix::fs::symlink(root.join("real.jpg"), root.join("link.jpg")).unwrap();

        let files = FileManager::list_files(root).unwrap();
        assert_eq!(files, vec![root.join("real.jpg")]);
    }

    #[test]
    fn test_is_convertible_is_case_sensitive() {
        assert!(FileManager::is_convertible(Path::new("/x/a.jpg")));
        assert!(FileManager::is_convertible(Path::new("/x/a.jpeg")));
        assert!(FileManager::is_convertible(Path::new("/x/a.png")));
        assert!(!FileManager::is_convertible(Path::new("/x/a.JPG")));
        assert!(!FileManager::is_convertible(Path::new("/x/a.gif")));
        assert!(!FileManager::is_convertible(Path::new("/x/a.txt")));
        assert!(!FileManager::is_convertible(Path::new("/x/a.jpg.avif")));
        assert!(!FileManager::is_convertible(Path::new("/x/jpg")));
    }

    #[tokio::test]
    async fn test_remove_missing_file_is_cleanup_error() {
        let temp_dir = TempDir::new().unwrap();
        let err = FileManager::remove(&temp_dir.path().join("nope.jpg"))
            .await
            .unwrap_err();
        assert!(matches!(err, RecompressError::Cleanup { .. }));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(FileManager::format_size(512), "512 B");
        assert_eq!(FileManager::format_size(2048), "2.00 KB");
        assert_eq!(FileManager::format_size(5 * 1024 * 1024), "5.00 MB");
    }
}
