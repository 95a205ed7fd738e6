//! # Archive Extraction Module
//!
//! Adattatore verso il tool esterno di estrazione.
//!
//! ## Responsabilità:
//! - `Unpacker`: capacità esterna di spacchettare un archivio in una directory
//! - `UnarUnpacker`: implementazione basata su `unar` (appiattisce la directory
//!   top-level dell'archivio e preserva i timestamp dei file)
//! - `Extractor`: deriva la directory di destinazione, salta l'estrazione se
//!   esiste già e pubblica il risultato solo a estrazione completata
//!
//! ## Path di destinazione:
//! ```text
//! Archive: /downloads/holiday.zip
//! Parent:  /scratch
//! Output:  /scratch/holiday
//! ```
//!
//! L'estrazione avviene in una directory temporanea dentro il parent, poi
//! rinominata: un'estrazione fallita non lascia mai una directory che un
//! rerun salterebbe.

use crate::error::{RecompressError, Result};
use crate::tool_resolver::ToolResolver;
use crate::utils::to_os_args;
use async_trait::async_trait;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// External capability that unpacks an archive into a directory
#[async_trait]
pub trait Unpacker: Send + Sync {
    /// Unpack `archive` into `target_dir`, which already exists and is empty.
    ///
    /// A single top-level directory inside the archive is flattened away and
    /// file timestamps are preserved.
    async fn unpack(&self, archive: &Path, target_dir: &Path) -> Result<()>;

    /// Fail early when the underlying tool is missing
    async fn check_available(&self) -> Result<()> {
        Ok(())
    }

    /// Name for logging
    fn name(&self) -> &str;
}

/// Unpacker driving The Unarchiver's `unar` command
#[derive(Debug, Default, Clone)]
pub struct UnarUnpacker;

impl UnarUnpacker {
    const TOOL: &'static str = "unar";

    fn tool_path() -> Result<PathBuf> {
        ToolResolver::instance().resolve(Self::TOOL).ok_or_else(|| {
            RecompressError::MissingDependency(format!(
                "{} is required to extract archives. Install with: {}",
                Self::TOOL,
                ToolResolver::install_hint(Self::TOOL)
            ))
        })
    }
}

#[async_trait]
impl Unpacker for UnarUnpacker {
    async fn unpack(&self, archive: &Path, target_dir: &Path) -> Result<()> {
        let tool = Self::tool_path()?;
        let args = to_os_args([
            OsStr::new("-quiet"),
            OsStr::new("-force-overwrite"),
            OsStr::new("-no-directory"),
            OsStr::new("-copy-time"),
            OsStr::new("-output-directory"),
            target_dir.as_os_str(),
            archive.as_os_str(),
        ]);
        debug!("Running {:?} {:?}", tool, args);

        let output = Command::new(&tool)
            .args(&args)
            .output()
            .await
            .map_err(|e| RecompressError::Extraction {
                archive: archive.to_path_buf(),
                cause: format!("failed to launch {}: {}", tool.display(), e),
            })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(RecompressError::Extraction {
                archive: archive.to_path_buf(),
                cause: format!(
                    "{} exited with {}: {}",
                    Self::TOOL,
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            })
        }
    }

    async fn check_available(&self) -> Result<()> {
        Self::tool_path().map(|_| ())
    }

    fn name(&self) -> &str {
        Self::TOOL
    }
}

/// Directory an archive is extracted into: `parent/<archive name without extension>`
pub fn extracted_dir_for(archive: &Path, parent: &Path) -> Result<PathBuf> {
    let stem = archive.file_stem().ok_or_else(|| {
        RecompressError::Input(format!("Invalid archive name: {}", archive.display()))
    })?;
    Ok(parent.join(stem))
}

/// Idempotent extraction on top of an [`Unpacker`]
#[derive(Clone)]
pub struct Extractor {
    unpacker: Arc<dyn Unpacker>,
}

impl Extractor {
    pub fn new(unpacker: Arc<dyn Unpacker>) -> Self {
        Self { unpacker }
    }

    pub fn unar() -> Self {
        Self::new(Arc::new(UnarUnpacker))
    }

    /// Extract `archive` under `destination_parent` and return the extracted directory.
    ///
    /// An existing target directory is returned as-is without unpacking again.
    pub async fn extract(&self, archive: &Path, destination_parent: &Path) -> Result<PathBuf> {
        let target_dir = extracted_dir_for(archive, destination_parent)?;

        match tokio::fs::metadata(&target_dir).await {
            Ok(metadata) if metadata.is_dir() => {
                info!(
                    "Extraction target {} already exists, skipping extraction",
                    target_dir.display()
                );
                return Ok(target_dir);
            }
            Ok(_) => {
                return Err(RecompressError::Extraction {
                    archive: archive.to_path_buf(),
                    cause: format!("{} exists and is not a directory", target_dir.display()),
                });
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        self.unpacker.check_available().await?;
        let extraction_error = |cause: String| RecompressError::Extraction {
            archive: archive.to_path_buf(),
            cause,
        };

        tokio::fs::create_dir_all(destination_parent)
            .await
            .map_err(|e| extraction_error(format!("cannot create {}: {}", destination_parent.display(), e)))?;

        // Dropping the TempDir removes whatever a failed unpack left behind
        let staging = tempfile::Builder::new()
            .prefix(".extracting-")
            .tempdir_in(destination_parent)
            .map_err(|e| extraction_error(format!("cannot create staging directory: {}", e)))?;

        info!(
            "Extracting {} with {} -> {}",
            archive.display(),
            self.unpacker.name(),
            target_dir.display()
        );
        self.unpacker
            .unpack(archive, staging.path())
            .await
            .map_err(|e| match e {
                RecompressError::Extraction { .. } | RecompressError::MissingDependency(_) => e,
                other => extraction_error(other.to_string()),
            })?;

        tokio::fs::rename(staging.path(), &target_dir)
            .await
            .map_err(|e| extraction_error(format!("cannot move extracted files into place: {}", e)))?;

        if let Err(e) = staging.close() {
            // Expected: the directory was renamed away
            debug!("Staging directory already gone: {}", e);
        }

        Ok(target_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Writes one file per call and counts invocations
    #[derive(Default)]
    struct CountingUnpacker {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl Unpacker for CountingUnpacker {
        async fn unpack(&self, _archive: &Path, target_dir: &Path) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::fs::write(target_dir.join("page1.jpg"), b"jpeg").await?;
            if self.fail {
                return Err(RecompressError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "truncated archive",
                )));
            }
            Ok(())
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    #[test]
    fn test_extracted_dir_strips_last_extension() {
        let parent = Path::new("/scratch");
        assert_eq!(
            extracted_dir_for(Path::new("/dl/holiday.zip"), parent).unwrap(),
            PathBuf::from("/scratch/holiday")
        );
        assert_eq!(
            extracted_dir_for(Path::new("/dl/comic.vol1.cbz"), parent).unwrap(),
            PathBuf::from("/scratch/comic.vol1")
        );
    }

    #[tokio::test]
    async fn test_extract_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("photos.zip");
        std::fs::write(&archive, b"PK").unwrap();

        let unpacker = Arc::new(CountingUnpacker::default());
        let extractor = Extractor::new(unpacker.clone());

        let first = extractor.extract(&archive, temp_dir.path()).await.unwrap();
        let second = extractor.extract(&archive, temp_dir.path()).await.unwrap();

        assert_eq!(first, temp_dir.path().join("photos"));
        assert_eq!(first, second);
        assert_eq!(unpacker.calls.load(Ordering::SeqCst), 1);
        assert!(first.join("page1.jpg").is_file());
    }

    #[tokio::test]
    async fn test_failed_extraction_leaves_no_target() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("broken.zip");
        std::fs::write(&archive, b"not an archive").unwrap();

        let extractor = Extractor::new(Arc::new(CountingUnpacker {
            fail: true,
            ..Default::default()
        }));
        let err = extractor.extract(&archive, temp_dir.path()).await.unwrap_err();

        assert!(matches!(err, RecompressError::Extraction { .. }));
        assert!(!temp_dir.path().join("broken").exists());
        let leftovers: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(".extracting-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_archive_without_extension_is_not_treated_as_extracted() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("photos");
        std::fs::write(&archive, b"PK").unwrap();

        let unpacker = Arc::new(CountingUnpacker::default());
        let extractor = Extractor::new(unpacker.clone());
        let err = extractor.extract(&archive, temp_dir.path()).await.unwrap_err();

        assert!(matches!(err, RecompressError::Extraction { .. }));
        assert!(err.is_fatal());
        assert_eq!(unpacker.calls.load(Ordering::SeqCst), 0);
        assert_eq!(std::fs::read(&archive).unwrap(), b"PK");
    }

    #[tokio::test]
    async fn test_extract_creates_missing_output_directory() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("set.zip");
        std::fs::write(&archive, b"PK").unwrap();
        let out = temp_dir.path().join("out/nested");

        let extractor = Extractor::new(Arc::new(CountingUnpacker::default()));
        let dir = extractor.extract(&archive, &out).await.unwrap();
        assert_eq!(dir, out.join("set"));
        assert!(dir.join("page1.jpg").is_file());
    }
}
