//! # Configuration Management Module
//!
//! Questo modulo gestisce la configurazione del job di ricompressione.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` costruita una volta all'avvio e mai modificata
//! - Definisce `TargetFormat` e il profilo di encoding fisso di ogni formato
//! - Valida i parametri di input prima dell'avvio della pipeline
//!
//! ## Parametri di configurazione:
//! - `remove_archive`: Rimuove l'archivio a fine elaborazione (default: false)
//! - `format`: Formato di destinazione, `avif` o `webp` (default: avif)
//! - `output_directory`: Directory in cui estrarre l'archivio (default: None = accanto all'archivio)
//! - `target_path`: Archivio o directory da elaborare
//! - `concurrency`: Numero massimo di conversioni simultanee (default: 1)
//! - `json_output`: Output JSON line-delimited invece del testo (default: false)
//!
//! ## Esempio:
//! ```ignore
//! let config = Config {
//!     format: TargetFormat::Webp,
//!     concurrency: 8,
//!     ..Config::new("photos.zip")
//! };
//! config.validate()?;
//! ```

use crate::error::{RecompressError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Output format requested from the transcoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    #[default]
    Avif,
    Webp,
}

/// Fixed quality/effort policy used to encode one format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeProfile {
    /// Encoder quality (1-100)
    pub quality: u8,
    /// CPU effort, 0 = fastest
    pub effort: u8,
    /// Keep full chroma resolution (4:4:4)
    pub full_chroma: bool,
    /// Let the encoder pick subsampling per region
    pub smart_subsample: bool,
}

impl TargetFormat {
    /// Extension appended to the source name for the converted candidate
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Avif => "avif",
            Self::Webp => "webp",
        }
    }

    pub fn profile(&self) -> EncodeProfile {
        match self {
            Self::Avif => EncodeProfile {
                quality: 50,
                effort: 9,
                full_chroma: true,
                smart_subsample: false,
            },
            Self::Webp => EncodeProfile {
                quality: 75,
                effort: 6,
                full_chroma: false,
                smart_subsample: true,
            },
        }
    }
}

impl std::fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Configuration for one recompression job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Delete the archive once every image has been processed
    pub remove_archive: bool,
    /// Output format for converted images
    pub format: TargetFormat,
    /// Where archives are extracted (None = next to the archive)
    pub output_directory: Option<PathBuf>,
    /// Archive file or directory of images
    pub target_path: PathBuf,
    /// Maximum number of conversions in flight
    pub concurrency: usize,
    /// Output progress and status as JSON for programmatic use
    pub json_output: bool,
}

impl Config {
    pub fn new(target_path: impl Into<PathBuf>) -> Self {
        Self {
            remove_archive: false,
            format: TargetFormat::default(),
            output_directory: None,
            target_path: target_path.into(),
            concurrency: 1,
            json_output: false,
        }
    }

    /// Concurrency ceiling actually applied; zero is treated as one
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency.max(1)
    }

    /// Directory the archive is extracted into
    pub fn extraction_parent(&self) -> PathBuf {
        if let Some(ref dir) = self.output_directory {
            return dir.clone();
        }
        match self.target_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => Path::new(".").to_path_buf(),
        }
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.target_path.as_os_str().is_empty() {
            return Err(RecompressError::Input("target path is empty".to_string()));
        }

        if let Some(ref output_dir) = self.output_directory {
            if output_dir.exists() && !output_dir.is_dir() {
                return Err(RecompressError::Input(format!(
                    "Output path is not a directory: {}",
                    output_dir.display()
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::new("/data/photos.zip");
        assert!(!config.remove_archive);
        assert_eq!(config.format, TargetFormat::Avif);
        assert_eq!(config.output_directory, None);
        assert_eq!(config.concurrency, 1);
        assert!(!config.json_output);
    }

    #[test]
    fn test_effective_concurrency_has_floor_of_one() {
        let mut config = Config::new("dir");
        config.concurrency = 0;
        assert_eq!(config.effective_concurrency(), 1);
        config.concurrency = 8;
        assert_eq!(config.effective_concurrency(), 8);
    }

    #[test]
    fn test_extraction_parent() {
        let config = Config::new("/data/archives/photos.zip");
        assert_eq!(config.extraction_parent(), PathBuf::from("/data/archives"));

        let config = Config::new("photos.zip");
        assert_eq!(config.extraction_parent(), PathBuf::from("."));

        let config = Config {
            output_directory: Some(PathBuf::from("/scratch")),
            ..Config::new("/data/archives/photos.zip")
        };
        assert_eq!(config.extraction_parent(), PathBuf::from("/scratch"));
    }

    #[test]
    fn test_config_validation() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("not_a_dir");
        std::fs::write(&file, b"x").unwrap();

        assert!(Config::new("photos.zip").validate().is_ok());
        assert!(Config::new("").validate().is_err());

        let config = Config {
            output_directory: Some(file),
            ..Config::new("photos.zip")
        };
        assert!(config.validate().is_err());

        let config = Config {
            output_directory: Some(temp_dir.path().join("created_later")),
            ..Config::new("photos.zip")
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_format_profiles() {
        assert_eq!(TargetFormat::Avif.extension(), "avif");
        assert_eq!(TargetFormat::Webp.extension(), "webp");

        let avif = TargetFormat::Avif.profile();
        assert_eq!((avif.quality, avif.effort), (50, 9));
        assert!(avif.full_chroma);

        let webp = TargetFormat::Webp.profile();
        assert_eq!((webp.quality, webp.effort), (75, 6));
        assert!(webp.smart_subsample);
    }

    #[test]
    fn test_config_serializes_format_lowercase() {
        let json = serde_json::to_string(&Config::new("a")).unwrap();
        assert!(json.contains("\"format\":\"avif\""));
    }
}
