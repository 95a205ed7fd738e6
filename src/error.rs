//! # Error Types Module
//!
//! Questo modulo definisce tutti i tipi di errore della pipeline.
//!
//! ## Categorie di errori:
//! - `Input`: target path mancante o di tipo non supportato (fatale)
//! - `MissingDependency`: nessun tool esterno disponibile (fatale)
//! - `Extraction`: archivio illeggibile o corrotto (fatale)
//! - `Walk`: directory illeggibile durante la traversata (fatale)
//! - `Transcode`: singola immagine non convertibile (recuperato per file)
//! - `Cleanup`: rimozione del file perdente o dell'archivio fallita
//!
//! Gli errori fatali interrompono il run prima di qualsiasi conversione.
//! `Transcode` e `Cleanup` per file restano isolati al file che li ha generati.
//!
//! ## Esempio:
//! ```ignore
//! if !target.exists() {
//!     return Err(RecompressError::Input(format!("{} does not exist", target.display())));
//! }
//! ```

use std::path::PathBuf;

/// Custom error types for archive extraction and image recompression
#[derive(thiserror::Error, Debug)]
pub enum RecompressError {
    #[error("Input error: {0}")]
    Input(String),

    #[error("Dependency missing: {0}")]
    MissingDependency(String),

    #[error("Extraction of {} failed: {cause}", archive.display())]
    Extraction { archive: PathBuf, cause: String },

    #[error("Cannot walk {}: {source}", root.display())]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Transcode of {} failed: {reason}", path.display())]
    Transcode { path: PathBuf, reason: String },

    #[error("Cannot remove {}: {source}", path.display())]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RecompressError {
    /// Errors that abort the batch before any conversion begins
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Input(_) | Self::MissingDependency(_) | Self::Extraction { .. } | Self::Walk { .. }
        )
    }

    pub fn transcode(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Transcode {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RecompressError>;
