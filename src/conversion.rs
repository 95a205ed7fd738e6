//! # Conversion Unit Module
//!
//! Worker per la conversione di un singolo file.
//! Separato dall'orchestratore per poter girare in parallelo senza stato condiviso.
//!
//! ## Flusso per file:
//! 1. Transcode del sorgente nel candidato (`photo.jpg` → `photo.jpg.avif`)
//! 2. Stat di originale e candidato
//! 3. Decisione: se il candidato non risparmia almeno l'1% si tiene l'originale
//! 4. Rimozione del file perdente: alla fine ne sopravvive esattamente uno
//!
//! Se il transcode fallisce l'originale non viene toccato.

use crate::config::TargetFormat;
use crate::error::{RecompressError, Result};
use crate::file_manager::FileManager;
use crate::transcoder::Transcoder;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Which file survives a conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Kept {
    Original,
    Converted,
}

/// Result of converting one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionOutcome {
    /// Original file that was dispatched
    pub path: PathBuf,
    /// Path of the file left on disk
    pub kept_path: PathBuf,
    pub original_size: u64,
    pub candidate_size: u64,
    /// Size of the surviving file
    pub final_size: u64,
    pub kept: Kept,
}

/// Keep decision given both sizes.
///
/// The candidate must come in strictly under 99% of the original; anything
/// else, the exact 99% boundary included, keeps the original.
pub fn decide(original_size: u64, candidate_size: u64) -> Kept {
    if candidate_size as u128 * 100 >= original_size as u128 * 99 {
        Kept::Original
    } else {
        Kept::Converted
    }
}

/// Converts one file and keeps the smaller of original and candidate
#[derive(Clone)]
pub struct ConversionUnit {
    transcoder: Arc<dyn Transcoder>,
    format: TargetFormat,
}

impl ConversionUnit {
    pub fn new(transcoder: Arc<dyn Transcoder>, format: TargetFormat) -> Self {
        Self { transcoder, format }
    }

    /// Transcode, compare and clean up `path`.
    ///
    /// On success exactly one of original and candidate remains on disk.
    pub async fn convert_one(&self, path: &Path) -> Result<ConversionOutcome> {
        let candidate = self
            .transcoder
            .transcode(path, self.format)
            .await
            .map_err(|e| match e {
                RecompressError::Transcode { .. } => e,
                other => RecompressError::transcode(path, other),
            })?;

        let (original_size, candidate_size) = match Self::sizes(path, &candidate).await {
            Ok(sizes) => sizes,
            Err(e) => {
                // Original is authoritative when the candidate cannot be measured
                if let Err(cleanup) = FileManager::remove(&candidate).await {
                    warn!("{}", cleanup);
                }
                return Err(e);
            }
        };
        debug!(
            "{}: {} => {} bytes",
            path.display(),
            original_size,
            candidate_size
        );

        let kept = decide(original_size, candidate_size);
        let (loser, kept_path, final_size) = match kept {
            Kept::Original => (candidate, path.to_path_buf(), original_size),
            Kept::Converted => (path.to_path_buf(), candidate, candidate_size),
        };
        FileManager::remove(&loser).await?;

        Ok(ConversionOutcome {
            path: path.to_path_buf(),
            kept_path,
            original_size,
            candidate_size,
            final_size,
            kept,
        })
    }

    async fn sizes(path: &Path, candidate: &Path) -> Result<(u64, u64)> {
        let original_size = FileManager::file_size(path).await?;
        let candidate_size = FileManager::file_size(candidate)
            .await
            .map_err(|e| RecompressError::transcode(path, format!("candidate unreadable: {}", e)))?;
        Ok((original_size, candidate_size))
    }
}
