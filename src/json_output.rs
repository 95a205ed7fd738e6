//! # JSON Output Module
//!
//! Questo modulo gestisce l'output strutturato in JSON (`--json`) per chi
//! pilota il tool da un altro processo. Un oggetto per riga su stdout.
//!
//! ## Tipi di messaggi:
//! - `start`: inizio della fase di conversione
//! - `file_complete`: decisione presa per un file
//! - `file_failed`: file saltato per errore, originale intatto
//! - `complete`: totali finali
//! - `error`: errore fatale, nessun riepilogo

use crate::config::Config;
use crate::conversion::{ConversionOutcome, Kept};
use crate::error::RecompressError;
use crate::progress::BatchTotals;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Tipo di messaggio JSON
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JsonMessage {
    Start {
        target_path: PathBuf,
        images_root: PathBuf,
        total_files: usize,
        config: Config,
    },

    FileComplete {
        path: PathBuf,
        kept_path: PathBuf,
        original_size: u64,
        candidate_size: u64,
        final_size: u64,
        kept: Kept,
    },

    FileFailed {
        path: PathBuf,
        error: String,
    },

    Complete {
        total_before_bytes: u64,
        total_after_bytes: u64,
        converted: usize,
        kept_original: usize,
        failed: usize,
        cleanup_failures: usize,
        ratio: f64,
        duration_seconds: f64,
    },

    Error {
        message: String,
    },
}

impl JsonMessage {
    /// Emette il messaggio JSON su stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }

    pub fn start(config: &Config, images_root: &Path, total_files: usize) -> Self {
        Self::Start {
            target_path: config.target_path.clone(),
            images_root: images_root.to_path_buf(),
            total_files,
            config: config.clone(),
        }
    }

    pub fn file_complete(outcome: &ConversionOutcome) -> Self {
        Self::FileComplete {
            path: outcome.path.clone(),
            kept_path: outcome.kept_path.clone(),
            original_size: outcome.original_size,
            candidate_size: outcome.candidate_size,
            final_size: outcome.final_size,
            kept: outcome.kept,
        }
    }

    pub fn file_failed(path: &Path, err: &RecompressError) -> Self {
        Self::FileFailed {
            path: path.to_path_buf(),
            error: err.to_string(),
        }
    }

    pub fn complete(totals: &BatchTotals, duration_seconds: f64) -> Self {
        Self::Complete {
            total_before_bytes: totals.total_before_bytes,
            total_after_bytes: totals.total_after_bytes,
            converted: totals.converted,
            kept_original: totals.kept_original,
            failed: totals.failed,
            cleanup_failures: totals.cleanup_failures,
            ratio: totals.ratio(),
            duration_seconds,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}
