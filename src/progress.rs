//! # Progress Tracking and Statistics Module
//!
//! Questo modulo gestisce il progress tracking, i totali aggregati e l'output
//! per l'utente.
//!
//! ## Componenti principali:
//! - `BatchTotals`: byte prima/dopo e contatori, posseduti dal solo orchestratore
//! - `ProgressManager`: progress bar `indicatif` su stderr
//! - `Reporter`: righe testuali su stdout, oppure eventi JSON con `--json`
//!
//! ## Output testuale:
//! ```text
//! /photos/a.jpg
//!   100000 => 40000
//! /photos/b.png
//!   5000 => 4980
//!   Converted file has been removed due to inefficient conversion
//! 105000 => 45000 (0.4286)
//! ```

use crate::config::Config;
use crate::conversion::{ConversionOutcome, Kept};
use crate::error::RecompressError;
use crate::file_manager::FileManager;
use crate::json_output::JsonMessage;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use tracing::error;

/// Running totals for one batch.
///
/// Only the pipeline controller folds into this; conversion tasks hand back
/// outcomes instead of touching it.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct BatchTotals {
    pub total_before_bytes: u64,
    pub total_after_bytes: u64,
    /// Files where the converted candidate was kept
    pub converted: usize,
    /// Files where the original was kept
    pub kept_original: usize,
    /// Files that failed to transcode, left untouched
    pub failed: usize,
    /// Files whose losing copy could not be deleted
    pub cleanup_failures: usize,
}

impl BatchTotals {
    pub fn new() -> Self {
        Self::default()
    }

    /// The after total counts the size of the file left on disk
    pub fn fold(&mut self, outcome: &ConversionOutcome) {
        self.total_before_bytes += outcome.original_size;
        self.total_after_bytes += outcome.final_size;
        match outcome.kept {
            Kept::Converted => self.converted += 1,
            Kept::Original => self.kept_original += 1,
        }
    }

    pub fn record_failure(&mut self, err: &RecompressError) {
        match err {
            RecompressError::Cleanup { .. } => self.cleanup_failures += 1,
            _ => self.failed += 1,
        }
    }

    /// Files whose keep decision completed
    pub fn files_decided(&self) -> usize {
        self.converted + self.kept_original
    }

    /// After/before ratio; 1.0 when nothing was processed
    pub fn ratio(&self) -> f64 {
        if self.total_before_bytes == 0 {
            1.0
        } else {
            self.total_after_bytes as f64 / self.total_before_bytes as f64
        }
    }

    pub fn format_summary(&self) -> String {
        format!(
            "{} => {} ({:.4})",
            self.total_before_bytes,
            self.total_after_bytes,
            self.ratio()
        )
    }
}

/// Manages the progress bar for the converting stage
#[derive(Clone)]
pub struct ProgressManager {
    bar: ProgressBar,
}

impl ProgressManager {
    pub fn new(total_files: u64) -> Self {
        let bar = ProgressBar::new(total_files);

        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
        {
            bar.set_style(style.progress_chars("=>-"));
        }
        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    /// Advance by one file with a message
    pub fn update(&self, message: &str) {
        self.bar.inc(1);
        self.bar.set_message(message.to_string());
    }

    /// Print a line to stdout without tearing the bar
    pub fn println(&self, line: &str) {
        self.bar.suspend(|| println!("{}", line));
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

/// User-facing output for one batch
pub struct Reporter {
    json: bool,
    progress: ProgressManager,
}

impl Reporter {
    pub fn new(total_files: usize, json: bool) -> Self {
        let progress = if json {
            ProgressManager::hidden()
        } else {
            ProgressManager::new(total_files as u64)
        };
        Self { json, progress }
    }

    pub fn start(&self, config: &Config, images_root: &Path, total_files: usize) {
        if self.json {
            JsonMessage::start(config, images_root, total_files).emit();
        }
    }

    pub fn file_done(&self, outcome: &ConversionOutcome) {
        let name = file_name(&outcome.path);
        if self.json {
            JsonMessage::file_complete(outcome).emit();
        } else {
            self.progress.println(&format!(
                "{}\n  {} => {}",
                outcome.path.display(),
                outcome.original_size,
                outcome.candidate_size
            ));
            if outcome.kept == Kept::Original {
                self.progress
                    .println("  Converted file has been removed due to inefficient conversion");
            }
        }

        let message = match outcome.kept {
            Kept::Converted => format!(
                "[OK] {}: {} saved",
                name,
                FileManager::format_size(outcome.original_size.saturating_sub(outcome.final_size))
            ),
            Kept::Original => format!("[SKIP] {}: kept original", name),
        };
        self.progress.update(&message);
    }

    pub fn file_failed(&self, path: &Path, err: &RecompressError) {
        error!("Failed to process {}: {}", path.display(), err);
        if self.json {
            JsonMessage::file_failed(path, err).emit();
        }
        self.progress
            .update(&format!("[ERROR] {}: error", file_name(path)));
    }

    pub fn finish(&self, totals: &BatchTotals, duration: Duration) {
        self.progress.finish();
        if self.json {
            JsonMessage::complete(totals, duration.as_secs_f64()).emit();
        } else {
            println!("{}", totals.format_summary());
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .into_owned()
}
