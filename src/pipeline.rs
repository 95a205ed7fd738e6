//! # Pipeline Controller Module
//!
//! Orchestratore principale: dal target path ai totali finali.
//!
//! ## Stati:
//! `Resolving → Extracting (opzionale) → Walking → Converting → Finalizing`
//!
//! 1. **Resolving**: stat del target; file = archivio, directory = immagini
//! 2. **Extracting**: estrazione idempotente dell'archivio
//! 3. **Walking**: elenco ricorsivo e filtro per estensione
//! 4. **Converting**: un task per file, ammissione limitata da un semaforo con
//!    `concurrency` permessi; si attende la fine di tutti i task
//! 5. **Finalizing**: riepilogo e rimozione opzionale dell'archivio
//!
//! Un errore nei primi tre stati interrompe il run prima di qualsiasi
//! conversione. Gli errori per singolo file vengono contati e loggati
//! senza fermare il batch.
//!
//! ## Gestione concorrenza:
//! I task restituiscono un `ConversionOutcome`; solo il controller accumula
//! i totali, nell'ordine di completamento.

use crate::config::Config;
use crate::conversion::{ConversionOutcome, ConversionUnit};
use crate::error::{RecompressError, Result};
use crate::extractor::Extractor;
use crate::file_manager::FileManager;
use crate::progress::{BatchTotals, Reporter};
use crate::transcoder::{ToolTranscoder, Transcoder};
use futures::stream::{FuturesUnordered, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, info};

/// Pipeline state, logged on entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Resolving,
    Extracting,
    Walking,
    Converting,
    Finalizing,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Resolving => "resolving",
            Self::Extracting => "extracting",
            Self::Walking => "walking",
            Self::Converting => "converting",
            Self::Finalizing => "finalizing",
        };
        f.write_str(name)
    }
}

/// What the target path turned out to be
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputKind {
    Archive(PathBuf),
    Directory(PathBuf),
}

/// Result of a completed run
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub totals: BatchTotals,
    /// Directory that was walked
    pub images_root: PathBuf,
    pub archive_removed: bool,
}

/// Drives one recompression job end to end
pub struct Pipeline {
    config: Config,
    extractor: Extractor,
    transcoder: Arc<dyn Transcoder>,
}

impl Pipeline {
    pub fn new(config: Config, extractor: Extractor, transcoder: Arc<dyn Transcoder>) -> Self {
        Self {
            config,
            extractor,
            transcoder,
        }
    }

    /// Pipeline backed by `unar` and ImageMagick/libvips
    pub fn with_system_tools(config: Config) -> Self {
        Self::new(config, Extractor::unar(), Arc::new(ToolTranscoder::new()))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run every stage and return the batch totals
    pub async fn process(&self) -> Result<BatchReport> {
        let start_time = Instant::now();
        self.config.validate()?;

        Self::enter(Stage::Resolving);
        let input = self.resolve_input().await?;
        self.transcoder.check_available(self.config.format).await?;

        let images_root = match input {
            InputKind::Archive(ref archive) => {
                Self::enter(Stage::Extracting);
                self.extractor
                    .extract(archive, &self.config.extraction_parent())
                    .await?
            }
            InputKind::Directory(ref dir) => dir.clone(),
        };
        let images_root = tokio::fs::canonicalize(&images_root).await.map_err(|e| {
            RecompressError::Input(format!("Cannot resolve {}: {}", images_root.display(), e))
        })?;
        info!("Processing directory: {}", images_root.display());

        Self::enter(Stage::Walking);
        let files = Self::eligible_files(&images_root)?;

        Self::enter(Stage::Converting);
        let reporter = Reporter::new(files.len(), self.config.json_output);
        reporter.start(&self.config, &images_root, files.len());
        let totals = self.convert_all(files, &reporter).await;

        Self::enter(Stage::Finalizing);
        reporter.finish(&totals, start_time.elapsed());
        info!(
            "Decided {} files ({} converted, {} kept original), {} failed, {} cleanup failures: {}",
            totals.files_decided(),
            totals.converted,
            totals.kept_original,
            totals.failed,
            totals.cleanup_failures,
            totals.format_summary()
        );

        let archive_removed = self.remove_archive_if_requested(&input).await?;

        Ok(BatchReport {
            totals,
            images_root,
            archive_removed,
        })
    }

    fn enter(stage: Stage) {
        debug!("Entering stage: {}", stage);
    }

    /// Classify the target path as archive or image directory
    pub async fn resolve_input(&self) -> Result<InputKind> {
        let target = &self.config.target_path;
        let metadata = tokio::fs::metadata(target).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RecompressError::Input(format!("Target path does not exist: {}", target.display()))
            } else {
                RecompressError::Input(format!("Cannot stat {}: {}", target.display(), e))
            }
        })?;

        if metadata.is_file() {
            Ok(InputKind::Archive(target.clone()))
        } else if metadata.is_dir() {
            Ok(InputKind::Directory(target.clone()))
        } else {
            Err(RecompressError::Input(format!(
                "Target path is neither a file nor a directory: {}",
                target.display()
            )))
        }
    }

    /// Walk `root` and keep only the convertible images
    fn eligible_files(root: &Path) -> Result<Vec<PathBuf>> {
        let (eligible, ignored): (Vec<_>, Vec<_>) = FileManager::list_files(root)?
            .into_iter()
            .partition(|path| FileManager::is_convertible(path));

        for path in &ignored {
            debug!("Ignoring {}", path.display());
        }
        info!(
            "Found {} images to convert ({} other files ignored)",
            eligible.len(),
            ignored.len()
        );
        Ok(eligible)
    }

    /// Run one conversion task per file, at most `concurrency` at a time.
    ///
    /// Returns once every task has settled.
    async fn convert_all(&self, files: Vec<PathBuf>, reporter: &Reporter) -> BatchTotals {
        let semaphore = Arc::new(Semaphore::new(self.config.effective_concurrency()));
        let unit = ConversionUnit::new(self.transcoder.clone(), self.config.format);

        let mut pending: FuturesUnordered<_> = files
            .into_iter()
            .map(|path| {
                let semaphore = semaphore.clone();
                let unit = unit.clone();
                let task_path = path.clone();
                let handle = tokio::spawn(async move {
                    // Held until the unit settles, success or failure
                    let _permit = semaphore.acquire_owned().await.map_err(|e| {
                        RecompressError::transcode(&task_path, format!("no conversion slot: {}", e))
                    })?;
                    unit.convert_one(&task_path).await
                });
                async move { (path, handle.await) }
            })
            .collect();

        let mut totals = BatchTotals::new();
        while let Some((path, joined)) = pending.next().await {
            let result: Result<ConversionOutcome> = joined.unwrap_or_else(|e| {
                Err(RecompressError::transcode(
                    &path,
                    format!("conversion task aborted: {}", e),
                ))
            });
            match result {
                Ok(outcome) => {
                    totals.fold(&outcome);
                    reporter.file_done(&outcome);
                }
                Err(err) => {
                    totals.record_failure(&err);
                    reporter.file_failed(&path, &err);
                }
            }
        }
        totals
    }

    /// Delete the archive after conversion settled; a directory target has nothing to remove
    async fn remove_archive_if_requested(&self, input: &InputKind) -> Result<bool> {
        if !self.config.remove_archive {
            return Ok(false);
        }
        match input {
            InputKind::Archive(archive) => {
                FileManager::remove(archive).await?;
                info!("Removed archive {}", archive.display());
                Ok(true)
            }
            InputKind::Directory(dir) => {
                debug!("{} is a directory, no archive to remove", dir.display());
                Ok(false)
            }
        }
    }
}
