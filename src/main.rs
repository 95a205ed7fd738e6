//! # Space Image Recompressor - Main Entry Point
//!
//! Questo è il punto di ingresso principale dell'applicazione.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del sistema di logging con `tracing` (su stderr)
//! - Creazione della directory di output se richiesta
//! - Creazione della configurazione e avvio della pipeline
//!
//! ## Flusso di esecuzione:
//! 1. Parsa gli argomenti CLI (target, formato, outdir, threads, etc.)
//! 2. Configura il logging (`RUST_LOG`, oppure INFO/DEBUG a seconda di `--verbose`)
//! 3. Crea un oggetto Config con tutti i parametri
//! 4. Avvia la pipeline e stampa il riepilogo
//!
//! Exit code diverso da zero per errori fatali e per file perdenti non
//! rimovibili; i file non convertibili vengono solo saltati.
//!
//! ## Esempio di utilizzo:
//! ```bash
//! image-recompressor photos.zip --format webp --outdir /scratch --threads 8 --removeArchive
//! ```

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use space_image_recompressor::json_output::JsonMessage;
use space_image_recompressor::{Config, Pipeline, TargetFormat};

#[derive(Parser)]
#[command(name = "image-recompressor")]
#[command(about = "Unpack an image archive and recompress its JPEG/PNG images to AVIF or WebP")]
struct Args {
    /// Archive file or directory of images
    target_path: PathBuf,

    /// Delete the archive after all images have been processed
    #[arg(short = 'r', long = "removeArchive", alias = "remove-archive")]
    remove_archive: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = TargetFormat::Avif)]
    format: TargetFormat,

    /// Directory to extract the archive into (default: next to the archive)
    #[arg(short, long)]
    outdir: Option<PathBuf>,

    /// Number of images converted concurrently
    #[arg(short, long, default_value = "1")]
    threads: usize,

    /// Output progress and results as JSON lines
    #[arg(long)]
    json: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // stdout is reserved for the per-file lines and JSON events
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(args: Args) -> Result<()> {
    if let Some(ref output_dir) = args.outdir {
        if !output_dir.exists() {
            tokio::fs::create_dir_all(output_dir)
                .await
                .with_context(|| format!("Cannot create output directory {}", output_dir.display()))?;
            info!("Created output directory: {}", output_dir.display());
        }
    }

    let config = Config {
        remove_archive: args.remove_archive,
        format: args.format,
        output_directory: args.outdir,
        target_path: args.target_path,
        concurrency: args.threads,
        json_output: args.json,
    };

    let report = Pipeline::with_system_tools(config).process().await?;

    if report.totals.cleanup_failures > 0 {
        bail!(
            "{} file(s) could not be cleaned up; both original and converted copies may remain",
            report.totals.cleanup_failures
        );
    }
    if report.totals.failed > 0 {
        info!("{} image(s) could not be converted and were left untouched", report.totals.failed);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);
    let json = args.json;

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if json {
                JsonMessage::error(format!("{:#}", e)).emit();
            } else {
                error!("{:#}", e);
            }
            ExitCode::FAILURE
        }
    }
}
