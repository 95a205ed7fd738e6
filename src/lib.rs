//! # Space Image Recompressor Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare dell'applicazione
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per i test di integrazione
//!
//! ## Architettura dei moduli:
//! - `config`: Configurazione del job, formato di destinazione e profili di encoding
//! - `error`: Tipi di errore, fatali e per singolo file
//! - `file_manager`: Traversata ricorsiva, filtro estensioni, stat e rimozione
//! - `tool_resolver`: Ricerca dei tool esterni (`unar`, `magick`, `vips`)
//! - `extractor`: Estrazione idempotente dell'archivio
//! - `transcoder`: Conversione AVIF/WebP con ridimensionamento a 4096 px
//! - `conversion`: Decisione "tieni il più piccolo" per un singolo file
//! - `progress`: Totali aggregati, progress bar e output testuale
//! - `json_output`: Eventi JSON line-delimited
//! - `pipeline`: Orchestratore con concorrenza limitata
//!
//! ## Utilizzo:
//! ```ignore
//! use space_image_recompressor::{Config, Pipeline};
//!
//! let config = Config::new("photos.zip");
//! let report = Pipeline::with_system_tools(config).process().await?;
//! println!("{}", report.totals.format_summary());
//! ```

pub mod config;
pub mod conversion;
pub mod error;
pub mod extractor;
pub mod file_manager;
pub mod json_output;
pub mod pipeline;
pub mod progress;
pub mod tool_resolver;
pub mod transcoder;
pub mod utils;

pub use config::{Config, EncodeProfile, TargetFormat};
pub use conversion::{decide, ConversionOutcome, ConversionUnit, Kept};
pub use error::{RecompressError, Result};
pub use extractor::{Extractor, UnarUnpacker, Unpacker};
pub use pipeline::{BatchReport, Pipeline};
pub use progress::BatchTotals;
pub use transcoder::{candidate_path, ToolTranscoder, Transcoder};
