//! # Image Transcoding Module
//!
//! Questo modulo converte le immagini in AVIF o WebP delegando a tool esterni.
//!
//! ## Pipeline di conversione
//!
//! 1. **Header**: legge le dimensioni con il crate `image` (jpeg/png), formato
//!    riconosciuto dal contenuto e non dall'estensione; un header corrotto è
//!    un errore `Transcode` prima di lanciare qualsiasi processo
//! 2. **Resize**: riduce in modo che nessuna dimensione superi 4096 px,
//!    preservando l'aspect ratio e senza mai ingrandire
//! 3. **Encode**: profilo fisso del formato richiesto (vedi `EncodeProfile`)
//! 4. **Output**: estensione del formato *aggiunta* al nome sorgente
//!
//! ```text
//! Input:  /photos/IMG_001.jpg
//! Output: /photos/IMG_001.jpg.avif
//! ```
//!
//! ## Strategia Tool Selection (priorità decrescente)
//!
//! 1. **magick**: ImageMagick 7
//! 2. **convert**: ImageMagick 6
//! 3. **vips**: `vips thumbnail` con `--size down`
//!
//! Se un tool fallisce, il file parziale viene rimosso e si prova il successivo.

use crate::config::{EncodeProfile, TargetFormat};
use crate::error::{RecompressError, Result};
use crate::tool_args;
use crate::tool_resolver::ToolResolver;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, warn};

/// Neither output dimension exceeds this many pixels
pub const MAX_DIMENSION: u32 = 4096;

/// Tools tried in order of preference
const TOOL_CHAIN: &[&str] = &["magick", "convert", "vips"];

/// External image codec used by the conversion unit
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Write a resized, re-encoded copy of `source` to
    /// [`candidate_path`]`(source, format)` and return that path.
    ///
    /// The source file is never modified. Any failure is a
    /// [`RecompressError::Transcode`].
    async fn transcode(&self, source: &Path, format: TargetFormat) -> Result<PathBuf>;

    /// Fail early when no encoder for `format` is installed
    async fn check_available(&self, _format: TargetFormat) -> Result<()> {
        Ok(())
    }

    /// Name for logging
    fn name(&self) -> &str;
}

/// Output path for a converted image: the format extension is appended, not substituted
pub fn candidate_path(source: &Path, format: TargetFormat) -> PathBuf {
    let mut name = source.as_os_str().to_os_string();
    name.push(".");
    name.push(format.extension());
    PathBuf::from(name)
}

/// Largest size that fits inside `max` x `max` with the same aspect ratio, never upscaling
pub fn fit_within(width: u32, height: u32, max: u32) -> (u32, u32) {
    if width <= max && height <= max {
        return (width, height);
    }
    let (w, h, m) = (width as u64, height as u64, max as u64);
    if w >= h {
        (max, ((h * m + w / 2) / w).max(1) as u32)
    } else {
        (((w * m + h / 2) / h).max(1) as u32, max)
    }
}

/// Transcoder shelling out to ImageMagick or libvips
#[derive(Debug, Default, Clone)]
pub struct ToolTranscoder;

impl ToolTranscoder {
    pub fn new() -> Self {
        Self
    }

    /// Reads width and height from the image header.
    ///
    /// The decoder is picked from the file content, not the extension.
    async fn read_dimensions(source: &Path) -> Result<(u32, u32)> {
        let path = source.to_path_buf();
        tokio::task::spawn_blocking(move || -> image::ImageResult<(u32, u32)> {
            image::io::Reader::open(&path)?
                .with_guessed_format()?
                .into_dimensions()
        })
        .await
        .map_err(|e| RecompressError::transcode(source, format!("header task failed: {}", e)))?
        .map_err(|e| RecompressError::transcode(source, format!("unreadable image: {}", e)))
    }

    fn build_args(
        tool: &str,
        source: &Path,
        candidate: &Path,
        format: TargetFormat,
        needs_resize: bool,
    ) -> Vec<OsString> {
        let profile: EncodeProfile = format.profile();

        if tool == "vips" {
            let options = match format {
                TargetFormat::Avif => format!(
                    "[Q={},effort={},subsample-mode={},strip]",
                    profile.quality,
                    profile.effort,
                    if profile.full_chroma { "off" } else { "auto" }
                ),
                TargetFormat::Webp => format!(
                    "[Q={},effort={},smart-subsample={},strip]",
                    profile.quality, profile.effort, profile.smart_subsample
                ),
            };
            let mut output = candidate.as_os_str().to_os_string();
            output.push(options);
            let max = MAX_DIMENSION.to_string();
            return tool_args!["thumbnail", source, output, max, "--height", max, "--size", "down"];
        }

        let mut args = tool_args![source];
        if needs_resize {
            args.extend(tool_args!["-resize", format!("{0}x{0}>", MAX_DIMENSION)]);
        }
        args.extend(tool_args!["-strip", "-quality", profile.quality.to_string()]);
        match format {
            TargetFormat::Avif => {
                // heic:speed runs 0 (slowest) to 9
                let speed = 9u8.saturating_sub(profile.effort);
                args.extend(tool_args!["-define", format!("heic:speed={}", speed)]);
                if profile.full_chroma {
                    args.extend(tool_args!["-sampling-factor", "4:4:4"]);
                }
            }
            TargetFormat::Webp => {
                args.extend(tool_args!["-define", format!("webp:method={}", profile.effort)]);
                if profile.smart_subsample {
                    args.extend(tool_args!["-define", "webp:use-sharp-yuv=true"]);
                }
            }
        }

        let mut output = OsString::from(format.extension().to_uppercase());
        output.push(":");
        output.push(candidate.as_os_str());
        args.push(output);
        args
    }

    async fn discard_partial(candidate: &Path) {
        match tokio::fs::remove_file(candidate).await {
            Ok(()) => debug!("Removed partial output {}", candidate.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove partial output {}: {}", candidate.display(), e),
        }
    }
}

#[async_trait]
impl Transcoder for ToolTranscoder {
    async fn transcode(&self, source: &Path, format: TargetFormat) -> Result<PathBuf> {
        let (width, height) = Self::read_dimensions(source).await?;
        let (target_w, target_h) = fit_within(width, height, MAX_DIMENSION);
        let needs_resize = (target_w, target_h) != (width, height);
        if needs_resize {
            debug!(
                "Downsizing {} from {}x{} to {}x{}",
                source.display(),
                width,
                height,
                target_w,
                target_h
            );
        }

        let candidate = candidate_path(source, format);
        let resolver = ToolResolver::instance();
        let mut failures = Vec::new();

        for tool in TOOL_CHAIN {
            let Some(tool_path) = resolver.resolve(tool) else {
                continue;
            };
            let args = Self::build_args(tool, source, &candidate, format, needs_resize);
            debug!("Running {} {:?}", tool, args);

            let start_time = std::time::Instant::now();
            let result = Command::new(&tool_path).args(&args).output().await;
            let elapsed = start_time.elapsed();

            match result {
                Ok(output) if output.status.success() && candidate.is_file() => {
                    debug!("{} encoded with {} in {:?}", candidate.display(), tool, elapsed);
                    return Ok(candidate);
                }
                Ok(output) => {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    warn!(
                        "{} failed on {} after {:?} ({}), trying next tool",
                        tool,
                        source.display(),
                        elapsed,
                        output.status
                    );
                    failures.push(format!("{}: {}", tool, stderr.trim()));
                }
                Err(e) => {
                    warn!("Could not launch {}: {}", tool, e);
                    failures.push(format!("{}: {}", tool, e));
                }
            }
            Self::discard_partial(&candidate).await;
        }

        let reason = if failures.is_empty() {
            format!("no transcoding tool available ({})", TOOL_CHAIN.join("/"))
        } else {
            failures.join("; ")
        };
        Err(RecompressError::transcode(source, reason))
    }

    async fn check_available(&self, format: TargetFormat) -> Result<()> {
        let resolver = ToolResolver::instance();
        if TOOL_CHAIN.iter().any(|tool| resolver.is_available(tool)) {
            return Ok(());
        }
        Err(RecompressError::MissingDependency(format!(
            "No {} encoder available. Please install one of: {}\n{}",
            format,
            TOOL_CHAIN.join(", "),
            resolver.report(TOOL_CHAIN)
        )))
    }

    fn name(&self) -> &str {
        "imagemagick/vips"
    }
}
