//! Conversion entry points.
//!
//! ## Pipeline
//!
//! Seven stages run in order: read, correlate figures, pre-process,
//! compile figures, substitute references, export, clean up. Figure
//! compilation is the only concurrent stage and the only one allowed to
//! fail partially — a broken figure costs its PNG, not the document.
//! Identifiers are derived once from the original text and handed to both
//! the extraction and the substitution side, so the two always agree on
//! which figure gets which name.

use crate::config::ConversionConfig;
use crate::error::Latex2DocxError;
use crate::output::{ConversionOutput, ConversionStats, DocumentScan, FigureResult};
use crate::pipeline::{compile, export, figures, input, preprocess};
use crate::progress::{NoopProgressCallback, ProgressCallback};
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

const ENGINE_HINT: &str =
    "Install TeX Live (https://tug.org/texlive/) or name another engine via `latex_engine`.";
const IMAGEMAGICK_HINT: &str =
    "Install ImageMagick (https://imagemagick.org/) so figure PDFs can be rasterised.";
const PANDOC_HINT: &str =
    "Install pandoc (https://pandoc.org/installing.html) to produce DOCX output.";

/// Convert a LaTeX document to DOCX.
///
/// This is the primary entry point for the library. The output lands beside
/// the input as `output_<YYYYMMDD>.docx`; use [`convert_to_file`] to name
/// the destination instead.
///
/// # Returns
/// `Ok(ConversionOutput)` on success, even if some figures failed to render
/// (check `output.stats.figures_failed`, or tighten the contract with
/// [`ConversionOutput::into_result`]).
///
/// # Errors
/// Returns `Err(Latex2DocxError)` only for fatal errors:
/// - Input missing, unreadable, or not UTF-8
/// - A required external tool not installed
/// - pandoc failing to produce the DOCX
pub async fn convert(
    input_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Latex2DocxError> {
    convert_to(input_path.as_ref(), None, config).await
}

/// Convert a LaTeX document to DOCX at an explicit output path.
pub async fn convert_to_file(
    input_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionStats, Latex2DocxError> {
    let output = convert_to(input_path.as_ref(), Some(output_path.as_ref()), config).await?;
    Ok(output.stats)
}

/// Convert in-memory LaTeX source to DOCX.
///
/// The source is staged through a managed [`tempfile`] directory, so the
/// caller never sees the intermediate `.tex` files. This is the recommended
/// API when the document comes from a database or an editor buffer rather
/// than a file on disk.
///
/// # Example
/// ```rust,no_run
/// use latex2docx::{convert_source, ConversionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let source = std::fs::read_to_string("paper.tex")?;
/// let config = ConversionConfig::default();
/// let output = convert_source(&source, "paper.docx", &config).await?;
/// println!("{} bytes", output.stats.output_bytes);
/// # Ok(())
/// # }
/// ```
pub async fn convert_source(
    source: &str,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Latex2DocxError> {
    let staging =
        tempfile::tempdir().map_err(|e| Latex2DocxError::Internal(format!("tempdir: {e}")))?;
    let input_path = staging.path().join("document.tex");
    tokio::fs::write(&input_path, source)
        .await
        .map_err(|e| Latex2DocxError::Internal(format!("staging write: {e}")))?;

    // A relative output path is anchored to the caller's working directory
    // inside convert_to, not to the staging directory that vanishes when
    // `staging` drops on return.
    convert_to(&input_path, Some(output_path.as_ref()), config).await
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Latex2DocxError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Latex2DocxError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(convert(input_path, config))
}

/// Scan a document without converting it.
///
/// Reports figure and label counts, the correlated identifier list, and
/// `\ab` macro usage. Requires none of the external tools.
pub async fn inspect(input_path: impl AsRef<Path>) -> Result<DocumentScan, Latex2DocxError> {
    let doc = input::read_document(input_path.as_ref()).await?;
    Ok(input::scan_document(&doc.text))
}

/// Remove everything a previous conversion left in `dir`: the build and
/// asset directories, intermediate `.tex` files, produced `.docx` files and
/// the pandoc transcript. Returns the paths that were removed.
pub async fn clean_artifacts(
    dir: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<Vec<PathBuf>, Latex2DocxError> {
    let dir = dir.as_ref();
    let mut removed = Vec::new();

    for sub in [&config.build_dir, &config.asset_dir] {
        let path = dir.join(sub);
        if path.is_dir() {
            tokio::fs::remove_dir_all(&path)
                .await
                .map_err(|e| Latex2DocxError::WorkspaceFailed {
                    path: path.clone(),
                    source: e,
                })?;
            removed.push(path);
        }
    }

    let mut entries =
        tokio::fs::read_dir(dir)
            .await
            .map_err(|e| Latex2DocxError::WorkspaceFailed {
                path: dir.to_path_buf(),
                source: e,
            })?;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| Latex2DocxError::WorkspaceFailed {
            path: dir.to_path_buf(),
            source: e,
        })?
    {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if is_intermediate(name) {
            tokio::fs::remove_file(&path)
                .await
                .map_err(|e| Latex2DocxError::WorkspaceFailed {
                    path: path.clone(),
                    source: e,
                })?;
            removed.push(path);
        }
    }

    info!("Removed {} artifacts from {}", removed.len(), dir.display());
    Ok(removed)
}

/// Files the pipeline leaves beside the input.
fn is_intermediate(name: &str) -> bool {
    name.ends_with("_pandoc.tex")
        || name.ends_with("_with_images.tex")
        || name.ends_with(".docx")
        || name == export::PANDOC_LOG
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn convert_to(
    input_path: &Path,
    output_path: Option<&Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Latex2DocxError> {
    let total_start = Instant::now();
    info!("Starting conversion: {}", input_path.display());
    let progress: ProgressCallback = config
        .progress_callback
        .clone()
        .unwrap_or_else(|| Arc::new(NoopProgressCallback));

    // ── Step 1: Read and scan the source ─────────────────────────────────
    let doc = input::read_document(input_path).await?;
    let scan = input::scan_document(&doc.text);
    info!(
        "Document has {} figures, {} labels, {} \\ab macros",
        scan.figures,
        scan.labels.len(),
        scan.delimiter_macros
    );

    // ── Step 2: Correlate figures ────────────────────────────────────────
    // Identifiers and units both come from the original text, before any
    // rewriting, so extraction and substitution agree on ordinals.
    let identifiers = figures::derive_identifiers(&doc.text);
    let units = figures::extract_figures(&doc.text, &identifiers);
    progress.on_conversion_start(units.len());

    // ── Step 3: Pre-process ──────────────────────────────────────────────
    let pre = preprocess::preprocess_document(&doc.text);
    if !pre.reached_fixed_point {
        warn!("Delimiter rewriting hit its pass budget; some \\ab macros may remain");
    }
    // The engine, ImageMagick and pandoc each run from their own working
    // directory, so every path handed to them must be absolute.
    let parent: PathBuf = if doc.parent().is_absolute() {
        doc.parent().to_path_buf()
    } else {
        let cwd = std::env::current_dir()
            .map_err(|e| Latex2DocxError::Internal(format!("cwd: {e}")))?;
        cwd.join(doc.parent()).components().collect()
    };
    let pandoc_tex = parent.join(format!("{}_pandoc.tex", doc.stem()));
    write_intermediate(&pandoc_tex, &pre.text).await?;

    // ── Step 4: Compile figures ──────────────────────────────────────────
    let compile_start = Instant::now();
    let mut figure_results = if units.is_empty() {
        Vec::new()
    } else {
        compile::ensure_tool(&config.latex_engine, ENGINE_HINT).await?;
        compile::ensure_tool(compile::IMAGEMAGICK, IMAGEMAGICK_HINT).await?;
        let workspace = compile::prepare_workspace(&parent, config).await?;
        compile_all(&units, &workspace, config, &progress).await
    };
    // buffer_unordered yields in completion order
    figure_results.sort_by_key(|r| r.ordinal);
    let compile_duration_ms = compile_start.elapsed().as_millis() as u64;
    let compiled = figure_results.iter().filter(|r| r.is_success()).count();
    if !units.is_empty() {
        info!(
            "Compiled {}/{} figures in {}ms",
            compiled,
            units.len(),
            compile_duration_ms
        );
    }

    // ── Step 5: Substitute figure references ─────────────────────────────
    let (substituted, replacements) = figures::substitute_figures(
        &pre.text,
        &identifiers,
        &config.asset_dir,
        config.image_width,
    );
    let images_tex = parent.join(format!("{}_with_images.tex", doc.stem()));
    write_intermediate(&images_tex, &substituted).await?;

    // ── Step 6: Export ───────────────────────────────────────────────────
    compile::ensure_tool("pandoc", PANDOC_HINT).await?;
    let output_file = match output_path {
        Some(path) if path.is_absolute() => path.to_path_buf(),
        Some(path) => std::env::current_dir()
            .map_err(|e| Latex2DocxError::Internal(format!("cwd: {e}")))?
            .join(path),
        None => default_output_path(&parent),
    };
    let export_start = Instant::now();
    let output_bytes = export::export_docx(&images_tex, &output_file, &parent, config).await?;
    let export_duration_ms = export_start.elapsed().as_millis() as u64;
    info!(
        "Wrote {} ({} bytes) in {}ms",
        output_file.display(),
        output_bytes,
        export_duration_ms
    );

    // ── Step 7: Stats and cleanup ────────────────────────────────────────
    if config.clean_intermediates {
        remove_intermediates(&parent, &pandoc_tex, &images_tex, config).await;
    }

    let stats = ConversionStats {
        figures_detected: units.len(),
        labels_detected: identifiers.len(),
        figures_compiled: compiled,
        figures_failed: figure_results.len() - compiled,
        replacements,
        rewrite_passes: pre.rewrite_passes,
        macros_rewritten: pre.macros_rewritten,
        compile_duration_ms,
        export_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        output_bytes,
    };

    info!(
        "Conversion complete: {}/{} figures, {}ms total",
        compiled,
        units.len(),
        stats.total_duration_ms
    );
    progress.on_conversion_complete(units.len(), compiled);

    Ok(ConversionOutput {
        output_path: output_file,
        document: substituted,
        scan,
        figures: figure_results,
        stats,
    })
}

/// Compile every unit with bounded concurrency, firing per-figure progress
/// events around each worker.
async fn compile_all(
    units: &[figures::FigureUnit],
    workspace: &compile::FigureWorkspace,
    config: &ConversionConfig,
    progress: &ProgressCallback,
) -> Vec<FigureResult> {
    let total = units.len();
    stream::iter(units.iter().map(|unit| {
        let progress = Arc::clone(progress);
        async move {
            progress.on_figure_start(unit.ordinal, total);
            let result = compile::compile_figure(unit, workspace, config).await;
            match &result.error {
                None => progress.on_figure_complete(unit.ordinal, total, &result.identifier),
                Some(e) => progress.on_figure_error(unit.ordinal, total, &e.to_string()),
            }
            result
        }
    }))
    .buffer_unordered(config.concurrency)
    .collect()
    .await
}

/// Best-effort removal of the working directories, staged `.tex` files and
/// the pandoc transcript after a successful export. The source and the DOCX
/// are never touched; removal failures are logged, not raised.
async fn remove_intermediates(
    parent: &Path,
    pandoc_tex: &Path,
    images_tex: &Path,
    config: &ConversionConfig,
) {
    debug!("Removing intermediates from {}", parent.display());
    for sub in [&config.build_dir, &config.asset_dir] {
        let path = parent.join(sub);
        if !path.is_dir() {
            continue;
        }
        if let Err(e) = tokio::fs::remove_dir_all(&path).await {
            warn!("Could not remove {}: {}", path.display(), e);
        }
    }
    let log = parent.join(export::PANDOC_LOG);
    for path in [pandoc_tex, images_tex, log.as_path()] {
        if !path.exists() {
            continue;
        }
        if let Err(e) = tokio::fs::remove_file(path).await {
            warn!("Could not remove {}: {}", path.display(), e);
        }
    }
}

async fn write_intermediate(path: &Path, text: &str) -> Result<(), Latex2DocxError> {
    debug!("Writing {}", path.display());
    tokio::fs::write(path, text)
        .await
        .map_err(|e| Latex2DocxError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })
}

/// Default output path when the caller does not name one:
/// `output_<YYYYMMDD>.docx` beside the input.
fn default_output_path(parent: &Path) -> PathBuf {
    let stamp = chrono::Local::now().format("%Y%m%d");
    parent.join(format!("output_{stamp}.docx"))
}
