//! Output types: per-figure results, document scans, and conversion
//! statistics.
//!
//! Everything here derives `Serialize`/`Deserialize` so the CLI's `--json`
//! mode and any host application can persist a run's outcome verbatim.

use crate::error::{FigureError, Latex2DocxError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Outcome of one figure's compile-and-rasterise attempt.
///
/// Always produced, success or failure — a failed figure carries its
/// [`FigureError`] here instead of aborting the conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FigureResult {
    /// 1-indexed position in document order.
    pub ordinal: usize,
    /// Correlated name (label or synthesized `figure-NN`).
    pub identifier: String,
    /// Path of the rendered PNG; `None` when the figure failed.
    pub asset_path: Option<PathBuf>,
    /// Wall-clock time spent compiling and rasterising this figure.
    pub duration_ms: u64,
    /// The failure, if any.
    pub error: Option<FigureError>,
}

impl FigureResult {
    /// Whether the PNG was produced.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Non-destructive scan of a document, as returned by [`crate::inspect`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentScan {
    /// `\documentclass` argument, when present.
    pub documentclass: Option<String>,
    /// `\title` argument, when present.
    pub title: Option<String>,
    /// `\author` argument, when present.
    pub author: Option<String>,
    /// Number of tikzpicture bodies found.
    pub figures: usize,
    /// `fig:` label names in document order, duplicates included.
    pub labels: Vec<String>,
    /// The identifier each figure ordinal resolves to.
    pub identifiers: Vec<String>,
    /// Rewritable `\ab` macro instances.
    pub delimiter_macros: usize,
}

/// Aggregate statistics for one conversion run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Figure bodies detected in the document.
    pub figures_detected: usize,
    /// `fig:` labels detected.
    pub labels_detected: usize,
    /// Figures whose PNG was produced.
    pub figures_compiled: usize,
    /// Figures that failed to compile or rasterise.
    pub figures_failed: usize,
    /// Figure bodies replaced by image references.
    pub replacements: usize,
    /// Passes the delimiter rewriter performed.
    pub rewrite_passes: u32,
    /// `\ab` instances rewritten.
    pub macros_rewritten: usize,
    /// Time spent compiling and rasterising figures.
    pub compile_duration_ms: u64,
    /// Time spent inside pandoc.
    pub export_duration_ms: u64,
    /// End-to-end wall-clock time.
    pub total_duration_ms: u64,
    /// Size of the produced DOCX.
    pub output_bytes: u64,
}

/// Everything a conversion run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    /// Where the DOCX was written.
    pub output_path: PathBuf,
    /// The final LaTeX text handed to pandoc, with figure bodies replaced
    /// by image references. Useful for debugging a bad export without
    /// re-running the pipeline.
    pub document: String,
    /// Pre-conversion view of the document.
    pub scan: DocumentScan,
    /// Per-figure outcomes, in document order.
    pub figures: Vec<FigureResult>,
    /// Aggregate statistics.
    pub stats: ConversionStats,
}

impl ConversionOutput {
    /// Strict view: treat any figure failure as an error.
    ///
    /// The default contract is lenient — the DOCX exports even when figures
    /// fail, with their references left dangling. Callers that would rather
    /// reject such an output call this and get
    /// [`Latex2DocxError::PartialFailure`].
    pub fn into_result(self) -> Result<Self, Latex2DocxError> {
        if self.stats.figures_failed > 0 {
            return Err(Latex2DocxError::PartialFailure {
                success: self.stats.figures_compiled,
                failed: self.stats.figures_failed,
                total: self.stats.figures_detected,
            });
        }
        Ok(self)
    }
}
