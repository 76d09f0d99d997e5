//! Error types for the latex2docx library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Latex2DocxError`] — **Fatal**: the conversion cannot proceed at all
//!   (missing input file, pandoc not installed, pandoc export failure).
//!   Returned as `Err(Latex2DocxError)` from the top-level `convert*`
//!   functions.
//!
//! * [`FigureError`] — **Non-fatal**: a single figure failed to compile or
//!   rasterise but the rest of the document is fine. The asset reference
//!   stays in the exported text (pandoc degrades to a missing image) and
//!   the error is stored inside [`crate::output::FigureResult`] so callers
//!   can inspect partial success.
//!
//! The separation lets callers decide their own tolerance: treat any figure
//! failure as fatal via [`crate::output::ConversionOutput::into_result`],
//! or log and ship the document anyway.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the latex2docx library.
///
/// Figure-level failures use [`FigureError`] and are stored in
/// [`crate::output::FigureResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum Latex2DocxError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("LaTeX file not found: '{path}'\nCheck the path exists and is readable.")]
    InputNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists but is not UTF-8 text.
    #[error("File is not valid UTF-8 text: '{path}'\nIs this actually a .tex source file?")]
    InputNotUtf8 { path: PathBuf },

    // ── Workspace / I/O errors ────────────────────────────────────────────
    /// Could not create or reset a figure working directory.
    #[error("Failed to prepare working directory '{path}': {source}")]
    WorkspaceFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not write an intermediate or output file.
    #[error("Failed to write '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── External tool errors ──────────────────────────────────────────────
    /// A required external binary is not on PATH.
    #[error("Required tool '{tool}' was not found on PATH.\n{hint}")]
    ToolNotFound { tool: String, hint: String },

    /// pandoc ran but the DOCX was not produced.
    #[error("DOCX export failed: {detail}\nFull pandoc output: {log}")]
    ExportFailed { detail: String, log: PathBuf },

    // ── Aggregate figure errors ───────────────────────────────────────────
    /// Some figures compiled but at least one failed.
    ///
    /// Returned by [`crate::output::ConversionOutput::into_result`] when
    /// the caller wants to treat any figure failure as an error.
    #[error("{failed}/{total} figures failed to render")]
    PartialFailure {
        success: usize,
        failed: usize,
        total: usize,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single figure.
///
/// Stored alongside [`crate::output::FigureResult`] when a figure fails.
/// The overall conversion always continues; the document exports with the
/// image reference in place.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum FigureError {
    /// Writing the standalone unit file failed.
    #[error("Figure '{identifier}': writing unit file failed: {detail}")]
    WriteFailed { identifier: String, detail: String },

    /// The LaTeX engine did not produce a PDF for the unit.
    #[error("Figure '{identifier}': LaTeX compilation failed: {detail}")]
    CompileFailed { identifier: String, detail: String },

    /// ImageMagick did not produce the PNG.
    #[error("Figure '{identifier}': rasterisation failed: {detail}")]
    RasterizeFailed { identifier: String, detail: String },

    /// An external tool exceeded the configured timeout.
    #[error("Figure '{identifier}': {tool} timed out after {secs}s")]
    Timeout {
        identifier: String,
        tool: String,
        secs: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_failure_display() {
        let e = Latex2DocxError::PartialFailure {
            success: 6,
            failed: 1,
            total: 7,
        };
        let msg = e.to_string();
        assert!(msg.contains("1/7"), "got: {msg}");
    }

    #[test]
    fn input_not_found_display() {
        let e = Latex2DocxError::InputNotFound {
            path: PathBuf::from("thesis.tex"),
        };
        assert!(e.to_string().contains("thesis.tex"));
    }

    #[test]
    fn tool_not_found_display() {
        let e = Latex2DocxError::ToolNotFound {
            tool: "pandoc".into(),
            hint: "Install it from https://pandoc.org".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("pandoc"));
        assert!(msg.contains("pandoc.org"));
    }

    #[test]
    fn compile_failed_display() {
        let e = FigureError::CompileFailed {
            identifier: "circle".into(),
            detail: "Undefined control sequence".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("circle"));
        assert!(msg.contains("Undefined control sequence"));
    }

    #[test]
    fn timeout_display() {
        let e = FigureError::Timeout {
            identifier: "figure-02".into(),
            tool: "pdflatex".into(),
            secs: 300,
        };
        let msg = e.to_string();
        assert!(msg.contains("figure-02"));
        assert!(msg.contains("300s"));
    }
}
