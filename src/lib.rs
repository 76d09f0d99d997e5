//! # latex2docx
//!
//! Convert LaTeX documents with TikZ figures to Word (DOCX) via pandoc.
//!
//! ## Why this crate?
//!
//! Pandoc alone handles most of LaTeX, but real manuscripts lean on two
//! things it cannot digest: the `physics2` package's `\ab(...)` automatic
//! delimiters, and `tikzpicture` environments, which have no DOCX
//! equivalent at all. This crate rewrites the former into plain
//! `\left`/`\right` pairs and compiles the latter into PNGs the document
//! then references, so the handoff to pandoc is clean.
//!
//! ## Pipeline Overview
//!
//! ```text
//! LaTeX
//!  │
//!  ├─ 1. Input       read the source, scan figures and labels
//!  ├─ 2. Correlate   pair tikzpicture environments with fig: labels
//!  ├─ 3. Preprocess  \ab(…) → \left(…\right); simplify the preamble
//!  ├─ 4. Compile     pdflatex + ImageMagick per figure (concurrent)
//!  ├─ 5. Substitute  tikzpicture → \includegraphics references
//!  └─ 6. Export      pandoc → .docx + per-figure stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use latex2docx::{convert, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::default();
//!     let output = convert("paper.tex", &config).await?;
//!     println!("{}", output.output_path.display());
//!     eprintln!("figures: {}/{} rendered",
//!         output.stats.figures_compiled,
//!         output.stats.figures_detected);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `latex2docx` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! latex2docx = { version = "0.2", default-features = false }
//! ```
//!
//! ## External Tools
//!
//! | Tool | Used for |
//! |------|----------|
//! | `pdflatex` (or any engine named in the config) | compiling extracted figure units |
//! | `convert` (ImageMagick) | rasterising figure PDFs to PNG |
//! | `pandoc` | the final DOCX export |
//!
//! Each tool is probed with `--version` before use; a missing one fails
//! fast with an install hint instead of after minutes of compilation.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder};
pub use convert::{
    clean_artifacts, convert, convert_source, convert_sync, convert_to_file, inspect,
};
pub use error::{FigureError, Latex2DocxError};
pub use output::{ConversionOutput, ConversionStats, DocumentScan, FigureResult};
pub use pipeline::figures::{
    derive_identifiers, extract_figures, identifier_for, substitute_figures, FigureUnit,
};
pub use pipeline::preprocess::{
    count_ab_macros, preprocess_document, rewrite_ab_delimiters, DelimiterShape,
    PreprocessedDocument, RewriteOutcome,
};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
