//! Pipeline stages for LaTeX-to-DOCX conversion.
//!
//! Each submodule implements exactly one transformation step.
//! Keeping stages separate makes each independently testable and lets us
//! swap implementations (e.g. switch the LaTeX engine) without touching
//! other stages.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ preprocess ──▶ figures ──▶ compile ──▶ export
//! (path)   (\ab rewrite)  (extract/    (pdflatex    (pandoc)
//!                          substitute)  + magick)
//! ```
//!
//! 1. [`input`]      — read the source file and scan its structure
//! 2. [`preprocess`] — rewrite `\ab` delimiters to `\left`/`\right` pairs and
//!    strip pandoc-hostile preamble constructs
//! 3. [`figures`]    — correlate tikzpicture environments with `fig:` labels,
//!    extract standalone units, substitute image references
//! 4. [`compile`]    — compile and rasterise each unit; runs external tools,
//!    one child process per step
//! 5. [`export`]     — hand the substituted document to pandoc for DOCX

pub mod compile;
pub mod export;
pub mod figures;
pub mod input;
pub mod preprocess;
