//! Progress-callback trait for per-figure conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! real-time events as the pipeline compiles each figure.
//!
//! # Why callbacks instead of channels?
//!
//! The callback approach is the least-invasive integration point: callers can
//! forward events to a Tokio broadcast channel, a WebSocket, a database record,
//! or a terminal progress bar — without the library knowing anything about how
//! the host application communicates. The trait is `Send + Sync` so it works
//! correctly when figures are compiled concurrently.
//!
//! # Example
//!
//! ```rust
//! use latex2docx::{ConversionProgressCallback, ConversionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: Arc<AtomicUsize>,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_figure_complete(&self, ordinal: usize, total: usize, identifier: &str) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Figure {}/{} rendered ({})", ordinal, total, identifier);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     completed: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the conversion pipeline as it compiles each figure.
///
/// Implementations must be `Send + Sync` (figures compile concurrently).
/// All methods have default no-op implementations so callers only override
/// what they care about.
///
/// # Thread safety
///
/// `on_figure_start`, `on_figure_complete`, and `on_figure_error` may be
/// called concurrently from different tasks. Implementations must protect
/// shared mutable state with appropriate synchronisation primitives
/// (e.g. `Mutex`, `AtomicUsize`).
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once before any figure is compiled.
    ///
    /// # Arguments
    /// * `total_figures` — number of figures detected in the document
    fn on_conversion_start(&self, total_figures: usize) {
        let _ = total_figures;
    }

    /// Called just before a figure's unit is handed to the LaTeX engine.
    ///
    /// # Arguments
    /// * `ordinal` — 1-indexed position in document order
    /// * `total`   — total figures in the document
    fn on_figure_start(&self, ordinal: usize, total: usize) {
        let _ = (ordinal, total);
    }

    /// Called when a figure's PNG was produced.
    ///
    /// # Arguments
    /// * `ordinal`    — 1-indexed position in document order
    /// * `total`      — total figures
    /// * `identifier` — the figure's correlated name (label or `figure-NN`)
    fn on_figure_complete(&self, ordinal: usize, total: usize, identifier: &str) {
        let _ = (ordinal, total, identifier);
    }

    /// Called when a figure failed to compile or rasterise.
    ///
    /// # Arguments
    /// * `ordinal` — 1-indexed position in document order
    /// * `total`   — total figures
    /// * `error`   — human-readable error description
    fn on_figure_error(&self, ordinal: usize, total: usize, error: &str) {
        let _ = (ordinal, total, error);
    }

    /// Called once after all figures have been attempted.
    ///
    /// # Arguments
    /// * `total_figures` — total figures in the document
    /// * `success_count` — figures that rendered without error
    fn on_conversion_complete(&self, total_figures: usize, success_count: usize) {
        let _ = (total_figures, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
///
/// This is the default when no callback is configured.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
