//! End-to-end integration tests for latex2docx.
//!
//! The gated tests run the real external tools and are skipped unless the
//! `E2E_ENABLED` environment variable is set, so CI without a TeX
//! installation stays green. They need a TeX Live with TikZ and pgfplots,
//! ImageMagick, and pandoc on PATH.
//!
//! Run with:
//!   E2E_ENABLED=1 cargo test --test e2e -- --nocapture
//!
//! To restrict to a specific test:
//!   E2E_ENABLED=1 cargo test --test e2e test_convert_two -- --nocapture
//!
//! Everything else (correlation, pre-processing, config validation,
//! callback plumbing) runs on every `cargo test` with generated fixtures.

use latex2docx::{
    clean_artifacts, convert, convert_source, convert_to_file, derive_identifiers,
    extract_figures, inspect, preprocess_document, substitute_figures, ConversionConfig,
    ConversionProgressCallback, NoopProgressCallback,
};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

// ── Fixtures ─────────────────────────────────────────────────────────────────

/// A small but realistic manuscript: physics2 `\ab` macros, one labelled and
/// one unlabelled tikzpicture.
const TWO_FIGURE_DOC: &str = r"\documentclass[a4paper]{jlreq}
\usepackage{amsmath}
\usepackage{physics2}
\usephysicsmodule{ab}
\usepackage{tikz}
\begin{document}
\title{Forced oscillation}
\author{R. Yamada}
\maketitle

\section{Model}
The response amplitude is
\[
  A(\omega) = \ab| \frac{F_0/m}{\omega_0^2 - \omega^2 + i\gamma\omega} |.
\]
Energy follows from $E = \frac{m}{2}\ab(\dot{x}^2 + \omega_0^2 x^2)$.

\begin{figure}[h]
  \centering
  \begin{tikzpicture}
    \draw (0,0) circle (1.0);
    \draw[->] (0,0) -- (0.7,0.7);
  \end{tikzpicture}
  \caption{Phase-space orbit.}
  \label{fig:circle}
\end{figure}

\begin{figure}[h]
  \centering
  \begin{tikzpicture}
    \draw[->] (0,0) -- (3,0) node[right] {$\omega$};
    \draw[->] (0,0) -- (0,2) node[above] {$A$};
    \draw (0,0.4) .. controls (1.4,1.8) .. (3,0.2);
  \end{tikzpicture}
  \caption{Resonance curve, deliberately unlabelled.}
\end{figure}

\end{document}
";

/// Same flavour of document without any figures.
const NO_FIGURE_DOC: &str = r"\documentclass{article}
\usepackage{amsmath}
\usepackage{physics2}
\usephysicsmodule{ab}
\begin{document}
Energy is $E = \frac{m}{2}\ab(v^2 + \omega^2 x^2)$.
\end{document}
";

fn write_fixture(doc: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("paper.tex");
    std::fs::write(&path, doc).expect("write fixture");
    (dir, path)
}

/// Skip this test unless E2E_ENABLED is set *and* all three external tools
/// respond to `--version`.
macro_rules! e2e_skip_unless_tools {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests (needs pdflatex, convert, pandoc)");
            return;
        }
        for tool in ["pdflatex", "convert", "pandoc"] {
            if std::process::Command::new(tool)
                .arg("--version")
                .output()
                .is_err()
            {
                println!("SKIP — {tool} not found on PATH");
                return;
            }
        }
    }};
}

// ── Correlation and pre-processing (no tools, always run) ────────────────────

#[test]
fn test_figure_correlation_scenario() {
    let identifiers = derive_identifiers(TWO_FIGURE_DOC);
    assert_eq!(identifiers, vec!["circle"]);

    let units = extract_figures(TWO_FIGURE_DOC, &identifiers);
    assert_eq!(units.len(), 2);
    assert_eq!(units[0].identifier, "circle");
    assert_eq!(units[1].identifier, "figure-02");
    assert!(units[0].source.starts_with("\\documentclass{standalone}"));
    assert!(units[0].source.contains("\\draw (0,0) circle (1.0);"));
    assert!(units[1].source.contains("controls"));
    // captions live outside the tikzpicture and stay out of the unit
    assert!(!units[1].source.contains("Resonance"));

    let (substituted, replaced) =
        substitute_figures(TWO_FIGURE_DOC, &identifiers, "tikz_png", 0.8);
    assert_eq!(replaced, 2);
    assert!(!substituted.contains("tikzpicture"));
    assert!(substituted.contains("tikz_png/circle.png"));
    assert!(substituted.contains("tikz_png/figure-02.png"));
    assert!(substituted.contains("width=0.8\\textwidth"));
    // captions and labels survive the substitution
    assert!(substituted.contains("\\caption{Phase-space orbit.}"));
    assert!(substituted.contains("\\label{fig:circle}"));
}

#[test]
fn test_preprocess_realistic_document() {
    let pre = preprocess_document(TWO_FIGURE_DOC);

    assert!(!pre.text.contains("\\ab(") && !pre.text.contains("\\ab|"));
    assert!(pre.text.contains("\\left|"));
    assert!(pre.text.contains("\\left("));
    assert_eq!(pre.rewrite_passes, 2);
    assert_eq!(pre.macros_rewritten, 2);
    assert!(pre.reached_fixed_point);

    assert!(pre.text.contains("\\documentclass{article}"));
    assert!(!pre.text.contains("physics2"));
    assert!(!pre.text.contains("usephysicsmodule"));
}

#[tokio::test]
async fn test_inspect_two_figure_fixture() {
    let (_dir, path) = write_fixture(TWO_FIGURE_DOC);

    let scan = inspect(&path).await.expect("inspect() should succeed");

    assert_eq!(scan.documentclass.as_deref(), Some("jlreq"));
    assert_eq!(scan.title.as_deref(), Some("Forced oscillation"));
    assert_eq!(scan.author.as_deref(), Some("R. Yamada"));
    assert_eq!(scan.figures, 2);
    assert_eq!(scan.labels, vec!["circle"]);
    assert_eq!(scan.identifiers, vec!["circle", "figure-02"]);
    assert_eq!(scan.delimiter_macros, 2);
}

#[tokio::test]
async fn test_inspect_nonexistent() {
    let result = inspect("/definitely/not/a/real/file.tex").await;
    assert!(
        result.is_err(),
        "inspect() should return Err for a nonexistent file"
    );
}

#[tokio::test]
async fn test_scan_serialises_to_json() {
    let (_dir, path) = write_fixture(TWO_FIGURE_DOC);
    let scan = inspect(&path).await.expect("inspect() should succeed");

    let json = serde_json::to_string_pretty(&scan).expect("DocumentScan must serialise");
    let back: latex2docx::DocumentScan = serde_json::from_str(&json).expect("round-trip");
    assert_eq!(back.figures, scan.figures);
    assert_eq!(back.identifiers, scan.identifiers);
}

// ── Config validation (always run) ───────────────────────────────────────────

#[test]
fn test_config_builder_clamps_density_and_quality() {
    let config = ConversionConfig::builder()
        .density(10_000)
        .quality(500)
        .build()
        .expect("builder clamps rather than failing");
    assert_eq!(config.density, 1200);
    assert_eq!(config.quality, 100);

    let config = ConversionConfig::builder()
        .density(10)
        .build()
        .expect("clamped");
    assert_eq!(config.density, 72);
}

#[test]
fn test_config_builder_rejects_bad_width() {
    assert!(ConversionConfig::builder().image_width(0.0).build().is_err());
    assert!(ConversionConfig::builder().image_width(1.5).build().is_err());
    assert!(ConversionConfig::builder().image_width(1.0).build().is_ok());
}

#[test]
fn test_config_builder_rejects_empty_engine() {
    assert!(ConversionConfig::builder().latex_engine("").build().is_err());
}

#[test]
fn test_config_concurrency_floor() {
    let config = ConversionConfig::builder()
        .concurrency(0)
        .build()
        .expect("valid config");
    assert_eq!(config.concurrency, 1);
}

// ── Callback API (always run) ────────────────────────────────────────────────

/// `ConversionProgressCallback` boxed as `Arc<dyn …>` must be movable into a
/// `tokio::spawn` task: the conversion future is Send and callers do run it
/// on multi-threaded runtimes.
#[tokio::test]
async fn test_callback_send_in_tokio_spawn() {
    struct ErrorLogger {
        log: Arc<Mutex<Vec<String>>>,
    }

    impl ConversionProgressCallback for ErrorLogger {
        fn on_figure_error(&self, _ordinal: usize, _total: usize, error: &str) {
            self.log.lock().unwrap().push(error.to_string());
        }
    }

    let logger = Arc::new(ErrorLogger {
        log: Arc::new(Mutex::new(vec![])),
    });
    let log_ref = Arc::clone(&logger.log);

    // Cast to the type the library actually stores and passes around.
    let cb: Arc<dyn ConversionProgressCallback> = logger;

    tokio::spawn(async move {
        cb.on_figure_error(2, 5, "pdflatex timed out after 300s");
    })
    .await
    .expect("spawn must succeed");

    let captured = log_ref.lock().unwrap().clone();
    assert_eq!(captured, vec!["pdflatex timed out after 300s"]);
}

#[test]
fn test_noop_callback_is_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<NoopProgressCallback>();

    let cb: Arc<dyn ConversionProgressCallback> = Arc::new(NoopProgressCallback);
    cb.on_figure_error(1, 1, "an error");
}

// ── Full conversions (need pdflatex + ImageMagick + pandoc) ──────────────────

#[tokio::test]
async fn test_convert_two_figure_document() {
    e2e_skip_unless_tools!();
    let (dir, path) = write_fixture(TWO_FIGURE_DOC);
    let out_path = dir.path().join("paper.docx");

    let config = ConversionConfig::builder()
        .density(150) // keep the gated run quick
        .concurrency(2)
        .build()
        .expect("valid config");

    let stats = convert_to_file(&path, &out_path, &config)
        .await
        .expect("conversion should succeed");

    assert_eq!(stats.figures_detected, 2);
    assert_eq!(stats.figures_compiled, 2, "both figures should render");
    assert_eq!(stats.figures_failed, 0);
    assert_eq!(stats.replacements, 2);
    assert_eq!(stats.rewrite_passes, 2);
    assert_eq!(stats.macros_rewritten, 2);
    assert!(stats.output_bytes > 0);

    assert!(out_path.exists());
    assert!(dir.path().join("tikz_png/circle.png").exists());
    assert!(dir.path().join("tikz_png/figure-02.png").exists());
    assert!(dir.path().join("paper_pandoc.tex").exists());
    assert!(dir.path().join("paper_with_images.tex").exists());
    assert!(dir.path().join("pandoc_conversion.log").exists());

    println!(
        "[two-figure] {} bytes of DOCX, {}ms total",
        stats.output_bytes, stats.total_duration_ms
    );
}

#[tokio::test]
async fn test_convert_without_figures() {
    e2e_skip_unless_tools!();
    let (dir, path) = write_fixture(NO_FIGURE_DOC);
    let out_path = dir.path().join("plain.docx");

    let config = ConversionConfig::default();
    let stats = convert_to_file(&path, &out_path, &config)
        .await
        .expect("conversion should succeed");

    assert_eq!(stats.figures_detected, 0);
    assert_eq!(stats.figures_compiled, 0);
    assert_eq!(stats.replacements, 0);
    assert_eq!(stats.rewrite_passes, 2);
    assert!(out_path.exists());
    // no figure workspace is created for a figure-free document
    assert!(!dir.path().join("tikz_extracted").exists());
    assert!(!dir.path().join("tikz_png").exists());
}

#[tokio::test]
async fn test_convert_default_output_path() {
    e2e_skip_unless_tools!();
    let (dir, path) = write_fixture(NO_FIGURE_DOC);

    let config = ConversionConfig::default();
    let output = convert(&path, &config)
        .await
        .expect("conversion should succeed");

    let name = output.output_path.file_name().unwrap().to_str().unwrap();
    assert!(name.starts_with("output_") && name.ends_with(".docx"));
    assert!(output.output_path.exists());
    assert_eq!(output.output_path.parent(), Some(dir.path()));
}

#[tokio::test]
async fn test_convert_source_staging() {
    e2e_skip_unless_tools!();
    let out_dir = tempfile::tempdir().expect("tempdir");
    let out_path = out_dir.path().join("from_source.docx");

    let config = ConversionConfig::default();
    let output = convert_source(NO_FIGURE_DOC, &out_path, &config)
        .await
        .expect("conversion should succeed");

    assert!(out_path.exists());
    assert_eq!(output.output_path, out_path);
    assert_eq!(output.stats.figures_detected, 0);
}

#[tokio::test]
async fn test_clean_artifacts_after_convert() {
    e2e_skip_unless_tools!();
    let (dir, path) = write_fixture(TWO_FIGURE_DOC);
    let out_path = dir.path().join("paper.docx");

    let config = ConversionConfig::default();
    convert_to_file(&path, &out_path, &config)
        .await
        .expect("conversion should succeed");

    let removed = clean_artifacts(dir.path(), &config)
        .await
        .expect("clean should succeed");
    assert!(
        removed.len() >= 5,
        "build dir, asset dir, two intermediates, log and docx; got {removed:?}"
    );

    assert!(path.exists(), "the source must never be removed");
    assert!(!out_path.exists());
    assert!(!dir.path().join("tikz_extracted").exists());
    assert!(!dir.path().join("tikz_png").exists());
}

#[tokio::test]
async fn test_convert_clean_intermediates() {
    e2e_skip_unless_tools!();
    let (dir, path) = write_fixture(TWO_FIGURE_DOC);
    let out_path = dir.path().join("paper.docx");

    let config = ConversionConfig::builder()
        .density(150)
        .clean_intermediates(true)
        .build()
        .expect("valid config");

    let stats = convert_to_file(&path, &out_path, &config)
        .await
        .expect("conversion should succeed");
    assert_eq!(stats.figures_compiled, 2);

    // cleanup runs after the export, so only the source and the DOCX remain
    assert!(out_path.exists());
    assert!(path.exists());
    assert!(!dir.path().join("tikz_extracted").exists());
    assert!(!dir.path().join("tikz_png").exists());
    assert!(!dir.path().join("paper_pandoc.tex").exists());
    assert!(!dir.path().join("paper_with_images.tex").exists());
    assert!(!dir.path().join("pandoc_conversion.log").exists());
}

#[tokio::test]
async fn test_output_json_serialisable() {
    e2e_skip_unless_tools!();
    let (_dir, path) = write_fixture(TWO_FIGURE_DOC);

    let config = ConversionConfig::default();
    let output = convert(&path, &config)
        .await
        .expect("conversion should succeed");

    let json = serde_json::to_string_pretty(&output).expect("ConversionOutput must serialise");
    let back: latex2docx::ConversionOutput =
        serde_json::from_str(&json).expect("JSON must deserialise back to ConversionOutput");
    assert_eq!(back.stats.figures_detected, output.stats.figures_detected);
    assert_eq!(back.figures.len(), output.figures.len());
}

#[tokio::test]
async fn test_progress_callbacks_fire() {
    e2e_skip_unless_tools!();
    use std::sync::atomic::{AtomicUsize, Ordering};

    let (dir, path) = write_fixture(TWO_FIGURE_DOC);
    let out_path = dir.path().join("paper.docx");

    struct TestCallback {
        starts: Arc<AtomicUsize>,
        completes: Arc<AtomicUsize>,
        conversion_started: Arc<AtomicUsize>,
        conversion_completed: Arc<AtomicUsize>,
    }

    impl ConversionProgressCallback for TestCallback {
        fn on_conversion_start(&self, total_figures: usize) {
            self.conversion_started.store(total_figures, Ordering::SeqCst);
        }
        fn on_figure_start(&self, _ordinal: usize, _total: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }
        fn on_figure_complete(&self, _ordinal: usize, _total: usize, _identifier: &str) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }
        fn on_conversion_complete(&self, _total: usize, success: usize) {
            self.conversion_completed.store(success, Ordering::SeqCst);
        }
    }

    let starts = Arc::new(AtomicUsize::new(0));
    let completes = Arc::new(AtomicUsize::new(0));
    let conversion_started = Arc::new(AtomicUsize::new(0));
    let conversion_completed = Arc::new(AtomicUsize::new(0));

    let cb = Arc::new(TestCallback {
        starts: Arc::clone(&starts),
        completes: Arc::clone(&completes),
        conversion_started: Arc::clone(&conversion_started),
        conversion_completed: Arc::clone(&conversion_completed),
    });

    let config = ConversionConfig::builder()
        .density(150)
        .progress_callback(cb as Arc<dyn ConversionProgressCallback>)
        .build()
        .expect("valid config");

    convert_to_file(&path, &out_path, &config)
        .await
        .expect("conversion should succeed");

    assert_eq!(conversion_started.load(Ordering::SeqCst), 2);
    assert_eq!(starts.load(Ordering::SeqCst), 2);
    assert_eq!(completes.load(Ordering::SeqCst), 2);
    assert_eq!(conversion_completed.load(Ordering::SeqCst), 2);
}
