//! CLI binary for latex2docx.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use latex2docx::{
    clean_artifacts, convert, convert_to_file, inspect, ConversionConfig,
    ConversionProgressCallback, ConversionStats, ProgressCallback,
};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: renders a live progress bar and per-figure log
/// lines using [indicatif]. Designed to work correctly when figures complete
/// out-of-order (concurrent compilation).
struct CliProgressCallback {
    /// The single progress bar anchored at the bottom of the terminal.
    bar: ProgressBar,
    /// Per-figure wall-clock start times for elapsed reporting.
    start_times: Mutex<HashMap<usize, Instant>>,
    /// Count of figures that errored out.
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Create a callback whose progress-bar length is set dynamically
    /// by `on_conversion_start` (called once the document has been scanned).
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0); // length set in on_conversion_start

        // Initial style: spinner only (no counter until we know the total).
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Scanning document…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    /// Switch to the full progress-bar style once we know `total`.
    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>2}/{len} figures  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Rendering");
        self.bar.reset_eta();
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_figures: usize) {
        if total_figures == 0 {
            self.bar.set_message("No figures; exporting directly…");
            return;
        }
        // Switch from spinner-only style to full progress bar now that we
        // know the actual figure count.
        self.activate_bar(total_figures);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Rendering {total_figures} figures…"))
        ));
    }

    fn on_figure_start(&self, ordinal: usize, _total: usize) {
        self.start_times
            .lock()
            .unwrap()
            .insert(ordinal, Instant::now());
        self.bar.set_message(format!("figure {ordinal}"));
    }

    fn on_figure_complete(&self, ordinal: usize, total: usize, identifier: &str) {
        let elapsed_ms = self
            .start_times
            .lock()
            .unwrap()
            .remove(&ordinal)
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0);

        self.bar.println(format!(
            "  {} Figure {:>2}/{:<2}  {:<20}  {}",
            green("✓"),
            ordinal,
            total,
            identifier,
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
        self.bar.inc(1);
    }

    fn on_figure_error(&self, ordinal: usize, total: usize, error: &str) {
        let elapsed_ms = self
            .start_times
            .lock()
            .unwrap()
            .remove(&ordinal)
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0);

        self.errors.fetch_add(1, Ordering::SeqCst);

        // Truncate very long error messages, on a char boundary, to keep
        // output tidy.
        let msg = match error.char_indices().nth(79) {
            Some((idx, _)) => format!("{}\u{2026}", &error[..idx]),
            None => error.to_string(),
        };

        self.bar.println(format!(
            "  {} Figure {:>2}/{:<2}  {}  {}",
            red("✗"),
            ordinal,
            total,
            red(&msg),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
        self.bar.inc(1);
    }

    fn on_conversion_complete(&self, total_figures: usize, success_count: usize) {
        let failed = total_figures.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if total_figures == 0 {
            return;
        }
        if failed == 0 {
            eprintln!(
                "{} {} figures rendered",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} figures rendered  ({} failed)",
                if failed == total_figures {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_figures,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Basic conversion (output lands beside the input as output_<date>.docx)
  latex2docx paper.tex

  # Name the output
  latex2docx paper.tex paper.docx

  # Higher-resolution figures
  latex2docx --density 600 paper.tex

  # A different engine for units that need it
  latex2docx --engine lualatex paper.tex

  # Scan a document without converting (no external tools needed)
  latex2docx --inspect-only paper.tex

  # Machine-readable result
  latex2docx --json paper.tex > result.json

  # Remove everything a previous run left behind
  latex2docx --clean-only

REQUIRED EXTERNAL TOOLS:
  Tool         Used for                               Install
  ─────────    ─────────────────────────────────────  ──────────────────────
  pdflatex     compiling extracted figure units       TeX Live / MiKTeX
  convert      rasterising figure PDFs (ImageMagick)  imagemagick package
  pandoc       the final DOCX export                  pandoc.org/installing

  Each tool is probed with --version before use; a missing one fails fast
  with an install hint instead of after minutes of compilation.

ENVIRONMENT VARIABLES:
  LATEX2DOCX_DENSITY      Rasterisation density in DPI
  LATEX2DOCX_QUALITY      PNG quality (1-100)
  LATEX2DOCX_WIDTH        Image width as a fraction of \textwidth
  LATEX2DOCX_CONCURRENCY  Concurrent figure compilations
  LATEX2DOCX_ENGINE       LaTeX engine binary
  LATEX2DOCX_TIMEOUT      Per-tool timeout in seconds
  RUST_LOG                Tracing filter (overrides -v/-q)

SETUP:
  1. Install tools:   apt install texlive imagemagick pandoc
  2. Convert:         latex2docx paper.tex paper.docx
"#;

/// Convert LaTeX documents with TikZ figures to Word (DOCX).
#[derive(Parser, Debug)]
#[command(
    name = "latex2docx",
    version,
    about = "Convert LaTeX documents with TikZ figures to Word (DOCX)",
    long_about = "Convert LaTeX documents to DOCX via pandoc. physics2 \\ab delimiters are \
rewritten into plain \\left/\\right pairs, and tikzpicture environments are compiled and \
rasterised into PNGs that the exported document references. Requires a LaTeX engine, \
ImageMagick, and pandoc on PATH.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// LaTeX source file.
    input: Option<String>,

    /// Output DOCX path. Defaults to output_<YYYYMMDD>.docx beside the input.
    output: Option<PathBuf>,

    /// Rasterisation density in DPI (72–1200).
    #[arg(long, env = "LATEX2DOCX_DENSITY", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(72..=1200))]
    density: u32,

    /// PNG quality (1–100).
    #[arg(long, env = "LATEX2DOCX_QUALITY", default_value_t = 90,
          value_parser = clap::value_parser!(u32).range(1..=100))]
    quality: u32,

    /// Figure width as a fraction of \textwidth.
    #[arg(long, env = "LATEX2DOCX_WIDTH", default_value_t = 0.8)]
    width: f32,

    /// Number of figures compiled concurrently.
    #[arg(short, long, env = "LATEX2DOCX_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// LaTeX engine binary (pdflatex, lualatex, xelatex, …).
    #[arg(long, env = "LATEX2DOCX_ENGINE", default_value = "pdflatex")]
    engine: String,

    /// Directory for extracted figure sources and engine artifacts.
    #[arg(long, env = "LATEX2DOCX_BUILD_DIR", default_value = "tikz_extracted")]
    build_dir: String,

    /// Directory for rendered PNGs.
    #[arg(long, env = "LATEX2DOCX_ASSET_DIR", default_value = "tikz_png")]
    asset_dir: String,

    /// Data directory copied beside the figure builds.
    #[arg(long, env = "LATEX2DOCX_DATA_DIR", default_value = "data")]
    data_dir: String,

    /// Per-tool timeout in seconds.
    #[arg(long, env = "LATEX2DOCX_TIMEOUT", default_value_t = 300)]
    timeout: u64,

    /// Skip the table of contents.
    #[arg(long, env = "LATEX2DOCX_NO_TOC")]
    no_toc: bool,

    /// Skip section numbering.
    #[arg(long, env = "LATEX2DOCX_NO_NUMBER_SECTIONS")]
    no_number_sections: bool,

    /// Remove working directories and intermediate files after a successful conversion.
    #[arg(long, env = "LATEX2DOCX_CLEAN")]
    clean: bool,

    /// Remove artifacts from a previous run and exit.
    #[arg(long)]
    clean_only: bool,

    /// Print the document scan only, no conversion.
    #[arg(long)]
    inspect_only: bool,

    /// Output structured JSON instead of human-readable text.
    #[arg(long, env = "LATEX2DOCX_JSON")]
    json: bool,

    /// Disable the progress bar.
    #[arg(long, env = "LATEX2DOCX_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "LATEX2DOCX_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "LATEX2DOCX_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user. Verbose
    // mode drops the bar instead, so debug logs stay readable.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.verbose;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Clean-only mode ──────────────────────────────────────────────────
    if cli.clean_only {
        let config = build_config(&cli, None)?;
        let dir = clean_target(cli.input.as_deref());
        let removed = clean_artifacts(&dir, &config).await.context("Clean failed")?;

        if !cli.quiet {
            for path in &removed {
                eprintln!("  removed {}", dim(&path.display().to_string()));
            }
            eprintln!(
                "{} {} artifacts removed",
                green("✔"),
                bold(&removed.len().to_string())
            );
        }
        return Ok(());
    }

    let Some(ref input) = cli.input else {
        anyhow::bail!("INPUT is required unless --clean-only is given");
    };

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let scan = inspect(input).await.context("Failed to inspect document")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&scan).context("Failed to serialise scan")?
            );
        } else {
            println!("File:         {}", input);
            if let Some(ref c) = scan.documentclass {
                println!("Class:        {}", c);
            }
            if let Some(ref t) = scan.title {
                println!("Title:        {}", t);
            }
            if let Some(ref a) = scan.author {
                println!("Author:       {}", a);
            }
            println!("Figures:      {}", scan.figures);
            println!("Labels:       {}", scan.labels.len());
            println!("\\ab macros:   {}", scan.delimiter_macros);
            for (i, id) in scan.identifiers.iter().enumerate() {
                println!("  figure {:>2}: {}", i + 1, id);
            }
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    // The progress bar starts as a spinner (no figure count yet);
    // `on_conversion_start` resizes it to the correct total once the
    // document has been scanned. `show_progress` was already computed above.

    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb)?;

    // ── Run conversion ───────────────────────────────────────────────────
    if let Some(ref output_path) = cli.output {
        let stats = convert_to_file(input, output_path, &config)
            .await
            .context("Conversion failed")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&stats).context("Failed to serialise stats")?
            );
        } else if !cli.quiet {
            print_summary(&stats, output_path);
        }
    } else {
        let output = convert(input, &config).await.context("Conversion failed")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&output).context("Failed to serialise output")?
            );
        } else if !cli.quiet {
            print_summary(&output.stats, &output.output_path);
        }
    }

    Ok(())
}

/// Two-line result summary (the callback already printed per-figure ticks).
fn print_summary(stats: &ConversionStats, output_path: &Path) {
    eprintln!(
        "{}  {}/{} figures  {}ms  →  {}",
        if stats.figures_failed == 0 {
            green("✔")
        } else {
            cyan("⚠")
        },
        stats.figures_compiled,
        stats.figures_detected,
        stats.total_duration_ms,
        bold(&output_path.display().to_string()),
    );
    eprintln!(
        "   {} rewrite passes  /  {} \\ab macros  /  {} figure refs",
        dim(&stats.rewrite_passes.to_string()),
        dim(&stats.macros_rewritten.to_string()),
        dim(&stats.replacements.to_string()),
    );
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .density(cli.density)
        .quality(cli.quality)
        .image_width(cli.width)
        .concurrency(cli.concurrency)
        .latex_engine(cli.engine.as_str())
        .build_dir(cli.build_dir.as_str())
        .asset_dir(cli.asset_dir.as_str())
        .data_dir(cli.data_dir.as_str())
        .tool_timeout_secs(cli.timeout)
        .toc(!cli.no_toc)
        .number_sections(!cli.no_number_sections)
        .clean_intermediates(cli.clean);

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Directory `--clean-only` operates on: the input's directory when one is
/// given (or the input itself if it is a directory), the current directory
/// otherwise.
fn clean_target(input: Option<&str>) -> PathBuf {
    match input {
        Some(input) => {
            let path = Path::new(input);
            if path.is_dir() {
                path.to_path_buf()
            } else {
                match path.parent() {
                    Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                    _ => PathBuf::from("."),
                }
            }
        }
        None => PathBuf::from("."),
    }
}
