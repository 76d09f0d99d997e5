//! Figure compilation: each standalone unit becomes a PDF, then a PNG.
//!
//! ## Why shell out?
//!
//! TikZ is a full TeX-embedded language; nothing short of a real TeX engine
//! renders it faithfully. Every extracted unit is compiled with the
//! configured engine and rasterised with ImageMagick as separate child
//! processes, one figure at a time, so a broken figure costs one PNG and
//! not the document. Success is judged by artifact existence rather than
//! exit codes — pdflatex exits non-zero for recoverable warnings while
//! still emitting a perfectly usable PDF.

use crate::config::ConversionConfig;
use crate::error::{FigureError, Latex2DocxError};
use crate::output::FigureResult;
use crate::pipeline::figures::FigureUnit;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, warn};

/// ImageMagick entry point. v6 only ships `convert` and v7 installs keep a
/// `convert` shim, so this stays the portable spelling.
pub(crate) const IMAGEMAGICK: &str = "convert";

/// The two working directories for figure builds.
#[derive(Debug, Clone)]
pub struct FigureWorkspace {
    /// Unit sources and engine artifacts (`<id>.tex`, `<id>.pdf`, logs).
    pub build_dir: PathBuf,
    /// Rendered PNGs, referenced from the substituted document.
    pub asset_dir: PathBuf,
}

/// Probe for an external tool by running `<tool> --version`.
///
/// Called once per tool before the figure loop: a missing binary becomes a
/// single fatal error with an install hint instead of N identical figure
/// failures.
pub async fn ensure_tool(tool: &str, hint: &str) -> Result<(), Latex2DocxError> {
    match Command::new(tool).arg("--version").output().await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(Latex2DocxError::ToolNotFound {
                tool: tool.to_string(),
                hint: hint.to_string(),
            })
        }
        Err(e) => Err(Latex2DocxError::Internal(format!(
            "probing '{tool}' failed: {e}"
        ))),
    }
}

/// Create fresh working directories beside the input, removing stale ones
/// from a previous run, and copy the document's data directory into the
/// build directory so units that plot external data files compile.
pub async fn prepare_workspace(
    base: &Path,
    config: &ConversionConfig,
) -> Result<FigureWorkspace, Latex2DocxError> {
    let build_dir = base.join(&config.build_dir);
    let asset_dir = base.join(&config.asset_dir);

    for dir in [&build_dir, &asset_dir] {
        if dir.exists() {
            tokio::fs::remove_dir_all(dir)
                .await
                .map_err(|e| workspace_err(dir, e))?;
        }
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| workspace_err(dir, e))?;
    }

    let data_src = base.join(&config.data_dir);
    if data_src.is_dir() {
        let data_dst = build_dir.join(&config.data_dir);
        debug!("Copying {} into the build directory", data_src.display());
        let src = data_src.clone();
        tokio::task::spawn_blocking(move || copy_dir_recursive(&src, &data_dst))
            .await
            .map_err(|e| Latex2DocxError::Internal(format!("data copy task panicked: {e}")))?
            .map_err(|e| workspace_err(&data_src, e))?;
    }

    Ok(FigureWorkspace {
        build_dir,
        asset_dir,
    })
}

fn workspace_err(path: &Path, source: std::io::Error) -> Latex2DocxError {
    Latex2DocxError::WorkspaceFailed {
        path: path.to_path_buf(),
        source,
    }
}

/// Plain recursive copy; runs on the blocking pool.
fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Compile one unit to PDF and rasterise it to PNG.
///
/// Never fails the pipeline: every outcome is a [`FigureResult`], with any
/// error recorded inside it.
pub async fn compile_figure(
    unit: &FigureUnit,
    workspace: &FigureWorkspace,
    config: &ConversionConfig,
) -> FigureResult {
    let started = Instant::now();
    debug!("Compiling figure {} ({})", unit.ordinal, unit.identifier);

    let outcome = build_figure(unit, workspace, config).await;
    let duration_ms = started.elapsed().as_millis() as u64;

    match outcome {
        Ok(asset_path) => {
            debug!(
                "Figure '{}' rendered in {}ms: {}",
                unit.identifier,
                duration_ms,
                asset_path.display()
            );
            FigureResult {
                ordinal: unit.ordinal,
                identifier: unit.identifier.clone(),
                asset_path: Some(asset_path),
                duration_ms,
                error: None,
            }
        }
        Err(error) => {
            warn!("{}", error);
            FigureResult {
                ordinal: unit.ordinal,
                identifier: unit.identifier.clone(),
                asset_path: None,
                duration_ms,
                error: Some(error),
            }
        }
    }
}

async fn build_figure(
    unit: &FigureUnit,
    workspace: &FigureWorkspace,
    config: &ConversionConfig,
) -> Result<PathBuf, FigureError> {
    let id = &unit.identifier;
    let pdf_path = workspace.build_dir.join(format!("{id}.pdf"));
    let png_path = workspace.asset_dir.join(format!("{id}.png"));

    tokio::fs::write(workspace.build_dir.join(format!("{id}.tex")), &unit.source)
        .await
        .map_err(|e| FigureError::WriteFailed {
            identifier: id.clone(),
            detail: e.to_string(),
        })?;

    // ── LaTeX engine: <id>.tex → <id>.pdf ──
    let args = engine_args(id);
    let output = run_tool(
        &config.latex_engine,
        &args,
        &workspace.build_dir,
        config.tool_timeout_secs,
    )
    .await
    .map_err(|e| match e {
        RunError::TimedOut => FigureError::Timeout {
            identifier: id.clone(),
            tool: config.latex_engine.clone(),
            secs: config.tool_timeout_secs,
        },
        RunError::Spawn(detail) => FigureError::CompileFailed {
            identifier: id.clone(),
            detail,
        },
    })?;
    if !pdf_path.exists() {
        return Err(FigureError::CompileFailed {
            identifier: id.clone(),
            detail: failure_detail(&output),
        });
    }

    // ── ImageMagick: <id>.pdf → <id>.png ──
    let args = magick_args(id, &png_path, config.density, config.quality);
    let output = run_tool(
        IMAGEMAGICK,
        &args,
        &workspace.build_dir,
        config.tool_timeout_secs,
    )
    .await
    .map_err(|e| match e {
        RunError::TimedOut => FigureError::Timeout {
            identifier: id.clone(),
            tool: IMAGEMAGICK.to_string(),
            secs: config.tool_timeout_secs,
        },
        RunError::Spawn(detail) => FigureError::RasterizeFailed {
            identifier: id.clone(),
            detail,
        },
    })?;
    if !png_path.exists() {
        return Err(FigureError::RasterizeFailed {
            identifier: id.clone(),
            detail: failure_detail(&output),
        });
    }

    Ok(png_path)
}

pub(crate) enum RunError {
    TimedOut,
    Spawn(String),
}

pub(crate) async fn run_tool(
    program: &str,
    args: &[String],
    cwd: &Path,
    timeout_secs: u64,
) -> Result<Output, RunError> {
    debug!("Running {} {}", program, args.join(" "));
    let mut command = Command::new(program);
    // kill_on_drop so a timed-out engine does not linger as a zombie.
    command.args(args).current_dir(cwd).kill_on_drop(true);
    match tokio::time::timeout(Duration::from_secs(timeout_secs), command.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(RunError::Spawn(e.to_string())),
        Err(_) => Err(RunError::TimedOut),
    }
}

/// Arguments for compiling one unit; the command runs inside the build
/// directory so artifacts land there.
fn engine_args(identifier: &str) -> Vec<String> {
    vec![
        "-interaction=nonstopmode".to_string(),
        format!("{identifier}.tex"),
    ]
}

/// Arguments for `convert -density D <id>.pdf -quality Q <png>`; density
/// must precede the input or ImageMagick rasterises at its 72 DPI default.
fn magick_args(identifier: &str, png_path: &Path, density: u32, quality: u32) -> Vec<String> {
    vec![
        "-density".to_string(),
        density.to_string(),
        format!("{identifier}.pdf"),
        "-quality".to_string(),
        quality.to_string(),
        png_path.display().to_string(),
    ]
}

/// Short diagnostic from a failed tool run: exit status plus the tail of
/// whatever it printed. pdflatex reports errors on stdout, ImageMagick on
/// stderr, so both are considered.
pub(crate) fn failure_detail(output: &Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let text = if stderr.trim().is_empty() { stdout } else { stderr };
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let tail = lines[lines.len().saturating_sub(5)..].join(" | ");
    if tail.is_empty() {
        output.status.to_string()
    } else {
        format!("{}; {}", output.status, tail)
    }
}
