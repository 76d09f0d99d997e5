//! DOCX export via pandoc.
//!
//! The substituted document at this point contains nothing a Word reader
//! chokes on: `\ab` macros are gone, tikzpicture environments have become
//! `\includegraphics` blocks, and the preamble is plain `article`. Pandoc
//! does the rest. Its full transcript is kept next to the input after every
//! run, successful or not, because pandoc warnings (missing images, broken
//! cross-references) are the first place to look when the output renders
//! oddly.

use crate::config::ConversionConfig;
use crate::error::Latex2DocxError;
use crate::pipeline::compile::{failure_detail, run_tool, RunError};
use std::path::{Path, PathBuf};
use std::process::Output;
use tracing::{debug, warn};

/// Transcript file written beside the input on every export attempt.
pub(crate) const PANDOC_LOG: &str = "pandoc_conversion.log";

/// Convert the image-substituted document to DOCX.
///
/// Returns the size of the produced file in bytes. Both a non-zero pandoc
/// exit and a missing output file are reported as
/// [`Latex2DocxError::ExportFailed`] pointing at the transcript.
pub async fn export_docx(
    images_file: &Path,
    output: &Path,
    source_parent: &Path,
    config: &ConversionConfig,
) -> Result<u64, Latex2DocxError> {
    let log_path = source_parent.join(PANDOC_LOG);
    let resources = resource_paths(source_parent, config);
    let args = pandoc_args(
        images_file,
        output,
        &resources,
        config.toc,
        config.number_sections,
    );
    debug!("Exporting {} via pandoc", output.display());

    let run = match run_tool("pandoc", &args, source_parent, config.tool_timeout_secs).await {
        Ok(run) => run,
        Err(RunError::TimedOut) => {
            return Err(Latex2DocxError::ExportFailed {
                detail: format!(
                    "pandoc did not finish within {}s",
                    config.tool_timeout_secs
                ),
                log: log_path,
            })
        }
        Err(RunError::Spawn(detail)) => {
            return Err(Latex2DocxError::ExportFailed {
                detail,
                log: log_path,
            })
        }
    };

    write_log(&log_path, &run).await;

    if !run.status.success() {
        return Err(Latex2DocxError::ExportFailed {
            detail: failure_detail(&run),
            log: log_path,
        });
    }

    match tokio::fs::metadata(output).await {
        Ok(meta) => Ok(meta.len()),
        Err(_) => Err(Latex2DocxError::ExportFailed {
            detail: format!(
                "pandoc exited successfully but {} was not produced",
                output.display()
            ),
            log: log_path,
        }),
    }
}

/// Directories pandoc may resolve images and includes from: the document's
/// own directory, the rendered asset directory, and any extras from the
/// configuration.
fn resource_paths(source_parent: &Path, config: &ConversionConfig) -> Vec<PathBuf> {
    let mut resources = vec![
        source_parent.to_path_buf(),
        source_parent.join(&config.asset_dir),
    ];
    for extra in &config.resource_paths {
        resources.push(source_parent.join(extra));
    }
    resources
}

/// Pandoc invocation for the substituted document. `--standalone` is
/// implied for docx but spelled out anyway; the resource path uses the
/// unix list separator.
fn pandoc_args(
    input: &Path,
    output: &Path,
    resources: &[PathBuf],
    toc: bool,
    number_sections: bool,
) -> Vec<String> {
    let joined = resources
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(":");
    let mut args = vec![
        input.display().to_string(),
        "-o".to_string(),
        output.display().to_string(),
        "--standalone".to_string(),
        format!("--resource-path={joined}"),
    ];
    if toc {
        args.push("--toc".to_string());
    }
    if number_sections {
        args.push("--number-sections".to_string());
    }
    args
}

async fn write_log(path: &Path, run: &Output) {
    let body = format!(
        "pandoc {}\n\n── stdout ──\n{}\n── stderr ──\n{}\n",
        run.status,
        String::from_utf8_lossy(&run.stdout),
        String::from_utf8_lossy(&run.stderr),
    );
    if let Err(e) = tokio::fs::write(path, body).await {
        warn!("Could not write {}: {}", path.display(), e);
    }
}
