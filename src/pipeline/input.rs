//! Input resolution: validate and read the source document.
//!
//! ## Why read the whole file up front?
//!
//! Every stage scans the full text (labels, figure bodies, `\ab` macros),
//! and the identifier sequence must be derived from the pristine source
//! before anything is rewritten, so the document is read exactly once into
//! memory and shared from there. Validation happens before any stage runs:
//! a missing, unreadable or non-text input is fatal immediately rather than
//! halfway through a compile.

use crate::error::Latex2DocxError;
use crate::output::DocumentScan;
use crate::pipeline::{figures, preprocess};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::debug;

/// The resolved source document: path plus full text.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub path: PathBuf,
    pub text: String,
}

impl SourceDocument {
    /// Directory the input lives in. Working directories and intermediate
    /// files are created beside the input, never in the process CWD.
    pub fn parent(&self) -> &Path {
        self.path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
    }

    /// File stem used to derive intermediate names
    /// (`<stem>_pandoc.tex`, `<stem>_with_images.tex`).
    pub fn stem(&self) -> &str {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("input")
    }
}

/// Validate and read the input file.
///
/// Checks, in order: the path exists, the process may read it, and the
/// contents are UTF-8 text.
pub async fn read_document(path: &Path) -> Result<SourceDocument, Latex2DocxError> {
    let path = path.to_path_buf();

    if !path.exists() {
        return Err(Latex2DocxError::InputNotFound { path });
    }

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Latex2DocxError::PermissionDenied { path });
        }
        Err(_) => return Err(Latex2DocxError::InputNotFound { path }),
    };

    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(_) => return Err(Latex2DocxError::InputNotUtf8 { path }),
    };

    debug!("Read {} bytes from {}", text.len(), path.display());
    Ok(SourceDocument { path, text })
}

// Preamble metadata is sniffed with plain first-match regexes; `[^}]*`
// truncates at nested braces, which is fine for an inspection view.

static RE_DOCUMENTCLASS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\documentclass(?:\[[^\]]*\])?\{([^}]+)\}").unwrap());

static RE_TITLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\title\{([^}]*)\}").unwrap());

static RE_AUTHOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\author\{([^}]*)\}").unwrap());

fn first_capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .map(|caps| caps[1].trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Non-destructive document inspection backing [`crate::inspect`] and the
/// CLI's `--inspect-only` mode: preamble metadata, figure/label counts, and
/// the identifier each figure ordinal will resolve to.
pub fn scan_document(text: &str) -> DocumentScan {
    let labels = figures::derive_identifiers(text);
    let units = figures::extract_figures(text, &labels);

    DocumentScan {
        documentclass: first_capture(&RE_DOCUMENTCLASS, text),
        title: first_capture(&RE_TITLE, text),
        author: first_capture(&RE_AUTHOR, text),
        figures: units.len(),
        identifiers: units.into_iter().map(|u| u.identifier).collect(),
        labels,
        delimiter_macros: preprocess::count_ab_macros(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_read_document_not_found() {
        let err = read_document(Path::new("/no/such/file.tex"))
            .await
            .unwrap_err();
        assert!(matches!(err, Latex2DocxError::InputNotFound { .. }));
    }

    #[tokio::test]
    async fn test_read_document_returns_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.tex");
        std::fs::write(&path, "\\documentclass{article}\n").unwrap();

        let doc = read_document(&path).await.unwrap();
        assert_eq!(doc.text, "\\documentclass{article}\n");
        assert_eq!(doc.stem(), "doc");
        assert_eq!(doc.parent(), dir.path());
    }

    #[tokio::test]
    async fn test_read_document_rejects_non_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("binary.tex");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(&[0xff, 0xfe, 0x00, 0x41]).unwrap();
        drop(f);

        let err = read_document(&path).await.unwrap_err();
        assert!(matches!(err, Latex2DocxError::InputNotUtf8 { .. }));
    }

    #[test]
    fn test_parent_of_bare_filename_is_dot() {
        let doc = SourceDocument {
            path: PathBuf::from("main.tex"),
            text: String::new(),
        };
        assert_eq!(doc.parent(), Path::new("."));
        assert_eq!(doc.stem(), "main");
    }

    #[test]
    fn test_scan_document() {
        let text = r"\documentclass[a4paper]{article}
\title{Waves and Optics}
\author{R. Suzuki}
\begin{document}
\ab(x) and \ab|y|
\begin{tikzpicture}\draw;\end{tikzpicture}
\label{fig:wavefront}
\begin{tikzpicture}\draw;\end{tikzpicture}
\end{document}
";
        let scan = scan_document(text);
        assert_eq!(scan.documentclass.as_deref(), Some("article"));
        assert_eq!(scan.title.as_deref(), Some("Waves and Optics"));
        assert_eq!(scan.author.as_deref(), Some("R. Suzuki"));
        assert_eq!(scan.figures, 2);
        assert_eq!(scan.labels, vec!["wavefront"]);
        assert_eq!(scan.identifiers, vec!["wavefront", "figure-02"]);
        assert_eq!(scan.delimiter_macros, 2);
    }

    #[test]
    fn test_scan_document_empty_title_is_none() {
        let scan = scan_document(r"\documentclass{article}\title{}");
        assert!(scan.title.is_none());
        assert_eq!(scan.figures, 0);
        assert!(scan.labels.is_empty());
    }
}
