//! Figure correlation: extract TikZ figures into standalone compilation
//! units and swap them for rendered-image references.
//!
//! DOCX has no notion of TikZ, so every `\begin{tikzpicture}...\end{tikzpicture}`
//! span is compiled separately to a PNG and the document gets an
//! `\includegraphics` block in its place. The two sides meet through a
//! shared *identifier*: the PNG is named after it, and the reference points
//! at it, so they must agree exactly.
//!
//! ## Correlation rule
//!
//! Identifiers come from `\label{fig:...}` occurrences, scanned once from
//! the original document in order of appearance. The i-th figure (1-based,
//! document order) takes the i-th label; when the labels run out the name
//! `figure-<i>` is synthesized, ordinal zero-padded to two digits. The rule
//! lives in one place ([`identifier_for`]) and both extraction and
//! substitution call it against the same immutable sequence, which is what
//! keeps the unit files and the references ordinally aligned even for
//! documents that label only some of their figures.
//!
//! Labels are taken as-is: duplicates are kept (the later unit file simply
//! overwrites the earlier one) and labels beyond the figure count are
//! ignored.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

/// Boilerplate preamble shared by every standalone figure unit. Carries the
/// TikZ libraries and math packages the source documents draw on, so a unit
/// compiles without access to the original preamble.
pub const STANDALONE_PREAMBLE: &str = r"\documentclass{standalone}
\usepackage{tikz}
\usetikzlibrary{calc,positioning,patterns,arrows.meta,decorations.pathmorphing}
\usepackage{pgfplots}
\pgfplotsset{compat=1.18}
\usepackage{amsmath,amssymb,bm,siunitx}
";

static RE_FIGURE_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\label\{fig:([^}]+)\}").unwrap());

static RE_TIKZ_ENV: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\\begin\{tikzpicture\}.*?\\end\{tikzpicture\}").unwrap());

/// One standalone compilation unit produced by [`extract_figures`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FigureUnit {
    /// 1-based position in document order.
    pub ordinal: usize,
    /// Correlated name: the matching `fig:` label, or a synthesized
    /// `figure-NN` when no label exists for this ordinal.
    pub identifier: String,
    /// Complete standalone LaTeX source for the unit.
    pub source: String,
}

/// Scan `\label{fig:...}` occurrences in document order.
///
/// Returns the captured names as-is: duplicates are not collapsed and
/// nothing is validated — the label text is the caller's business.
pub fn derive_identifiers(document: &str) -> Vec<String> {
    RE_FIGURE_LABEL
        .captures_iter(document)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// The canonical ordinal → identifier rule.
///
/// `ordinal` is 1-based. Returns the label at that position when one
/// exists, else `figure-<ordinal>` with the ordinal zero-padded to two
/// digits. Extraction and substitution both resolve names through this
/// function, against the same sequence, so the two passes cannot drift.
pub fn identifier_for(ordinal: usize, identifiers: &[String]) -> String {
    debug_assert!(ordinal >= 1, "figure ordinals are 1-based");
    identifiers
        .get(ordinal - 1)
        .cloned()
        .unwrap_or_else(|| format!("figure-{ordinal:02}"))
}

/// Extract every figure body into a standalone unit, correlated by ordinal.
///
/// Output order equals document order. Bodies are wrapped verbatim in
/// [`STANDALONE_PREAMBLE`] boilerplate; nothing inside a body is rewritten.
pub fn extract_figures(document: &str, identifiers: &[String]) -> Vec<FigureUnit> {
    figure_spans(document)
        .iter()
        .enumerate()
        .map(|(idx, span)| {
            let ordinal = idx + 1;
            FigureUnit {
                ordinal,
                identifier: identifier_for(ordinal, identifiers),
                source: standalone_unit(span.as_str()),
            }
        })
        .collect()
}

/// Replace every figure body with a centered `\includegraphics` reference
/// to `<asset_dir>/<identifier>.png`, resolving identifiers with the same
/// rule as [`extract_figures`]. Returns the new text and the replacement
/// count, which always equals the number of matched bodies — whether the
/// PNG actually exists on disk is not this function's concern.
pub fn substitute_figures(
    document: &str,
    identifiers: &[String],
    asset_dir: &str,
    image_width: f32,
) -> (String, usize) {
    let spans = figure_spans(document);
    let mut out = String::with_capacity(document.len());
    let mut last_end = 0usize;

    for (idx, span) in spans.iter().enumerate() {
        let ordinal = idx + 1;
        out.push_str(&document[last_end..span.start()]);
        out.push_str(&asset_reference(
            &identifier_for(ordinal, identifiers),
            asset_dir,
            image_width,
        ));
        last_end = span.end();
    }
    out.push_str(&document[last_end..]);

    (out, spans.len())
}

/// The figure spans of `document`, in order. A `\begin{tikzpicture}`
/// without a matching end never produces a span; it is logged and the text
/// flows through the callers untouched.
fn figure_spans(document: &str) -> Vec<regex::Match<'_>> {
    let spans: Vec<_> = RE_TIKZ_ENV.find_iter(document).collect();
    let begins = document.matches("\\begin{tikzpicture}").count();
    if begins > spans.len() {
        warn!(
            "{} tikzpicture environment(s) without a matching \\end left untouched",
            begins - spans.len()
        );
    }
    spans
}

fn standalone_unit(body: &str) -> String {
    format!("{STANDALONE_PREAMBLE}\n\\begin{{document}}\n{body}\n\\end{{document}}\n")
}

fn asset_reference(identifier: &str, asset_dir: &str, image_width: f32) -> String {
    format!(
        "\\begin{{center}}\n\\includegraphics[width={image_width}\\textwidth]{{{asset_dir}/{identifier}.png}}\n\\end{{center}}"
    )
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_FIGURE_DOC: &str = r"\documentclass{article}
\begin{document}
\begin{figure}[h]
  \begin{tikzpicture}
    \draw (0,0) circle (1);
  \end{tikzpicture}
  \caption{A circle}
  \label{fig:circle}
\end{figure}
Some text between figures.
\begin{figure}[h]
  \begin{tikzpicture}
    \draw (0,0) rectangle (2,1);
  \end{tikzpicture}
  \caption{Unlabeled}
\end{figure}
\end{document}
";

    #[test]
    fn test_derive_identifiers_in_order() {
        let doc = r"\label{fig:energy} text \label{fig:momentum} \label{fig:phase}";
        assert_eq!(
            derive_identifiers(doc),
            vec!["energy", "momentum", "phase"]
        );
    }

    #[test]
    fn test_derive_identifiers_none() {
        assert!(derive_identifiers(r"\label{eq:euler} no figure labels").is_empty());
    }

    #[test]
    fn test_derive_identifiers_keeps_duplicates() {
        let doc = r"\label{fig:dup} \label{fig:dup}";
        assert_eq!(derive_identifiers(doc), vec!["dup", "dup"]);
    }

    #[test]
    fn test_identifier_for_prefers_label() {
        let ids = vec!["circle".to_string()];
        assert_eq!(identifier_for(1, &ids), "circle");
    }

    #[test]
    fn test_identifier_for_synthesizes_zero_padded() {
        let ids = vec!["circle".to_string()];
        assert_eq!(identifier_for(2, &ids), "figure-02");
        assert_eq!(identifier_for(10, &ids), "figure-10");
    }

    #[test]
    fn test_extract_none() {
        assert!(extract_figures("no figures at all", &[]).is_empty());
    }

    #[test]
    fn test_extract_wraps_standalone() {
        let ids = derive_identifiers(TWO_FIGURE_DOC);
        let units = extract_figures(TWO_FIGURE_DOC, &ids);
        assert_eq!(units.len(), 2);

        let unit = &units[0];
        assert!(unit.source.starts_with("\\documentclass{standalone}\n"));
        assert!(unit.source.contains("\\usetikzlibrary{calc,positioning,patterns"));
        assert!(unit.source.contains("\\pgfplotsset{compat=1.18}"));
        assert!(unit.source.contains("\\draw (0,0) circle (1);"));
        assert!(unit.source.ends_with("\\end{document}\n"));
    }

    #[test]
    fn test_extract_correlates_labels_by_ordinal() {
        let ids = derive_identifiers(TWO_FIGURE_DOC);
        let units = extract_figures(TWO_FIGURE_DOC, &ids);
        assert_eq!(units[0].identifier, "circle");
        assert_eq!(units[0].ordinal, 1);
        assert_eq!(units[1].identifier, "figure-02");
        assert_eq!(units[1].ordinal, 2);
    }

    #[test]
    fn test_extract_no_labels_synthesizes_all() {
        let doc = "\\begin{tikzpicture}a\\end{tikzpicture}\
                   \\begin{tikzpicture}b\\end{tikzpicture}\
                   \\begin{tikzpicture}c\\end{tikzpicture}";
        let units = extract_figures(doc, &[]);
        let names: Vec<_> = units.iter().map(|u| u.identifier.as_str()).collect();
        assert_eq!(names, vec!["figure-01", "figure-02", "figure-03"]);
    }

    #[test]
    fn test_extract_excess_labels_unused() {
        let ids = vec!["one".into(), "two".into(), "three".into()];
        let doc = r"\begin{tikzpicture}x\end{tikzpicture}";
        let units = extract_figures(doc, &ids);
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].identifier, "one");
    }

    #[test]
    fn test_substitute_replaces_every_body() {
        let ids = derive_identifiers(TWO_FIGURE_DOC);
        let (text, count) = substitute_figures(TWO_FIGURE_DOC, &ids, "tikz_png", 0.8);
        assert_eq!(count, 2);
        assert!(!text.contains("tikzpicture"));
        assert!(text.contains(
            "\\includegraphics[width=0.8\\textwidth]{tikz_png/circle.png}"
        ));
        assert!(text.contains(
            "\\includegraphics[width=0.8\\textwidth]{tikz_png/figure-02.png}"
        ));
        // Surrounding structure is untouched.
        assert!(text.contains("\\caption{A circle}"));
        assert!(text.contains("Some text between figures."));
    }

    #[test]
    fn test_substitute_references_in_document_order() {
        let ids = derive_identifiers(TWO_FIGURE_DOC);
        let (text, _) = substitute_figures(TWO_FIGURE_DOC, &ids, "tikz_png", 0.8);
        let first = text.find("tikz_png/circle.png").unwrap();
        let second = text.find("tikz_png/figure-02.png").unwrap();
        assert!(first < second);
    }

    #[test]
    fn test_substitute_centers_reference() {
        let doc = r"\begin{tikzpicture}x\end{tikzpicture}";
        let (text, _) = substitute_figures(doc, &[], "tikz_png", 0.8);
        assert_eq!(
            text,
            "\\begin{center}\n\\includegraphics[width=0.8\\textwidth]{tikz_png/figure-01.png}\n\\end{center}"
        );
    }

    #[test]
    fn test_substitute_custom_width_and_dir() {
        let doc = r"\begin{tikzpicture}x\end{tikzpicture}";
        let (text, _) = substitute_figures(doc, &[], "assets", 0.5);
        assert!(text.contains("[width=0.5\\textwidth]{assets/figure-01.png}"));
    }

    #[test]
    fn test_substitute_zero_figures() {
        let doc = "plain paragraph";
        let (text, count) = substitute_figures(doc, &[], "tikz_png", 0.8);
        assert_eq!(text, doc);
        assert_eq!(count, 0);
    }

    #[test]
    fn test_extract_and_substitute_stay_aligned() {
        // One labeled, one unlabeled, one labeled again via a second label.
        let doc = r"\label{fig:a}
\begin{tikzpicture}1\end{tikzpicture}
\begin{tikzpicture}2\end{tikzpicture}
\begin{tikzpicture}3\end{tikzpicture}
\label{fig:b}";
        let ids = derive_identifiers(doc);
        let units = extract_figures(doc, &ids);
        let (text, count) = substitute_figures(doc, &ids, "tikz_png", 0.8);

        assert_eq!(count, units.len());
        for unit in &units {
            assert!(
                text.contains(&format!("tikz_png/{}.png", unit.identifier)),
                "no reference for unit {}",
                unit.identifier
            );
        }
        // Label order, not proximity: figure 2 takes the second label.
        assert_eq!(units[1].identifier, "b");
        assert_eq!(units[2].identifier, "figure-03");
    }

    #[test]
    fn test_unterminated_environment_passes_through() {
        let doc = "\\begin{tikzpicture}ok\\end{tikzpicture}\n\\begin{tikzpicture} dangling";
        let ids: Vec<String> = Vec::new();
        let units = extract_figures(doc, &ids);
        assert_eq!(units.len(), 1);

        let (text, count) = substitute_figures(doc, &ids, "tikz_png", 0.8);
        assert_eq!(count, 1);
        assert!(text.ends_with("\\begin{tikzpicture} dangling"));
    }
}
