//! Pre-processing: rewrite source TeX into a dialect pandoc can digest.
//!
//! ## Why is pre-processing necessary?
//!
//! The documents this tool targets lean on packages that only work under
//! LuaLaTeX or that pandoc's LaTeX reader does not understand:
//!
//! - `physics2`'s `\ab(...)` auto-bracket macro (pandoc passes `\ab` through
//!   as literal text, which then renders verbatim in the DOCX)
//! - the `jlreq` Japanese document class and `luatexja`
//! - `\tikzexternalize`, which expects a shell-escape compilation step
//! - custom equation-tag commands (`\daggnum`) defined in the preamble
//!
//! The heavy lifting is the `\ab` rewrite: every `\ab(...)`, `\ab|...|` and
//! `\ab\{...\}` becomes the equivalent `\left ... \right` pair, which every
//! TeX dialect understands. Operands nest arbitrarily, so matching is a
//! linear scan with a depth counter per shape rather than a regex; see
//! [`DelimiterShape`]. The remaining rules are cheap line-local regex
//! substitutions.
//!
//! ## Rule Order
//!
//! Delimiters are rewritten first so the scan sees the untouched source;
//! preamble simplification and tag expansion run afterwards and are
//! order-independent among themselves.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

/// Upper bound on fixed-point passes of the delimiter rewriter. A pass that
/// rewrites nothing ends the loop, so this only triggers on pathological
/// input; hitting it logs a warning and returns the best-effort text.
const MAX_REWRITE_PASSES: u32 = 50;

/// The three delimiter shapes `\ab` accepts.
///
/// Each variant knows its opener token, its sized replacement pair, and how
/// to find the matching closer. Keeping the shape data here means the scan
/// and rewrite logic exist exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelimiterShape {
    /// `\ab( ... )` → `\left( ... \right)`
    Paren,
    /// `\ab| ... |` → `\left| ... \right|`
    Pipe,
    /// `\ab\{ ... \}` → `\left\{ ... \right\}`
    Brace,
}

impl DelimiterShape {
    /// All shapes, in the order a pass sweeps them.
    pub const ALL: [DelimiterShape; 3] =
        [DelimiterShape::Paren, DelimiterShape::Pipe, DelimiterShape::Brace];

    /// The literal token that opens a rewritable span.
    pub fn opener(self) -> &'static str {
        match self {
            DelimiterShape::Paren => "\\ab(",
            DelimiterShape::Pipe => "\\ab|",
            DelimiterShape::Brace => "\\ab\\{",
        }
    }

    /// The sized delimiter emitted in place of the opener.
    pub fn left(self) -> &'static str {
        match self {
            DelimiterShape::Paren => "\\left(",
            DelimiterShape::Pipe => "\\left|",
            DelimiterShape::Brace => "\\left\\{",
        }
    }

    /// The sized delimiter emitted in place of the closer.
    pub fn right(self) -> &'static str {
        match self {
            DelimiterShape::Paren => "\\right)",
            DelimiterShape::Pipe => "\\right|",
            DelimiterShape::Brace => "\\right\\}",
        }
    }

    fn closer_len(self) -> usize {
        match self {
            DelimiterShape::Paren | DelimiterShape::Pipe => 1,
            DelimiterShape::Brace => 2,
        }
    }

    /// Byte offset of the matching closer in `rest` — the text immediately
    /// following an opener — or `None` when the span is unterminated or the
    /// operand would be empty.
    ///
    /// All delimiter tokens are ASCII, so the scan runs over bytes; offsets
    /// returned always sit on character boundaries. A backslash escapes the
    /// following character: `\(` and `\)` do not count towards paren depth
    /// (while the `(` of `\left(` still does), and for the brace shape the
    /// *escaped* pair `\{` / `\}` is what counts, with plain `{` `}` TeX
    /// groups ignored.
    fn find_operand_end(self, rest: &str) -> Option<usize> {
        let bytes = rest.as_bytes();
        match self {
            DelimiterShape::Paren => {
                let mut depth = 1usize;
                let mut i = 0usize;
                while i < bytes.len() {
                    match bytes[i] {
                        b'\\' => {
                            i += 2;
                            continue;
                        }
                        b'(' => depth += 1,
                        b')' => {
                            depth -= 1;
                            if depth == 0 {
                                return if i == 0 { None } else { Some(i) };
                            }
                        }
                        _ => {}
                    }
                    i += 1;
                }
                None
            }
            DelimiterShape::Pipe => {
                // Pipes are self-delimiting: the next unescaped `|` closes.
                let mut i = 0usize;
                while i < bytes.len() {
                    match bytes[i] {
                        b'\\' => {
                            i += 2;
                            continue;
                        }
                        b'|' => return if i == 0 { None } else { Some(i) },
                        _ => {}
                    }
                    i += 1;
                }
                None
            }
            DelimiterShape::Brace => {
                let mut depth = 1usize;
                let mut i = 0usize;
                while i < bytes.len() {
                    if bytes[i] == b'\\' && i + 1 < bytes.len() {
                        match bytes[i + 1] {
                            b'{' => depth += 1,
                            b'}' => {
                                depth -= 1;
                                if depth == 0 {
                                    return if i == 0 { None } else { Some(i) };
                                }
                            }
                            _ => {}
                        }
                        i += 2;
                    } else {
                        i += 1;
                    }
                }
                None
            }
        }
    }
}

/// Result of [`rewrite_ab_delimiters`].
#[derive(Debug, Clone)]
pub struct RewriteOutcome {
    /// The rewritten document text.
    pub text: String,
    /// Number of passes performed, including the final no-change pass.
    /// A document with no `\ab` macros reports 1.
    pub passes: u32,
    /// Total `\ab` instances rewritten across all passes.
    pub rewritten: usize,
    /// `false` only when the pass budget ran out before convergence.
    pub reached_fixed_point: bool,
}

/// Result of [`preprocess_document`]: the full stage output.
#[derive(Debug, Clone)]
pub struct PreprocessedDocument {
    /// Document text after delimiter rewriting, preamble simplification and
    /// tag expansion.
    pub text: String,
    /// Pass count reported by the delimiter rewriter.
    pub rewrite_passes: u32,
    /// `\ab` instances rewritten.
    pub macros_rewritten: usize,
    /// Whether the rewriter converged within its pass budget.
    pub reached_fixed_point: bool,
}

/// Run the whole pre-processing stage: delimiter rewriting, preamble
/// simplification, tag expansion. Logs a warning when the `\left(` /
/// `\right)` counts of the result disagree — a strong hint that the source
/// contained malformed spans that were passed through.
pub fn preprocess_document(input: &str) -> PreprocessedDocument {
    let rewrite = rewrite_ab_delimiters(input);
    let text = simplify_preamble(&rewrite.text);
    let text = expand_tag_macros(&text);

    let (left, right) = sized_delimiter_balance(&text, DelimiterShape::Paren);
    if left != right {
        warn!(
            "\\left( and \\right) counts disagree after rewriting ({} vs {})",
            left, right
        );
    }
    debug!(
        "pre-processing done: {} \\ab instance(s) rewritten in {} pass(es)",
        rewrite.rewritten, rewrite.passes
    );

    PreprocessedDocument {
        text,
        rewrite_passes: rewrite.passes,
        macros_rewritten: rewrite.rewritten,
        reached_fixed_point: rewrite.reached_fixed_point,
    }
}

/// Rewrite every `\ab` delimiter macro into its sized `\left ... \right`
/// form.
///
/// Each pass sweeps the document once per shape, left to right. A found
/// opener is resolved by scanning for its closer with the shape's rule; the
/// operand is rewritten recursively before being wrapped, so inner macros
/// resolve within their enclosing operand and `\ab(x + \ab(y+z))` comes out
/// as `\left(x + \left(y+z\right)\right)`. Openers with no closer (or an
/// empty operand) are emitted untouched and logged; they are never an error.
///
/// Passes repeat until one rewrites nothing, bounded by a budget of
/// [`MAX_REWRITE_PASSES`].
pub fn rewrite_ab_delimiters(input: &str) -> RewriteOutcome {
    let mut text = input.to_string();
    let mut rewritten = 0usize;
    let mut passes = 0u32;

    while passes < MAX_REWRITE_PASSES {
        passes += 1;
        let mut changed = 0usize;
        for shape in DelimiterShape::ALL {
            let (next, n) = rewrite_shape(&text, shape);
            text = next;
            changed += n;
        }
        if changed == 0 {
            return RewriteOutcome {
                text,
                passes,
                rewritten,
                reached_fixed_point: true,
            };
        }
        rewritten += changed;
    }

    warn!(
        "delimiter rewriting did not converge within {} passes; returning best-effort text",
        MAX_REWRITE_PASSES
    );
    RewriteOutcome {
        text,
        passes,
        rewritten,
        reached_fixed_point: false,
    }
}

/// One left-to-right sweep for a single shape. Returns the rewritten text
/// and the number of instances rewritten (including recursively resolved
/// inner ones).
fn rewrite_shape(input: &str, shape: DelimiterShape) -> (String, usize) {
    let opener = shape.opener();
    let mut out = String::with_capacity(input.len() + 32);
    let mut rest = input;
    let mut rewritten = 0usize;

    while let Some(pos) = rest.find(opener) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos + opener.len()..];
        match shape.find_operand_end(tail) {
            Some(end) => {
                let (operand, inner) = rewrite_shape(&tail[..end], shape);
                out.push_str(shape.left());
                out.push_str(&operand);
                out.push_str(shape.right());
                rewritten += 1 + inner;
                rest = &tail[end + shape.closer_len()..];
            }
            None => {
                // Unterminated or empty span: pass the opener through and
                // keep scanning after it.
                debug!("unmatched {} opener left in place", opener);
                out.push_str(opener);
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    (out, rewritten)
}

/// Occurrences of the sized open/close tokens for one shape, e.g.
/// `(\left(, \right))` counts for [`DelimiterShape::Paren`]. Equal counts
/// are expected after a clean rewrite of balanced input.
pub fn sized_delimiter_balance(text: &str, shape: DelimiterShape) -> (usize, usize) {
    (
        text.matches(shape.left()).count(),
        text.matches(shape.right()).count(),
    )
}

/// Occurrences of rewritable `\ab` openers across all shapes.
pub fn count_ab_macros(text: &str) -> usize {
    DelimiterShape::ALL
        .iter()
        .map(|shape| text.matches(shape.opener()).count())
        .sum()
}

// ── Preamble simplification ──────────────────────────────────────────────────
//
// The source documents are written for LuaLaTeX with Japanese typesetting
// (jlreq + luatexja) and externalized TikZ. None of that survives the trip
// through pandoc, so the offending lines are dropped or swapped for portable
// equivalents.

/// `\usepackage{physics2}` — defines `\ab`; obsolete once rewriting is done.
static RE_PHYSICS2: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\usepackage\{physics2\}\n?").unwrap());

/// `\usephysicsmodule{...}` with any module list, since the package is gone.
static RE_PHYSICS_MODULE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\usephysicsmodule\{[^}]*\}\n?").unwrap());

/// `\tikzexternalize` and everything after it on the line.
static RE_TIKZ_EXTERNALIZE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\tikzexternalize.*\n?").unwrap());

/// `\documentclass[...]{jlreq}` with any option list → plain article.
static RE_JLREQ_CLASS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\documentclass(?:\[[^\]]*\])?\{jlreq\}").unwrap());

static RE_LUATEXJA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\usepackage\{luatexja\}\n?").unwrap());

/// jlreq heading tweaks; meaningless for the article class.
static RE_MODIFY_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\ModifyHeading.*\n?").unwrap());

/// Remove or replace preamble constructs the DOCX export cannot process.
pub fn simplify_preamble(input: &str) -> String {
    let s = RE_PHYSICS2.replace_all(input, "");
    let s = RE_PHYSICS_MODULE.replace_all(&s, "");
    let s = RE_TIKZ_EXTERNALIZE.replace_all(&s, "");
    let s = RE_JLREQ_CLASS.replace_all(&s, r"\documentclass{article}");
    let s = RE_LUATEXJA.replace_all(&s, "");
    let s = RE_MODIFY_HEADING.replace_all(&s, "");
    s.into_owned()
}

// ── Equation-tag expansion ───────────────────────────────────────────────────
//
// The documents define `\daggnum{X}` to typeset dagger-starred equation
// numbers, and tag primed/daggered variants via `\tag*{${(X)}^\prime$}`.
// pandoc drops `\tag*` with custom commands inside, so the variants are
// flattened into plain-text `\tag{...}` forms that survive as equation
// labels in the DOCX.

static RE_DAGGNUM_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\tag\*\{\\daggnum\{([^}]+)\}\}").unwrap());

static RE_DAGGNUM_DEF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\newcommand\{\\daggnum\}.*\n?").unwrap());

static RE_PRIME_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\tag\*\{\$\{(\([^)]+\))\}\^\\prime\$\}").unwrap());

static RE_DAGGER_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\tag\*\{\$\{(\([^)]+\))\}\^\\dagger\$\}").unwrap());

/// Flatten custom equation-tag macros into plain `\tag{...}` forms.
pub fn expand_tag_macros(input: &str) -> String {
    let s = RE_DAGGNUM_TAG.replace_all(input, r"\tag{(${1})-dagger}");
    let s = RE_DAGGNUM_DEF.replace_all(&s, "");
    let s = RE_PRIME_TAG.replace_all(&s, r"\tag{${1}-prime}");
    let s = RE_DAGGER_TAG.replace_all(&s, r"\tag{${1}-dagger}");
    s.into_owned()
}

// ── Tests ────────────────────────────────────────────────────────────────────
