//! Post-processing: deterministic cleanup of page text.
//!
//! Page text arrives from two very different sources. The pdfium text layer
//! brings CRLF line endings, soft hyphens, and runs of blank lines from
//! layout whitespace. OCR output occasionally comes wrapped in code fences
//! despite the prompt. The same rule chain cleans both so the joined document
//! looks uniform.
//!
//! ## Rule Order
//!
//! Fences are stripped before line endings are normalised (the fence regex
//! expects `\n`), and blank-line collapsing runs after trailing whitespace is
//! trimmed so whitespace-only lines count as blank.

use once_cell::sync::Lazy;
use regex::Regex;

/// Separator placed between consecutive pages in the joined text.
pub const PAGE_SEPARATOR: &str = "\n\n";

/// Apply all cleanup rules to one page's text.
///
/// Rules (applied in order):
/// 1. Strip outer code fences
/// 2. Normalise line endings (CRLF / CR → LF)
/// 3. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 4. Trim trailing whitespace per line
/// 5. Collapse 3+ consecutive blank lines down to one
/// 6. Trim leading and trailing blank lines
pub fn clean_page_text(input: &str) -> String {
    let s = strip_code_fences(input);
    let s = normalise_line_endings(&s);
    let s = remove_invisible_chars(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    s.trim_matches('\n').to_string()
}

/// Join cleaned pages, skipping pages that ended up empty.
///
/// The result ends with exactly one newline, or is empty when every page was.
pub fn join_pages<I, S>(pages: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let joined = pages
        .into_iter()
        .filter(|p| !p.as_ref().is_empty())
        .collect::<Vec<_>>();
    if joined.is_empty() {
        return String::new();
    }
    let mut out = joined
        .iter()
        .map(|p| p.as_ref())
        .collect::<Vec<_>>()
        .join(PAGE_SEPARATOR);
    out.push('\n');
    out
}

// ── Rule 1: Strip outer code fences ─────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z]*\r?\n(.*)\r?\n```\s*$").unwrap());

fn strip_code_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

// ── Rule 2: Normalise line endings ──────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 4: Trim trailing whitespace per line ───────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 5: Collapse excessive blank lines ──────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}
