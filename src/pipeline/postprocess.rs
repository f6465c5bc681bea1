//! Post-processing: deterministic cleanup of recognizer output.
//!
//! Each engine leaves its own residue: tesseract ends every page with a
//! form feed, vision models sometimes wrap their answer in a code fence
//! despite the prompt, and both can emit CRLF line endings, zero-width
//! characters and long runs of blank lines. The rules below remove that
//! residue without touching the words themselves.
//!
//! ## Rule Order
//!
//! Fences are stripped first, on the raw input, so the fence regex sees the
//! answer exactly as the model produced it. Line endings are normalised
//! before any line-based rule runs.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all post-processing rules to raw recognizer output.
///
/// Rules (applied in order):
/// 1. Strip an outer code fence around the whole answer
/// 2. Normalise line endings (CRLF / CR → LF)
/// 3. Replace form feeds with line breaks
/// 4. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 5. Trim trailing whitespace per line
/// 6. Collapse runs of blank lines to a single blank line
/// 7. Trim leading and trailing blank space
pub fn clean_text(input: &str) -> String {
    let s = strip_outer_fence(input);
    let s = normalise_line_endings(&s);
    let s = replace_form_feeds(&s);
    let s = remove_invisible_chars(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    s.trim().to_string()
}

// ── Rule 1: Strip outer fence ────────────────────────────────────────────────

static RE_OUTER_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^```(?:text|plaintext|markdown)?\r?\n(.*?)\r?\n```\s*$")
        .expect("static regex")
});

fn strip_outer_fence(input: &str) -> String {
    match RE_OUTER_FENCE.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Form feeds ──────────────────────────────────────────────────────

fn replace_form_feeds(input: &str) -> String {
    input.replace('\u{000C}', "\n")
}

// ── Rule 4: Invisible characters ─────────────────────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 5: Trailing whitespace ──────────────────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 6: Blank-line runs ──────────────────────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{3,}").expect("static regex"));

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}
