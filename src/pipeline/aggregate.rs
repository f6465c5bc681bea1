//! Aggregation: one labelled text block per recognised page.

use crate::output::PageText;

/// Format one page block: `"{label} {page_num}:\n{trimmed text}\n"`.
pub fn format_page(label: &str, page_num: usize, text: &str) -> String {
    format!("{} {}:\n{}\n", label, page_num, text.trim())
}

/// Format every successful page, in page order.
///
/// Failed pages (those carrying an error) are left out. An empty result is
/// valid here; callers decide whether that is an error.
pub fn aggregate(label: &str, pages: &[PageText]) -> Vec<String> {
    let mut ok: Vec<&PageText> = pages.iter().filter(|p| p.is_ok()).collect();
    ok.sort_by_key(|p| p.page_num);
    ok.into_iter()
        .map(|p| format_page(label, p.page_num, &p.text))
        .collect()
}
