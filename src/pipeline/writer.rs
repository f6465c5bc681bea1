//! Output document assembly with `printpdf` 0.8.
//!
//! Every text entry starts on a fresh page. Lines are word-wrapped to the
//! usable width using an average Helvetica glyph width, and a page that
//! fills up down to the bottom margin continues on the next one. Line
//! placement mirrors a classic cell layout: each line owns a
//! `line_height_mm` tall cell and its baseline sits at half the cell height
//! plus 0.3 × the font size.
//!
//! The built-in Helvetica is a WinAnsi (CP1252) font: Latin-1 letters such
//! as `á`, `ñ` or `¿` are written as-is, anything outside that set becomes
//! `?`.

use crate::config::DocumentLayout;
use crate::error::ExtractError;
use crate::output::WrittenDocument;
use printpdf::{
    BuiltinFont, Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Point, Pt, TextItem,
};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

const PT_TO_MM: f32 = 0.3528;

/// Average Helvetica glyph advance as a fraction of the font size.
const AVG_CHAR_WIDTH_EM: f32 = 0.5;

/// Prefix of files created by [`persist_document`].
pub const PERSISTED_FILE_PREFIX: &str = "texto_extraido-";

/// Lay out `texts` into a PDF held in memory.
///
/// Fails with [`ExtractError::EmptyDocument`] when there is nothing to
/// write; a PDF without pages is never produced.
#[instrument(skip_all, fields(entries = texts.len()))]
pub fn write_document(
    texts: &[String],
    layout: &DocumentLayout,
) -> Result<WrittenDocument, ExtractError> {
    if texts.is_empty() {
        return Err(ExtractError::EmptyDocument);
    }
    layout.validate()?;

    let max_chars = max_chars_per_line(layout);
    let lines_per_page = lines_per_page(layout);
    debug!(max_chars, lines_per_page, "Text layout parameters");

    let mut pages: Vec<PdfPage> = Vec::new();
    for text in texts {
        let lines = wrap_text(text.trim_end_matches('\n'), max_chars);
        if lines.is_empty() {
            pages.push(blank_page(layout));
            continue;
        }
        for chunk in lines.chunks(lines_per_page) {
            pages.push(text_page(chunk, layout));
        }
    }

    let page_count = pages.len();
    let mut doc = PdfDocument::new(&layout.title);
    doc.with_pages(pages);

    let mut warnings: Vec<PdfWarnMsg> = Vec::new();
    let bytes = doc.save(&PdfSaveOptions::default(), &mut warnings);
    for w in &warnings {
        warn!("printpdf: {:?}", w);
    }
    if bytes.is_empty() {
        return Err(ExtractError::DocumentAssemblyFailed(
            "printpdf produced an empty document".into(),
        ));
    }

    info!(
        "Assembled output PDF: {} entries → {} pages, {} bytes",
        texts.len(),
        page_count,
        bytes.len()
    );
    Ok(WrittenDocument { bytes, page_count })
}

/// Write `doc` to `path` atomically (temp file + rename).
pub async fn write_to_file(doc: &WrittenDocument, path: &Path) -> Result<(), ExtractError> {
    let write_err = |source| ExtractError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("pdf.tmp");
    tokio::fs::write(&tmp_path, &doc.bytes)
        .await
        .map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(write_err)?;

    info!("Wrote {} ({} pages)", path.display(), doc.page_count);
    Ok(())
}

/// Store `doc` under a fresh unique name (`texto_extraido-XXXXXX.pdf`).
///
/// The file goes to `dir`, or the system temp directory when `None`, and is
/// kept after return; removing it is up to the caller.
pub fn persist_document(doc: &WrittenDocument, dir: Option<&Path>) -> Result<PathBuf, ExtractError> {
    use std::io::Write;

    let mut builder = tempfile::Builder::new();
    builder.prefix(PERSISTED_FILE_PREFIX).suffix(".pdf");
    let target_dir = dir
        .map(Path::to_path_buf)
        .unwrap_or_else(std::env::temp_dir);

    let mut file = builder
        .tempfile_in(&target_dir)
        .map_err(|source| ExtractError::OutputWriteFailed {
            path: target_dir.clone(),
            source,
        })?;
    file.write_all(&doc.bytes)
        .and_then(|_| file.flush())
        .map_err(|source| ExtractError::OutputWriteFailed {
            path: file.path().to_path_buf(),
            source,
        })?;

    let (_file, path) = file.keep().map_err(|e| ExtractError::OutputWriteFailed {
        path: target_dir.clone(),
        source: e.error,
    })?;

    debug!("Persisted output PDF to {}", path.display());
    Ok(path)
}

fn max_chars_per_line(layout: &DocumentLayout) -> usize {
    let avg_char_width_mm = AVG_CHAR_WIDTH_EM * layout.font_size_pt * PT_TO_MM;
    ((layout.usable_width_mm() / avg_char_width_mm) as usize).max(1)
}

fn lines_per_page(layout: &DocumentLayout) -> usize {
    ((layout.usable_height_mm() / layout.line_height_mm) as usize).max(1)
}

fn blank_page(layout: &DocumentLayout) -> PdfPage {
    PdfPage::new(
        Mm(layout.page_width_mm),
        Mm(layout.page_height_mm),
        Vec::new(),
    )
}

fn text_page(lines: &[String], layout: &DocumentLayout) -> PdfPage {
    let page_h_pt = Mm(layout.page_height_mm).into_pt().0;
    let margin_pt = Mm(layout.margin_mm).into_pt().0;
    let font_mm = layout.font_size_pt * PT_TO_MM;
    let baseline_in_cell_mm = 0.5 * layout.line_height_mm + 0.3 * font_mm;

    let mut ops: Vec<Op> = Vec::with_capacity(lines.len() * 5);
    for (i, line) in lines.iter().enumerate() {
        if line.is_empty() {
            continue;
        }
        let from_top_mm =
            layout.margin_mm + i as f32 * layout.line_height_mm + baseline_in_cell_mm;
        let y_pt = page_h_pt - Mm(from_top_mm).into_pt().0;

        ops.push(Op::StartTextSection);
        ops.push(Op::SetTextCursor {
            pos: Point {
                x: Pt(margin_pt),
                y: Pt(y_pt),
            },
        });
        ops.push(Op::SetFontSizeBuiltinFont {
            size: Pt(layout.font_size_pt),
            font: BuiltinFont::Helvetica,
        });
        ops.push(Op::WriteTextBuiltinFont {
            items: vec![TextItem::Text(to_builtin_charset(line))],
            font: BuiltinFont::Helvetica,
        });
        ops.push(Op::EndTextSection);
    }

    PdfPage::new(Mm(layout.page_width_mm), Mm(layout.page_height_mm), ops)
}

/// CP1252 code points above Latin-1 (0x80–0x9F range of WinAnsiEncoding).
const WIN_ANSI_EXTRAS: &[char] = &[
    '€', '‚', 'ƒ', '„', '…', '†', '‡', 'ˆ', '‰', 'Š', '‹', 'Œ', 'Ž', '‘', '’', '“', '”', '•',
    '–', '—', '˜', '™', 'š', '›', 'œ', 'ž', 'Ÿ',
];

/// Replace characters Helvetica cannot show with `?`. Tabs become spaces.
fn to_builtin_charset(line: &str) -> String {
    line.chars()
        .map(|c| match c {
            '\t' => ' ',
            ' '..='~' | '\u{A0}'..='\u{FF}' => c,
            c if WIN_ANSI_EXTRAS.contains(&c) => c,
            _ => '?',
        })
        .collect()
}

/// Wrap text so that no line exceeds `max_width` characters.
///
/// Existing newlines are kept; words longer than a line are force-broken.
/// Widths are counted in `char`s so multi-byte letters never split.
fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    let mut result = Vec::new();
    if text.is_empty() {
        return result;
    }

    for paragraph in text.split('\n') {
        let words: Vec<&str> = paragraph.split_whitespace().collect();
        if words.is_empty() {
            result.push(String::new());
            continue;
        }

        let mut current = String::new();
        let mut current_len = 0usize;

        for word in words {
            let word_len = word.chars().count();
            if word_len > max_width {
                if !current.is_empty() {
                    result.push(std::mem::take(&mut current));
                }
                let chars: Vec<char> = word.chars().collect();
                let mut chunks = chars.chunks(max_width).peekable();
                while let Some(chunk) = chunks.next() {
                    if chunks.peek().is_some() {
                        result.push(chunk.iter().collect());
                    } else {
                        current = chunk.iter().collect();
                        current_len = chunk.len();
                    }
                }
            } else if current.is_empty() {
                current.push_str(word);
                current_len = word_len;
            } else if current_len + 1 + word_len <= max_width {
                current.push(' ');
                current.push_str(word);
                current_len += 1 + word_len;
            } else {
                result.push(std::mem::replace(&mut current, word.to_string()));
                current_len = word_len;
            }
        }

        if !current.is_empty() {
            result.push(current);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pdf_page_count(bytes: &[u8]) -> usize {
        lopdf::Document::load_mem(bytes)
            .expect("generated PDF should parse")
            .get_pages()
            .len()
    }

    fn page_text(bytes: &[u8], page: u32) -> String {
        lopdf::Document::load_mem(bytes)
            .expect("generated PDF should parse")
            .extract_text(&[page])
            .expect("page text")
    }

    #[test]
    fn accented_entries_read_back_in_page_order() {
        let texts = vec![
            "Página 1:\nañadió ¿qué?\n".to_string(),
            "Página 2:\nb\n".to_string(),
        ];
        let doc = write_document(&texts, &DocumentLayout::default()).unwrap();

        let first = page_text(&doc.bytes, 1);
        assert!(first.contains("Página 1:"), "page 1: {first:?}");
        assert!(first.contains("añadió ¿qué?"), "page 1: {first:?}");
        assert!(!first.contains("Página 2:"));

        let second = page_text(&doc.bytes, 2);
        assert!(second.contains("Página 2:"), "page 2: {second:?}");
        assert!(second.contains('b'));
        assert!(!second.contains("añadió"));
    }

    #[test]
    fn charset_keeps_latin1_and_replaces_the_rest() {
        assert_eq!(to_builtin_charset("Página ñ ¿€?"), "Página ñ ¿€?");
        assert_eq!(to_builtin_charset("a\tb"), "a b");
        assert_eq!(to_builtin_charset("中文 ✓"), "?? ?");
    }

    #[test]
    fn wrap_respects_width() {
        let lines = wrap_text("uno dos tres cuatro cinco", 9);
        assert_eq!(lines, vec!["uno dos", "tres", "cuatro", "cinco"]);
    }

    #[test]
    fn wrap_keeps_newlines_and_blank_lines() {
        let lines = wrap_text("Página 1:\n\nhola", 80);
        assert_eq!(lines, vec!["Página 1:", "", "hola"]);
    }

    #[test]
    fn wrap_force_breaks_on_char_boundaries() {
        let lines = wrap_text("ááááá", 2);
        assert_eq!(lines, vec!["áá", "áá", "á"]);
    }

    #[test]
    fn default_layout_capacity() {
        let layout = DocumentLayout::default();
        assert_eq!(lines_per_page(&layout), 27);
        assert!(max_chars_per_line(&layout) > 80);
    }

    #[test]
    fn one_page_per_entry() {
        let texts = vec![
            "Página 1:\nprimera\n".to_string(),
            "Página 2:\nsegunda\n".to_string(),
            "Página 3:\ntercera\n".to_string(),
        ];
        let doc = write_document(&texts, &DocumentLayout::default()).unwrap();
        assert_eq!(doc.page_count, 3);
        assert_eq!(pdf_page_count(&doc.bytes), 3);
        assert!(doc.bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn long_entry_overflows_to_next_page() {
        let body: Vec<String> = (0..40).map(|i| format!("línea {i}")).collect();
        let texts = vec![format!("Página 1:\n{}\n", body.join("\n"))];
        let doc = write_document(&texts, &DocumentLayout::default()).unwrap();
        assert_eq!(doc.page_count, 2);
        assert_eq!(pdf_page_count(&doc.bytes), 2);
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(matches!(
            write_document(&[], &DocumentLayout::default()),
            Err(ExtractError::EmptyDocument)
        ));
    }

    #[tokio::test]
    async fn atomic_write_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("sub").join("out.pdf");
        let doc = write_document(&["Página 1:\nx\n".into()], &DocumentLayout::default()).unwrap();
        write_to_file(&doc, &out).await.unwrap();
        assert_eq!(std::fs::read(&out).unwrap(), doc.bytes);
        assert!(!out.with_extension("pdf.tmp").exists());
    }

    #[test]
    fn persisted_files_get_unique_names() {
        let dir = tempfile::tempdir().unwrap();
        let doc = write_document(&["Página 1:\nx\n".into()], &DocumentLayout::default()).unwrap();
        let a = persist_document(&doc, Some(dir.path())).unwrap();
        let b = persist_document(&doc, Some(dir.path())).unwrap();
        assert_ne!(a, b);
        for p in [&a, &b] {
            let name = p.file_name().unwrap().to_string_lossy().to_string();
            assert!(name.starts_with("texto_extraido-"), "got {name}");
            assert!(name.ends_with(".pdf"));
            assert!(p.exists());
        }
    }
}
