//! Text extraction: turning a source file into numbered pages.

use std::path::Path;

use crate::{
    error::{Error, Result},
    segmenter::Page,
};

/// Separator between pages in plain-text exports of paginated documents.
pub const PAGE_BREAK: char = '\u{000C}';

/// Produces the per-page text of a document.
pub trait TextExtractor {
    fn extract(&self, path: &Path) -> Result<Vec<Page>>;
}

/// Reads UTF-8 text files, treating form feeds as page breaks.
///
/// This is the format `pdftotext` and similar converters emit, so a PDF
/// can be queried after a conversion step. A file without form feeds is a
/// single page.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, path: &Path) -> Result<Vec<Page>> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::ExtractionFailed {
                origin: path.display().to_string(),
                cause: e.to_string(),
            }
        })?;
        let pages = split_pages(&content);
        if pages.iter().all(|p| p.text.is_none()) {
            tracing::warn!(path = %path.display(), "document has no text");
        }
        tracing::debug!(
            path = %path.display(),
            pages = pages.len(),
            "extracted pages"
        );
        Ok(pages)
    }
}

/// Split text into pages on [`PAGE_BREAK`], numbering from 1.
///
/// Pages with no visible text are returned with `text: None`.
///
/// # Examples
///
/// ```
/// use docqa::extract::split_pages;
///
/// let pages = split_pages("first page\u{000C}\u{000C}third page");
/// assert_eq!(pages.len(), 3);
/// assert_eq!(pages[1].text, None);
/// assert_eq!(pages[2].number, 3);
/// ```
pub fn split_pages(text: &str) -> Vec<Page> {
    text.split(PAGE_BREAK)
        .enumerate()
        .map(|(i, page)| Page {
            number: i as u32 + 1,
            text: (!page.trim().is_empty()).then(|| page.to_string()),
        })
        .collect()
}
