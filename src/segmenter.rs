//! Sentence segmentation of extracted page text.
//!
//! Pages are whitespace-normalized and split after sentence terminals. The
//! boundary rule is a heuristic: abbreviations ("e.g. this"), decimals
//! followed by a space, and quoted punctuation can split a sentence early
//! or join two sentences. Short fragments (headers, page numbers, stray
//! words) are dropped by a minimum length filter.

/// Candidates of this many characters or fewer are discarded.
pub const MIN_UNIT_CHARS: usize = 20;

/// Characters that end a sentence when followed by whitespace.
pub const SENTENCE_TERMINALS: &[char] = &['.', '!', '?', '\u{061F}'];

/// Raw text of one page as produced by a text extractor.
///
/// `text` is `None` when the extractor found nothing on the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// 1-based page number.
    pub number: u32,
    pub text: Option<String>,
}

impl Page {
    pub fn new(number: u32, text: impl Into<String>) -> Self {
        Self {
            number,
            text: Some(text.into()),
        }
    }

    pub fn blank(number: u32) -> Self {
        Self { number, text: None }
    }
}

/// A sentence-like span of a page, before it has been assigned an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub page: u32,
}

/// Collapse every whitespace run to a single space and trim the ends.
///
/// # Examples
///
/// ```
/// use docqa::segmenter::normalize_whitespace;
///
/// assert_eq!(normalize_whitespace("  a\n\tb   c "), "a b c");
/// ```
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_sentence_terminal(c: char) -> bool {
    SENTENCE_TERMINALS.contains(&c)
}

/// Split text after each sentence terminal that is followed by whitespace.
///
/// The terminal stays with the sentence it ends; the whitespace run after
/// it is consumed.
///
/// # Examples
///
/// ```
/// use docqa::segmenter::split_sentences;
///
/// let parts = split_sentences("One. Two? Three");
/// assert_eq!(parts, vec!["One.", "Two?", "Three"]);
/// ```
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut prev: Option<char> = None;
    let mut chars = text.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        if c.is_whitespace() && prev.is_some_and(is_sentence_terminal) {
            pieces.push(&text[start..idx]);

            let mut end = idx + c.len_utf8();
            while let Some(&(next_idx, next)) = chars.peek() {
                if !next.is_whitespace() {
                    break;
                }
                end = next_idx + next.len_utf8();
                chars.next();
            }
            start = end;
            prev = None;
            continue;
        }
        prev = Some(c);
    }

    pieces.push(&text[start..]);
    pieces
}

/// Segment pages into units, in page order and then in sentence order.
///
/// Blank or missing pages are skipped. The output order is the order in
/// which units are numbered by the retrieval engine.
///
/// # Examples
///
/// ```
/// use docqa::segmenter::{Page, segment};
///
/// let pages = vec![
///     Page::new(1, "Water boils at 100 degrees. It is a common fact."),
///     Page::blank(2),
///     Page::new(3, "Ice melts at 0 degrees."),
/// ];
/// let units = segment(&pages);
/// assert_eq!(units.len(), 2);
/// assert_eq!(units[0].page, 1);
/// assert_eq!(units[1].page, 3);
/// ```
pub fn segment(pages: &[Page]) -> Vec<Segment> {
    let mut segments = Vec::new();

    for page in pages {
        let Some(raw) = page.text.as_deref() else {
            continue;
        };
        let normalized = normalize_whitespace(raw);
        if normalized.is_empty() {
            continue;
        }

        let before = segments.len();
        for candidate in split_sentences(&normalized) {
            let candidate = candidate.trim();
            if candidate.chars().count() > MIN_UNIT_CHARS {
                segments.push(Segment {
                    text: candidate.to_string(),
                    page: page.number,
                });
            }
        }
        tracing::trace!(
            page = page.number,
            units = segments.len() - before,
            "segmented page"
        );
    }

    segments
}
