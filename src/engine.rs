//! The retrieval engine: segmentation, embedding, indexing and querying of
//! a single document.
//!
//! An engine starts out not ready. A successful [`RetrievalEngine::ingest`]
//! segments the pages, embeds every unit and builds a fresh vector store;
//! only then is the previous corpus (if any) replaced. A failed ingest
//! leaves the engine exactly as it was.

use std::{collections::BTreeSet, path::Path};

use serde::Serialize;

use crate::{
    embedder::Embedder,
    error::{Error, Result},
    extract::TextExtractor,
    segmenter::{self, Page},
    text_util::{DEFAULT_PREVIEW_CHARS, preview},
    vector_store::VectorStore,
};

/// Number of results returned when the caller does not ask for a count.
pub const DEFAULT_TOP_K: usize = 5;

/// Units sent to the embedder per call during ingest.
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// Added to the distance to keep the confidence finite at distance zero.
pub const CONFIDENCE_EPSILON: f64 = 1e-5;

/// An indexed, retrievable span of the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Unit {
    /// Position in segmentation order, and row of the unit's vector.
    pub id: usize,
    pub text: String,
    pub page: u32,
}

/// One ranked answer to a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    /// 1-based position in the result list.
    pub rank: usize,
    pub unit: Unit,
    /// Squared Euclidean distance between query and unit embeddings.
    pub distance: f32,
    /// See [`confidence`].
    pub confidence: f64,
}

/// Counts reported after a successful ingest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub unit_count: usize,
    /// Distinct pages that contributed at least one unit.
    pub page_count: usize,
}

/// Map a squared distance to a relevance indicator in `(0, 1]`.
///
/// Computes `1 - d / (d + ε)` as the equivalent `ε / (d + ε)`, which is
/// exactly `1.0` at `d == 0` and strictly decreasing in `d`.
///
/// This is a heuristic, not a probability. It saturates towards zero for
/// any non-trivial distance, and values from stores built with different
/// embedders or dimensionalities are not comparable.
///
/// A distance that is not a number, or that overflowed to infinity, maps
/// to `0.0`.
///
/// # Examples
///
/// ```
/// use docqa::engine::confidence;
///
/// assert_eq!(confidence(0.0), 1.0);
/// assert!(confidence(0.5) > confidence(2.0));
/// ```
pub fn confidence(distance: f32) -> f64 {
    if distance.is_nan() {
        return 0.0;
    }
    let d = f64::from(distance.max(0.0));
    CONFIDENCE_EPSILON / (d + CONFIDENCE_EPSILON)
}

#[derive(Debug)]
struct Corpus {
    units: Vec<Unit>,
    store: VectorStore,
    summary: IngestSummary,
}

/// Answers queries against one ingested document.
pub struct RetrievalEngine<E> {
    embedder: E,
    batch_size: usize,
    corpus: Option<Corpus>,
}

impl<E: Embedder> RetrievalEngine<E> {
    pub fn new(embedder: E) -> Self {
        Self {
            embedder,
            batch_size: DEFAULT_BATCH_SIZE,
            corpus: None,
        }
    }

    /// Set how many units are embedded per embedder call (minimum 1).
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    /// Returns `true` once a document has been ingested successfully.
    pub fn is_ready(&self) -> bool {
        self.corpus.is_some()
    }

    /// Units of the current document, in id order. Empty when not ready.
    pub fn units(&self) -> &[Unit] {
        match &self.corpus {
            Some(corpus) => &corpus.units,
            None => &[],
        }
    }

    /// Counts of the current document, if any.
    pub fn summary(&self) -> Option<IngestSummary> {
        self.corpus.as_ref().map(|c| c.summary)
    }

    /// Extract `path` with `extractor` and ingest the resulting pages.
    pub fn ingest_document(
        &mut self,
        extractor: &impl TextExtractor,
        path: &Path,
    ) -> Result<IngestSummary> {
        let pages = extractor.extract(path)?;
        self.ingest(&pages)
    }

    /// Segment, embed and index `pages`, replacing the current document.
    pub fn ingest(&mut self, pages: &[Page]) -> Result<IngestSummary> {
        self.ingest_with_progress(pages, |_, _| {})
    }

    /// Like [`ingest`](Self::ingest), calling `on_progress(done, total)`
    /// after each embedded batch.
    pub fn ingest_with_progress(
        &mut self,
        pages: &[Page],
        mut on_progress: impl FnMut(usize, usize),
    ) -> Result<IngestSummary> {
        let segments = segmenter::segment(pages);
        if segments.is_empty() {
            return Err(Error::NoUnitsFound);
        }
        tracing::debug!(
            pages = pages.len(),
            units = segments.len(),
            "segmented document"
        );

        let texts: Vec<String> =
            segments.iter().map(|s| s.text.clone()).collect();
        let total = texts.len();
        let mut vectors = Vec::with_capacity(total);

        for batch in texts.chunks(self.batch_size) {
            vectors.extend(self.embed_units(batch)?);
            on_progress(vectors.len(), total);
        }

        let mut store = VectorStore::new();
        store.build(&vectors)?;

        let units: Vec<Unit> = segments
            .into_iter()
            .enumerate()
            .map(|(id, s)| Unit {
                id,
                text: s.text,
                page: s.page,
            })
            .collect();
        let page_count =
            units.iter().map(|u| u.page).collect::<BTreeSet<_>>().len();
        let summary = IngestSummary {
            unit_count: units.len(),
            page_count,
        };

        self.corpus = Some(Corpus {
            units,
            store,
            summary,
        });
        tracing::info!(
            units = summary.unit_count,
            pages = summary.page_count,
            "document indexed"
        );
        Ok(summary)
    }

    /// Embed one batch of unit texts.
    ///
    /// When the batch call fails, the texts are embedded one at a time so
    /// the error names the text the embedder rejected.
    fn embed_units(&mut self, batch: &[String]) -> Result<Vec<Vec<f32>>> {
        let embedded = match self.embedder.embed_batch(batch) {
            Ok(embedded) => embedded,
            Err(err) if batch.len() > 1 => {
                tracing::debug!(
                    batch = batch.len(),
                    error = %err,
                    "batch embedding failed, retrying texts one by one"
                );
                for text in batch {
                    self.embedder
                        .embed(text)
                        .map_err(|e| embedding_failure(text, e))?;
                }
                return Err(embedding_failure(&batch[0], err));
            }
            Err(err) => return Err(embedding_failure(&batch[0], err)),
        };

        if embedded.len() != batch.len() {
            return Err(Error::EmbeddingFailed {
                text: preview(&batch[0], DEFAULT_PREVIEW_CHARS),
                cause: format!(
                    "embedder returned {} vectors for {} texts",
                    embedded.len(),
                    batch.len()
                ),
            });
        }
        Ok(embedded)
    }

    /// Return the `k` units closest to `text`, best first.
    pub fn query(&mut self, text: &str, k: usize) -> Result<Vec<QueryResult>> {
        let corpus = self.corpus.as_ref().ok_or(Error::NotReady)?;
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::EmptyQuery);
        }
        if k == 0 {
            return Err(Error::InvalidCount);
        }

        let query_vector = self
            .embedder
            .embed(text)
            .map_err(|e| embedding_failure(text, e))?;
        let neighbors = corpus.store.search(&query_vector, k)?;

        Ok(neighbors
            .into_iter()
            .enumerate()
            .map(|(i, n)| QueryResult {
                rank: i + 1,
                unit: corpus.units[n.id].clone(),
                distance: n.distance,
                confidence: confidence(n.distance),
            })
            .collect())
    }
}

fn embedding_failure(text: &str, error: Error) -> Error {
    match error {
        Error::EmbeddingFailed { .. } => error,
        other => Error::EmbeddingFailed {
            text: preview(text, DEFAULT_PREVIEW_CHARS),
            cause: other.to_string(),
        },
    }
}

impl<E> std::fmt::Debug for RetrievalEngine<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalEngine")
            .field("batch_size", &self.batch_size)
            .field("corpus", &self.corpus)
            .finish_non_exhaustive()
    }
}
