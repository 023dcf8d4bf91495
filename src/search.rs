use serde::Serialize;

use crate::{
    embedder::Embedder,
    engine::{QueryResult, RetrievalEngine},
    error::Result,
};

/// Options for a single question asked of the loaded document.
#[derive(Debug, Clone)]
pub struct QueryParams {
    pub query: String,
    /// Number of results to return.
    pub count: usize,
    /// Results with a lower confidence are dropped.
    pub min_confidence: f64,
    /// Rank every unit instead of the top `count`.
    pub all: bool,
}

/// Execute a query with filtering.
///
/// 1. Nearest-neighbor search for `count` units (every unit with `all`)
/// 2. Filter by `min_confidence`
/// 3. Re-number ranks 1..n over the survivors
pub fn execute_query<E: Embedder>(
    engine: &mut RetrievalEngine<E>,
    params: &QueryParams,
) -> Result<Vec<QueryResult>> {
    let k = if params.all {
        engine.units().len().max(1)
    } else {
        params.count
    };

    let results = engine.query(&params.query, k)?;
    let before = results.len();

    let filtered: Vec<QueryResult> = results
        .into_iter()
        .filter(|r| r.confidence >= params.min_confidence)
        .enumerate()
        .map(|(i, mut r)| {
            r.rank = i + 1;
            r
        })
        .collect();

    tracing::debug!(
        query = %params.query,
        found = before,
        kept = filtered.len(),
        "query answered"
    );
    Ok(filtered)
}

/// Format a human-readable text block for a question and its results.
pub fn render_human(query: &str, results: &[QueryResult]) -> String {
    let mut out = format!("Question: {query}\n\n");
    if results.is_empty() {
        out.push_str("No results found.\n");
        return out;
    }

    out.push_str(&format!("Top {} answers:\n\n", results.len()));
    for r in results {
        out.push_str(&format!(
            "{}. [Page {}] (Confidence: {:.2})\n{}\n\n",
            r.rank, r.unit.page, r.confidence, r.unit.text
        ));
    }
    out
}

/// Format results for human-readable terminal output.
pub fn format_human(query: &str, results: &[QueryResult]) {
    print!("{}", render_human(query, results));
}

#[derive(Debug, Serialize)]
struct QueryResponse<'a> {
    query: &'a str,
    result_count: usize,
    results: &'a [QueryResult],
}

/// Serialize a question and its results as a JSON object.
pub fn render_json(
    query: &str,
    results: &[QueryResult],
) -> serde_json::Result<String> {
    serde_json::to_string(&QueryResponse {
        query,
        result_count: results.len(),
        results,
    })
}

/// Format results as JSON output.
pub fn format_json(query: &str, results: &[QueryResult]) -> Result<()> {
    println!("{}", render_json(query, results)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{embedder::HashingEmbedder, engine::Unit, segmenter::Page};

    fn make_params(query: &str) -> QueryParams {
        QueryParams {
            query: query.to_string(),
            count: 5,
            min_confidence: 0.0,
            all: false,
        }
    }

    fn setup_engine() -> RetrievalEngine<HashingEmbedder> {
        let mut engine = RetrievalEngine::new(HashingEmbedder::default());
        engine
            .ingest(&[
                Page::new(
                    1,
                    "Rust is a systems programming language focused on safety. \
                     It achieves memory safety without garbage collection.",
                ),
                Page::new(
                    2,
                    "Python is a high-level interpreted programming language. \
                     Boil water in a large pot before adding the pasta.",
                ),
                Page::new(
                    3,
                    "Water your plants regularly during the summer. \
                     Machine learning systems learn patterns from data.",
                ),
            ])
            .unwrap();
        engine
    }

    #[test]
    fn respects_count_limit() {
        let mut engine = setup_engine();
        let mut params = make_params("programming language");
        params.count = 2;

        let results = execute_query(&mut engine, &params).unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn all_flag_returns_every_unit() {
        let mut engine = setup_engine();
        let mut params = make_params("programming language");
        params.all = true;
        params.count = 1;

        let results = execute_query(&mut engine, &params).unwrap();
        assert_eq!(results.len(), engine.units().len());
    }

    #[test]
    fn min_confidence_filters_and_reranks() {
        let mut engine = setup_engine();
        let exact = "Water your plants regularly during the summer.";
        let mut params = make_params(exact);
        params.min_confidence = 0.5;

        let results = execute_query(&mut engine, &params).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].rank, 1);
        assert_eq!(results[0].unit.text, exact);
        assert_eq!(results[0].unit.page, 3);
    }

    #[test]
    fn impossible_threshold_returns_nothing() {
        let mut engine = setup_engine();
        let mut params = make_params("programming");
        params.min_confidence = 1.5;

        assert!(execute_query(&mut engine, &params).unwrap().is_empty());
    }

    #[test]
    fn ranks_are_sequential() {
        let mut engine = setup_engine();
        let results =
            execute_query(&mut engine, &make_params("water")).unwrap();
        for (i, r) in results.iter().enumerate() {
            assert_eq!(r.rank, i + 1);
        }
    }

    fn sample_result() -> QueryResult {
        QueryResult {
            rank: 1,
            unit: Unit {
                id: 3,
                text: "Water boils at 100 degrees.".to_string(),
                page: 4,
            },
            distance: 0.0,
            confidence: 1.0,
        }
    }

    #[test]
    fn human_output_lists_page_and_confidence() {
        let text = render_human("boiling point?", &[sample_result()]);
        assert!(text.starts_with("Question: boiling point?"));
        assert!(text.contains("Top 1 answers:"));
        assert!(text.contains("1. [Page 4] (Confidence: 1.00)"));
        assert!(text.contains("Water boils at 100 degrees."));
    }

    #[test]
    fn human_output_without_results() {
        let text = render_human("anything", &[]);
        assert!(text.contains("No results found."));
    }

    #[test]
    fn json_output_is_structured() {
        let json = render_json("q \"quoted\"", &[sample_result()]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["query"], "q \"quoted\"");
        assert_eq!(value["result_count"], 1);
        assert_eq!(value["results"][0]["unit"]["page"], 4);
        assert_eq!(value["results"][0]["unit"]["id"], 3);
        assert_eq!(value["results"][0]["confidence"], 1.0);
    }
}
