//! docqa - ask questions of a document and get back the sentences that
//! answer them.
//!
//! A document is split into pages, each page into sentence-sized units,
//! and every unit is embedded into a dense vector. A question is embedded
//! the same way and answered with the units nearest to it by squared
//! Euclidean distance, each tagged with its page and a relative
//! confidence. Embeddings come from a mean-pooled
//! [ColBERT](https://github.com/stanford-futuredata/ColBERT) model, or from
//! a model-free hashing embedder for offline use.
//!
//! # Quick start
//!
//! ```
//! use docqa::{RetrievalEngine, embedder::HashingEmbedder};
//! use docqa::search::{self, QueryParams};
//! use docqa::segmenter::Page;
//!
//! let mut engine = RetrievalEngine::new(HashingEmbedder::default());
//! engine
//!     .ingest(&[
//!         Page::new(1, "Water boils at 100 degrees Celsius. It is hot."),
//!         Page::new(2, "Ice melts at zero degrees Celsius."),
//!     ])
//!     .unwrap();
//!
//! let params = QueryParams {
//!     query: "Ice melts at zero degrees Celsius.".to_string(),
//!     count: 1,
//!     min_confidence: 0.0,
//!     all: false,
//! };
//!
//! let results = search::execute_query(&mut engine, &params).unwrap();
//! assert_eq!(results[0].unit.page, 2);
//! for r in &results {
//!     println!("[Page {}] {} ({:.2})", r.unit.page, r.unit.text, r.confidence);
//! }
//! ```

pub mod cli;
pub mod config_db;
pub mod data_dir;
pub mod embedder;
pub mod engine;
pub mod error;
pub mod extract;
pub mod mcp;
pub mod model_manager;
pub mod search;
pub mod segmenter;
pub mod settings;
pub mod text_util;
pub mod vector_store;

pub use config_db::ConfigDb;
pub use data_dir::DataDir;
pub use embedder::{Embedder, HashingEmbedder};
pub use engine::{QueryResult, RetrievalEngine, Unit};
pub use error::{Error, Result};
pub use model_manager::ModelManager;
pub use vector_store::VectorStore;
