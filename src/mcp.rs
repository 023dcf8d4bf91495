use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use rmcp::{
    ServerHandler,
    ServiceExt,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{
        CallToolResult,
        Content,
        Implementation,
        ServerCapabilities,
        ServerInfo,
    },
    tool,
    tool_handler,
    tool_router,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    embedder::Embedder,
    engine::{QueryResult, RetrievalEngine},
    error::{self, Error},
    extract::PlainTextExtractor,
    search::{self, QueryParams},
    settings::Settings,
};

type SharedEngine = RetrievalEngine<Box<dyn Embedder + Send>>;

struct DocqaState {
    source: PathBuf,
    default_limit: usize,
    engine: Mutex<SharedEngine>,
}

#[derive(Clone)]
pub struct DocqaMcpServer {
    state: Arc<DocqaState>,
    tool_router: ToolRouter<Self>,
}

impl DocqaMcpServer {
    fn new(state: DocqaState) -> Self {
        Self {
            state: Arc::new(state),
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_router(router = tool_router)]
impl DocqaMcpServer {
    /// Answer a question with the most relevant sentences of the document.
    #[tool(
        name = "docqa_query",
        description = "Find the sentences of the loaded document that best answer a question. Results carry the page number and a relative confidence."
    )]
    pub async fn docqa_query(
        &self,
        params: Parameters<QueryToolParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let params = params.0;
        let query = params.query.clone();

        let query_params = QueryParams {
            query: params.query,
            count: params.limit.unwrap_or(self.state.default_limit),
            min_confidence: params.min_confidence.unwrap_or(0.0),
            all: params.all.unwrap_or(false),
        };

        let mut engine = self.state.engine.lock().map_err(|_| {
            rmcp::ErrorData::internal_error("engine lock poisoned", None)
        })?;

        let results = search::execute_query(&mut *engine, &query_params)
            .map_err(query_error)?;

        let summary = format_query_summary(&results, &query);
        let structured = serde_json::to_value(QueryResponse {
            query,
            result_count: results.len(),
            results: results.into_iter().map(QueryResultItem::from).collect(),
        })
        .map_err(|e| mcp_error("failed to serialize query results", e))?;

        let mut result = CallToolResult::success(vec![Content::text(summary)]);
        result.structured_content = Some(structured);
        Ok(result)
    }

    /// Describe the loaded document.
    #[tool(
        name = "docqa_info",
        description = "Report which document is loaded and how many pages and sentences were indexed."
    )]
    pub async fn docqa_info(&self) -> Result<CallToolResult, rmcp::ErrorData> {
        let engine = self.state.engine.lock().map_err(|_| {
            rmcp::ErrorData::internal_error("engine lock poisoned", None)
        })?;
        let summary = engine.summary().ok_or_else(|| {
            rmcp::ErrorData::internal_error("no document loaded", None)
        })?;

        let source = self.state.source.display().to_string();
        let text = format!(
            "{source}: {} page(s), {} sentence(s)",
            summary.page_count, summary.unit_count
        );
        let structured = json!({
            "source": source,
            "pageCount": summary.page_count,
            "unitCount": summary.unit_count,
        });

        let mut result = CallToolResult::success(vec![Content::text(text)]);
        result.structured_content = Some(structured);
        Ok(result)
    }
}

#[tool_handler(router = self.tool_router)]
impl ServerHandler for DocqaMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo::new(ServerCapabilities::builder().enable_tools().build())
            .with_server_info(
                Implementation::new("docqa", env!("CARGO_PKG_VERSION"))
                    .with_title("docqa MCP"),
            )
            .with_instructions(
                "Use docqa_query to find the sentences of the loaded document that answer a question. Confidence is relative: compare it between results, not against a fixed bar.",
            )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct QueryToolParams {
    /// Natural-language question.
    pub query: String,
    /// Maximum number of results (default: the configured top_k).
    pub limit: Option<usize>,
    /// Minimum confidence threshold.
    pub min_confidence: Option<f64>,
    /// Return every sentence above the confidence threshold.
    pub all: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    query: String,
    result_count: usize,
    results: Vec<QueryResultItem>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryResultItem {
    rank: usize,
    unit_id: usize,
    page: u32,
    text: String,
    distance: f32,
    confidence: f64,
}

impl From<QueryResult> for QueryResultItem {
    fn from(r: QueryResult) -> Self {
        Self {
            rank: r.rank,
            unit_id: r.unit.id,
            page: r.unit.page,
            text: r.unit.text,
            distance: r.distance,
            confidence: r.confidence,
        }
    }
}

fn format_query_summary(results: &[QueryResult], query: &str) -> String {
    if results.is_empty() {
        return format!("No results found for \"{query}\"");
    }

    let mut lines = Vec::with_capacity(results.len() + 1);
    let suffix = if results.len() == 1 { "" } else { "s" };
    lines.push(format!(
        "Found {} result{} for \"{query}\":",
        results.len(),
        suffix
    ));

    for r in results {
        lines.push(format!(
            "{}. [Page {}] ({:.2}) {}",
            r.rank, r.unit.page, r.confidence, r.unit.text
        ));
    }

    lines.join("\n")
}

fn query_error(error: Error) -> rmcp::ErrorData {
    match error {
        Error::EmptyQuery | Error::InvalidCount => {
            rmcp::ErrorData::invalid_params(error.to_string(), None)
        }
        other => {
            let stage = other.stage().map(|s| s.to_string());
            rmcp::ErrorData::internal_error(
                "query failed".to_string(),
                Some(json!({ "error": other.to_string(), "stage": stage })),
            )
        }
    }
}

fn mcp_error(message: &str, error: impl std::fmt::Display) -> rmcp::ErrorData {
    rmcp::ErrorData::internal_error(
        message.to_string(),
        Some(json!({ "error": error.to_string() })),
    )
}

/// Index `path` and serve questions about it over stdio until the client
/// disconnects.
pub fn run_mcp(settings: &Settings, path: &Path) -> error::Result<()> {
    let mut engine = RetrievalEngine::new(settings.build_embedder());
    engine.ingest_document(&PlainTextExtractor, path)?;

    let state = DocqaState {
        source: path.to_path_buf(),
        default_limit: settings.top_k,
        engine: Mutex::new(engine),
    };

    let server = DocqaMcpServer::new(state);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| {
            error::Error::Config(format!("failed to start tokio runtime: {e}"))
        })?;

    runtime.block_on(async move {
        let transport = rmcp::transport::stdio();
        let running = server.serve(transport).await.map_err(|e| {
            error::Error::Config(format!(
                "MCP server initialization failed: {e}"
            ))
        })?;
        running.waiting().await.map_err(|e| {
            error::Error::Config(format!("MCP server error: {e}"))
        })?;
        Ok(())
    })
}
