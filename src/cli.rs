use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use crate::settings::EmbedderKind;

#[derive(Debug, Parser)]
#[command(
    name = "docqa",
    about = "Ask questions of a document and get back the sentences that answer them"
)]
pub struct Cli {
    /// Override the XDG data directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Override the ColBERT model ID or local model path
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Embedder used to turn sentences and questions into vectors
    #[arg(long, value_enum, global = true)]
    pub embedder: Option<EmbedderKind>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors; hide progress bars
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Index a document and answer one or more questions about it
    Ask(AskArgs),
    /// Show how a document is split into sentences, without embedding it
    Inspect(InspectArgs),
    /// Start MCP server answering questions about a document
    Mcp(McpArgs),
    /// Manage stored settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

// -- Ask --

#[derive(Debug, Parser)]
pub struct AskArgs {
    /// Text file to index; form feeds separate pages
    pub file: PathBuf,

    /// Questions to answer, in order
    #[arg(required = true)]
    pub queries: Vec<String>,

    /// Number of results per question (default: stored top_k, else 5)
    #[arg(short = 'n', long)]
    pub count: Option<usize>,

    /// Minimum confidence threshold
    #[arg(long, default_value = "0.0")]
    pub min_confidence: f64,

    /// Rank every sentence above the confidence threshold
    #[arg(long)]
    pub all: bool,

    /// Output results as JSON (one object per question)
    #[arg(long)]
    pub json: bool,
}

// -- Inspect --

#[derive(Debug, Parser)]
pub struct InspectArgs {
    /// Text file to segment; form feeds separate pages
    pub file: PathBuf,

    /// List every sentence with its id and page
    #[arg(long)]
    pub units: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- MCP --

#[derive(Debug, Parser)]
pub struct McpArgs {
    /// Text file to index and serve
    pub file: PathBuf,
}

// -- Config --

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Show stored settings and the values in effect
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Store a setting (model_name, embedder, top_k)
    Set {
        /// Setting name
        key: String,
        /// New value
        value: String,
    },
    /// Remove a stored setting (revert to default)
    Unset {
        /// Setting name
        key: String,
    },
}

// -- Completions --

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "docqa",
            &mut std::io::stdout(),
        );
    }
}
