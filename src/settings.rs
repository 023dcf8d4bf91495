//! Resolution of user-facing settings from flags, environment and the
//! settings database.

use crate::{
    config_db::{ConfigDb, EMBEDDER_KEY, KNOWN_KEYS, MODEL_NAME_KEY, TOP_K_KEY},
    embedder::{Embedder, HashingEmbedder},
    engine::DEFAULT_TOP_K,
    error::{Error, Result},
    model_manager::{DEFAULT_MODEL_ID, MODEL_ENV_VAR, ModelManager},
};

/// Which embedder turns text into vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum EmbedderKind {
    /// ColBERT model, mean-pooled (downloads the model on first use)
    Colbert,
    /// Hashed bag of words; no model, keyword-level matching only
    Hashing,
}

impl EmbedderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmbedderKind::Colbert => "colbert",
            EmbedderKind::Hashing => "hashing",
        }
    }
}

impl std::str::FromStr for EmbedderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        <Self as clap::ValueEnum>::from_str(s.trim(), true).map_err(|_| {
            Error::Config(format!(
                "unknown embedder '{s}' (expected 'colbert' or 'hashing')"
            ))
        })
    }
}

impl std::fmt::Display for EmbedderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Effective settings for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub model_id: String,
    pub embedder: EmbedderKind,
    pub top_k: usize,
}

impl Settings {
    /// Resolve settings. Each value comes from, in order of priority:
    /// 1. The command-line flag
    /// 2. The environment (`DOCQA_MODEL`, model only)
    /// 3. The settings database
    /// 4. The built-in default
    pub fn resolve(
        config_db: &ConfigDb,
        model: Option<&str>,
        embedder: Option<EmbedderKind>,
    ) -> Result<Self> {
        let env_model = std::env::var(MODEL_ENV_VAR).ok();
        Self::resolve_with_env(config_db, model, embedder, env_model)
    }

    fn resolve_with_env(
        config_db: &ConfigDb,
        model: Option<&str>,
        embedder: Option<EmbedderKind>,
        env_model: Option<String>,
    ) -> Result<Self> {
        let model_id = match (model, env_model) {
            (Some(m), _) => m.to_string(),
            (None, Some(m)) => m,
            (None, None) => {
                config_db.get_setting_or(MODEL_NAME_KEY, DEFAULT_MODEL_ID)?
            }
        };

        let embedder = match embedder {
            Some(kind) => kind,
            None => match config_db.get_setting(EMBEDDER_KEY)? {
                Some(value) => value.parse()?,
                None => EmbedderKind::Colbert,
            },
        };

        let top_k = match config_db.get_setting(TOP_K_KEY)? {
            Some(value) => parse_top_k(&value)?,
            None => DEFAULT_TOP_K,
        };

        Ok(Self {
            model_id,
            embedder,
            top_k,
        })
    }

    /// Construct the configured embedder. The ColBERT model is loaded
    /// lazily on the first embedding call.
    pub fn build_embedder(&self) -> Box<dyn Embedder + Send> {
        match self.embedder {
            EmbedderKind::Colbert => {
                Box::new(ModelManager::with_model_id(self.model_id.clone()))
            }
            EmbedderKind::Hashing => Box::new(HashingEmbedder::default()),
        }
    }
}

fn parse_top_k(value: &str) -> Result<usize> {
    match value.trim().parse::<usize>() {
        Ok(k) if k > 0 => Ok(k),
        _ => Err(Error::Config(format!(
            "{TOP_K_KEY} must be a positive integer, got '{value}'"
        ))),
    }
}

/// Check that `key` is a known setting and `value` is valid for it.
pub fn validate_setting(key: &str, value: &str) -> Result<()> {
    match key {
        MODEL_NAME_KEY if value.trim().is_empty() => Err(Error::Config(
            format!("{MODEL_NAME_KEY} must not be empty"),
        )),
        MODEL_NAME_KEY => Ok(()),
        EMBEDDER_KEY => value.parse::<EmbedderKind>().map(|_| ()),
        TOP_K_KEY => parse_top_k(value).map(|_| ()),
        _ => Err(Error::Config(format!(
            "unknown setting '{key}' (known: {})",
            KNOWN_KEYS.join(", ")
        ))),
    }
}
