use candle_core::{DType, Device, Tensor};
use pylate_rs::ColBERT;

use crate::{embedder::Embedder, error::Result};

pub const DEFAULT_MODEL_ID: &str = "lightonai/GTE-ModernColBERT-v1";
pub const MODEL_ENV_VAR: &str = "DOCQA_MODEL";

/// Select the best available compute device.
///
/// Uses CUDA when compiled with the `cuda` feature, Metal when compiled with
/// the `metal` feature, and falls back to CPU otherwise.
fn default_device() -> Device {
    #[cfg(feature = "cuda")]
    {
        if let Ok(device) = Device::new_cuda(0) {
            return device;
        }
    }

    #[cfg(feature = "metal")]
    {
        if let Ok(device) = Device::new_metal(0) {
            return device;
        }
    }

    Device::Cpu
}

/// Manages the ColBERT model lifecycle, supporting lazy loading on first use.
///
/// ColBERT produces one embedding per token; this embedder mean-pools them
/// into a single vector per text so that sentences can be compared by
/// Euclidean distance.
pub struct ModelManager {
    model: Option<ColBERT>,
    model_id: String,
}

impl Default for ModelManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelManager {
    /// Creates a new `ModelManager`. The model ID is resolved from:
    /// 1. The `DOCQA_MODEL` environment variable, if set
    /// 2. Otherwise, the default model (`lightonai/GTE-ModernColBERT-v1`)
    ///
    /// The model is not loaded until the first text is embedded.
    pub fn new() -> Self {
        let model_id = std::env::var(MODEL_ENV_VAR)
            .unwrap_or_else(|_| DEFAULT_MODEL_ID.to_string());

        Self {
            model: None,
            model_id,
        }
    }

    /// Creates a `ModelManager` with an explicit model ID, bypassing
    /// environment variable resolution.
    pub fn with_model_id(model_id: String) -> Self {
        Self {
            model: None,
            model_id,
        }
    }

    /// Returns the model ID that will be (or has been) loaded.
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Returns `true` if the model has already been loaded into memory.
    pub fn is_loaded(&self) -> bool {
        self.model.is_some()
    }

    /// Ensures the model is loaded, downloading from HuggingFace Hub if needed.
    fn ensure_loaded(&mut self) -> Result<&mut ColBERT> {
        if self.model.is_none() {
            tracing::info!(model = %self.model_id, "loading ColBERT model");
            let device = default_device();
            let colbert: ColBERT = ColBERT::from(&self.model_id)
                .with_device(device)
                .try_into()?;
            self.model = Some(colbert);
        }

        self.model.as_mut().ok_or_else(|| {
            crate::error::Error::Config("model not loaded".to_string())
        })
    }

    /// Encodes texts and mean-pools the token embeddings.
    ///
    /// Queries go through the document encoder as well: both sides of a
    /// distance must come from the same encoder.
    pub fn encode_pooled(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let model = self.ensure_loaded()?;

        let embeddings = model.encode(texts, false)?;
        Ok(mean_pool_tokens(&embeddings)?.to_vec2::<f32>()?)
    }
}

/// Average the token rows of `[batch, tokens, dimension]` embeddings into
/// `[batch, dimension]`.
///
/// The encoder pads every text to the longest in its batch with all-zero
/// rows. Only non-zero rows are averaged, so a text pools to the same
/// vector alone or in any batch.
fn mean_pool_tokens(embeddings: &Tensor) -> Result<Tensor> {
    let embeddings = embeddings.to_dtype(DType::F32)?;
    // [batch, tokens, 1], 1.0 for real tokens
    let mask = embeddings
        .sqr()?
        .sum_keepdim(2)?
        .gt(0f32)?
        .to_dtype(DType::F32)?;
    let summed = embeddings.broadcast_mul(&mask)?.sum(1)?;
    let counts = mask.sum(1)?.maximum(1f32)?;
    Ok(summed.broadcast_div(&counts)?)
}

impl Embedder for ModelManager {
    fn embed(&mut self, text: &str) -> Result<Vec<f32>> {
        self.encode_pooled(&[text.to_string()])?
            .pop()
            .ok_or_else(|| crate::error::Error::EmbeddingFailed {
                text: text.to_string(),
                cause: "model returned no embedding".to_string(),
            })
    }

    fn embed_batch(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.encode_pooled(texts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_model_id() {
        let manager = ModelManager::with_model_id("custom/model".to_string());
        assert_eq!(manager.model_id(), "custom/model");
        assert!(!manager.is_loaded());
    }

    #[test]
    fn with_model_id_not_loaded_by_default() {
        let manager = ModelManager::with_model_id(DEFAULT_MODEL_ID.to_string());
        assert!(!manager.is_loaded());
        assert_eq!(manager.model_id(), DEFAULT_MODEL_ID);
    }

    #[test]
    fn pooling_ignores_padding_rows() {
        let device = Device::Cpu;
        let alone =
            Tensor::new(&[[[1f32, 0.0], [0.0, 1.0]]], &device).unwrap();
        let batched = Tensor::new(
            &[
                [[1f32, 0.0], [0.0, 1.0], [0.0, 0.0], [0.0, 0.0]],
                [[0.6, 0.8], [0.8, 0.6], [1.0, 0.0], [0.0, 1.0]],
            ],
            &device,
        )
        .unwrap();

        let alone = mean_pool_tokens(&alone).unwrap().to_vec2::<f32>().unwrap();
        let batched =
            mean_pool_tokens(&batched).unwrap().to_vec2::<f32>().unwrap();

        assert_eq!(alone, vec![vec![0.5, 0.5]]);
        assert_eq!(batched[0], alone[0]);
        for x in &batched[1] {
            assert!((x - 0.6).abs() < 1e-6);
        }
    }

    #[test]
    fn pooling_all_padding_is_zero_vector() {
        let padding = Tensor::zeros((1, 3, 4), DType::F32, &Device::Cpu).unwrap();
        let pooled =
            mean_pool_tokens(&padding).unwrap().to_vec2::<f32>().unwrap();
        assert_eq!(pooled, vec![vec![0.0; 4]]);
    }

    #[test]
    fn empty_batch_does_not_load_model() {
        let mut manager = ModelManager::with_model_id("unused/model".into());
        assert!(manager.embed_batch(&[]).unwrap().is_empty());
        assert!(!manager.is_loaded());
    }
}
