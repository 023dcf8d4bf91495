use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
};

use crate::error::Result;

/// Maps text to fixed-length vectors.
///
/// Every vector an embedder returns must have the same length for the
/// lifetime of the embedder. `embed_batch` must return exactly one vector
/// per input, in input order.
pub trait Embedder {
    fn embed(&mut self, text: &str) -> Result<Vec<f32>>;

    fn embed_batch(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

impl<E: Embedder + ?Sized> Embedder for Box<E> {
    fn embed(&mut self, text: &str) -> Result<Vec<f32>> {
        (**self).embed(text)
    }

    fn embed_batch(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        (**self).embed_batch(texts)
    }
}

pub const DEFAULT_HASHING_DIMENSION: usize = 384;

/// Model-free bag-of-words embedder.
///
/// Lowercased alphanumeric tokens are hashed into `dimension` buckets and
/// the counts are scaled to unit length. Texts sharing more words end up
/// closer together; there is no notion of synonyms or word order.
///
/// # Examples
///
/// ```
/// use docqa::embedder::{Embedder, HashingEmbedder};
///
/// let mut embedder = HashingEmbedder::new(64);
/// let a = embedder.embed("Rust is fast").unwrap();
/// let b = embedder.embed("rust IS fast!").unwrap();
/// assert_eq!(a.len(), 64);
/// assert_eq!(a, b);
/// ```
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_HASHING_DIMENSION)
    }
}

impl HashingEmbedder {
    /// Create an embedder producing vectors of `dimension` components.
    ///
    /// A dimension of zero is raised to one.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn bucket(&self, token: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        token.hash(&mut hasher);
        (hasher.finish() % self.dimension as u64) as usize
    }
}

impl Embedder for HashingEmbedder {
    fn embed(&mut self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dimension];

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let token = token.to_lowercase();
            vector[self.bucket(&token)] += 1.0;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }

        Ok(vector)
    }
}
