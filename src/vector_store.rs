//! Exact nearest-neighbor index over fixed-dimension vectors.
//!
//! Vectors are kept in a single row-major buffer in insertion order, so the
//! row number of a vector is its id. Search is exhaustive under squared
//! Euclidean distance; no approximation and no pruning.

use std::cmp::Ordering;

use rayon::prelude::*;

use crate::error::{Error, Result};

/// A stored vector's id and its squared Euclidean distance to a query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub id: usize,
    pub distance: f32,
}

#[derive(Debug, Clone)]
struct FlatIndex {
    dimension: usize,
    /// `data[id * dimension + j]` is component `j` of vector `id`.
    data: Vec<f32>,
}

impl FlatIndex {
    fn len(&self) -> usize {
        self.data.len() / self.dimension
    }

    fn row(&self, id: usize) -> &[f32] {
        let start = id * self.dimension;
        &self.data[start..start + self.dimension]
    }
}

/// In-memory vector store supporting bulk build and exact kNN search.
///
/// # Examples
///
/// ```
/// use docqa::vector_store::VectorStore;
///
/// let mut store = VectorStore::new();
/// store
///     .build(&[vec![0.0, 0.0], vec![1.0, 0.0], vec![5.0, 5.0]])
///     .unwrap();
///
/// let hits = store.search(&[0.9, 0.0], 2).unwrap();
/// assert_eq!(hits[0].id, 1);
/// assert_eq!(hits[1].id, 0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct VectorStore {
    index: Option<FlatIndex>,
}

impl VectorStore {
    /// Create an empty, unbuilt store.
    pub fn new() -> Self {
        Self { index: None }
    }

    /// Replace the store's contents with `vectors`, in order.
    ///
    /// The dimensionality is taken from the first vector. NaN and infinite
    /// components are rejected. Every vector is validated before anything
    /// is replaced, so a failed build leaves the previous contents in place.
    pub fn build(&mut self, vectors: &[Vec<f32>]) -> Result<()> {
        let first = vectors.first().ok_or(Error::EmptyBuild)?;
        let dimension = first.len();
        if dimension == 0 {
            return Err(Error::ZeroDimension);
        }

        if let Some((position, v)) = vectors
            .iter()
            .enumerate()
            .find(|(_, v)| v.len() != dimension)
        {
            return Err(Error::DimensionMismatch {
                expected: dimension,
                actual: v.len(),
                position: Some(position),
            });
        }

        if let Some(position) = vectors
            .iter()
            .position(|v| v.iter().any(|x| !x.is_finite()))
        {
            return Err(Error::NonFiniteVector {
                position: Some(position),
            });
        }

        let mut data = Vec::with_capacity(vectors.len() * dimension);
        for v in vectors {
            data.extend_from_slice(v);
        }

        self.index = Some(FlatIndex { dimension, data });
        tracing::debug!(vectors = vectors.len(), dimension, "built vector store");
        Ok(())
    }

    /// Returns `true` once a build has succeeded.
    pub fn is_built(&self) -> bool {
        self.index.is_some()
    }

    /// Number of stored vectors (0 before the first build).
    pub fn len(&self) -> usize {
        self.index.as_ref().map_or(0, FlatIndex::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dimensionality of the stored vectors, if built.
    pub fn dimension(&self) -> Option<usize> {
        self.index.as_ref().map(|idx| idx.dimension)
    }

    /// The stored vector with the given id.
    pub fn vector(&self, id: usize) -> Option<&[f32]> {
        let index = self.index.as_ref()?;
        (id < index.len()).then(|| index.row(id))
    }

    /// Find the `k` stored vectors closest to `query`.
    ///
    /// Returns `min(k, len)` neighbors sorted by ascending distance, with
    /// ties broken by ascending id.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        let index = self.index.as_ref().ok_or(Error::NotBuilt)?;
        if query.len() != index.dimension {
            return Err(Error::DimensionMismatch {
                expected: index.dimension,
                actual: query.len(),
                position: None,
            });
        }
        if query.iter().any(|x| !x.is_finite()) {
            return Err(Error::NonFiniteVector { position: None });
        }
        if k == 0 {
            return Err(Error::InvalidCount);
        }

        let mut neighbors: Vec<Neighbor> = index
            .data
            .par_chunks_exact(index.dimension)
            .enumerate()
            .map(|(id, row)| Neighbor {
                id,
                distance: squared_l2(query, row),
            })
            .collect();

        if k < neighbors.len() {
            neighbors.select_nth_unstable_by(k - 1, compare_neighbors);
            neighbors.truncate(k);
        }
        neighbors.sort_unstable_by(compare_neighbors);

        Ok(neighbors)
    }
}

fn compare_neighbors(a: &Neighbor, b: &Neighbor) -> Ordering {
    a.distance
        .total_cmp(&b.distance)
        .then_with(|| a.id.cmp(&b.id))
}

/// Squared Euclidean distance between two equal-length vectors.
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Points on a line plus two off-axis points, chosen so that all
    /// squared distances to the test queries are exact in f32.
    fn line_store() -> VectorStore {
        let mut store = VectorStore::new();
        store
            .build(&[
                vec![0.0, 0.0], // 0
                vec![1.0, 0.0], // 1
                vec![2.0, 0.0], // 2
                vec![3.0, 0.0], // 3
                vec![0.0, 4.0], // 4
                vec![-1.0, 0.0], // 5
                vec![10.0, 10.0], // 6
            ])
            .unwrap();
        store
    }

    fn ids(neighbors: &[Neighbor]) -> Vec<usize> {
        neighbors.iter().map(|n| n.id).collect()
    }

    #[test]
    fn search_before_build_fails() {
        let store = VectorStore::new();
        assert!(!store.is_built());
        assert!(matches!(store.search(&[1.0], 1), Err(Error::NotBuilt)));
    }

    #[test]
    fn build_rejects_mixed_lengths() {
        let mut store = VectorStore::new();
        let err = store
            .build(&[vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0]])
            .unwrap_err();
        match err {
            Error::DimensionMismatch {
                expected,
                actual,
                position,
            } => {
                assert_eq!(expected, 2);
                assert_eq!(actual, 1);
                assert_eq!(position, Some(2));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!store.is_built());
    }

    #[test]
    fn build_rejects_empty_and_zero_dimension() {
        let mut store = VectorStore::new();
        assert!(matches!(store.build(&[]), Err(Error::EmptyBuild)));
        assert!(matches!(
            store.build(&[vec![], vec![]]),
            Err(Error::ZeroDimension)
        ));
    }

    #[test]
    fn failed_rebuild_keeps_previous_contents() {
        let mut store = line_store();
        assert!(store.build(&[vec![1.0], vec![1.0, 2.0]]).is_err());
        assert_eq!(store.len(), 7);
        assert_eq!(store.dimension(), Some(2));
        assert_eq!(store.vector(3), Some(&[3.0, 0.0][..]));
    }

    #[test]
    fn rebuild_replaces_contents() {
        let mut store = line_store();
        store.build(&[vec![1.0, 1.0, 1.0]]).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.dimension(), Some(3));
        assert!(store.vector(1).is_none());
    }

    #[test]
    fn search_rejects_wrong_query_dimension() {
        let store = line_store();
        let err = store.search(&[1.0, 2.0, 3.0], 2).unwrap_err();
        assert!(matches!(
            err,
            Error::DimensionMismatch {
                expected: 2,
                actual: 3,
                position: None
            }
        ));
    }

    #[test]
    fn build_rejects_non_finite_components() {
        let mut store = line_store();
        let err = store
            .build(&[vec![0.0, 1.0], vec![f32::NAN, 0.0]])
            .unwrap_err();
        assert!(matches!(err, Error::NonFiniteVector { position: Some(1) }));

        let err = store
            .build(&[vec![f32::INFINITY, 0.0], vec![1.0, 0.0]])
            .unwrap_err();
        assert!(matches!(err, Error::NonFiniteVector { position: Some(0) }));

        // previous contents survive
        assert_eq!(store.len(), 7);
    }

    #[test]
    fn search_rejects_non_finite_query() {
        let store = line_store();
        for query in [[f32::NAN, 0.0], [0.0, f32::NEG_INFINITY]] {
            assert!(matches!(
                store.search(&query, 1),
                Err(Error::NonFiniteVector { position: None })
            ));
        }
    }

    #[test]
    fn search_rejects_zero_k() {
        let store = line_store();
        assert!(matches!(
            store.search(&[0.0, 0.0], 0),
            Err(Error::InvalidCount)
        ));
    }

    #[test]
    fn exact_neighbors_in_ascending_distance() {
        let store = line_store();
        // Distances from (2.5, 0): id2 0.25, id3 0.25, id1 2.25, id0 6.25,
        // id5 12.25, id4 22.25, id6 162.25.
        let hits = store.search(&[2.5, 0.0], 4).unwrap();
        assert_eq!(ids(&hits), vec![2, 3, 1, 0]);
        assert_eq!(hits[0].distance, 0.25);
        assert_eq!(hits[1].distance, 0.25);
        assert_eq!(hits[2].distance, 2.25);
        assert_eq!(hits[3].distance, 6.25);
    }

    #[test]
    fn ties_break_by_ascending_id() {
        let store = line_store();
        // id1 and id5 are both at distance 1 from the origin query, after
        // id0 at 0.
        let hits = store.search(&[0.0, 0.0], 3).unwrap();
        assert_eq!(ids(&hits), vec![0, 1, 5]);

        // With k = 2 the tie at rank 2 must still resolve to the lower id.
        let hits = store.search(&[0.0, 0.0], 2).unwrap();
        assert_eq!(ids(&hits), vec![0, 1]);
    }

    #[test]
    fn k_larger_than_store_returns_everything() {
        let store = line_store();
        let hits = store.search(&[0.0, 0.0], 100).unwrap();
        assert_eq!(hits.len(), 7);
        assert_eq!(ids(&hits), vec![0, 1, 5, 2, 3, 4, 6]);
        for pair in hits.windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
        }
    }

    #[test]
    fn identical_vector_has_zero_distance() {
        let store = line_store();
        let hits = store.search(&[10.0, 10.0], 1).unwrap();
        assert_eq!(hits, vec![Neighbor { id: 6, distance: 0.0 }]);
    }

    #[test]
    fn matches_brute_force_on_every_k() {
        let store = line_store();
        let query = [0.5, 1.5];
        let mut expected: Vec<(usize, f32)> = (0..store.len())
            .map(|id| (id, squared_l2(&query, store.vector(id).unwrap())))
            .collect();
        expected.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));

        for k in 1..=store.len() {
            let hits = store.search(&query, k).unwrap();
            let want: Vec<usize> =
                expected.iter().take(k).map(|(id, _)| *id).collect();
            assert_eq!(ids(&hits), want, "k = {k}");
        }
    }
}
