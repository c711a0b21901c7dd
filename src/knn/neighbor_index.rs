use std::cmp::Ordering;
use std::fmt;
use std::path::Path;

use dary_heap::OctonaryHeap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ArtifactLoadError;
use crate::io::{self, DenseIndex};
use crate::knn::interaction_matrix::InteractionMatrix;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// `1 - cos(a, b)`. A row without interactions is at distance 1 from everything.
    Cosine,
    Euclidean,
}

impl Default for Metric {
    fn default() -> Self {
        Metric::Cosine
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Cosine => write!(f, "cosine"),
            Metric::Euclidean => write!(f, "euclidean"),
        }
    }
}

#[derive(PartialEq, Debug, Clone, Copy)]
pub struct Neighbor {
    pub index: DenseIndex,
    pub distance: f64,
}

impl Neighbor {
    pub fn new(index: DenseIndex, distance: f64) -> Self {
        Neighbor { index, distance }
    }
}

impl Eq for Neighbor {}

// Closest first; equal distances fall back to the lower dense index.
impl Ord for Neighbor {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.distance.partial_cmp(&other.distance) {
            Some(Ordering::Equal) | None => self.index.cmp(&other.index),
            Some(ordering) => ordering,
        }
    }
}

impl PartialOrd for Neighbor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

pub trait NeighborSearch {
    /// The `n_neighbors` rows of `matrix` closest to row `query`, in ascending
    /// distance. The query row itself is part of the candidate set.
    fn kneighbors(
        &self,
        matrix: &InteractionMatrix,
        query: DenseIndex,
        n_neighbors: usize,
    ) -> Vec<Neighbor>;
}

/// The fitted nearest-neighbor model. The fitted samples are the rows of the
/// interaction matrix, so the model itself only records how it was fitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnnModel {
    pub metric: Metric,
    pub n_samples_fit: usize,
    pub n_features_in: usize,
}

impl KnnModel {
    pub fn fit(metric: Metric, matrix: &InteractionMatrix) -> Self {
        KnnModel {
            metric,
            n_samples_fit: matrix.qty_items(),
            n_features_in: matrix.qty_users(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, ArtifactLoadError> {
        let model: KnnModel = io::read_bincode("knn model", path)?;
        debug!(path = %path.display(), metric = %model.metric, "read knn model");
        Ok(model)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        io::write_bincode(path, self)
    }

    /// Checks that this model was fitted on `matrix`.
    pub fn validate(&self, matrix: &InteractionMatrix) -> Result<(), ArtifactLoadError> {
        if self.n_samples_fit != matrix.qty_items() {
            return Err(ArtifactLoadError::Inconsistent(format!(
                "knn model was fitted on {} items but the matrix has {}",
                self.n_samples_fit,
                matrix.qty_items()
            )));
        }
        if self.n_features_in != matrix.qty_users() {
            return Err(ArtifactLoadError::Inconsistent(format!(
                "knn model was fitted on {} features but the matrix has {}",
                self.n_features_in,
                matrix.qty_users()
            )));
        }
        Ok(())
    }

    fn distance(
        &self,
        matrix: &InteractionMatrix,
        query: DenseIndex,
        other: DenseIndex,
        dot: f64,
    ) -> f64 {
        let query_norm = matrix.row_norm(query);
        let other_norm = matrix.row_norm(other);
        match self.metric {
            Metric::Cosine => {
                if query_norm == 0.0 || other_norm == 0.0 {
                    1.0
                } else {
                    1.0 - dot / (query_norm * other_norm)
                }
            }
            Metric::Euclidean => {
                let squared = query_norm * query_norm + other_norm * other_norm - 2.0 * dot;
                squared.max(0.0).sqrt()
            }
        }
    }
}

impl NeighborSearch for KnnModel {
    fn kneighbors(
        &self,
        matrix: &InteractionMatrix,
        query: DenseIndex,
        n_neighbors: usize,
    ) -> Vec<Neighbor> {
        if n_neighbors == 0 || query >= matrix.qty_items() {
            return Vec::new();
        }

        let dots = matrix.dot_with_all_rows(query);

        // Max-heap on distance: the root is the worst of the current top-n.
        let mut closest = OctonaryHeap::<Neighbor>::with_capacity(n_neighbors);
        for (other, dot) in dots.into_iter().enumerate() {
            let candidate = Neighbor::new(other, self.distance(matrix, query, other, dot));
            if closest.len() < n_neighbors {
                closest.push(candidate);
            } else if let Some(mut worst) = closest.peek_mut() {
                if candidate < *worst {
                    *worst = candidate;
                }
            }
        }

        closest.into_sorted_vec()
    }
}
