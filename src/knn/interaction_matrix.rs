use std::path::Path;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sprs::{CsMat, CsVecView};
use tracing::{debug, info};

use crate::error::ArtifactLoadError;
use crate::io::{self, DenseIndex};

/// Which axis of the stored matrix holds the items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    ItemsByUsers,
    UsersByItems,
}

/// On-disk form of the interaction matrix: a CSR matrix plus the orientation
/// the trainer wrote it in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SparseMatrixArtifact {
    pub orientation: Orientation,
    pub shape: (usize, usize),
    pub indptr: Vec<usize>,
    pub indices: Vec<usize>,
    pub data: Vec<f64>,
}

impl SparseMatrixArtifact {
    pub fn from_matrix(orientation: Orientation, matrix: CsMat<f64>) -> Self {
        let matrix = if matrix.is_csr() {
            matrix
        } else {
            matrix.to_csr()
        };
        let shape = matrix.shape();
        let (indptr, indices, data) = matrix.into_raw_storage();
        SparseMatrixArtifact {
            orientation,
            shape,
            indptr,
            indices,
            data,
        }
    }

    pub fn load(path: &Path) -> Result<Self, ArtifactLoadError> {
        io::read_bincode("sparse matrix", path)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        io::write_bincode(path, self)
    }
}

/// Item feature vectors used for neighbor search. Row `i` belongs to the item
/// with encoder index `i`.
///
/// Besides the item-major CSR rows we keep a user-major copy, so a query only
/// touches the items that share at least one user with the query item.
pub struct InteractionMatrix {
    item_rows: CsMat<f64>,
    user_columns: CsMat<f64>,
    row_norms: Vec<f64>,
}

impl InteractionMatrix {
    /// `item_rows` must have shape `[items, users]`.
    pub fn from_item_rows(item_rows: CsMat<f64>) -> Self {
        let item_rows = if item_rows.is_csr() {
            item_rows
        } else {
            item_rows.to_csr()
        };
        let user_columns = item_rows.to_csc();
        let row_norms: Vec<f64> = (0..item_rows.rows())
            .into_par_iter()
            .map(|row| match item_rows.outer_view(row) {
                Some(vector) => vector.data().iter().map(|value| value * value).sum::<f64>().sqrt(),
                None => 0.0,
            })
            .collect();

        InteractionMatrix {
            item_rows,
            user_columns,
            row_norms,
        }
    }

    pub fn from_artifact(artifact: SparseMatrixArtifact) -> Result<Self, ArtifactLoadError> {
        if let Some(value) = artifact.data.iter().find(|value| !value.is_finite()) {
            return Err(ArtifactLoadError::InvalidMatrix(format!(
                "non-finite interaction value {}",
                value
            )));
        }

        let stored = CsMat::try_new(
            artifact.shape,
            artifact.indptr,
            artifact.indices,
            artifact.data,
        )
        .map_err(|(_, _, _, err)| ArtifactLoadError::InvalidMatrix(format!("{:?}", err)))?;

        let item_rows = match artifact.orientation {
            Orientation::ItemsByUsers => stored,
            Orientation::UsersByItems => {
                debug!("transposing users x items matrix into item rows");
                stored.transpose_into().to_csr()
            }
        };

        Ok(InteractionMatrix::from_item_rows(item_rows))
    }

    pub fn load(path: &Path) -> Result<Self, ArtifactLoadError> {
        let matrix = InteractionMatrix::from_artifact(SparseMatrixArtifact::load(path)?)?;
        info!(
            path = %path.display(),
            qty_items = matrix.qty_items(),
            qty_users = matrix.qty_users(),
            nnz = matrix.nnz(),
            "read interaction matrix"
        );
        Ok(matrix)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        SparseMatrixArtifact::from_matrix(Orientation::ItemsByUsers, self.item_rows.clone())
            .save(path)
    }

    pub fn row(&self, item: DenseIndex) -> Option<CsVecView<'_, f64>> {
        self.item_rows.outer_view(item)
    }

    pub fn row_norm(&self, item: DenseIndex) -> f64 {
        self.row_norms.get(item).copied().unwrap_or(0.0)
    }

    /// Dot products of row `item` with every row, indexed by dense index.
    pub fn dot_with_all_rows(&self, item: DenseIndex) -> Vec<f64> {
        let mut dots = vec![0.0; self.qty_items()];
        if let Some(query) = self.item_rows.outer_view(item) {
            for (user, rating) in query.iter() {
                if let Some(co_rated) = self.user_columns.outer_view(user) {
                    for (other_item, other_rating) in co_rated.iter() {
                        dots[other_item] += rating * other_rating;
                    }
                }
            }
        }
        dots
    }

    pub fn qty_items(&self) -> usize {
        self.item_rows.rows()
    }

    pub fn qty_users(&self) -> usize {
        self.item_rows.cols()
    }

    pub fn nnz(&self) -> usize {
        self.item_rows.nnz()
    }
}
