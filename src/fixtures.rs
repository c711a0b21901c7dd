//! Small artifact sets shared by the unit tests.

use std::path::Path;

use sprs::{CsMat, TriMat};

use crate::artifacts::ArtifactPaths;
use crate::catalog::Catalog;
use crate::io::{self, Item};
use crate::knn::encoder::BookEncoder;
use crate::knn::interaction_matrix::{InteractionMatrix, Orientation, SparseMatrixArtifact};
use crate::knn::neighbor_index::{KnnModel, Metric};

pub struct Fixture {
    pub items: Vec<Item>,
    pub encoder: BookEncoder,
    pub matrix: InteractionMatrix,
    pub model: KnnModel,
}

impl Fixture {
    pub fn catalog(&self) -> Catalog<'_> {
        Catalog::new(&self.items).restrict_to_known(&self.encoder)
    }
}

pub fn csr_from_rows(rows: &[Vec<f64>]) -> CsMat<f64> {
    let qty_cols = rows.iter().map(|row| row.len()).max().unwrap_or(0);
    let mut triplets = TriMat::new((rows.len(), qty_cols));
    for (row_index, row) in rows.iter().enumerate() {
        for (col_index, value) in row.iter().enumerate() {
            if *value != 0.0 {
                triplets.add_triplet(row_index, col_index, *value);
            }
        }
    }
    triplets.to_csr()
}

pub fn matrix_from_rows(rows: &[Vec<f64>]) -> InteractionMatrix {
    InteractionMatrix::from_item_rows(csr_from_rows(rows))
}

/// Three unit rows. Under cosine distance row 0 is 0.2 away from row 1 and
/// 0.5 away from row 2.
pub fn scenario_matrix() -> InteractionMatrix {
    matrix_from_rows(&[
        vec![1.0, 0.0, 0.0],
        vec![0.8, 0.6, 0.0],
        vec![0.5, 0.0, 0.75_f64.sqrt()],
    ])
}

pub fn scenario_items() -> Vec<Item> {
    let mut foo = Item::new("k1", "Foo", 2000);
    foo.image_url = Some("http://covers/k1.jpg".to_string());
    let mut bar = Item::new("k2", "Bar", 2001);
    bar.author = Some("B. Author".to_string());
    bar.image_url = Some("http://covers/k2.jpg".to_string());
    let baz = Item::new("k3", "Baz", 1999);
    vec![foo, bar, baz]
}

pub fn scenario() -> Fixture {
    let encoder = BookEncoder::from_classes(vec!["k1".into(), "k2".into(), "k3".into()]).unwrap();
    let matrix = scenario_matrix();
    let model = KnnModel::fit(Metric::Cosine, &matrix);
    Fixture {
        items: scenario_items(),
        encoder,
        matrix,
        model,
    }
}

/// Writes the scenario artifacts into `dir`, with the matrix stored the way
/// the training pipeline writes it: users x items.
pub fn write_scenario_artifacts(dir: &Path) -> ArtifactPaths {
    let fixture = scenario();
    let paths = ArtifactPaths::in_dir(dir);

    fixture.model.save(&paths.model).unwrap();
    fixture.encoder.save(&paths.encoder).unwrap();
    let users_by_items = csr_from_rows(&[
        vec![1.0, 0.8, 0.5],
        vec![0.0, 0.6, 0.0],
        vec![0.0, 0.0, 0.75_f64.sqrt()],
    ]);
    SparseMatrixArtifact::from_matrix(Orientation::UsersByItems, users_by_items)
        .save(&paths.matrix)
        .unwrap();

    let mut items = fixture.items;
    // Present in the table, unknown to the model.
    items.push(Item::new("k404", "Uncharted", 2010));
    io::write_item_table(&paths.items, &items).unwrap();

    paths
}
