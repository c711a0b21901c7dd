use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use hashbrown::HashSet;
use once_cell::sync::OnceCell;
use tracing::{info, warn};

use crate::catalog::Catalog;
use crate::config::ArtifactConfig;
use crate::error::{ArtifactLoadError, RecommendError};
use crate::io::{self, Item, Year};
use crate::knn::encoder::BookEncoder;
use crate::knn::interaction_matrix::InteractionMatrix;
use crate::knn::neighbor_index::{KnnModel, Metric};
use crate::knn::{self, ScoredBook, SelfMatchPolicy};

#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactPaths {
    pub model: PathBuf,
    pub encoder: PathBuf,
    pub matrix: PathBuf,
    pub items: PathBuf,
}

impl ArtifactPaths {
    pub fn from_config(config: &ArtifactConfig) -> Self {
        let dir = Path::new(&config.dir);
        ArtifactPaths {
            model: dir.join(&config.model_file),
            encoder: dir.join(&config.encoder_file),
            matrix: dir.join(&config.matrix_file),
            items: dir.join(&config.items_file),
        }
    }

    /// The default file names inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        ArtifactPaths {
            model: dir.join("model_knn.bin"),
            encoder: dir.join("book_encoder.bin"),
            matrix: dir.join("sparse_matrix.bin"),
            items: dir.join("Books_clean.csv"),
        }
    }
}

pub struct CatalogStats {
    pub descriptive_name: String,
    pub qty_items_in_table: usize,
    pub qty_known_items: usize,
    /// Encoder classes without a row in the item table. These can come up as
    /// neighbors but can never be shown.
    pub qty_classes_without_row: usize,
    pub qty_distinct_titles: usize,
    pub min_year: Option<Year>,
    pub max_year: Option<Year>,
    pub qty_users: usize,
    pub qty_interactions: usize,
    pub metric: Metric,
    pub loaded_at: DateTime<Utc>,
    pub load_duration_millis: u128,
}

/// Everything needed to answer recommendation requests. Built once at startup
/// and shared read-only afterwards.
pub struct ArtifactStore {
    model: KnnModel,
    encoder: BookEncoder,
    matrix: InteractionMatrix,
    known_items: Vec<Item>,
    stats: CatalogStats,
}

impl ArtifactStore {
    pub fn load(paths: &ArtifactPaths) -> Result<ArtifactStore, ArtifactLoadError> {
        let start_time = Instant::now();
        info!(items = %paths.items.display(), "loading artifacts");

        let model = KnnModel::load(&paths.model)?;
        let encoder = BookEncoder::load(&paths.encoder)?;
        let matrix = InteractionMatrix::load(&paths.matrix)?;
        let table = io::read_item_table(&paths.items)?;

        ArtifactStore::from_parts(
            paths.items.display().to_string(),
            model,
            encoder,
            matrix,
            table,
            start_time,
        )
    }

    fn from_parts(
        descriptive_name: String,
        model: KnnModel,
        encoder: BookEncoder,
        matrix: InteractionMatrix,
        table: Vec<Item>,
        start_time: Instant,
    ) -> Result<ArtifactStore, ArtifactLoadError> {
        if encoder.len() != matrix.qty_items() {
            return Err(ArtifactLoadError::Inconsistent(format!(
                "encoder knows {} items but the matrix has {} item rows",
                encoder.len(),
                matrix.qty_items()
            )));
        }
        model.validate(&matrix)?;

        let known_items: Vec<Item> = Catalog::new(&table)
            .restrict_to_known(&encoder)
            .iter()
            .cloned()
            .collect();

        let table_keys: HashSet<&str> = table.iter().map(|item| item.key.as_str()).collect();
        let qty_classes_without_row = encoder
            .classes()
            .iter()
            .filter(|class| !table_keys.contains(class.as_str()))
            .count();
        if qty_classes_without_row > 0 {
            warn!(
                qty_classes_without_row,
                qty_classes = encoder.len(),
                "encoder classes missing from the item table"
            );
        }

        let known = Catalog::new(&known_items);
        let (min_year, max_year) = match known.year_bounds() {
            Some((lo, hi)) => (Some(lo), Some(hi)),
            None => (None, None),
        };
        let stats = CatalogStats {
            descriptive_name,
            qty_items_in_table: table.len(),
            qty_known_items: known.len(),
            qty_classes_without_row,
            qty_distinct_titles: known.selectable_titles().len(),
            min_year,
            max_year,
            qty_users: matrix.qty_users(),
            qty_interactions: matrix.nnz(),
            metric: model.metric,
            loaded_at: Utc::now(),
            load_duration_millis: start_time.elapsed().as_millis(),
        };

        info!(
            qty_items_in_table = stats.qty_items_in_table,
            qty_known_items = stats.qty_known_items,
            qty_distinct_titles = stats.qty_distinct_titles,
            metric = %stats.metric,
            millis = stats.load_duration_millis,
            "artifacts loaded"
        );

        Ok(ArtifactStore {
            model,
            encoder,
            matrix,
            known_items,
            stats,
        })
    }

    /// Items of the table that the model knows, in table order.
    pub fn catalog(&self) -> Catalog<'_> {
        Catalog::new(&self.known_items)
    }

    pub fn recommend<'a>(
        &self,
        title: &str,
        n: usize,
        catalog: &Catalog<'a>,
        self_match: SelfMatchPolicy,
    ) -> Result<Vec<ScoredBook<'a>>, RecommendError> {
        knn::recommend(
            title,
            n,
            catalog,
            &self.encoder,
            &self.model,
            &self.matrix,
            self_match,
        )
    }

    pub fn stats(&self) -> &CatalogStats {
        &self.stats
    }
}

/// Loads the store on first use. Concurrent first callers wait for a single
/// load; a failed load is not remembered and will be attempted again.
pub struct ArtifactCache {
    paths: ArtifactPaths,
    store: OnceCell<Arc<ArtifactStore>>,
}

impl ArtifactCache {
    pub fn new(paths: ArtifactPaths) -> Self {
        ArtifactCache {
            paths,
            store: OnceCell::new(),
        }
    }

    pub fn get_or_load(&self) -> Result<Arc<ArtifactStore>, ArtifactLoadError> {
        self.store
            .get_or_try_init(|| ArtifactStore::load(&self.paths).map(Arc::new))
            .map(Arc::clone)
    }

    pub fn is_loaded(&self) -> bool {
        self.store.get().is_some()
    }
}

#[cfg(test)]
mod artifacts_test {
    use super::*;
    use crate::fixtures;
    use crate::knn::interaction_matrix::{Orientation, SparseMatrixArtifact};
    use float_cmp::approx_eq;

    #[test]
    fn should_load_scenario_and_restrict_to_known_items() {
        let dir = tempfile::tempdir().unwrap();
        let paths = fixtures::write_scenario_artifacts(dir.path());

        let store = ArtifactStore::load(&paths).unwrap();

        assert_eq!(vec!["k1", "k2", "k3"], store.catalog().keys());
        let stats = store.stats();
        assert_eq!(4, stats.qty_items_in_table);
        assert_eq!(3, stats.qty_known_items);
        assert_eq!(0, stats.qty_classes_without_row);
        assert_eq!(Some(1999), stats.min_year);
        assert_eq!(Some(2001), stats.max_year);
        assert_eq!(Metric::Cosine, stats.metric);
    }

    #[test]
    fn should_recommend_from_users_by_items_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let paths = fixtures::write_scenario_artifacts(dir.path());
        let store = ArtifactStore::load(&paths).unwrap();
        let catalog = store.catalog();

        let result = store
            .recommend("Foo", 2, &catalog, SelfMatchPolicy::Identity)
            .unwrap();

        let keys: Vec<&str> = result.iter().map(|scored| scored.item.key.as_str()).collect();
        assert_eq!(vec!["k2", "k3"], keys);
        assert!(approx_eq!(f64, 0.8, result[0].similarity, epsilon = 1e-9));
        assert!(approx_eq!(f64, 0.5, result[1].similarity, epsilon = 1e-9));
    }

    #[test]
    fn should_count_encoder_classes_without_table_row() {
        let dir = tempfile::tempdir().unwrap();
        let paths = fixtures::write_scenario_artifacts(dir.path());
        let items: Vec<Item> = fixtures::scenario_items()
            .into_iter()
            .filter(|item| item.key != "k2")
            .collect();
        io::write_item_table(&paths.items, &items).unwrap();

        let store = ArtifactStore::load(&paths).unwrap();

        assert_eq!(1, store.stats().qty_classes_without_row);
        assert_eq!(vec!["k1", "k3"], store.catalog().keys());
        let catalog = store.catalog();
        let result = store
            .recommend("Foo", 2, &catalog, SelfMatchPolicy::Identity)
            .unwrap();
        assert_eq!(1, result.len());
        assert_eq!("k3", result[0].item.key);
    }

    #[test]
    fn should_report_missing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let paths = fixtures::write_scenario_artifacts(dir.path());
        std::fs::remove_file(&paths.encoder).unwrap();

        match ArtifactStore::load(&paths) {
            Err(ArtifactLoadError::Missing { name, path }) => {
                assert_eq!("encoder", name);
                assert_eq!(paths.encoder, path);
            }
            _ => panic!("expected a missing encoder"),
        }
    }

    #[test]
    fn should_report_corrupt_model() {
        let dir = tempfile::tempdir().unwrap();
        let paths = fixtures::write_scenario_artifacts(dir.path());
        std::fs::write(&paths.model, b"not a model").unwrap();

        assert!(matches!(
            ArtifactStore::load(&paths),
            Err(ArtifactLoadError::Corrupt { .. })
        ));
    }

    #[test]
    fn should_report_item_table_without_required_column() {
        let dir = tempfile::tempdir().unwrap();
        let paths = fixtures::write_scenario_artifacts(dir.path());
        std::fs::write(&paths.items, "isbn,year_of_publication\nk1,2000\n").unwrap();

        assert!(matches!(
            ArtifactStore::load(&paths),
            Err(ArtifactLoadError::ItemTable { .. })
        ));
    }

    #[test]
    fn should_report_encoder_matrix_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let paths = fixtures::write_scenario_artifacts(dir.path());
        BookEncoder::from_classes(vec!["k1".into(), "k2".into()])
            .unwrap()
            .save(&paths.encoder)
            .unwrap();

        assert!(matches!(
            ArtifactStore::load(&paths),
            Err(ArtifactLoadError::Inconsistent(_))
        ));
    }

    #[test]
    fn should_report_model_fitted_on_other_matrix() {
        let dir = tempfile::tempdir().unwrap();
        let paths = fixtures::write_scenario_artifacts(dir.path());
        let wider = fixtures::csr_from_rows(&[
            vec![1.0, 0.0, 0.0, 1.0],
            vec![0.8, 0.6, 0.0, 0.0],
            vec![0.5, 0.0, 0.5, 0.0],
        ]);
        SparseMatrixArtifact::from_matrix(Orientation::ItemsByUsers, wider)
            .save(&paths.matrix)
            .unwrap();

        assert!(matches!(
            ArtifactStore::load(&paths),
            Err(ArtifactLoadError::Inconsistent(_))
        ));
    }

    #[test]
    fn should_build_paths_from_config() {
        let config = ArtifactConfig {
            dir: "/srv/folio".to_string(),
            model_file: "m.bin".to_string(),
            encoder_file: "e.bin".to_string(),
            matrix_file: "x.bin".to_string(),
            items_file: "books.csv".to_string(),
        };

        let paths = ArtifactPaths::from_config(&config);

        assert_eq!(PathBuf::from("/srv/folio/m.bin"), paths.model);
        assert_eq!(PathBuf::from("/srv/folio/books.csv"), paths.items);
    }

    #[test]
    fn should_load_once_and_share_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let paths = fixtures::write_scenario_artifacts(dir.path());
        let cache = ArtifactCache::new(paths);
        assert!(!cache.is_loaded());

        let first = cache.get_or_load().unwrap();
        let second = cache.get_or_load().unwrap();

        assert!(cache.is_loaded());
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn should_retry_after_failed_load() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::in_dir(dir.path());
        let cache = ArtifactCache::new(paths);

        assert!(cache.get_or_load().is_err());
        assert!(!cache.is_loaded());

        fixtures::write_scenario_artifacts(dir.path());
        assert!(cache.get_or_load().is_ok());
    }
}
