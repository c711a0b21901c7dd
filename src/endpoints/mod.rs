use crate::catalog::Catalog;
use crate::io::Year;

pub mod catalog_resource;
pub mod index_resource;
pub mod recommend_resource;

/// Applies an optional year window. A missing bound defaults to the catalog's
/// own bound on that side.
pub(crate) fn year_window<'a>(
    catalog: Catalog<'a>,
    min_year: Option<Year>,
    max_year: Option<Year>,
) -> Catalog<'a> {
    if min_year.is_none() && max_year.is_none() {
        return catalog;
    }
    match catalog.year_bounds() {
        Some((lo, hi)) => {
            catalog.filter_by_year_range(min_year.unwrap_or(lo), max_year.unwrap_or(hi))
        }
        None => catalog,
    }
}

#[cfg(test)]
pub(crate) mod endpoints_test {
    use std::sync::Arc;

    use super::*;
    use crate::artifacts::ArtifactStore;
    use crate::config::RecommendConfig;
    use crate::context::ServingContext;
    use crate::fixtures;

    pub(crate) fn scenario_context() -> ServingContext {
        let dir = tempfile::tempdir().unwrap();
        let paths = fixtures::write_scenario_artifacts(dir.path());
        let store = ArtifactStore::load(&paths).unwrap();
        ServingContext::new(Arc::new(store), RecommendConfig::default(), 1)
    }

    #[test]
    fn should_default_missing_bounds_to_catalog_bounds() {
        let fixture = fixtures::scenario();

        let upper_only = year_window(fixture.catalog(), None, Some(2000));
        let lower_only = year_window(fixture.catalog(), Some(2001), None);
        let unbounded = year_window(fixture.catalog(), None, None);

        assert_eq!(vec!["k1", "k3"], upper_only.keys());
        assert_eq!(vec!["k2"], lower_only.keys());
        assert_eq!(3, unbounded.len());
    }
}
