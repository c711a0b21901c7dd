use itertools::Itertools;

use crate::io::{Item, Year};
use crate::knn::encoder::BookEncoder;

/// An ordered, borrowed view over items. Filters narrow the view without
/// copying items, and table order is preserved throughout. Every view remembers
/// the table it was narrowed from.
#[derive(Debug, Clone, Default)]
pub struct Catalog<'a> {
    table: &'a [Item],
    items: Vec<&'a Item>,
}

impl<'a> Catalog<'a> {
    pub fn new(items: &'a [Item]) -> Self {
        Catalog {
            table: items,
            items: items.iter().collect(),
        }
    }

    /// The full table this view was built from, ignoring all filters.
    pub fn table(&self) -> &'a [Item] {
        self.table
    }

    /// Keeps the items the trained model knows about. Anything outside the
    /// encoder must never reach the neighbor index.
    pub fn restrict_to_known(&self, encoder: &BookEncoder) -> Catalog<'a> {
        self.retain(|item| encoder.contains(&item.key))
    }

    /// Inclusive on both ends. `lo > hi` yields an empty catalog.
    pub fn filter_by_year_range(&self, lo: Year, hi: Year) -> Catalog<'a> {
        self.retain(|item| lo <= item.year && item.year <= hi)
    }

    /// Distinct titles in ascending order.
    pub fn selectable_titles(&self) -> Vec<&'a str> {
        self.items
            .iter()
            .map(|item| item.title.as_str())
            .sorted()
            .dedup()
            .collect()
    }

    pub fn year_bounds(&self) -> Option<(Year, Year)> {
        self.items
            .iter()
            .map(|item| item.year)
            .minmax()
            .into_option()
    }

    /// First item in table order with exactly this title.
    pub fn find_by_title(&self, title: &str) -> Option<&'a Item> {
        self.items.iter().copied().find(|item| item.title == title)
    }

    pub fn find_by_key(&self, key: &str) -> Option<&'a Item> {
        self.items.iter().copied().find(|item| item.key == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a Item> + '_ {
        self.items.iter().copied()
    }

    pub fn keys(&self) -> Vec<&'a str> {
        self.items.iter().map(|item| item.key.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn retain<F>(&self, keep: F) -> Catalog<'a>
    where
        F: Fn(&Item) -> bool,
    {
        Catalog {
            table: self.table,
            items: self.items.iter().copied().filter(|item| keep(*item)).collect(),
        }
    }
}

impl PartialEq for Catalog<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.items.len() == other.items.len()
            && self
                .items
                .iter()
                .zip(other.items.iter())
                .all(|(left, right)| left == right)
    }
}

#[cfg(test)]
mod catalog_test {
    use super::*;
    use crate::fixtures;

    #[test]
    fn should_filter_scenario_by_year() {
        let fixture = fixtures::scenario();
        let catalog = fixture.catalog();

        let filtered = catalog.filter_by_year_range(2000, 2001);

        assert_eq!(vec!["k1", "k2"], filtered.keys());
    }

    #[test]
    fn should_return_empty_catalog_for_inverted_range() {
        let fixture = fixtures::scenario();
        let filtered = fixture.catalog().filter_by_year_range(2001, 2000);
        assert!(filtered.is_empty());
        assert_eq!(None, filtered.year_bounds());
    }

    #[test]
    fn should_keep_everything_within_own_bounds() {
        let fixture = fixtures::scenario();
        let catalog = fixture.catalog();
        let (lo, hi) = catalog.year_bounds().unwrap();

        assert_eq!((1999, 2001), (lo, hi));
        assert_eq!(catalog, catalog.filter_by_year_range(lo, hi));
    }

    #[test]
    fn should_restrict_to_known_idempotently() {
        let fixture = fixtures::scenario();
        let mut items = fixture.items.clone();
        items.push(Item::new("k404", "Not In Model", 2005));
        let catalog = Catalog::new(&items);

        let once = catalog.restrict_to_known(&fixture.encoder);
        let twice = once.restrict_to_known(&fixture.encoder);

        assert_eq!(vec!["k1", "k2", "k3"], once.keys());
        assert_eq!(once, twice);
    }

    #[test]
    fn should_remember_the_table_behind_filtered_views() {
        let fixture = fixtures::scenario();

        let narrowed = fixture
            .catalog()
            .filter_by_year_range(1999, 1999)
            .restrict_to_known(&fixture.encoder);

        assert_eq!(vec!["k3"], narrowed.keys());
        assert_eq!(3, narrowed.table().len());
    }

    #[test]
    fn should_collapse_duplicate_titles() {
        let items = vec![
            Item::new("a", "Dune", 1965),
            Item::new("b", "Carrie", 1974),
            Item::new("c", "Dune", 1984),
            Item::new("d", "Anthem", 1938),
        ];
        let catalog = Catalog::new(&items);

        assert_eq!(vec!["Anthem", "Carrie", "Dune"], catalog.selectable_titles());
        assert_eq!("a", catalog.find_by_title("Dune").unwrap().key);
        assert_eq!("c", catalog.find_by_key("c").unwrap().key);
        assert!(catalog.find_by_title("dune").is_none());
    }
}
