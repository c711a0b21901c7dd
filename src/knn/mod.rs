use std::str::FromStr;

use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::catalog::Catalog;
use crate::error::RecommendError;
use crate::io::{DenseIndex, Item, Year};
use crate::knn::encoder::BookEncoder;
use crate::knn::interaction_matrix::InteractionMatrix;
use crate::knn::neighbor_index::{Neighbor, NeighborSearch};

pub mod encoder;
pub mod interaction_matrix;
pub mod neighbor_index;

/// How the query item is removed from its own neighbor list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelfMatchPolicy {
    /// Remove the neighbor carrying the query's own dense index. Falls back to
    /// dropping the farthest neighbor when the query was crowded out by other
    /// rows at distance zero.
    Identity,
    /// Drop the first returned neighbor, whatever it is.
    Position,
}

impl Default for SelfMatchPolicy {
    fn default() -> Self {
        SelfMatchPolicy::Identity
    }
}

impl FromStr for SelfMatchPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "identity" => Ok(SelfMatchPolicy::Identity),
            "position" => Ok(SelfMatchPolicy::Position),
            other => Err(format!("unknown self match policy {:?}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredBook<'a> {
    pub item: &'a Item,
    pub similarity: f64,
}

impl<'a> ScoredBook<'a> {
    pub fn new(item: &'a Item, similarity: f64) -> Self {
        ScoredBook { item, similarity }
    }

    /// Similarity as a percentage, rounded to two decimals.
    pub fn match_percent(&self) -> f64 {
        (self.similarity * 100.0 * 100.0).round() / 100.0
    }

    /// The cover image to display. Anything that does not look like an http(s)
    /// url is replaced by `placeholder`.
    pub fn cover_url<'p>(&'p self, placeholder: &'p str) -> &'p str {
        match self.item.image_url.as_deref() {
            Some(url) if url.starts_with("http") => url,
            _ => placeholder,
        }
    }

    pub fn to_card(&self, placeholder: &str) -> BookCard {
        BookCard {
            isbn: self.item.key.clone(),
            title: self.item.title.clone(),
            author: self.item.author.clone(),
            year: self.item.year,
            image_url: self.cover_url(placeholder).to_string(),
            similarity: self.similarity,
            match_percent: self.match_percent(),
        }
    }
}

/// Owned, serializable form of a [`ScoredBook`] for the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookCard {
    pub isbn: String,
    pub title: String,
    pub author: Option<String>,
    pub year: Year,
    pub image_url: String,
    pub similarity: f64,
    pub match_percent: f64,
}

/// Recommends up to `n` books similar to the first catalog item titled `title`.
///
/// Neighbors that cannot be joined back to `catalog` are dropped, so the
/// result may be shorter than `n` or empty.
pub fn recommend<'a, S: NeighborSearch>(
    title: &str,
    n: usize,
    catalog: &Catalog<'a>,
    encoder: &BookEncoder,
    index: &S,
    matrix: &InteractionMatrix,
    self_match: SelfMatchPolicy,
) -> Result<Vec<ScoredBook<'a>>, RecommendError> {
    if n == 0 {
        return Err(RecommendError::InvalidCount);
    }
    let item = catalog
        .find_by_title(title)
        .ok_or_else(|| RecommendError::UnknownTitle(title.to_string()))?;
    recommend_by_key(&item.key, n, catalog, encoder, index, matrix, self_match)
}

/// Same as [`recommend`], for callers that already know the external key.
pub fn recommend_by_key<'a, S: NeighborSearch>(
    key: &str,
    n: usize,
    catalog: &Catalog<'a>,
    encoder: &BookEncoder,
    index: &S,
    matrix: &InteractionMatrix,
    self_match: SelfMatchPolicy,
) -> Result<Vec<ScoredBook<'a>>, RecommendError> {
    if n == 0 {
        return Err(RecommendError::InvalidCount);
    }
    let query = encoder.transform(key)?;

    let neighbors = index.kneighbors(matrix, query, n + 1);
    let neighbors = remove_self_match(neighbors, query, n, self_match);

    let mut scored_keys: Vec<(&str, f64)> = Vec::with_capacity(neighbors.len());
    for neighbor in neighbors {
        match encoder.inverse_transform(neighbor.index) {
            Some(neighbor_key) => scored_keys.push((neighbor_key, 1.0 - neighbor.distance)),
            None => warn!(index = neighbor.index, "neighbor index outside the encoder range"),
        }
    }

    let (joined, drops) = join_with_catalog(&scored_keys, catalog);
    if drops != JoinDrops::default() {
        debug!(
            key,
            qty_neighbors = scored_keys.len(),
            qty_joined = joined.len(),
            qty_outside_view = drops.outside_view,
            qty_missing_from_table = drops.missing_from_table,
            "dropped neighbors without catalog entry"
        );
    }
    Ok(joined)
}

/// Neighbors that could not be joined back to the catalog, by cause.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct JoinDrops {
    /// Present in the table but filtered out of the view, e.g. by a year window.
    outside_view: usize,
    /// Known to the encoder without a row in the item table.
    missing_from_table: usize,
}

fn remove_self_match(
    mut neighbors: Vec<Neighbor>,
    query: DenseIndex,
    n: usize,
    self_match: SelfMatchPolicy,
) -> Vec<Neighbor> {
    match self_match {
        SelfMatchPolicy::Position => {
            if !neighbors.is_empty() {
                neighbors.remove(0);
            }
        }
        SelfMatchPolicy::Identity => {
            match neighbors.iter().position(|neighbor| neighbor.index == query) {
                Some(position) => {
                    neighbors.remove(position);
                }
                None => neighbors.truncate(n),
            }
        }
    }
    neighbors
}

// Keeps neighbor order and gives each joined item its own similarity.
fn join_with_catalog<'a>(
    scored_keys: &[(&str, f64)],
    catalog: &Catalog<'a>,
) -> (Vec<ScoredBook<'a>>, JoinDrops) {
    let mut position_of: HashMap<&str, usize> = HashMap::with_capacity(scored_keys.len());
    for (position, (key, _)) in scored_keys.iter().enumerate() {
        position_of.entry(*key).or_insert(position);
    }

    let mut matched: Vec<Option<&'a Item>> = vec![None; scored_keys.len()];
    let mut qty_unmatched = position_of.len();
    for item in catalog.iter() {
        if qty_unmatched == 0 {
            break;
        }
        if let Some(&position) = position_of.get(item.key.as_str()) {
            if matched[position].is_none() {
                matched[position] = Some(item);
                qty_unmatched -= 1;
            }
        }
    }

    let unmatched: HashSet<&str> = scored_keys
        .iter()
        .zip(&matched)
        .filter(|(_, item)| item.is_none())
        .map(|((key, _), _)| *key)
        .collect();
    let in_table: HashSet<&str> = if unmatched.is_empty() {
        HashSet::new()
    } else {
        catalog
            .table()
            .iter()
            .map(|item| item.key.as_str())
            .filter(|key| unmatched.contains(key))
            .collect()
    };

    let mut drops = JoinDrops::default();
    let joined = scored_keys
        .iter()
        .zip(matched)
        .filter_map(|((key, similarity), item)| match item {
            Some(item) => Some(ScoredBook::new(item, *similarity)),
            None if in_table.contains(key) => {
                debug!(key, "neighbor is outside the catalog view");
                drops.outside_view += 1;
                None
            }
            None => {
                warn!(key, "neighbor known to the model has no item table row");
                drops.missing_from_table += 1;
                None
            }
        })
        .collect();

    (joined, drops)
}
