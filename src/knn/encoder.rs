use std::path::Path;

use hashbrown::HashMap;
use tracing::debug;

use crate::error::{ArtifactLoadError, RecommendError};
use crate::io::{self, DenseIndex};

/// Bijection between the external keys the model was trained on and the dense
/// row indices of the interaction matrix. Position `i` of `classes` is the key
/// for row `i`.
#[derive(Debug, Clone)]
pub struct BookEncoder {
    classes: Vec<String>,
    key_to_index: HashMap<String, DenseIndex>,
}

impl BookEncoder {
    pub fn from_classes(classes: Vec<String>) -> Result<Self, ArtifactLoadError> {
        let mut key_to_index = HashMap::with_capacity(classes.len());
        for (index, key) in classes.iter().enumerate() {
            if key_to_index.insert(key.clone(), index).is_some() {
                return Err(ArtifactLoadError::Inconsistent(format!(
                    "encoder class {:?} occurs more than once",
                    key
                )));
            }
        }
        Ok(BookEncoder {
            classes,
            key_to_index,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ArtifactLoadError> {
        let classes: Vec<String> = io::read_bincode("encoder", path)?;
        debug!(path = %path.display(), qty_classes = classes.len(), "read encoder");
        BookEncoder::from_classes(classes)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        io::write_bincode(path, &self.classes)
    }

    pub fn transform(&self, key: &str) -> Result<DenseIndex, RecommendError> {
        self.key_to_index
            .get(key)
            .copied()
            .ok_or_else(|| RecommendError::UnknownKey(key.to_string()))
    }

    pub fn inverse_transform(&self, index: DenseIndex) -> Option<&str> {
        self.classes.get(index).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.key_to_index.contains_key(key)
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}
