use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, warn};

use crate::error::ArtifactLoadError;

pub type ExternalKey = String;
pub type DenseIndex = usize;
pub type Year = i32;

/// A book as described by the item table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Item {
    #[serde(rename = "isbn")]
    pub key: ExternalKey,
    #[serde(rename = "book_title")]
    pub title: String,
    #[serde(rename = "book_author", default, deserialize_with = "non_empty")]
    pub author: Option<String>,
    #[serde(rename = "year_of_publication", deserialize_with = "integral_year")]
    pub year: Year,
    #[serde(default, deserialize_with = "non_empty")]
    pub publisher: Option<String>,
    #[serde(rename = "image_url_m", default, deserialize_with = "non_empty")]
    pub image_url: Option<String>,
}

impl Item {
    pub fn new(key: &str, title: &str, year: Year) -> Self {
        Item {
            key: key.to_string(),
            title: title.to_string(),
            author: None,
            year,
            publisher: None,
            image_url: None,
        }
    }
}

// Cleaned tables sometimes carry the year as "2001.0".
fn integral_year<'de, D>(deserializer: D) -> Result<Year, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    let raw = raw.trim();
    if let Ok(year) = raw.parse::<Year>() {
        return Ok(year);
    }
    match raw.parse::<f64>() {
        Ok(year) if year.fract() == 0.0 && year.abs() <= Year::MAX as f64 => Ok(year as Year),
        _ => Err(D::Error::custom(format!("invalid publication year {:?}", raw))),
    }
}

fn non_empty<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|v| !v.trim().is_empty()))
}

/// Reads the item table. Rows are kept in file order, which defines the
/// "first match" for duplicate titles.
pub fn read_item_table(path: &Path) -> Result<Vec<Item>, ArtifactLoadError> {
    ensure_exists("item table", path)?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|source| ArtifactLoadError::ItemTable {
            path: path.to_path_buf(),
            source,
        })?;

    let items = reader
        .deserialize::<Item>()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| ArtifactLoadError::ItemTable {
            path: path.to_path_buf(),
            source,
        })?;

    if items.is_empty() {
        warn!(path = %path.display(), "item table is empty");
    }
    debug!(path = %path.display(), qty_items = items.len(), "read item table");
    Ok(items)
}

pub fn write_item_table(path: &Path, items: &[Item]) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for item in items {
        writer.serialize(item)?;
    }
    writer.flush()?;
    Ok(())
}

pub(crate) fn ensure_exists(name: &'static str, path: &Path) -> Result<(), ArtifactLoadError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(ArtifactLoadError::Missing {
            name,
            path: path.to_path_buf(),
        })
    }
}

pub(crate) fn read_bincode<T: DeserializeOwned>(
    name: &'static str,
    path: &Path,
) -> Result<T, ArtifactLoadError> {
    ensure_exists(name, path)?;
    let file = File::open(path).map_err(|source| ArtifactLoadError::Io {
        name,
        path: path.to_path_buf(),
        source,
    })?;
    bincode::deserialize_from(BufReader::new(file)).map_err(|source| {
        ArtifactLoadError::Corrupt {
            name,
            path: path.to_path_buf(),
            source,
        }
    })
}

pub(crate) fn write_bincode<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    bincode::serialize_into(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}
