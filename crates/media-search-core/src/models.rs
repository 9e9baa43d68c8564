//! Wire data model for the search service.
//!
//! The service is lenient about shapes: identifier lookups may return a
//! single object instead of an array, identifiers may be numbers, and the
//! continuation token may be a string or a sort-key array. Everything is
//! normalized here so the rest of the client sees one shape.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// Opaque server-issued continuation token (`search_after`).
///
/// Round-tripped verbatim: a JSON string keeps its contents, any other JSON
/// value keeps its compact JSON text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `null` and `""` both mean "no further data".
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(Self(s)),
            other => Some(Self(other.to_string())),
        }
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for Cursor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Cursor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Cursor::from_value(value)
            .ok_or_else(|| de::Error::custom("cursor must not be null or empty"))
    }
}

/// Identity of a result within a result list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum ItemKey {
    /// `(source-db, identifier)` as reported by the service.
    Composite { db: String, id: String },
    /// Fallback for entries missing either part, keyed by list position.
    Synthetic(usize),
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKey::Composite { db, id } => write!(f, "{}-{}", db, id),
            ItemKey::Synthetic(pos) => write!(f, "item-{}", pos),
        }
    }
}

/// A single media record. Every attribute is optional, and an attribute of
/// an unexpected type decodes as absent rather than failing the response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    #[serde(default, deserialize_with = "lenient_string")]
    pub db: Option<String>,
    #[serde(default, alias = "bildnummer", deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub thumbnail_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub image_url: Option<String>,
    #[serde(default, alias = "datum", deserialize_with = "lenient_string")]
    pub date: Option<String>,
    #[serde(default, alias = "fotografen", deserialize_with = "lenient_string")]
    pub author: Option<String>,
    #[serde(default, alias = "suchtext", deserialize_with = "lenient_string")]
    pub description: Option<String>,
}

impl MediaItem {
    /// The item's identity given its position in the result list.
    pub fn key(&self, position: usize) -> ItemKey {
        match (&self.db, &self.id) {
            (Some(db), Some(id)) => ItemKey::Composite {
                db: db.clone(),
                id: id.clone(),
            },
            _ => ItemKey::Synthetic(position),
        }
    }

    /// Full image reference, falling back to the thumbnail.
    pub fn best_image(&self) -> Option<&str> {
        self.image_url.as_deref().or(self.thumbnail_url.as_deref())
    }
}

/// One response from any search endpoint.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SearchPage {
    #[serde(default, deserialize_with = "one_or_many")]
    pub results: Vec<MediaItem>,
    #[serde(default)]
    pub count: Option<u64>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default, alias = "next_search_after", deserialize_with = "lenient_cursor")]
    pub next_cursor: Option<Cursor>,
}

impl SearchPage {
    /// Total matches, falling back to the number of items in this response.
    pub fn total_count(&self) -> u64 {
        self.count.unwrap_or(self.results.len() as u64)
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(_) | Value::Array(_) | Value::Object(_) => Ok(None),
    }
}

fn lenient_cursor<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Cursor>, D::Error> {
    Value::deserialize(deserializer).map(Cursor::from_value)
}

fn one_or_many<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<MediaItem>, D::Error> {
    let items = match Value::deserialize(deserializer)? {
        Value::Null => Vec::new(),
        Value::Array(values) => values,
        single @ Value::Object(_) => vec![single],
        other => {
            return Err(de::Error::custom(format!(
                "results must be an array or object, got {}",
                other
            )))
        }
    };

    // a malformed entry stays in the list, keyed by position
    Ok(items
        .into_iter()
        .filter(|v| !v.is_null())
        .map(|v| serde_json::from_value(v).unwrap_or_default())
        .collect())
}
