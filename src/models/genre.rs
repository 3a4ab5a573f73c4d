//! Genre model

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::skip_serializing_none;

use super::fields::{self, pick_id, pick_str, Object};

const ID_KEYS: &[&str] = &["id", "genreId", "genre_id", "_id"];
const NAME_KEYS: &[&str] = &["name", "genreName", "genre_name", "title", "label"];

pub(crate) const GENRE_LIST_ENVELOPES: &[&str] = &["data", "genres", "items", "content"];

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genre {
    pub id: Option<String>,
    pub name: String,
}

impl Genre {
    /// Normalize a genre given as a plain name, an object, or a bare id.
    /// A bare id yields a genre named after the id so nothing is lost.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(name) => {
                let name = name.trim();
                (!name.is_empty()).then(|| Genre { id: None, name: name.to_string() })
            }
            Value::Number(id) => Some(Genre {
                id: Some(id.to_string()),
                name: id.to_string(),
            }),
            Value::Object(obj) => Self::from_object(obj),
            _ => None,
        }
    }

    pub(crate) fn from_object(obj: &Object) -> Option<Self> {
        let id = pick_id(obj, ID_KEYS);
        let name = pick_str(obj, NAME_KEYS).or_else(|| id.clone())?;
        Some(Genre { id, name })
    }

    /// Normalize a list payload, skipping entries that carry no usable name
    pub fn list_from_value(value: &Value) -> Vec<Self> {
        fields::list_items(value, GENRE_LIST_ENVELOPES)
            .iter()
            .filter_map(Genre::from_value)
            .collect()
    }

    /// Case-insensitive match on id or name
    pub fn matches(&self, needle: &str) -> bool {
        let needle = needle.trim();
        self.name.eq_ignore_ascii_case(needle)
            || self.id.as_deref().map(|id| id == needle).unwrap_or(false)
    }
}
