//! Book (catalog entry) model.
//!
//! Catalog entries arrive from several API versions with different field names:
//! the title may be `title`, `bookName` or `bookTitle`, the genre may be a string,
//! an id or an object, and availability may be a count or a flag. [`Book::from_value`]
//! is the only place that knows about those variations.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::skip_serializing_none;

use super::fields::{self, pick_bool, pick_i32, pick_id, pick_str, pick_u32, Object};
use super::genre::Genre;

const ID_KEYS: &[&str] = &["id", "bookId", "book_id", "_id"];
const TITLE_KEYS: &[&str] = &["title", "bookName", "bookTitle", "book_name", "name"];
const AUTHOR_KEYS: &[&str] = &["author", "authorName", "bookAuthor", "author_name", "authors"];
const GENRE_KEYS: &[&str] = &["genre", "genreName", "bookGenre", "category"];
const ISBN_KEYS: &[&str] = &["isbn", "isbn13", "isbn10", "ISBN"];
const YEAR_KEYS: &[&str] = &["year", "publicationYear", "publishedYear", "publication_year"];
const DESCRIPTION_KEYS: &[&str] = &["description", "summary", "abstract", "bookDescription"];
const COVER_KEYS: &[&str] = &["coverUrl", "cover_url", "cover", "image", "imageUrl", "thumbnail"];
const AVAILABLE_COPIES_KEYS: &[&str] = &[
    "availableCopies",
    "available_copies",
    "copiesAvailable",
    "availableCount",
];
const TOTAL_COPIES_KEYS: &[&str] = &["totalCopies", "total_copies", "copies", "quantity"];
const AVAILABLE_FLAG_KEYS: &[&str] = &["available", "isAvailable", "is_available"];

pub(crate) const BOOK_LIST_ENVELOPES: &[&str] = &["data", "books", "items", "content", "results"];
pub(crate) const BOOK_ENVELOPES: &[&str] = &["data", "book"];

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub id: Option<String>,
    pub title: String,
    pub author: Option<String>,
    pub genre: Option<Genre>,
    pub isbn: Option<String>,
    pub year: Option<i32>,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    pub available_copies: Option<u32>,
    pub total_copies: Option<u32>,
}

impl Book {
    /// Normalize a single book payload, bare or enveloped
    pub fn from_value(value: &Value) -> Option<Self> {
        fields::entity(value, BOOK_ENVELOPES).and_then(Self::from_object)
    }

    /// Entries without any title are dropped; an untitled row cannot be shown or searched
    pub(crate) fn from_object(obj: &Object) -> Option<Self> {
        let title = pick_str(obj, TITLE_KEYS)?;

        let author = pick_str(obj, AUTHOR_KEYS).or_else(|| author_from_list(obj));

        let genre = GENRE_KEYS
            .iter()
            .find_map(|key| obj.get(*key).and_then(Genre::from_value))
            .or_else(|| {
                pick_id(obj, &["genreId", "genre_id"]).map(|id| Genre {
                    id: Some(id.clone()),
                    name: id,
                })
            });

        let total_copies = pick_u32(obj, TOTAL_COPIES_KEYS);
        let available_copies = pick_u32(obj, AVAILABLE_COPIES_KEYS).or_else(|| {
            pick_bool(obj, AVAILABLE_FLAG_KEYS)
                .map(|available| if available { total_copies.unwrap_or(1) } else { 0 })
        });

        Some(Book {
            id: pick_id(obj, ID_KEYS),
            title,
            author,
            genre,
            isbn: pick_str(obj, ISBN_KEYS).map(|isbn| isbn.replace(['-', ' '], "")),
            year: pick_i32(obj, YEAR_KEYS).or_else(|| year_from_date(obj)),
            description: pick_str(obj, DESCRIPTION_KEYS),
            cover_url: pick_str(obj, COVER_KEYS),
            available_copies,
            total_copies,
        })
    }

    pub fn list_from_value(value: &Value) -> Vec<Self> {
        let items = fields::list_items(value, BOOK_LIST_ENVELOPES);
        let books: Vec<Book> = items
            .iter()
            .filter_map(|item| item.as_object().and_then(Book::from_object))
            .collect();
        if books.len() < items.len() {
            tracing::debug!("Dropped {} untitled catalog entries", items.len() - books.len());
        }
        books
    }

    /// Unknown availability counts as available; the server decides at borrow time
    pub fn is_available(&self) -> bool {
        self.available_copies.map(|n| n > 0).unwrap_or(true)
    }

    pub fn genre_name(&self) -> Option<&str> {
        self.genre.as_ref().map(|g| g.name.as_str())
    }
}

fn author_from_list(obj: &Object) -> Option<String> {
    let authors = AUTHOR_KEYS.iter().find_map(|key| obj.get(*key)?.as_array())?;
    let names: Vec<String> = authors
        .iter()
        .filter_map(|a| match a {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Object(o) => pick_str(o, &["name", "fullName", "authorName"]).or_else(|| {
                let first = pick_str(o, &["firstName", "firstname"]);
                let last = pick_str(o, &["lastName", "lastname"]);
                match (first, last) {
                    (Some(f), Some(l)) => Some(format!("{} {}", f, l)),
                    (f, l) => f.or(l),
                }
            }),
            _ => None,
        })
        .filter(|s| !s.is_empty())
        .collect();
    (!names.is_empty()).then(|| names.join(", "))
}

fn year_from_date(obj: &Object) -> Option<i32> {
    let date = pick_str(obj, &["publicationDate", "publishedDate", "publication_date"])?;
    date.get(..4)?.parse().ok()
}
