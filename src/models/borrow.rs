//! Borrow (loan) model for the user dashboard

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::skip_serializing_none;

use super::book::Book;
use super::fields::{self, pick_datetime, pick_id, pick_str, Object};

const ID_KEYS: &[&str] = &["id", "borrowId", "loanId", "_id"];
const BOOK_ID_KEYS: &[&str] = &["bookId", "book_id", "itemId"];
const BOOK_TITLE_KEYS: &[&str] = &["bookTitle", "bookName", "title"];
const BORROWED_KEYS: &[&str] = &[
    "borrowDate",
    "borrowedAt",
    "issueDate",
    "startDate",
    "date",
    "borrow_date",
];
const DUE_KEYS: &[&str] = &["dueDate", "dueAt", "returnBy", "due_date"];
const RETURNED_KEYS: &[&str] = &["returnDate", "returnedAt", "returned_date", "return_date"];

pub(crate) const BORROW_LIST_ENVELOPES: &[&str] = &["data", "borrows", "loans", "items", "content"];

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Borrow {
    pub id: Option<String>,
    pub book_id: Option<String>,
    pub book_title: Option<String>,
    pub borrowed_at: Option<DateTime<Utc>>,
    pub due_at: Option<DateTime<Utc>>,
    pub returned_at: Option<DateTime<Utc>>,
}

impl Borrow {
    pub(crate) fn from_object(obj: &Object) -> Self {
        // The book may be embedded instead of referenced
        let embedded = obj.get("book").and_then(Book::from_value);

        Borrow {
            id: pick_id(obj, ID_KEYS),
            book_id: pick_id(obj, BOOK_ID_KEYS)
                .or_else(|| embedded.as_ref().and_then(|b| b.id.clone())),
            book_title: pick_str(obj, BOOK_TITLE_KEYS)
                .or_else(|| embedded.map(|b| b.title)),
            borrowed_at: pick_datetime(obj, BORROWED_KEYS),
            due_at: pick_datetime(obj, DUE_KEYS),
            returned_at: pick_datetime(obj, RETURNED_KEYS),
        }
    }

    pub fn list_from_value(value: &Value) -> Vec<Self> {
        fields::list_items(value, BORROW_LIST_ENVELOPES)
            .iter()
            .filter_map(Value::as_object)
            .map(Borrow::from_object)
            .collect()
    }

    pub fn is_active(&self) -> bool {
        self.returned_at.is_none()
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.is_active() && self.due_at.map(|due| due < now).unwrap_or(false)
    }
}
