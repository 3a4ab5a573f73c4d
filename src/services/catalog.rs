//! Catalog browsing: books, genres, and client-side search/filter/sort

use std::cmp::Ordering;
use std::sync::Arc;

use indexmap::IndexMap;
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

use crate::{
    error::{ClientError, ClientResult},
    models::{book::Book, genre::Genre},
    transport::{ApiRequest, HttpTransport},
};

pub const DEFAULT_PER_PAGE: usize = 20;
pub const MAX_PER_PAGE: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Title,
    Author,
    Year,
    Availability,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Catalog search parameters, all optional
#[derive(Debug, Clone, Default)]
pub struct CatalogQuery {
    /// Free text matched against title, author and ISBN
    pub text: Option<String>,
    /// Genre name or id
    pub genre: Option<String>,
    pub author: Option<String>,
    pub available_only: bool,
    pub year_from: Option<i32>,
    pub year_to: Option<i32>,
    pub sort: SortKey,
    pub order: SortOrder,
    /// 1-based
    pub page: Option<usize>,
    pub per_page: Option<usize>,
}

/// One page of results
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Number of matches before paging
    pub total: usize,
    pub page: usize,
    pub per_page: usize,
}

impl<T> Page<T> {
    pub fn page_count(&self) -> usize {
        self.total.div_ceil(self.per_page)
    }

    pub fn has_next(&self) -> bool {
        self.page < self.page_count()
    }
}

#[derive(Clone)]
pub struct CatalogService {
    transport: Arc<HttpTransport>,
}

impl CatalogService {
    pub fn new(transport: Arc<HttpTransport>) -> Self {
        Self { transport }
    }

    pub async fn list_books(&self) -> ClientResult<Vec<Book>> {
        let path = self.transport.config().endpoints.books.clone();
        let body = self.transport.send_json(ApiRequest::get(path)).await?;
        Ok(Book::list_from_value(&body))
    }

    pub async fn get_book(&self, id: &str) -> ClientResult<Book> {
        let base = self.transport.config().endpoints.books.trim_end_matches('/').to_string();
        let body = self
            .transport
            .send_json(ApiRequest::get(format!("{}/{}", base, id)))
            .await?;
        Book::from_value(&body)
            .ok_or_else(|| ClientError::Server(format!("Malformed payload for book {}", id)))
    }

    pub async fn list_genres(&self) -> ClientResult<Vec<Genre>> {
        let path = self.transport.config().endpoints.genres.clone();
        let body = self.transport.send_json(ApiRequest::get(path)).await?;
        Ok(Genre::list_from_value(&body))
    }

    /// Fetch the catalog and apply `query` locally
    pub async fn search(&self, query: &CatalogQuery) -> ClientResult<Page<Book>> {
        let books = self.list_books().await?;
        let page = apply_query(books, query);
        tracing::debug!("Catalog search matched {} books", page.total);
        Ok(page)
    }

    /// Fetch the catalog grouped by genre name
    pub async fn books_by_genre(&self) -> ClientResult<IndexMap<String, Vec<Book>>> {
        Ok(group_by_genre(self.list_books().await?))
    }
}

/// Filter, sort and page a list of books
pub fn apply_query(books: Vec<Book>, query: &CatalogQuery) -> Page<Book> {
    let text = query.text.as_deref().map(fold).filter(|t| !t.is_empty());
    let isbn = query.text.as_deref().map(isbn_key).filter(|i| !i.is_empty());
    let author = query.author.as_deref().map(fold).filter(|a| !a.is_empty());
    let genre = query
        .genre
        .as_deref()
        .map(str::trim)
        .filter(|g| !g.is_empty());

    let mut matches: Vec<Book> = books
        .into_iter()
        .filter(|book| {
            text.as_deref()
                .map_or(true, |text| matches_text(book, text, isbn.as_deref()))
        })
        .filter(|book| {
            author.as_ref().map_or(true, |author| {
                book.author.as_deref().map_or(false, |a| fold(a).contains(author.as_str()))
            })
        })
        .filter(|book| {
            genre.map_or(true, |genre| {
                book.genre.as_ref().map_or(false, |g| g.matches(genre))
            })
        })
        .filter(|book| !query.available_only || book.is_available())
        .filter(|book| match (query.year_from, query.year_to, book.year) {
            (None, None, _) => true,
            (_, _, None) => false,
            (from, to, Some(year)) => {
                from.map_or(true, |from| year >= from) && to.map_or(true, |to| year <= to)
            }
        })
        .collect();

    matches.sort_by(|a, b| compare(a, b, query.sort, query.order));

    let total = matches.len();
    let per_page = query
        .per_page
        .unwrap_or(DEFAULT_PER_PAGE)
        .clamp(1, MAX_PER_PAGE);
    let page = query.page.unwrap_or(1).max(1);
    let items = matches
        .into_iter()
        .skip((page - 1).saturating_mul(per_page))
        .take(per_page)
        .collect();

    Page {
        items,
        total,
        page,
        per_page,
    }
}

/// Group books under their genre name, in order of first appearance
pub fn group_by_genre(books: Vec<Book>) -> IndexMap<String, Vec<Book>> {
    let mut groups: IndexMap<String, Vec<Book>> = IndexMap::new();
    for book in books {
        let name = book.genre_name().unwrap_or("Uncategorized").to_string();
        groups.entry(name).or_default().push(book);
    }
    groups
}

/// Lowercase and strip accents so "Misérables" matches "miserables"
fn fold(s: &str) -> String {
    s.trim()
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Free text hits the title, the author or the ISBN
fn matches_text(book: &Book, text: &str, isbn: Option<&str>) -> bool {
    fold(&book.title).contains(text)
        || book.author.as_deref().map_or(false, |a| fold(a).contains(text))
        || match (isbn, book.isbn.as_deref()) {
            (Some(wanted), Some(own)) => isbn_key(own).contains(wanted),
            _ => false,
        }
}

/// ISBN as compared in searches: no separators, uppercase check digit
fn isbn_key(s: &str) -> String {
    s.chars()
        .filter(|c| !matches!(c, '-' | ' '))
        .collect::<String>()
        .to_ascii_uppercase()
}

/// Missing values sort last regardless of direction; ties fall back to title
fn compare(a: &Book, b: &Book, key: SortKey, order: SortOrder) -> Ordering {
    let primary = match key {
        SortKey::Title => Some(fold(&a.title).cmp(&fold(&b.title))),
        SortKey::Author => optional(a.author.as_deref().map(fold), b.author.as_deref().map(fold)),
        SortKey::Year => optional(a.year, b.year),
        SortKey::Availability => optional(a.available_copies, b.available_copies),
    };

    let primary = match primary {
        Some(ordering) if order == SortOrder::Desc => ordering.reverse(),
        Some(ordering) => ordering,
        None => return missing_last(a, b, key),
    };

    primary.then_with(|| fold(&a.title).cmp(&fold(&b.title)))
}

/// `None` when exactly one side is missing, so the caller keeps it last
fn optional<T: Ord>(a: Option<T>, b: Option<T>) -> Option<Ordering> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.cmp(&b)),
        (None, None) => Some(Ordering::Equal),
        _ => None,
    }
}

fn missing_last(a: &Book, b: &Book, key: SortKey) -> Ordering {
    let a_missing = match key {
        SortKey::Title => false,
        SortKey::Author => a.author.is_none(),
        SortKey::Year => a.year.is_none(),
        SortKey::Availability => a.available_copies.is_none(),
    };
    let b_missing = match key {
        SortKey::Title => false,
        SortKey::Author => b.author.is_none(),
        SortKey::Year => b.year.is_none(),
        SortKey::Availability => b.available_copies.is_none(),
    };
    a_missing.cmp(&b_missing)
}
