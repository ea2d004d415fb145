//! Practice library
//!
//! Every `*.json` file in the data directory is one book: a JSON list of
//! item records, named after the file stem. Generator blueprints and backup
//! copies live in the same directory and are skipped.

pub mod normalize;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use pulpit_algo::{Book, DataError, PracticeItem};

const SKIPPED_PREFIXES: [&str; 2] = ["blueprint", "_backup"];

#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path} is not a valid item list: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{path}: {source}")]
    Invalid {
        path: PathBuf,
        #[source]
        source: DataError,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookSummary {
    pub name: String,
    pub items: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Library {
    books: BTreeMap<String, Book>,
}

impl Library {
    /// Loads every book file in `dir`, creating the directory when missing.
    /// Broken files are logged and skipped.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self, LibraryError> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|source| LibraryError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut books = BTreeMap::new();
        for path in book_files(dir)? {
            let Some(name) = book_name(&path) else {
                continue;
            };
            match load_book(&path) {
                Ok(book) => {
                    books.insert(name, book);
                }
                Err(err) => warn!(path = %path.display(), error = %err, "skipping book file"),
            }
        }

        info!(dir = %dir.display(), books = books.len(), "practice library loaded");

        Ok(Self { books })
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Book> {
        self.books.get(name)
    }

    /// Sorted book names
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.books.keys().map(String::as_str)
    }

    pub fn summaries(&self) -> Vec<BookSummary> {
        self.books
            .iter()
            .map(|(name, book)| BookSummary {
                name: name.clone(),
                items: book.len(),
            })
            .collect()
    }
}

/// Parses and validates one book file.
pub fn load_book(path: impl AsRef<Path>) -> Result<Book, LibraryError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|source| LibraryError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let items: Vec<PracticeItem> = serde_json::from_str(&raw).map_err(|source| LibraryError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    Book::new(items).map_err(|source| LibraryError::Invalid {
        path: path.to_path_buf(),
        source,
    })
}

/// `*.json` files that are neither blueprints nor backups, sorted by name
pub fn book_files(dir: &Path) -> Result<Vec<PathBuf>, LibraryError> {
    let entries = std::fs::read_dir(dir).map_err(|source| LibraryError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_book_file(path))
        .collect();
    files.sort();
    Ok(files)
}

pub fn is_book_file(path: &Path) -> bool {
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let skipped = path
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| SKIPPED_PREFIXES.iter().any(|prefix| name.starts_with(prefix)));
    is_json && !skipped
}

fn book_name(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
}
