//! Validated item sets
//!
//! A [`Book`] is the unit a learner selects. Items are validated once at
//! construction and then shared by reference with every queue that loads
//! the book.

use std::collections::HashSet;
use std::sync::Arc;

use crate::types::{DataError, PracticeItem};

/// Ordered, immutable, validated list of practice items
#[derive(Debug, Clone, Default)]
pub struct Book {
    items: Arc<[Arc<PracticeItem>]>,
}

impl Book {
    /// Validates ids (positive, unique) and required phrases.
    pub fn new(items: Vec<PracticeItem>) -> Result<Self, DataError> {
        let mut seen = HashSet::with_capacity(items.len());

        for (index, item) in items.iter().enumerate() {
            if item.id == 0 {
                return Err(DataError::ZeroId { index });
            }
            if !seen.insert(item.id) {
                return Err(DataError::DuplicateId(item.id));
            }
            if item.source_phrase.trim().is_empty() {
                return Err(DataError::EmptyField {
                    id: item.id,
                    field: "phrase_cn",
                });
            }
            if item.target_phrase.trim().is_empty() {
                return Err(DataError::EmptyField {
                    id: item.id,
                    field: "phrase_en",
                });
            }
        }

        Ok(Self {
            items: items.into_iter().map(Arc::new).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[Arc<PracticeItem>] {
        &self.items
    }

    pub fn get(&self, id: u32) -> Option<&Arc<PracticeItem>> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.items.iter().map(|item| item.id)
    }
}
