//! Response formatting and pagination.
//!
//! Answers come back from the upstream with decorative artifacts and no
//! length bound; this crate cleans them and splits them into deliverable
//! pages. Both passes are deterministic, so identical answers are memoized
//! in bounded caches.

pub mod format;
pub mod nav;
pub mod split;

pub use format::clean_text;
pub use nav::{Direction, NavError, PageView, PaginationState, PaginationStore};
pub use split::split_pages;

use std::sync::Arc;

use moka::sync::Cache;

use relay_core::limits::{DEFAULT_MAX_PAGE_CHARS, PAGINATION_CACHE_CAPACITY};

/// Formatter + splitter with bounded memoization.
#[derive(Clone)]
pub struct Paginator {
    max_page_chars: usize,
    format_cache: Cache<String, Arc<String>>,
    page_cache: Cache<String, Arc<Vec<String>>>,
}

impl Paginator {
    pub fn new(max_page_chars: usize, cache_capacity: u64) -> Self {
        Self {
            max_page_chars,
            format_cache: Cache::new(cache_capacity),
            page_cache: Cache::new(cache_capacity),
        }
    }

    pub fn max_page_chars(&self) -> usize {
        self.max_page_chars
    }

    /// Cleans decorative artifacts out of a raw answer.
    pub fn format(&self, raw: &str) -> Arc<String> {
        self.format_cache
            .get_with(raw.to_string(), || Arc::new(clean_text(raw)))
    }

    /// Splits cleaned text into pages of at most `max_page_chars`.
    pub fn paginate(&self, clean: &str) -> Arc<Vec<String>> {
        let max = self.max_page_chars;
        self.page_cache
            .get_with(clean.to_string(), || Arc::new(split_pages(clean, max)))
    }
}

impl Default for Paginator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PAGE_CHARS, PAGINATION_CACHE_CAPACITY)
    }
}
