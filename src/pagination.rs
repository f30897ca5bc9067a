//! Page-number pagination with lenient page resolution.
//!
//! A requested page never produces an error: unparsable or missing values
//! resolve to page 1, values below 1 resolve to page 1, values past the end
//! resolve to the last page. An empty result set still has one (empty) page.

use serde::Serialize;

/// Splits a result set of `count` items into pages of `page_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    page_size: u64,
}

impl Paginator {
    pub fn new(page_size: u64) -> Self {
        Self { page_size: page_size.max(1) }
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    pub fn num_pages(&self, count: u64) -> u64 {
        count.div_ceil(self.page_size).max(1)
    }

    /// Resolves the raw `page` query value against `count` items.
    pub fn resolve(&self, raw: Option<&str>, count: u64) -> u64 {
        let last = self.num_pages(count);
        match raw.map(str::trim).and_then(|s| s.parse::<i64>().ok()) {
            Some(n) if n < 1 => 1,
            Some(n) if n as u64 > last => last,
            Some(n) => n as u64,
            None => 1,
        }
    }

    /// `(limit, offset)` for a resolved page number.
    pub fn window(&self, number: u64) -> (u64, u64) {
        (self.page_size, (number.max(1) - 1) * self.page_size)
    }
}

/// One page of results plus the metadata the templates need.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub object_list: Vec<T>,
    /// 1-based.
    pub number: u64,
    pub num_pages: u64,
    /// Items across all pages.
    pub count: u64,
    pub page_size: u64,
}

impl<T> Page<T> {
    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn has_other_pages(&self) -> bool {
        self.has_next() || self.has_previous()
    }

    pub fn next_page_number(&self) -> u64 {
        (self.number + 1).min(self.num_pages)
    }

    pub fn previous_page_number(&self) -> u64 {
        self.number.saturating_sub(1).max(1)
    }

    pub fn page_range(&self) -> std::ops::RangeInclusive<u64> {
        1..=self.num_pages
    }

    /// Human-readable page identity, e.g. `<Page 1 of 3>`.
    pub fn descriptor(&self) -> String {
        format!("<Page {} of {}>", self.number, self.num_pages)
    }

    pub fn is_empty(&self) -> bool {
        self.object_list.is_empty()
    }
}
