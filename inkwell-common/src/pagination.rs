//! Page-number pagination over ordered sequences.
//!
//! Page numbers come straight from query strings, so resolving them never
//! fails: anything that is not an integer selects the first page and any
//! integer outside the valid range selects the last one. A sequence always
//! has at least one page, which is empty for an empty sequence.

use serde::Serialize;
use std::num::NonZeroU64;

pub const DEFAULT_PAGE_SIZE: NonZeroU64 = NonZeroU64::new(10).unwrap();

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub struct Paginator {
    page_size: NonZeroU64,
}

impl Default for Paginator {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl Paginator {
    #[must_use]
    pub fn new(page_size: NonZeroU64) -> Self {
        Self { page_size }
    }

    #[must_use]
    pub fn page_size(self) -> u64 {
        self.page_size.get()
    }

    #[must_use]
    pub fn num_pages(self, count: u64) -> u64 {
        count.div_ceil(self.page_size()).max(1)
    }

    /// Picks the page to show for `requested` out of `count` items.
    #[must_use]
    pub fn window(self, count: u64, requested: Option<&str>) -> PageWindow {
        let num_pages = self.num_pages(count);
        let number = resolve_page_number(requested, num_pages);
        let offset = (number - 1) * self.page_size();

        PageWindow {
            number,
            num_pages,
            count,
            offset,
            limit: self.page_size().min(count - offset.min(count)),
        }
    }

    /// Slices one page out of an in-memory sequence.
    #[must_use]
    pub fn paginate<T: Clone>(self, items: &[T], requested: Option<&str>) -> Page<T> {
        let window = self.window(items.len() as u64, requested);
        let range = window.range();

        window.into_page(items[range].to_vec())
    }
}

fn resolve_page_number(requested: Option<&str>, num_pages: u64) -> u64 {
    let Some(raw) = requested.map(str::trim) else {
        return 1;
    };
    let digits = raw.strip_prefix(['+', '-']).unwrap_or(raw);
    if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return 1;
    }

    // Negative and overflowing integers fail to parse and are out of range.
    raw.parse::<u64>()
        .ok()
        .filter(|number| (1..=num_pages).contains(number))
        .unwrap_or(num_pages)
}

/// The slice of a sequence a page covers: items `offset..offset + limit`.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct PageWindow {
    pub number: u64,
    pub num_pages: u64,
    pub count: u64,
    pub offset: u64,
    pub limit: u64,
}

impl PageWindow {
    /// Index range of the window, for slicing in-memory sequences.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn range(self) -> std::ops::Range<usize> {
        self.offset as usize..(self.offset + self.limit) as usize
    }

    #[must_use]
    pub fn into_page<T>(self, items: Vec<T>) -> Page<T> {
        Page {
            items,
            number: self.number,
            num_pages: self.num_pages,
            count: self.count,
            has_next: self.number < self.num_pages,
            has_previous: self.number > 1,
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: u64,
    pub num_pages: u64,
    pub count: u64,
    pub has_next: bool,
    pub has_previous: bool,
}

impl<T> Page<T> {
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn next_page_number(&self) -> Option<u64> {
        self.has_next.then_some(self.number + 1)
    }

    #[must_use]
    pub fn previous_page_number(&self) -> Option<u64> {
        self.has_previous.then_some(self.number - 1)
    }
}
