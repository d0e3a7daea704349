//! Numbered page helpers shared by every feed.
//!
//! Out-of-range requests never fail: a page number that does not parse falls
//! back to the first page, and a number outside `1..=num_pages` lands on the
//! last page. An empty sequence still has one (empty) page.

use std::num::{IntErrorKind, NonZeroU32};

pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Page number as requested by the client, before clamping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageNumber(i64);

impl PageNumber {
    pub const FIRST: Self = Self(1);

    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Read a `?page=` value; anything that is not an integer means page 1.
    /// Integers too wide for `i64` saturate, so they still clamp to the last
    /// page.
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(value) = raw.map(str::trim) else {
            return Self::FIRST;
        };
        match value.parse::<i64>() {
            Ok(number) => Self(number),
            Err(err) => match err.kind() {
                IntErrorKind::PosOverflow => Self(i64::MAX),
                IntErrorKind::NegOverflow => Self(i64::MIN),
                _ => Self::FIRST,
            },
        }
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl Default for PageNumber {
    fn default() -> Self {
        Self::FIRST
    }
}

/// Resolved slice bounds for one page of a sequence of `total` items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub number: u32,
    pub num_pages: u32,
    pub offset: u64,
    pub limit: u32,
    pub total_count: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    page_size: NonZeroU32,
}

impl Default for Paginator {
    fn default() -> Self {
        Self {
            page_size: NonZeroU32::MIN.saturating_add(DEFAULT_PAGE_SIZE - 1),
        }
    }
}

impl Paginator {
    pub fn new(page_size: NonZeroU32) -> Self {
        Self { page_size }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size.get()
    }

    pub fn num_pages(&self, total: u64) -> u32 {
        if total == 0 {
            return 1;
        }
        let size = u64::from(self.page_size.get());
        u32::try_from(total.div_ceil(size)).unwrap_or(u32::MAX)
    }

    /// Clamp `requested` and compute the offset/limit to fetch for it.
    pub fn window(&self, total: u64, requested: PageNumber) -> PageWindow {
        let num_pages = self.num_pages(total);
        let number = match u32::try_from(requested.get()) {
            Ok(value) if (1..=num_pages).contains(&value) => value,
            _ => num_pages,
        };
        let size = self.page_size.get();
        PageWindow {
            number,
            num_pages,
            offset: u64::from(number - 1) * u64::from(size),
            limit: size,
            total_count: total,
        }
    }

    /// Slice an already ordered sequence.
    pub fn paginate<T>(&self, items: Vec<T>, requested: PageNumber) -> Page<T> {
        let window = self.window(items.len() as u64, requested);
        let start = usize::try_from(window.offset).unwrap_or(usize::MAX);
        let slice = items
            .into_iter()
            .skip(start)
            .take(window.limit as usize)
            .collect();
        Page::from_window(slice, window)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: u32,
    pub num_pages: u32,
    pub total_count: u64,
}

impl<T> Page<T> {
    pub fn from_window(items: Vec<T>, window: PageWindow) -> Self {
        Self {
            items,
            number: window.number,
            num_pages: window.num_pages,
            total_count: window.total_count,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn next_number(&self) -> Option<u32> {
        self.has_next().then_some(self.number + 1)
    }

    pub fn previous_number(&self) -> Option<u32> {
        self.has_previous().then_some(self.number - 1)
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            number: self.number,
            num_pages: self.num_pages,
            total_count: self.total_count,
        }
    }
}
