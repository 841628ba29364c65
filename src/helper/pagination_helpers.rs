use serde::Serialize;

/// Splits `total` ordered items into pages of `per_page`.
#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    pub total: u64,
    pub per_page: u32,
}

/// The slice of the result set one page covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub number: u32,
    pub num_pages: u32,
    pub offset: u32,
    pub limit: u32,
}

#[derive(Debug, Serialize)]
pub struct Page<T: Serialize> {
    pub items: Vec<T>,
    pub number: u32,
    pub num_pages: u32,
    pub total_count: u64,
    pub has_next: bool,
    pub has_previous: bool,
    pub next_page_number: Option<u32>,
    pub previous_page_number: Option<u32>,
}

impl Paginator {
    pub fn new(total: u64, per_page: u32) -> Self {
        Paginator { total, per_page: per_page.max(1) }
    }

    /// An empty result still has one (empty) page.
    pub fn num_pages(&self) -> u32 {
        let pages = self.total.div_ceil(u64::from(self.per_page)).max(1);
        u32::try_from(pages).unwrap_or(u32::MAX)
    }

    /// Out-of-range page numbers clamp to the first or last page.
    pub fn window(&self, requested: u32) -> PageWindow {
        let num_pages = self.num_pages();
        let number = requested.clamp(1, num_pages);
        PageWindow {
            number,
            num_pages,
            offset: (number - 1).saturating_mul(self.per_page),
            limit: self.per_page,
        }
    }
}

impl<T: Serialize> Page<T> {
    pub fn new(items: Vec<T>, window: PageWindow, total_count: u64) -> Self {
        let has_next = window.number < window.num_pages;
        let has_previous = window.number > 1;
        Page {
            items,
            number: window.number,
            num_pages: window.num_pages,
            total_count,
            has_next,
            has_previous,
            next_page_number: has_next.then(|| window.number + 1),
            previous_page_number: has_previous.then(|| window.number - 1),
        }
    }
}

/// Reads the `page` query value. Missing, empty or non-numeric means the
/// first page; zero and negatives are clamped later by `Paginator::window`.
pub fn parse_page_param(raw: Option<&str>) -> u32 {
    match raw.map(str::trim) {
        Some(value) if !value.is_empty() => match value.parse::<i64>() {
            Ok(n) if n < 1 => 1,
            Ok(n) => u32::try_from(n).unwrap_or(u32::MAX),
            Err(_) => 1,
        },
        _ => 1,
    }
}
