//! Shared numbered-pagination helpers.

use serde::{Deserialize, Serialize};

/// Page-number pagination request. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self { page, page_size }
    }
}

/// One page of a filtered collection, with the metadata the list screens
/// render (total count, page count, next/previous availability).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub page_size: u32,
    pub total_count: u64,
    pub total_pages: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, page: u32, page_size: u32, total_count: u64) -> Self {
        Self {
            items,
            page,
            page_size,
            total_count,
            total_pages: total_pages_for(total_count, page_size),
        }
    }

    pub fn empty(page: u32, page_size: u32) -> Self {
        Self::new(Vec::new(), page, page_size, 0)
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    /// Prepend an item, dropping the overflow row past the page size.
    pub fn prepend_capped(&mut self, item: T) {
        self.items.insert(0, item);
        self.items.truncate(self.page_size as usize);
    }

    /// Remove the first item matching `predicate`, if any.
    pub fn remove_where(&mut self, predicate: impl Fn(&T) -> bool) -> Option<T> {
        let index = self.items.iter().position(|item| predicate(item))?;
        Some(self.items.remove(index))
    }

    /// Shift the total count, re-deriving the page count.
    pub fn adjust_total(&mut self, delta: i64) {
        self.total_count = self.total_count.saturating_add_signed(delta);
        self.total_pages = total_pages_for(self.total_count, self.page_size);
    }
}

fn total_pages_for(total_count: u64, page_size: u32) -> u32 {
    if page_size == 0 {
        return 0;
    }
    u32::try_from(total_count.div_ceil(u64::from(page_size))).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_metadata_is_derived() {
        let page = Page::new(vec![1, 2, 3], 1, 3, 7);
        assert_eq!(page.total_pages, 3);
        assert!(page.has_next());
        assert!(!page.has_previous());

        let last = Page::new(vec![7], 3, 3, 7);
        assert!(!last.has_next());
        assert!(last.has_previous());
    }

    #[test]
    fn empty_page_has_no_neighbours() {
        let page: Page<u32> = Page::empty(1, 20);
        assert_eq!(page.total_pages, 0);
        assert!(!page.has_next());
        assert!(!page.has_previous());
    }

    #[test]
    fn prepend_capped_drops_overflow() {
        let mut page = Page::new(vec![1, 2, 3], 1, 3, 3);
        page.prepend_capped(0);
        assert_eq!(page.items, vec![0, 1, 2]);
    }

    #[test]
    fn remove_where_returns_removed_item() {
        let mut page = Page::new(vec![1, 2, 3], 1, 20, 3);
        assert_eq!(page.remove_where(|item| *item == 2), Some(2));
        assert_eq!(page.remove_where(|item| *item == 9), None);
        assert_eq!(page.items, vec![1, 3]);
    }

    #[test]
    fn adjust_total_rederives_page_count() {
        let mut page = Page::new(vec![1, 2, 3], 1, 3, 3);
        page.adjust_total(1);
        assert_eq!(page.total_count, 4);
        assert_eq!(page.total_pages, 2);

        page.adjust_total(-4);
        assert_eq!(page.total_count, 0);
        assert_eq!(page.total_pages, 0);
    }
}
