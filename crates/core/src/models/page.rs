//! Paginated list responses.

use serde::{Deserialize, Serialize};

/// One page of a backend list endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based page number.
    pub page: u32,
    pub per_page: u32,
    /// Total number of items across all pages.
    pub total: u64,
}

impl<T> Page<T> {
    /// An empty first page.
    #[must_use]
    pub const fn empty(per_page: u32) -> Self {
        Self {
            items: Vec::new(),
            page: 1,
            per_page,
            total: 0,
        }
    }

    /// Total number of pages (at least 1).
    #[must_use]
    pub fn total_pages(&self) -> u32 {
        if self.per_page == 0 {
            return 1;
        }
        let pages = self.total.div_ceil(u64::from(self.per_page));
        u32::try_from(pages).unwrap_or(u32::MAX).max(1)
    }

    #[must_use]
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    #[must_use]
    pub const fn has_prev(&self) -> bool {
        self.page > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_pages() {
        let mut page: Page<u8> = Page::empty(20);
        assert_eq!(page.total_pages(), 1);
        assert!(!page.has_next());

        page.total = 41;
        assert_eq!(page.total_pages(), 3);
        assert!(page.has_next());

        page.page = 3;
        assert!(!page.has_next());
        assert!(page.has_prev());
    }
}
