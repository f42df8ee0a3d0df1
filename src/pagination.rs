//! Fixed-size paging over catalog and cart listings.

/// One page of a listing together with its navigation state
#[derive(Debug, Clone, PartialEq)]
pub struct Page<'a, T> {
    pub items: &'a [T],
    /// 1-based page number after clamping
    pub number: u32,
    pub total_pages: u32,
}

impl<T> Page<'_, T> {
    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn has_next(&self) -> bool {
        self.number < self.total_pages
    }
}

/// Number of pages needed for `total` entries
pub fn total_pages(total: usize, page_size: usize) -> u32 {
    let page_size = page_size.max(1);
    u32::try_from(total.div_ceil(page_size)).unwrap_or(u32::MAX)
}

/// Clamp a requested page number to `[1, total_pages]`
pub fn clamp_page(page: u32, total_pages: u32) -> u32 {
    page.clamp(1, total_pages.max(1))
}

/// Slice `[(page-1)*size, page*size)` out of `items`, clamping the page first
pub fn paginate<T>(items: &[T], page: u32, page_size: usize) -> Page<'_, T> {
    let page_size = page_size.max(1);
    let total_pages = total_pages(items.len(), page_size);
    let number = clamp_page(page, total_pages);

    let start = (number as usize - 1).saturating_mul(page_size).min(items.len());
    let end = start.saturating_add(page_size).min(items.len());

    Page {
        items: &items[start..end],
        number,
        total_pages,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_middle_page_has_both_controls() {
        let items: Vec<u32> = (1..=7).collect();
        let page = paginate(&items, 3, 1);

        assert_eq!(page.items, &[3]);
        assert!(page.has_previous());
        assert!(page.has_next());
    }

    #[test]
    fn test_first_and_last_page_controls() {
        let items: Vec<u32> = (1..=7).collect();

        let first = paginate(&items, 1, 1);
        assert!(!first.has_previous());
        assert!(first.has_next());

        let last = paginate(&items, 7, 1);
        assert_eq!(last.items, &[7]);
        assert!(last.has_previous());
        assert!(!last.has_next());
    }

    #[test]
    fn test_out_of_range_pages_are_clamped() {
        let items: Vec<u32> = (1..=5).collect();

        let past_end = paginate(&items, 9, 2);
        assert_eq!(past_end.number, 3);
        assert_eq!(past_end.items, &[5]);

        let before_start = paginate(&items, 0, 2);
        assert_eq!(before_start.number, 1);
        assert_eq!(before_start.items, &[1, 2]);
    }

    #[test]
    fn test_empty_listing_is_a_single_empty_page() {
        let items: Vec<u32> = Vec::new();
        let page = paginate(&items, 4, 3);

        assert_eq!(page.number, 1);
        assert_eq!(page.total_pages, 0);
        assert!(page.items.is_empty());
        assert!(!page.has_previous());
        assert!(!page.has_next());
    }

    #[test]
    fn test_total_pages_rounds_up() {
        assert_eq!(total_pages(0, 3), 0);
        assert_eq!(total_pages(3, 3), 1);
        assert_eq!(total_pages(4, 3), 2);
    }
}
