/// One page of an ordered listing. Pages are 1-indexed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    /// Total matching rows across all pages.
    pub total: u64,
}

impl<T> Page<T> {
    pub fn pages(&self) -> u32 {
        if self.per_page == 0 {
            return 0;
        }
        u32::try_from(self.total.div_ceil(u64::from(self.per_page))).unwrap_or(u32::MAX)
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.pages()
    }

    /// Page numbers for pagination links, `None` marking an elided gap.
    /// Shows the first and last page, one page before the current one and
    /// one after it.
    pub fn iter_pages(&self) -> Vec<Option<u32>> {
        const LEFT_EDGE: u32 = 1;
        const LEFT_CURRENT: u32 = 1;
        const RIGHT_CURRENT: u32 = 2;
        const RIGHT_EDGE: u32 = 1;

        let pages = self.pages();
        let mut out = Vec::new();
        let mut last = 0;
        for num in 1..=pages {
            let near_left_edge = num <= LEFT_EDGE;
            let near_current = num + LEFT_CURRENT >= self.page && num < self.page + RIGHT_CURRENT;
            let near_right_edge = num + RIGHT_EDGE > pages;
            if near_left_edge || near_current || near_right_edge {
                if last + 1 != num {
                    out.push(None);
                }
                out.push(Some(num));
                last = num;
            }
        }
        out
    }
}
