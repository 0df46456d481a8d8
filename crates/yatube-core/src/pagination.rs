//! Page-number pagination over ordered results.
//!
//! The requested page comes straight from the query string, so resolution is
//! forgiving: anything that is not an integer lands on the first page and any
//! integer outside `1..=num_pages` lands on the last one.

use serde::Serialize;

/// Splits `count` ordered items into pages of `per_page`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    per_page: u64,
}

impl Paginator {
    pub fn new(per_page: u64) -> Self {
        Self {
            per_page: per_page.max(1),
        }
    }

    pub fn per_page(&self) -> u64 {
        self.per_page
    }

    /// An empty result still has one (empty) page.
    pub fn num_pages(&self, count: u64) -> u64 {
        if count == 0 {
            1
        } else {
            count.div_ceil(self.per_page)
        }
    }

    /// Turn the raw `page` parameter into a valid page number.
    pub fn resolve(&self, raw: Option<&str>, count: u64) -> u64 {
        let num_pages = self.num_pages(count);
        let Some(raw) = raw.map(str::trim) else {
            return 1;
        };
        match raw.parse::<i64>() {
            Ok(n) if n < 1 || n as u64 > num_pages => num_pages,
            Ok(n) => n as u64,
            // Too large for i64 but still an integer.
            Err(_) if is_integer(raw) => num_pages,
            Err(_) => 1,
        }
    }

    /// Locate the slice a repository has to fetch for the requested page.
    pub fn window(&self, raw: Option<&str>, count: u64) -> PageWindow {
        let number = self.resolve(raw, count);
        let offset = (number - 1) * self.per_page;
        PageWindow {
            number,
            num_pages: self.num_pages(count),
            count,
            per_page: self.per_page,
            offset,
            limit: self.per_page.min(count.saturating_sub(offset)),
        }
    }

    /// Paginate a collection that is already in memory.
    pub fn paginate<T>(&self, items: Vec<T>, raw: Option<&str>) -> Page<T> {
        let window = self.window(raw, items.len() as u64);
        let slice = items
            .into_iter()
            .skip(window.offset as usize)
            .take(window.limit as usize)
            .collect();
        window.into_page(slice)
    }
}

fn is_integer(raw: &str) -> bool {
    let digits = raw.strip_prefix(['-', '+']).unwrap_or(raw);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Position of one page inside the full result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub number: u64,
    pub num_pages: u64,
    pub count: u64,
    pub per_page: u64,
    pub offset: u64,
    pub limit: u64,
}

impl PageWindow {
    /// Attach the fetched items.
    pub fn into_page<T>(self, object_list: Vec<T>) -> Page<T> {
        let has_next = self.number < self.num_pages;
        let has_previous = self.number > 1;
        let (start_index, end_index) = if self.count == 0 {
            (0, 0)
        } else {
            (self.offset + 1, self.offset + object_list.len() as u64)
        };

        Page {
            object_list,
            number: self.number,
            num_pages: self.num_pages,
            count: self.count,
            per_page: self.per_page,
            has_next,
            has_previous,
            has_other_pages: has_next || has_previous,
            next_page_number: has_next.then_some(self.number + 1),
            previous_page_number: has_previous.then_some(self.number - 1),
            start_index,
            end_index,
        }
    }
}

/// One screen of results plus the metadata navigation needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub object_list: Vec<T>,
    pub number: u64,
    pub num_pages: u64,
    pub count: u64,
    pub per_page: u64,
    pub has_next: bool,
    pub has_previous: bool,
    pub has_other_pages: bool,
    pub next_page_number: Option<u64>,
    pub previous_page_number: Option<u64>,
    /// 1-based index of the first item on this page, 0 when empty.
    pub start_index: u64,
    pub end_index: u64,
}

impl<T> Page<T> {
    pub fn len(&self) -> usize {
        self.object_list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.object_list.is_empty()
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            object_list: self.object_list.into_iter().map(f).collect(),
            number: self.number,
            num_pages: self.num_pages,
            count: self.count,
            per_page: self.per_page,
            has_next: self.has_next,
            has_previous: self.has_previous,
            has_other_pages: self.has_other_pages,
            next_page_number: self.next_page_number,
            previous_page_number: self.previous_page_number,
            start_index: self.start_index,
            end_index: self.end_index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_pages_then_remainder() {
        let paginator = Paginator::new(10);
        let items: Vec<u32> = (1..=13).collect();

        let first = paginator.paginate(items.clone(), None);
        assert_eq!(first.len(), 10);
        assert_eq!(first.num_pages, 2);
        assert!(first.has_next);
        assert!(!first.has_previous);
        assert_eq!(first.next_page_number, Some(2));

        let second = paginator.paginate(items, Some("2"));
        assert_eq!(second.object_list, vec![11, 12, 13]);
        assert!(!second.has_next);
        assert_eq!(second.previous_page_number, Some(1));
        assert_eq!((second.start_index, second.end_index), (11, 13));
    }

    #[test]
    fn test_every_page_in_range_has_expected_length() {
        let paginator = Paginator::new(10);
        for count in [1u64, 9, 10, 11, 25, 100] {
            let num_pages = paginator.num_pages(count);
            for number in 1..=num_pages {
                let window = paginator.window(Some(&number.to_string()), count);
                let expected = if number < num_pages {
                    10
                } else {
                    count - (num_pages - 1) * 10
                };
                assert_eq!(window.limit, expected, "count={count} page={number}");
            }
        }
    }

    #[test]
    fn test_non_numeric_page_falls_back_to_first() {
        let paginator = Paginator::new(10);
        for raw in [None, Some(""), Some("abc"), Some("2.5")] {
            assert_eq!(paginator.resolve(raw, 35), 1, "{raw:?}");
        }
    }

    #[test]
    fn test_out_of_range_page_falls_back_to_last() {
        let paginator = Paginator::new(10);
        for raw in [
            "0",
            "-3",
            "5",
            "999999",
            "99999999999999999999",
            "-99999999999999999999",
        ] {
            assert_eq!(paginator.resolve(Some(raw), 35), 4, "{raw}");
        }
    }

    #[test]
    fn test_empty_collection_has_one_empty_page() {
        let page = Paginator::new(10).paginate(Vec::<u8>::new(), Some("3"));
        assert_eq!(page.number, 1);
        assert_eq!(page.num_pages, 1);
        assert!(page.is_empty());
        assert!(!page.has_other_pages);
        assert_eq!((page.start_index, page.end_index), (0, 0));
    }
}
