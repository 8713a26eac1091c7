use courier_common::Notification;
use serde::{Deserialize, Serialize};

const fn default_size() -> u32 {
    20
}

/// Zero-based page selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    #[serde(default)]
    pub page: u32,
    #[serde(default = "default_size")]
    pub size: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 0,
            size: default_size(),
        }
    }
}

impl PageRequest {
    #[must_use]
    pub const fn new(page: u32, size: u32) -> Self {
        Self { page, size }
    }

    #[must_use]
    pub const fn offset(&self) -> usize {
        self.page as usize * self.size as usize
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub size: u32,
    pub total: u64,
}

impl<T> Page<T> {
    #[must_use]
    pub fn total_pages(&self) -> u64 {
        if self.size == 0 {
            0
        } else {
            self.total.div_ceil(u64::from(self.size))
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            size: self.size,
            total: self.total,
        }
    }
}

/// Order newest first and cut out the requested page.
pub(crate) fn paginate(mut matching: Vec<Notification>, request: PageRequest) -> Page<Notification> {
    matching.sort_by(|a, b| {
        b.created_at()
            .cmp(&a.created_at())
            .then_with(|| b.id().cmp(&a.id()))
    });

    let total = matching.len() as u64;
    let items = matching
        .into_iter()
        .skip(request.offset())
        .take(request.size as usize)
        .collect();

    Page {
        items,
        page: request.page,
        size: request.size,
        total,
    }
}

#[cfg(test)]
mod tests {
    use courier_common::Channel;

    use super::*;

    fn notifications(n: usize) -> Vec<Notification> {
        (0..n)
            .map(|i| Notification::new(Channel::Console, "ops", format!("message {i}")))
            .collect()
    }

    #[test]
    fn test_pages_are_cut_in_order() {
        let all = notifications(5);
        let newest = all.iter().map(Notification::created_at).max();

        let first = paginate(all.clone(), PageRequest::new(0, 2));
        assert_eq!(first.items.len(), 2);
        assert_eq!(first.total, 5);
        assert_eq!(first.total_pages(), 3);
        assert_eq!(first.items.first().map(Notification::created_at), newest);

        let last = paginate(all, PageRequest::new(2, 2));
        assert_eq!(last.items.len(), 1);
    }

    #[test]
    fn test_page_past_end_is_empty() {
        let page = paginate(notifications(3), PageRequest::new(4, 10));
        assert!(page.items.is_empty());
        assert_eq!(page.total, 3);
    }

    #[test]
    fn test_zero_size_page() {
        let page = paginate(notifications(3), PageRequest::new(0, 0));
        assert!(page.items.is_empty());
        assert_eq!(page.total_pages(), 0);
    }
}
