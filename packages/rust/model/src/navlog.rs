//! The History Log: a doubly linked, append-only sequence of navigation
//! records, one per `open`/`click`/`submit`/`back` step. Indices are
//! stable for the lifetime of a crawl — the log is never truncated, only
//! appended to, matching the ordering guarantee in the concurrency model.

use crate::arena::PageId;
use crate::link::LinkRef;

/// Stable index of a record within a [`NavLog`].
pub type RecordId = usize;

/// One navigation step: the page it landed on, the link that was
/// followed to get there (`None` for the very first `open`), and — if
/// this step was a `back` — which earlier record it returned to.
#[derive(Debug, Clone)]
pub struct NavRecord {
    pub page: PageId,
    /// `(predecessor page, link followed)`, absent for the first record
    /// of a crawl (the initial `open`).
    pub via: Option<(PageId, LinkRef)>,
    pub prev: Option<RecordId>,
    pub next: Option<RecordId>,
    pub is_back: bool,
    /// When `is_back`, the record this step returned to.
    pub backto: Option<RecordId>,
}

/// Append-only doubly linked navigation history.
#[derive(Debug, Default)]
pub struct NavLog {
    records: Vec<NavRecord>,
}

impl NavLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the very first navigation to `page` (an `open`).
    pub fn open(&mut self, page: PageId) -> RecordId {
        let id = self.records.len();
        self.records.push(NavRecord {
            page,
            via: None,
            prev: None,
            next: None,
            is_back: false,
            backto: None,
        });
        id
    }

    /// Record a forward navigation (`click`/`submit`) from `prev_id` via
    /// `link_ref`, arriving at `page`.
    pub fn navigate(&mut self, prev_id: RecordId, via: (PageId, LinkRef), page: PageId) -> RecordId {
        let id = self.records.len();
        self.records.push(NavRecord {
            page,
            via: Some(via),
            prev: Some(prev_id),
            next: None,
            is_back: false,
            backto: None,
        });
        self.records[prev_id].next = Some(id);
        id
    }

    /// Record a `back` step from `prev_id`, landing back on `backto_id`'s
    /// page.
    pub fn back(&mut self, prev_id: RecordId, backto_id: RecordId) -> RecordId {
        let page = self.records[backto_id].page;
        let id = self.records.len();
        self.records.push(NavRecord {
            page,
            via: None,
            prev: Some(prev_id),
            next: None,
            is_back: true,
            backto: Some(backto_id),
        });
        self.records[prev_id].next = Some(id);
        id
    }

    pub fn get(&self, id: RecordId) -> &NavRecord {
        &self.records[id]
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn head(&self) -> Option<RecordId> {
        if self.records.is_empty() { None } else { Some(0) }
    }

    pub fn last(&self) -> Option<RecordId> {
        if self.records.is_empty() {
            None
        } else {
            Some(self.records.len() - 1)
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (RecordId, &NavRecord)> {
        self.records.iter().enumerate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::LinkRef;

    fn pid(n: usize) -> PageId {
        // PageId has no public constructor; round-trip through an arena.
        let mut arena = crate::arena::PageArena::new();
        for _ in 0..=n {
            arena.insert(crate::page::Page::new("http://x/".into(), vec![], vec![], vec![]));
        }
        arena.iter().nth(n).unwrap().0
    }

    #[test]
    fn open_has_no_predecessor() {
        let mut log = NavLog::new();
        let a = log.open(pid(0));
        assert!(log.get(a).prev.is_none());
        assert!(log.get(a).via.is_none());
    }

    #[test]
    fn navigate_links_prev_and_next() {
        let mut log = NavLog::new();
        let a = log.open(pid(0));
        let b = log.navigate(a, (pid(0), LinkRef::anchor(0)), pid(1));
        assert_eq!(log.get(a).next, Some(b));
        assert_eq!(log.get(b).prev, Some(a));
        assert!(!log.get(b).is_back);
    }

    #[test]
    fn back_records_backto_and_reuses_page() {
        let mut log = NavLog::new();
        let a = log.open(pid(0));
        let b = log.navigate(a, (pid(0), LinkRef::anchor(0)), pid(1));
        let back = log.back(b, a);
        assert!(log.get(back).is_back);
        assert_eq!(log.get(back).backto, Some(a));
        assert_eq!(log.get(back).page, log.get(a).page);
    }
}
