//! The crawl-wide worklist of unresolved links.

use std::collections::BTreeSet;

use statecrawl_model::{LinkKind, LinkRef, PageId};

/// Two sets — one of unresolved anchors, one of unresolved forms — kept in
/// sync with link resolution by the page map.
#[derive(Debug, Default)]
pub struct Unvisited {
    anchors: BTreeSet<(PageId, usize)>,
    forms: BTreeSet<(PageId, usize)>,
}

impl Unvisited {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, page: PageId, link_ref: LinkRef) {
        match link_ref.kind {
            LinkKind::Anchor => {
                self.anchors.insert((page, link_ref.index));
            }
            LinkKind::Form => {
                self.forms.insert((page, link_ref.index));
            }
        }
    }

    /// Removes the entry if present. Returns whether it was present —
    /// callers tolerate the "already removed by aggregation" case.
    pub fn remove(&mut self, page: PageId, link_ref: LinkRef) -> bool {
        match link_ref.kind {
            LinkKind::Anchor => self.anchors.remove(&(page, link_ref.index)),
            LinkKind::Form => self.forms.remove(&(page, link_ref.index)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty() && self.forms.is_empty()
    }

    pub fn len(&self) -> usize {
        self.anchors.len() + self.forms.len()
    }

    pub fn contains_page(&self, page: PageId) -> bool {
        self.anchors.range((page, 0)..(page, usize::MAX)).next().is_some()
            || self.forms.range((page, 0)..(page, usize::MAX)).next().is_some()
    }

    /// Every unresolved anchor on `page`, in index order.
    pub fn anchors_on(&self, page: PageId) -> impl Iterator<Item = LinkRef> + '_ {
        self.anchors
            .range((page, 0)..(page, usize::MAX))
            .map(|&(_, i)| LinkRef::anchor(i))
    }

    /// Every unresolved form on `page`, in index order.
    pub fn forms_on(&self, page: PageId) -> impl Iterator<Item = LinkRef> + '_ {
        self.forms
            .range((page, 0)..(page, usize::MAX))
            .map(|&(_, i)| LinkRef::form(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use statecrawl_model::{PageArena, Page};

    fn pid(arena: &mut PageArena) -> PageId {
        arena.insert(Page::new("http://x/".into(), vec![], vec![], vec![]))
    }

    #[test]
    fn add_and_remove_roundtrip() {
        let mut arena = PageArena::new();
        let p = pid(&mut arena);
        let mut u = Unvisited::new();
        u.add(p, LinkRef::anchor(0));
        assert!(!u.is_empty());
        assert!(u.remove(p, LinkRef::anchor(0)));
        assert!(u.is_empty());
    }

    #[test]
    fn remove_missing_entry_is_tolerated() {
        let mut arena = PageArena::new();
        let p = pid(&mut arena);
        let mut u = Unvisited::new();
        assert!(!u.remove(p, LinkRef::anchor(0)));
    }

    #[test]
    fn anchors_and_forms_tracked_separately() {
        let mut arena = PageArena::new();
        let p = pid(&mut arena);
        let mut u = Unvisited::new();
        u.add(p, LinkRef::anchor(0));
        u.add(p, LinkRef::form(0));
        assert_eq!(u.len(), 2);
        assert_eq!(u.anchors_on(p).count(), 1);
        assert_eq!(u.forms_on(p).count(), 1);
    }
}
