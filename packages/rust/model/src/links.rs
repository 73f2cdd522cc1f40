//! A page's full link collection: its anchors and forms together.

use crate::link::{Link, LinkRef};

/// All anchors and forms on one page, addressed by [`LinkRef`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Links {
    pub anchors: Vec<Link>,
    pub forms: Vec<Link>,
}

impl Links {
    pub fn new(anchors: Vec<Link>, forms: Vec<Link>) -> Self {
        Self { anchors, forms }
    }

    pub fn get(&self, link_ref: LinkRef) -> &Link {
        match link_ref.kind {
            crate::link::LinkKind::Anchor => &self.anchors[link_ref.index],
            crate::link::LinkKind::Form => &self.forms[link_ref.index],
        }
    }

    pub fn get_mut(&mut self, link_ref: LinkRef) -> &mut Link {
        match link_ref.kind {
            crate::link::LinkKind::Anchor => &mut self.anchors[link_ref.index],
            crate::link::LinkKind::Form => &mut self.forms[link_ref.index],
        }
    }

    /// Every link, anchors first then forms, paired with its ref.
    pub fn iter(&self) -> impl Iterator<Item = (LinkRef, &Link)> {
        self.anchors
            .iter()
            .enumerate()
            .map(|(i, l)| (LinkRef::anchor(i), l))
            .chain(
                self.forms
                    .iter()
                    .enumerate()
                    .map(|(i, l)| (LinkRef::form(i), l)),
            )
    }

    pub fn enumerate(&self) -> impl Iterator<Item = (LinkRef, &Link)> {
        self.iter()
    }

    /// Every unresolved, non-ignored link ref.
    pub fn get_unvisited(&self) -> Vec<LinkRef> {
        self.iter()
            .filter(|(_, l)| !l.ignore && l.is_unresolved())
            .map(|(r, _)| r)
            .collect()
    }

    /// First unvisited, non-ignored link, if any (anchors before forms —
    /// spec's "first unvisited link" ordering).
    pub fn first_unvisited(&self) -> Option<LinkRef> {
        self.get_unvisited().into_iter().next()
    }

    /// A deep clone with every link reset (fresh `nvisits`, no target, no
    /// history) — used by the split-page deep-clone step.
    pub fn clone_fresh(&self) -> Self {
        Self {
            anchors: self.anchors.iter().map(Link::fresh_clone).collect(),
            forms: self.forms.iter().map(Link::fresh_clone).collect(),
        }
    }
}
