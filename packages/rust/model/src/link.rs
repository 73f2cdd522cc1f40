//! Link candidates (anchors and forms) extracted from a fetched page.
//!
//! The original draws a runtime subclass distinction between anchors and
//! forms; here both are one [`Link`] carrying a [`LinkKind`] tag, so
//! `Links::iter`/`get_unvisited` can fold over both without downcasting.

use crate::arena::PageId;

/// Which concrete link a [`LinkRef`] names within a page's [`crate::links::Links`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LinkKind {
    Anchor,
    Form,
}

/// Index of one link within a page, paired with its kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LinkRef {
    pub kind: LinkKind,
    pub index: usize,
}

impl LinkRef {
    pub fn anchor(index: usize) -> Self {
        Self {
            kind: LinkKind::Anchor,
            index,
        }
    }

    pub fn form(index: usize) -> Self {
        Self {
            kind: LinkKind::Form,
            index,
        }
    }
}

/// One route snapshot: the sequence of `(page, link taken)` pairs leading
/// to wherever this link was first traversed from.
pub type Route = Vec<(PageId, LinkRef)>;

/// Kind-specific payload distinguishing an anchor from a form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkPayload {
    Anchor {
        href: String,
        dom_path: String,
    },
    Form {
        method: String,
        action: String,
        text_fields: Vec<String>,
        textarea_fields: Vec<String>,
        select_fields: Vec<String>,
    },
}

impl LinkPayload {
    pub fn kind(&self) -> LinkKind {
        match self {
            LinkPayload::Anchor { .. } => LinkKind::Anchor,
            LinkPayload::Form { .. } => LinkKind::Form,
        }
    }

    /// All non-empty field names, for the form-value oracle lookup key.
    /// Empty for anchors.
    pub fn field_names(&self) -> Vec<String> {
        match self {
            LinkPayload::Anchor { .. } => Vec::new(),
            LinkPayload::Form {
                text_fields,
                textarea_fields,
                select_fields,
                ..
            } => text_fields
                .iter()
                .chain(textarea_fields.iter())
                .chain(select_fields.iter())
                .cloned()
                .collect(),
        }
    }
}

/// One anchor or form on a page: kind-specific payload plus the shared
/// navigation bookkeeping the driver needs (resolved target, visit count,
/// the `ignore` flag, and the route snapshot recorded the first time it
/// was traversed).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub payload: LinkPayload,
    pub target: Option<PageId>,
    pub nvisits: u32,
    pub ignore: bool,
    pub history: Option<Route>,
    /// Index, into the global nav log, of every record reached by
    /// traversing this link — the abstract graph builder walks these to
    /// find which outgoing abstract link a navigation step took.
    pub visited_records: Vec<usize>,
}

impl Link {
    pub fn new_anchor(href: String, dom_path: String) -> Self {
        Self {
            payload: LinkPayload::Anchor { href, dom_path },
            target: None,
            nvisits: 0,
            ignore: false,
            history: None,
            visited_records: Vec::new(),
        }
    }

    pub fn new_form(
        method: String,
        action: String,
        text_fields: Vec<String>,
        textarea_fields: Vec<String>,
        select_fields: Vec<String>,
    ) -> Self {
        Self {
            payload: LinkPayload::Form {
                method,
                action,
                text_fields,
                textarea_fields,
                select_fields,
            },
            target: None,
            nvisits: 0,
            ignore: false,
            history: None,
            visited_records: Vec::new(),
        }
    }

    pub fn kind(&self) -> LinkKind {
        self.payload.kind()
    }

    /// Invariant: `nvisits == 0` iff `target` is unresolved.
    pub fn is_unresolved(&self) -> bool {
        self.nvisits == 0
    }

    /// A link is eligible for traversal when it resolves to a concrete
    /// target and has not been marked `ignore`.
    pub fn is_traversable(&self) -> bool {
        !self.ignore && self.target.is_some()
    }

    /// A fresh copy for use on a deep-cloned page: same payload, no
    /// resolution, no history — per the split-page deep-clone step.
    pub fn fresh_clone(&self) -> Self {
        Self {
            payload: self.payload.clone(),
            target: None,
            nvisits: 0,
            ignore: false,
            history: None,
            visited_records: Vec::new(),
        }
    }
}
