//! Types for the abstract request/page graph: the output of clustering
//! and the input/output of the state reducer.

use std::collections::BTreeMap;

use statecrawl_model::{LinkRef, RecordId};

/// Integer label on a transition, representing a server-observable
/// state. Initially one per navigation step; the state reducer folds
/// these into a minimal equivalent labelling.
pub type State = u32;

pub type AbstractPageId = usize;
pub type AbstractRequestId = usize;

/// `(target-object, transition-state, nvisits)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target<T> {
    pub target: T,
    pub next_state: State,
    pub nvisits: u32,
}

/// An anchor or form owned by an [`AbstractPage`], holding a map from
/// incoming state to the abstract request it leads to.
#[derive(Debug, Clone, Default)]
pub struct AbstractLink {
    pub targets: BTreeMap<State, Target<AbstractRequestId>>,
}

/// Equivalence class of concrete pages sharing a clustering signature.
#[derive(Debug, Clone)]
pub struct AbstractPage {
    pub id: AbstractPageId,
    /// Member navigation records, in the order clustering encountered them.
    pub members: Vec<RecordId>,
    pub anchors: Vec<AbstractLink>,
    pub forms: Vec<AbstractLink>,
    /// Incoming state -> the abstract link chosen from this page at that state.
    pub statelinkmap: BTreeMap<State, LinkRef>,
}

/// Equivalence class of HTTP requests keyed by a canonical string
/// (method + path + sorted query keys/values, or method + action +
/// sorted field names for a form submission).
#[derive(Debug, Clone)]
pub struct AbstractRequest {
    pub id: AbstractRequestId,
    pub canonical: String,
    pub targets: BTreeMap<State, Target<AbstractPageId>>,
}

/// The full abstract graph produced by one run of the builder.
#[derive(Debug, Clone, Default)]
pub struct AbstractGraph {
    pub pages: Vec<AbstractPage>,
    pub requests: Vec<AbstractRequest>,
    pub head_request: Option<AbstractRequestId>,
    pub final_state: Option<State>,
}
