//! Core data model for the state crawler: the page arena, links, the
//! navigation log, and the pure URL/DOM-path vectorizer.
//!
//! This crate has no knowledge of aggregation policy or graph
//! construction — it is the vocabulary [`statecrawl_pagemap`] and
//! [`statecrawl_graph`] are built from.

pub mod aggregation;
pub mod arena;
pub mod link;
pub mod links;
pub mod navlog;
pub mod page;
pub mod vector;

pub use aggregation::Aggregation;
pub use arena::{PageArena, PageId};
pub use link::{Link, LinkKind, LinkPayload, LinkRef, Route};
pub use links::Links;
pub use navlog::{NavLog, NavRecord, RecordId};
pub use page::Page;
pub use vector::{canonical_dom_path, content_hash, strip_query, urlvector, UrlVector};
