//! The Page Map / Aggregation Engine: equivalence of pages under
//! templatization, merge of near-duplicate pages, and the status-split
//! recovery path.

pub mod pagemap;
pub mod split;
pub mod unvisited;

pub use pagemap::{link_to, PageMap};
pub use split::split_page;
pub use unvisited::Unvisited;
