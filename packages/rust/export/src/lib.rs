//! Renders a finished crawl's Page Map as a Graphviz graph.

pub mod dot;

pub use dot::{render_dot, write_dot};
