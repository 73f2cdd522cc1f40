//! Abstract state-machine graph: clustering, the graph builder, and the
//! state reducer.

pub mod abstract_types;
pub mod builder;
pub mod cluster;
pub mod reduce;

pub use abstract_types::{
    AbstractGraph, AbstractLink, AbstractPage, AbstractPageId, AbstractRequest,
    AbstractRequestId, State, Target,
};
pub use builder::build_abstract_graph;
pub use cluster::{level_pass, simple_pass, LevelStats, SimpleClustering};
pub use reduce::{reduce_states, ReduceOutcome};
