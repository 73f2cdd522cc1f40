//! Drives a single target site through its Fetcher, building up the
//! concrete page graph one step at a time.
//!
//! - [`fetcher`] — the `Fetcher` contract and the default HTTP+DOM implementation
//! - [`path`] — breadth-first search for a route back to unvisited territory
//! - [`driver`] — the per-step loop tying fetcher, page map, and nav log together

pub mod driver;
pub mod fetcher;
pub mod path;

pub use driver::{into_shared_result, CrawlDriver, DriverError, StepOutcome};
pub use fetcher::{Action, FetchError, FetchedPage, Fetcher, HttpFetcher};
pub use path::{find_path_to_unvisited, PathStep};
