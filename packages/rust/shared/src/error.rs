//! Error types for the state-crawler workspace.
//!
//! Library crates use [`StateCrawlError`] via `thiserror`. The `apps/cli`
//! binary wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Fatal or structural errors. Routine, per-link signals (an empty
/// history, a form with no submit control, an HTTP error status) are
/// *not* represented here — see `statecrawl_crawler::fetcher::FetchError`
/// — those are expected outcomes the driver absorbs, not failures.
#[derive(Debug, thiserror::Error)]
pub enum StateCrawlError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// An assertion the page map or graph builder expects never fails.
    /// Surfaced rather than panicking so the partial graph can still be
    /// exported.
    #[error("invariant violated: {message}")]
    Invariant { message: String },

    /// Graph export (dot writer) failed.
    #[error("export error: {message}")]
    Export { message: String },
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, StateCrawlError>;

impl StateCrawlError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::Invariant {
            message: msg.into(),
        }
    }

    pub fn export(msg: impl Into<String>) -> Self {
        Self::Export {
            message: msg.into(),
        }
    }
}
