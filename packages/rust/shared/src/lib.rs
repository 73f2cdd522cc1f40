//! Shared error model, configuration, and form-value oracle for the state
//! crawler workspace.
//!
//! This crate is the foundation depended on by every other crate in the
//! workspace. It provides:
//! - [`StateCrawlError`] — the unified error type
//! - Configuration ([`AppConfig`], [`CrawlConfig`], config loading)
//! - [`FormFiller`] — the static form-value oracle

pub mod config;
pub mod error;
pub mod formfiller;

pub use config::{
    AppConfig, CrawlConfig, CrawlPoliciesConfig, config_dir, config_file_path, init_config,
    load_config, load_config_from,
};
pub use error::{Result, StateCrawlError};
pub use formfiller::FormFiller;
