//! CLI argument definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::Parser;
use color_eyre::eyre::{eyre, Result};
use statecrawl_crawler::{into_shared_result, CrawlDriver, HttpFetcher};
use statecrawl_export::write_dot;
use statecrawl_shared::{load_config, CrawlConfig, FormFiller};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// statecrawl — build an abstract state-machine model of a web application.
#[derive(Parser)]
#[command(
    name = "statecrawl",
    version,
    about = "Crawl a web application and build an abstract state-machine model of it.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// One or more start URLs, each crawled independently.
    #[arg(required = true)]
    pub urls: Vec<String>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Where to write the Graphviz `dot` export. With multiple URLs, an
    /// index is inserted before the extension (`graph-0.dot`, `graph-1.dot`, ...).
    #[arg(long, default_value = "graph.dot")]
    pub out: PathBuf,

    /// Minimum shared-visit count before a templatized bucket becomes
    /// eligible for aggregation. Overrides the config file value.
    #[arg(long)]
    pub similarity_join_threshold: Option<u32>,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = match cli.verbose {
        0 => "statecrawl=info",
        1 => "statecrawl=debug",
        _ => "statecrawl=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run every requested crawl in turn, exporting each to its own `dot`
/// file. A `ctrl-c` mid-crawl still exports the graph built so far
/// before exiting with 130, matching shell SIGINT convention.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config = load_config()?;
    let mut crawl_config = CrawlConfig::from(&config);
    if let Some(threshold) = cli.similarity_join_threshold {
        crawl_config.similarity_join_threshold = threshold;
    }

    let total = cli.urls.len();
    for (index, url) in cli.urls.iter().enumerate() {
        let out_path = derive_out_path(&cli.out, index, total);
        match crawl_one(url, &crawl_config, &out_path).await {
            CrawlOutcome::Finished => {}
            CrawlOutcome::Interrupted => {
                info!("crawl interrupted by ctrl-c, partial graph exported");
                std::process::exit(130);
            }
            CrawlOutcome::Failed(err) => return Err(err),
        }
    }

    Ok(())
}

enum CrawlOutcome {
    Finished,
    Interrupted,
    Failed(color_eyre::eyre::Error),
}

async fn crawl_one(url: &str, config: &CrawlConfig, out_path: &Path) -> CrawlOutcome {
    info!(url, out = %out_path.display(), "starting crawl");

    let fetcher = match HttpFetcher::new(&config.user_agent, config.request_timeout_secs) {
        Ok(f) => f,
        Err(e) => return CrawlOutcome::Failed(eyre!("failed to build HTTP client: {e}")),
    };

    let open_result = CrawlDriver::open(
        fetcher,
        url,
        config.similarity_join_threshold as usize,
        FormFiller::new(),
    )
    .await;

    let mut driver = match into_shared_result(open_result) {
        Ok(driver) => driver,
        Err(e) => return CrawlOutcome::Failed(eyre!("{e}")),
    };

    let outcome = tokio::select! {
        result = driver.run() => {
            match into_shared_result(result) {
                Ok(()) => CrawlOutcome::Finished,
                Err(e) => CrawlOutcome::Failed(eyre!("{e}")),
            }
        }
        _ = tokio::signal::ctrl_c() => CrawlOutcome::Interrupted,
    };

    if let Err(e) = write_dot(driver.arena(), out_path) {
        return CrawlOutcome::Failed(eyre!("failed to write graph export: {e}"));
    }

    info!(pages = driver.arena().len(), "crawl finished");
    outcome
}

fn derive_out_path(base: &Path, index: usize, total: usize) -> PathBuf {
    if total <= 1 {
        return base.to_path_buf();
    }
    let stem = base.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_else(|| "graph".into());
    let ext = base.extension().map(|e| e.to_string_lossy().to_string());
    let file_name = match ext {
        Some(ext) => format!("{stem}-{index}.{ext}"),
        None => format!("{stem}-{index}"),
    };
    base.with_file_name(file_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_url_keeps_the_bare_path() {
        let base = PathBuf::from("graph.dot");
        assert_eq!(derive_out_path(&base, 0, 1), base);
    }

    #[test]
    fn multiple_urls_insert_an_index() {
        let base = PathBuf::from("out/graph.dot");
        assert_eq!(derive_out_path(&base, 0, 2), PathBuf::from("out/graph-0.dot"));
        assert_eq!(derive_out_path(&base, 1, 2), PathBuf::from("out/graph-1.dot"));
    }
}
