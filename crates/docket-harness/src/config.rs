use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::runner::{DEFAULT_DB_PREFIX, RunOptions};
use crate::suite::SuiteOptions;

/// Run shell-style test scripts against a document store
#[derive(Parser, Debug, Clone)]
#[command(name = "docket")]
#[command(version, about, long_about = None)]
pub struct Args {
    /// docket-server address; without it scripts run against an in-process store
    #[arg(long, env = "DOCKET_ADDR")]
    pub addr: Option<String>,

    /// Scripts to run concurrently
    #[arg(short, long, default_value_t = 1, env = "DOCKET_JOBS",
          value_parser = clap::value_parser!(u16).range(1..))]
    pub jobs: u16,

    /// Per-call transport timeout in milliseconds
    #[arg(long, env = "DOCKET_TIMEOUT_MS")]
    pub timeout_ms: Option<u64>,

    /// Prefix of the per-run database names
    #[arg(long, default_value = DEFAULT_DB_PREFIX, env = "DOCKET_DB_PREFIX")]
    pub db_prefix: String,

    /// Skip scripts carrying this tag (repeatable)
    #[arg(long = "exclude-tag", env = "DOCKET_EXCLUDE_TAGS", value_delimiter = ',')]
    pub exclude_tags: Vec<String>,

    /// Keep each run's database instead of dropping it
    #[arg(long, env = "DOCKET_KEEP_DATA")]
    pub keep_data: bool,

    /// Print the report as JSON
    #[arg(long, env = "DOCKET_JSON")]
    pub json: bool,

    /// Script files or directories to search for .js files
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
}

impl Args {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn suite_options(&self) -> SuiteOptions {
        SuiteOptions {
            jobs: usize::from(self.jobs),
            exclude_tags: self.exclude_tags.clone(),
            run: RunOptions {
                db_prefix: self.db_prefix.clone(),
                keep_data: self.keep_data,
            },
        }
    }
}
