use std::path::PathBuf;

use crate::build_info;
use crate::config::DEFAULT_CONFIG_PATH;
use clap::Parser;
use history_core::{RunWindow, SourceTimezone, WindowError};

#[derive(Parser, Debug, Clone)]
#[command(
    about = "Import OTRS ticket history into Elasticsearch",
    version = build_info::VERSION_WITH_COMMIT,
    long_version = build_info::VERSION_WITH_COMMIT
)]
pub struct Cli {
    #[arg(short = 'd', long = "date")]
    /// Start of the import window, e.g. `2017-06-09` or `2017-06-09 08:00:00`.
    ///
    /// Indexed documents from this instant on are replaced.
    pub date: Option<String>,

    #[arg(short = 't', long = "tn")]
    /// Re-import a single ticket by its number without touching the rest of the index
    pub ticket_number: Option<String>,

    #[arg(short = 'i', long, default_value_t = false)]
    /// Re-emit every event of the selected tickets, including ones changed after `--date`
    pub initial: bool,

    #[arg(short = 'f', long = "config-file", default_value = DEFAULT_CONFIG_PATH)]
    pub config_file: PathBuf,

    #[arg(long = "database-url")]
    pub database_url: Option<String>,
    #[arg(long = "elastic-url")]
    pub elastic_url: Option<String>,

    #[arg(long = "log-level", default_value = "info")]
    pub log_level: String,
}

impl Cli {
    /// Resolves the ticket selector flags into a run window.
    ///
    /// A `--date` without an offset is read in `timezone`.
    pub fn run_window(&self, timezone: SourceTimezone) -> Result<RunWindow, WindowError> {
        RunWindow::from_selectors(
            self.date.as_deref(),
            self.ticket_number.as_deref(),
            self.initial,
            timezone,
        )
    }
}

pub fn parse_args() -> Cli {
    Cli::parse()
}
