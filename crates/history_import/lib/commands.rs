use crate::{
    cli::Cli,
    config::{Config, ConfigError},
    db,
    elastic::ElasticIndex,
    import::ImportService,
    logging::{format_error_report, init_logging},
    source::{HistoryQuery, MysqlHistorySource},
    writer::BatchPolicy,
};
use dotenv::dotenv;
use history_core::RunWindow;
use std::env;
use tracing::{error, info, warn};

const SERVICE_NAME: &str = "history_import";

pub const EXIT_OK: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_USAGE: i32 = 2;

/// Picks the flag value, then the environment variable, ignoring blanks.
fn explicit_url(flag: Option<&str>, env_key: &str) -> Option<String> {
    flag.map(str::to_string)
        .or_else(|| env::var(env_key).ok())
        .filter(|value| !value.trim().is_empty())
}

pub fn resolve_database_url(args: &Cli, config: &Config) -> Result<String, ConfigError> {
    match explicit_url(args.database_url.as_deref(), "DATABASE_URL") {
        Some(url) => Ok(url),
        None => config.database_url(),
    }
}

pub fn resolve_elastic_url(args: &Cli, config: &Config) -> String {
    explicit_url(args.elastic_url.as_deref(), "ELASTIC_URL").unwrap_or_else(|| config.elastic_url())
}

/// Runs one import and returns the process exit code.
///
/// 0 on success (an empty selection included), 2 for invalid invocation or settings, 1 when
/// the database, the index or a history query fails.
pub async fn run_import(args: Cli) -> i32 {
    dotenv().ok();

    let config = match Config::load(&args.config_file) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("failed to load config {}: {err}", args.config_file.display());
            return EXIT_USAGE;
        }
    };

    let window = match args.run_window(config.mysql.timezone) {
        Ok(window) => window,
        Err(err) => {
            eprintln!("{err}");
            return EXIT_USAGE;
        }
    };

    let logging_context = init_logging(SERVICE_NAME, window.mode(), &args.log_level);
    let run_span = tracing::info_span!(
        "import_run",
        service = %logging_context.service,
        environment = %logging_context.environment,
        mode = %logging_context.mode,
        run_id = %logging_context.run_id,
        build_version = %logging_context.build_version,
        build_commit = %logging_context.build_commit
    );
    let _run_guard = run_span.enter();

    if args.initial {
        if let RunWindow::SingleTicket { .. } = window {
            warn!(
                event = "initial_flag_ignored",
                "--initial has no effect on single-ticket runs"
            );
        }
    }

    let db_url = match resolve_database_url(&args, &config) {
        Ok(value) => value,
        Err(err) => {
            eprintln!("{err}");
            return EXIT_USAGE;
        }
    };
    let elastic_url = resolve_elastic_url(&args, &config);

    let index = match ElasticIndex::new(&elastic_url, config.elastic.index.clone()) {
        Ok(index) => index,
        Err(err) => {
            eprintln!("{err}");
            return EXIT_USAGE;
        }
    };

    let conn = match db::connect(&db_url).await {
        Ok(conn) => conn,
        Err(err) => {
            let error_report = format_error_report(&err);
            error!(
                event = "db_connect_failed",
                error = %err,
                error_debug = ?err,
                error_report = %error_report,
                "failed to connect to the helpdesk database"
            );
            eprintln!("failed to connect to the helpdesk database: {err}");
            eprintln!("{error_report}");
            return EXIT_FAILURE;
        }
    };

    info!(
        event = "import_configured",
        elastic_url = %elastic_url,
        index = %index.index(),
        bulk_max_lines = config.import.bulk_max_lines,
        exclude_automated_followups = config.import.exclude_automated_followups,
        source_timezone = %config.mysql.timezone,
        "connected, starting import"
    );

    let source = MysqlHistorySource::new(
        conn,
        HistoryQuery::new(config.import.exclude_automated_followups),
        config.mysql.timezone,
    );
    let service = ImportService::new(
        source,
        index,
        BatchPolicy {
            max_lines: config.import.bulk_max_lines,
        },
    );

    match service.run(&window).await {
        Ok(summary) => {
            if summary.documents_failed > 0 {
                warn!(
                    event = "import_incomplete",
                    documents_failed = summary.documents_failed,
                    "some documents were not indexed"
                );
            }
            EXIT_OK
        }
        Err(err) => {
            let error_report = format_error_report(&err);
            error!(
                event = "import_failed",
                error = %err,
                error_debug = ?err,
                error_report = %error_report,
                "import run failed"
            );
            eprintln!("import failed: {err}");
            eprintln!("{error_report}");
            EXIT_FAILURE
        }
    }
}
