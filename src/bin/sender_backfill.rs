use claims_indexer_lib::{
    backfill::{
        load_genesis_claims, run_backfill, PrefixPair, DEFAULT_SOURCE_PREFIX,
        DEFAULT_TARGET_PREFIX,
    },
    build_info,
    config::{DEFAULT_DATABASE_URL, DEFAULT_LOG_FILE},
    db::Store,
    logging::{format_error_report, init_logging},
};
use clap::Parser;
use dotenv::dotenv;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info};

/// Sequential pass that adds the converted sender address and its genesis claimable amount
/// to every stored merged event.
///
/// Each row is updated in its own short transaction. Rows that cannot be converted or are
/// missing from genesis are left untouched, so rerunning the pass is safe.
#[derive(Debug, Parser)]
#[command(
    about = "Enrich merged events with converted sender and genesis claims record",
    version = build_info::VERSION_WITH_COMMIT,
    long_version = build_info::VERSION_WITH_COMMIT
)]
struct Args {
    #[arg(long, default_value = "genesis.json")]
    genesis: PathBuf,

    #[arg(long = "database-url")]
    database_url: Option<String>,

    #[arg(long = "source-prefix", default_value = DEFAULT_SOURCE_PREFIX)]
    source_prefix: String,

    #[arg(long = "target-prefix", default_value = DEFAULT_TARGET_PREFIX)]
    target_prefix: String,

    #[arg(long = "log-file")]
    log_file: Option<String>,

    #[arg(long = "log-level", default_value = "info")]
    log_level: String,
}

fn resolve_database_url(args: &Args) -> String {
    args.database_url
        .clone()
        .or_else(|| env::var("DATABASE_URL").ok())
        .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string())
}

fn resolve_log_file(args: &Args) -> String {
    args.log_file
        .clone()
        .or_else(|| env::var("LOG_FILE").ok())
        .unwrap_or_else(|| DEFAULT_LOG_FILE.to_string())
}

fn validate_args(args: &Args) -> Result<(), String> {
    if args.source_prefix.trim().is_empty() {
        return Err("--source-prefix must not be empty".to_string());
    }
    if args.target_prefix.trim().is_empty() {
        return Err("--target-prefix must not be empty".to_string());
    }
    if args.source_prefix == args.target_prefix {
        return Err(format!(
            "--source-prefix and --target-prefix are both {}",
            args.source_prefix
        ));
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    dotenv().ok();

    let args = Args::parse();
    if let Err(err) = validate_args(&args) {
        eprintln!("{err}");
        std::process::exit(2);
    }

    let log_file = resolve_log_file(&args);
    let (logging_context, _log_guard) = match init_logging(
        "claims_indexer",
        "sender_backfill",
        &args.log_level,
        Path::new(&log_file),
    ) {
        Ok(logging) => logging,
        Err(err) => {
            eprintln!("{}", format_error_report(&err));
            std::process::exit(1);
        }
    };
    let run_span = tracing::info_span!(
        "backfill_run",
        service = %logging_context.service,
        environment = %logging_context.environment,
        mode = %logging_context.mode,
        run_id = %logging_context.run_id,
        build_version = %logging_context.build_version,
        build_commit = %logging_context.build_commit
    );
    let _run_guard = run_span.enter();
    info!(
        event = "sender_backfill_starting",
        genesis = %args.genesis.display(),
        source_prefix = %args.source_prefix,
        target_prefix = %args.target_prefix,
        "starting sender backfill run"
    );

    let started_at = Instant::now();
    let genesis = match load_genesis_claims(&args.genesis).await {
        Ok(genesis) => genesis,
        Err(err) => {
            let report = format_error_report(&err);
            error!(
                event = "sender_backfill_genesis_failed",
                error = %err,
                error_report = %report,
                "failed to load genesis claims records"
            );
            eprintln!("{report}");
            std::process::exit(1);
        }
    };
    info!(
        event = "sender_backfill_genesis_loaded",
        records = genesis.len(),
        "created map of genesis records"
    );

    let db_url = resolve_database_url(&args);
    let store = match Store::open(&db_url).await {
        Ok(store) => store,
        Err(err) => {
            let report = format_error_report(&err);
            error!(
                event = "sender_backfill_store_failed",
                error = %err,
                error_report = %report,
                "failed to open store"
            );
            eprintln!("{report}");
            std::process::exit(1);
        }
    };

    let prefixes = PrefixPair {
        source: args.source_prefix.clone(),
        target: args.target_prefix.clone(),
    };
    match run_backfill(&store, &genesis, &prefixes).await {
        Ok(summary) => {
            info!(
                event = "sender_backfill_complete",
                scanned = summary.scanned,
                updated = summary.updated,
                skipped_conversion = summary.skipped_conversion,
                skipped_missing_genesis = summary.skipped_missing_genesis,
                failed_updates = summary.failed_updates,
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                "job finished"
            );
        }
        Err(err) => {
            let report = format_error_report(&err);
            error!(
                event = "sender_backfill_failed",
                error = %err,
                error_report = %report,
                "sender backfill aborted"
            );
            eprintln!("{report}");
            std::process::exit(1);
        }
    }
}
