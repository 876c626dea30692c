use claims_indexer_lib::{
    cli::{parse_args, validate_run},
    config::Config,
    extract_service::ExtractService,
    logging::{format_error_report, init_logging},
};
use dotenv::dotenv;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Cancels the run on Ctrl-C. Batches already picked up by a worker still finish.
async fn cancel_on_interrupt(token: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            warn!(
                event = "interrupt_received",
                "interrupt received; finishing in-flight batches"
            );
            token.cancel();
        }
        Err(err) => {
            warn!(
                event = "interrupt_handler_failed",
                error = %err,
                "could not listen for interrupts"
            );
        }
    }
}

#[tokio::main]
async fn main() {
    dotenv().ok();

    let args = parse_args();
    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };
    args.apply_overrides(&mut config);

    let range = match validate_run(&args, &config) {
        Ok(range) => range,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };

    let (logging_context, _log_guard) = match init_logging(
        "claims_indexer",
        "collect_events",
        &args.log_level,
        Path::new(&config.log_file),
    ) {
        Ok(logging) => logging,
        Err(err) => {
            eprintln!("{}", format_error_report(&err));
            std::process::exit(1);
        }
    };
    let run_span = tracing::info_span!(
        "extract_run",
        service = %logging_context.service,
        environment = %logging_context.environment,
        mode = %logging_context.mode,
        run_id = %logging_context.run_id,
        build_version = %logging_context.build_version,
        build_commit = %logging_context.build_commit
    );
    let _run_guard = run_span.enter();

    let service = match ExtractService::from_config(&config).await {
        Ok(service) => service,
        Err(err) => {
            let report = format_error_report(&err);
            error!(
                event = "extract_setup_failed",
                error = %err,
                error_report = %report,
                "failed to set up extraction"
            );
            eprintln!("{report}");
            std::process::exit(1);
        }
    };

    let interrupt_handle = tokio::spawn(cancel_on_interrupt(service.cancellation_token()));

    let outcome = service.run(range).await;
    interrupt_handle.abort();

    match outcome {
        Ok(summary) => {
            info!(
                event = "extract_run_complete",
                from_height = range.from(),
                to_height = range.to(),
                query_failures = summary.query_failures,
                batches_failed_to_persist = summary.batches_failed_to_persist,
                cancelled = summary.cancelled,
                "job finished"
            );
        }
        Err(err) => {
            let report = format_error_report(&err);
            error!(
                event = "extract_run_failed",
                error = %err,
                error_report = %report,
                "extraction aborted"
            );
            eprintln!("{report}");
            std::process::exit(1);
        }
    }
}
