use crate::build_info;
use crate::config::Config;
use crate::extract_service::types::HeightRange;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    about = "Extracts claims events from ledger block results into SQLite",
    version = build_info::VERSION_WITH_COMMIT,
    long_version = build_info::VERSION_WITH_COMMIT
)]
pub struct Cli {
    #[clap(long)]
    /// First height to query (inclusive)
    pub from_height: i64,

    #[clap(long)]
    /// Last height to query (inclusive)
    pub to_height: i64,

    #[clap(long)]
    /// Heights per batch [env: BATCH_SIZE, default 100]
    pub batch_size: Option<i64>,

    #[clap(long)]
    /// Concurrent workers [env: MAX_WORKERS, default 5]
    pub max_workers: Option<usize>,

    #[clap(long = "database-url")]
    /// SQLite database path [env: DATABASE_URL]
    pub database_url: Option<String>,

    #[clap(long = "rpc-url")]
    /// Ledger RPC base URL [env: LEDGER_RPC_URL]
    pub rpc_url: Option<String>,

    #[clap(long)]
    /// Append-only log mirror [env: LOG_FILE]
    pub log_file: Option<String>,

    #[clap(long, default_value = "info")]
    pub log_level: String,
}

pub fn parse_args() -> Cli {
    Cli::parse()
}

impl Cli {
    /// Flags take precedence over environment values.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(max_workers) = self.max_workers {
            config.max_workers = max_workers;
        }
        if let Some(database_url) = &self.database_url {
            config.db_url = database_url.clone();
        }
        if let Some(rpc_url) = &self.rpc_url {
            config.ledger_rpc_url = rpc_url.clone();
        }
        if let Some(log_file) = &self.log_file {
            config.log_file = log_file.clone();
        }
    }

    pub fn height_range(&self) -> Result<HeightRange, String> {
        HeightRange::new(self.from_height, self.to_height).map_err(|err| err.to_string())
    }
}

/// Checks the effective run settings before any resource is opened.
pub fn validate_run(cli: &Cli, config: &Config) -> Result<HeightRange, String> {
    let range = cli.height_range()?;
    if config.batch_size <= 0 {
        return Err(format!("batch size must be > 0, got {}", config.batch_size));
    }
    if config.max_workers == 0 {
        return Err("max workers must be > 0".to_string());
    }
    Ok(range)
}
