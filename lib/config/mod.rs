use std::env;
use std::num::NonZeroU32;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::ledger_client::AttributeEncoding;

pub const DEFAULT_DATABASE_URL: &str = "./accounts.db";
pub const DEFAULT_LEDGER_RPC_URL: &str = "http://localhost:26657";
pub const DEFAULT_LOG_FILE: &str = "./output.log";
/// Heights per batch. Also the per-batch memory/latency knob: every decoded event of a
/// batch is held in memory until its single transaction commits.
pub const DEFAULT_BATCH_SIZE: i64 = 100;
pub const DEFAULT_MAX_WORKERS: usize = 5;
pub const DEFAULT_LEDGER_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

pub struct Config {
    /// SQLite database path. Default: `./accounts.db`
    pub db_url: String,
    pub ledger_rpc_url: String,
    pub log_file: String,
    /// Default: 100
    pub batch_size: i64,
    /// Default: 5
    pub max_workers: usize,
    /// Global ledger request budget shared by all workers. Unlimited when unset.
    pub ledger_max_rps: Option<NonZeroU32>,
    pub ledger_timeout: Duration,
    pub attribute_encoding: AttributeEncoding,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let db_url = env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());
        let ledger_rpc_url =
            env::var("LEDGER_RPC_URL").unwrap_or_else(|_| DEFAULT_LEDGER_RPC_URL.to_string());
        let log_file = env::var("LOG_FILE").unwrap_or_else(|_| DEFAULT_LOG_FILE.to_string());

        let batch_size = parse_var("BATCH_SIZE")?.unwrap_or(DEFAULT_BATCH_SIZE);
        let max_workers = parse_var("MAX_WORKERS")?.unwrap_or(DEFAULT_MAX_WORKERS);
        let ledger_max_rps = parse_var::<NonZeroU32>("LEDGER_MAX_RPS")?;
        let ledger_timeout = parse_var::<u64>("LEDGER_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_LEDGER_TIMEOUT);
        let attribute_encoding =
            parse_var("LEDGER_ATTRIBUTE_ENCODING")?.unwrap_or(AttributeEncoding::Base64);

        Ok(Self {
            db_url,
            ledger_rpc_url,
            log_file,
            batch_size,
            max_workers,
            ledger_max_rps,
            ledger_timeout,
            attribute_encoding,
        })
    }
}

fn parse_var<T: FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { name, value }),
        Err(_) => Ok(None),
    }
}
