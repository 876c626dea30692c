pub mod backfill;
pub mod build_info;
pub mod cli;
pub mod config;
pub mod db;
pub mod extract_service;
pub mod ledger_client;
pub mod logging;
