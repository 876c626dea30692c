//! Sequential enrichment of stored merged events with their evmos-prefixed sender address
//! and the sender's genesis claims record.

mod address;

pub use address::{convert_address, AddressError};

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::db::models::MergedEnrichment;
use crate::db::{Store, StoreError};

pub const DEFAULT_SOURCE_PREFIX: &str = "osmo";
pub const DEFAULT_TARGET_PREFIX: &str = "evmos";

#[derive(Error, Debug)]
pub enum BackfillError {
    #[error("failed to read genesis file {path}: {source}")]
    ReadGenesis {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse genesis file {path}: {source}")]
    ParseGenesis {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Task join error: {0}")]
    TaskJoinError(#[from] tokio::task::JoinError),
}

#[derive(Deserialize, Debug)]
struct Genesis {
    app_state: AppState,
}

#[derive(Deserialize, Debug)]
struct AppState {
    claims: ClaimsGenesis,
}

#[derive(Deserialize, Debug)]
struct ClaimsGenesis {
    #[serde(default)]
    claims_records: Vec<GenesisClaimsRecord>,
}

/// One `app_state.claims.claims_records[]` entry of the genesis file.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct GenesisClaimsRecord {
    pub address: String,
    pub initial_claimable_amount: String,
    #[serde(default)]
    pub actions_completed: Vec<bool>,
}

/// Claims records keyed by address.
pub type GenesisClaims = HashMap<String, GenesisClaimsRecord>;

/// Reads the genesis file into an address-keyed map. Later duplicates win.
pub async fn load_genesis_claims(path: &Path) -> Result<GenesisClaims, BackfillError> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || -> Result<GenesisClaims, BackfillError> {
        let file = File::open(&path).map_err(|source| BackfillError::ReadGenesis {
            path: path.clone(),
            source,
        })?;
        let genesis: Genesis = serde_json::from_reader(BufReader::new(file))
            .map_err(|source| BackfillError::ParseGenesis {
                path: path.clone(),
                source,
            })?;

        Ok(genesis
            .app_state
            .claims
            .claims_records
            .into_iter()
            .map(|record| (record.address.clone(), record))
            .collect())
    })
    .await?
}

/// Address namespaces of the conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixPair {
    pub source: String,
    pub target: String,
}

impl Default for PrefixPair {
    fn default() -> Self {
        Self {
            source: DEFAULT_SOURCE_PREFIX.to_string(),
            target: DEFAULT_TARGET_PREFIX.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackfillSummary {
    pub scanned: usize,
    pub updated: usize,
    pub skipped_conversion: usize,
    pub skipped_missing_genesis: usize,
    pub failed_updates: usize,
}

/// Enriches every merged event row.
///
/// Rows are read first, then updated one short transaction at a time. A row whose address
/// does not convert, or whose converted address is missing from genesis, is skipped with a
/// warning. A failed update is logged and the pass moves on. Only the initial read is fatal.
pub async fn run_backfill(
    store: &Store,
    genesis: &GenesisClaims,
    prefixes: &PrefixPair,
) -> Result<BackfillSummary, BackfillError> {
    let rows = store.load_merged_senders().await?;
    let mut summary = BackfillSummary {
        scanned: rows.len(),
        ..BackfillSummary::default()
    };

    let mut pending = Vec::new();
    for row in rows {
        let converted = match convert_address(&row.recipient, &prefixes.source, &prefixes.target)
        {
            Ok(converted) => converted,
            Err(err) => {
                summary.skipped_conversion += 1;
                warn!(
                    event = "sender_conversion_failed",
                    id = row.id,
                    address = %row.recipient,
                    error = %err,
                    "error converting address"
                );
                continue;
            }
        };

        let Some(record) = genesis.get(&converted) else {
            summary.skipped_missing_genesis += 1;
            warn!(
                event = "sender_missing_from_genesis",
                id = row.id,
                address = %converted,
                "address not found in genesis"
            );
            continue;
        };

        pending.push((
            row.id,
            MergedEnrichment {
                sender_evmos_prefix: Some(converted),
                sender_genesis_claim_record: Some(record.initial_claimable_amount.clone()),
            },
        ));
    }
    info!(
        event = "sender_scan_finished",
        scanned = summary.scanned,
        to_update = pending.len(),
        "rows scan finished"
    );

    for (id, enrichment) in pending {
        match store.update_merged_enrichment(id, &enrichment).await {
            Ok(0) => {
                summary.failed_updates += 1;
                warn!(event = "sender_update_missed", id, "row vanished before update");
            }
            Ok(_) => summary.updated += 1,
            Err(err) => {
                summary.failed_updates += 1;
                warn!(
                    event = "sender_update_failed",
                    id,
                    error = %err,
                    "error updating merged event"
                );
            }
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::{load_genesis_claims, BackfillError};

    #[tokio::test]
    async fn genesis_claims_are_keyed_by_address() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let path = dir.path().join("genesis.json");
        std::fs::write(
            &path,
            r#"{
                "chain_id": "evmos_9001-2",
                "app_state": {
                    "claims": {
                        "params": {"enable_claims": true},
                        "claims_records": [
                            {"address": "evmos1a", "initial_claimable_amount": "1000", "actions_completed": [false, false, false, false]},
                            {"address": "evmos1b", "initial_claimable_amount": "25"}
                        ]
                    }
                }
            }"#,
        )
        .expect("write genesis");

        let claims = load_genesis_claims(&path).await.expect("genesis should load");

        assert_eq!(claims.len(), 2);
        assert_eq!(claims["evmos1a"].initial_claimable_amount, "1000");
        assert_eq!(claims["evmos1a"].actions_completed.len(), 4);
        assert!(claims["evmos1b"].actions_completed.is_empty());
    }

    #[tokio::test]
    async fn unreadable_or_malformed_genesis_fails() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let missing = load_genesis_claims(&dir.path().join("absent.json")).await;
        assert!(matches!(missing, Err(BackfillError::ReadGenesis { .. })));

        let path = dir.path().join("genesis.json");
        std::fs::write(&path, r#"{"app_state": {}}"#).expect("write genesis");
        let malformed = load_genesis_claims(&path).await;
        assert!(matches!(malformed, Err(BackfillError::ParseGenesis { .. })));
    }
}
