pub mod models;
pub mod schema;

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::sync_connection_wrapper::SyncConnectionWrapper;
use diesel_async::{AsyncConnection, RunQueryDsl, SimpleAsyncConnection};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use thiserror::Error;
use tokio::task::JoinError;

use models::{ClaimEvent, ErrorRecord, MergedEnrichment, MergedEvent, MergedEventRow, MergedSender};
use schema::{claim_event, error_height, merged_event};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Applied to every connection. Workers open their own connections and write concurrently,
/// so each one waits on the SQLite write lock instead of failing with `SQLITE_BUSY`.
const CONNECTION_PRAGMAS: &str = r#"
    PRAGMA busy_timeout = 5000;
    PRAGMA foreign_keys = ON;
"#;

pub type AsyncSqliteConnection = SyncConnectionWrapper<SqliteConnection>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to open database {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: diesel::ConnectionError,
    },

    #[error("failed to run schema migrations: {0}")]
    Migration(String),

    #[error(transparent)]
    DieselError(#[from] diesel::result::Error),

    #[error("Task join error: {0}")]
    TaskJoinError(#[from] JoinError),
}

/// Row counts per table, logged at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableCounts {
    pub merged_events: i64,
    pub claim_events: i64,
    pub error_heights: i64,
}

/// Handle on the SQLite store shared by every worker.
///
/// The handle only carries the database location. Each operation opens its own connection,
/// so concurrent batches never share a transaction.
#[derive(Debug, Clone)]
pub struct Store {
    database_url: String,
}

impl Store {
    /// Opens the store and bootstraps the schema. Failure here is fatal for a run.
    pub async fn open(database_url: &str) -> Result<Self, StoreError> {
        let store = Self {
            database_url: database_url.to_string(),
        };
        store.bootstrap_schema().await?;
        Ok(store)
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    /// Creates the merged event, claim event and error tables if they do not exist.
    ///
    /// Safe to call any number of times.
    pub async fn bootstrap_schema(&self) -> Result<(), StoreError> {
        let database_url = self.database_url.clone();
        tokio::task::spawn_blocking(move || -> Result<(), StoreError> {
            let mut conn = SqliteConnection::establish(&database_url).map_err(|source| {
                StoreError::Connect {
                    url: database_url.clone(),
                    source,
                }
            })?;
            conn.batch_execute("PRAGMA journal_mode = WAL;")?;
            conn.batch_execute(CONNECTION_PRAGMAS)?;
            conn.run_pending_migrations(MIGRATIONS)
                .map_err(|err| StoreError::Migration(err.to_string()))?;
            Ok(())
        })
        .await?
    }

    pub async fn connect(&self) -> Result<AsyncSqliteConnection, StoreError> {
        let mut conn = AsyncSqliteConnection::establish(&self.database_url)
            .await
            .map_err(|source| StoreError::Connect {
                url: self.database_url.clone(),
                source,
            })?;
        conn.batch_execute(CONNECTION_PRAGMAS).await?;
        Ok(conn)
    }

    /// Inserts one batch of events in a single transaction.
    ///
    /// Merged events go first, then claim events, each in the order given. Any failing
    /// statement rolls the whole batch back.
    pub async fn insert_events(
        &self,
        merged: &[MergedEvent],
        claims: &[ClaimEvent],
    ) -> Result<(), StoreError> {
        if merged.is_empty() && claims.is_empty() {
            return Ok(());
        }

        let mut conn = self.connect().await?;
        conn.transaction::<(), StoreError, _>(|conn| {
            async move {
                for record in merged {
                    diesel::insert_into(merged_event::table)
                        .values(record)
                        .execute(conn)
                        .await?;
                }
                for record in claims {
                    diesel::insert_into(claim_event::table)
                        .values(record)
                        .execute(conn)
                        .await?;
                }
                Ok(())
            }
            .scope_boxed()
        })
        .await
    }

    /// Records one unqueryable height in its own transaction.
    pub async fn insert_error(&self, record: &ErrorRecord) -> Result<(), StoreError> {
        let mut conn = self.connect().await?;
        conn.transaction::<(), StoreError, _>(|conn| {
            async move {
                diesel::insert_into(error_height::table)
                    .values(record)
                    .execute(conn)
                    .await?;
                Ok(())
            }
            .scope_boxed()
        })
        .await
    }

    pub async fn load_merged_senders(&self) -> Result<Vec<MergedSender>, StoreError> {
        let mut conn = self.connect().await?;
        let rows = merged_event::table
            .select((merged_event::id, merged_event::recipient))
            .order(merged_event::id.asc())
            .load::<MergedSender>(&mut conn)
            .await?;
        Ok(rows)
    }

    /// Writes the enrichment columns of one merged event row. Returns affected rows.
    pub async fn update_merged_enrichment(
        &self,
        id: i32,
        enrichment: &MergedEnrichment,
    ) -> Result<usize, StoreError> {
        let mut conn = self.connect().await?;
        let updated = diesel::update(merged_event::table.find(id))
            .set(enrichment)
            .execute(&mut conn)
            .await?;
        Ok(updated)
    }

    pub async fn load_merged_events(&self) -> Result<Vec<MergedEventRow>, StoreError> {
        let mut conn = self.connect().await?;
        let rows = merged_event::table
            .select(MergedEventRow::as_select())
            .order(merged_event::id.asc())
            .load(&mut conn)
            .await?;
        Ok(rows)
    }

    pub async fn load_claim_events(&self) -> Result<Vec<ClaimEvent>, StoreError> {
        let mut conn = self.connect().await?;
        let rows = claim_event::table
            .select(ClaimEvent::as_select())
            .order(claim_event::id.asc())
            .load(&mut conn)
            .await?;
        Ok(rows)
    }

    pub async fn load_error_heights(&self) -> Result<Vec<i64>, StoreError> {
        let mut conn = self.connect().await?;
        let rows = error_height::table
            .select(error_height::height)
            .order(error_height::id.asc())
            .load::<i64>(&mut conn)
            .await?;
        Ok(rows)
    }

    pub async fn table_counts(&self) -> Result<TableCounts, StoreError> {
        let mut conn = self.connect().await?;
        let merged_events = merged_event::table
            .count()
            .get_result::<i64>(&mut conn)
            .await?;
        let claim_events = claim_event::table
            .count()
            .get_result::<i64>(&mut conn)
            .await?;
        let error_heights = error_height::table
            .count()
            .get_result::<i64>(&mut conn)
            .await?;
        Ok(TableCounts {
            merged_events,
            claim_events,
            error_heights,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::models::{ClaimEvent, ErrorRecord, MergedEnrichment, MergedEvent};
    use super::Store;

    fn merged(height: i64, recipient: &str) -> MergedEvent {
        MergedEvent {
            height,
            recipient: recipient.to_string(),
            claimed_coins: "100aevmos".to_string(),
            fund_community_pool: "false".to_string(),
        }
    }

    fn claim(height: i64, sender: &str) -> ClaimEvent {
        ClaimEvent {
            height,
            sender: sender.to_string(),
            amount: "30".to_string(),
            action: "ACTION_VOTE".to_string(),
        }
    }

    async fn temp_store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let path = dir.path().join("accounts.db");
        let store = Store::open(path.to_str().expect("utf-8 temp path"))
            .await
            .expect("store should open");
        (dir, store)
    }

    #[tokio::test]
    async fn insert_events_preserves_received_order() {
        let (_dir, store) = temp_store().await;

        store
            .insert_events(
                &[merged(5, "osmo1b"), merged(3, "osmo1a")],
                &[claim(7, "evmos1x"), claim(2, "evmos1y")],
            )
            .await
            .expect("batch insert should succeed");

        let merged_rows = store.load_merged_events().await.expect("load merged");
        let heights: Vec<i64> = merged_rows.iter().map(|row| row.height).collect();
        assert_eq!(heights, vec![5, 3]);
        assert!(merged_rows.iter().all(|row| row.sender_evmos_prefix.is_none()));

        let claims = store.load_claim_events().await.expect("load claims");
        assert_eq!(claims, vec![claim(7, "evmos1x"), claim(2, "evmos1y")]);
    }

    #[tokio::test]
    async fn empty_batch_is_a_no_op() {
        let (_dir, store) = temp_store().await;

        store
            .insert_events(&[], &[])
            .await
            .expect("empty batch should succeed");

        let counts = store.table_counts().await.expect("counts");
        assert_eq!(counts.merged_events, 0);
        assert_eq!(counts.claim_events, 0);
    }

    #[tokio::test]
    async fn error_records_and_enrichment_round_trip() {
        let (_dir, store) = temp_store().await;

        store
            .insert_error(&ErrorRecord { height: 10 })
            .await
            .expect("error insert");
        store
            .insert_events(&[merged(11, "osmo1z")], &[])
            .await
            .expect("merged insert");

        let senders = store.load_merged_senders().await.expect("senders");
        assert_eq!(senders.len(), 1);
        assert_eq!(senders[0].recipient, "osmo1z");

        let updated = store
            .update_merged_enrichment(
                senders[0].id,
                &MergedEnrichment {
                    sender_evmos_prefix: Some("evmos1z".to_string()),
                    sender_genesis_claim_record: Some("1000".to_string()),
                },
            )
            .await
            .expect("update");
        assert_eq!(updated, 1);

        let rows = store.load_merged_events().await.expect("rows");
        assert_eq!(rows[0].sender_evmos_prefix.as_deref(), Some("evmos1z"));
        assert_eq!(rows[0].sender_genesis_claim_record.as_deref(), Some("1000"));
        assert_eq!(store.load_error_heights().await.expect("errors"), vec![10]);
    }
}
