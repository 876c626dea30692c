use diesel::prelude::*;

/// One decoded `merge_claims_records` event.
#[derive(Queryable, Selectable, Insertable, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = super::schema::merged_event)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct MergedEvent {
    pub height: i64,
    pub recipient: String,
    pub claimed_coins: String,
    pub fund_community_pool: String,
}

/// One decoded `claim` event.
#[derive(Queryable, Selectable, Insertable, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = super::schema::claim_event)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ClaimEvent {
    pub height: i64,
    pub sender: String,
    pub amount: String,
    pub action: String,
}

/// A height whose block results could not be queried.
#[derive(Queryable, Selectable, Insertable, Debug, Clone, Copy, PartialEq, Eq)]
#[diesel(table_name = super::schema::error_height)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ErrorRecord {
    pub height: i64,
}

/// Address column of a stored merged event, as read by the sender backfill.
#[derive(Queryable, Debug, Clone, PartialEq, Eq)]
pub struct MergedSender {
    pub id: i32,
    pub recipient: String,
}

/// Enrichment columns written back onto a merged event row by id.
#[derive(AsChangeset, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = super::schema::merged_event)]
#[diesel(treat_none_as_null = true)]
pub struct MergedEnrichment {
    pub sender_evmos_prefix: Option<String>,
    pub sender_genesis_claim_record: Option<String>,
}

/// Full merged event row including enrichment state.
#[derive(Queryable, Selectable, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = super::schema::merged_event)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct MergedEventRow {
    pub id: i32,
    pub height: i64,
    pub recipient: String,
    pub claimed_coins: String,
    pub fund_community_pool: String,
    pub sender_evmos_prefix: Option<String>,
    pub sender_genesis_claim_record: Option<String>,
}
