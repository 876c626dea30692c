//! Build identity reported by `--version`, the bootstrap log event and the ledger RPC
//! `User-Agent` header.

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const GIT_COMMIT_HASH: &str = env!("CLAIMS_INDEXER_GIT_COMMIT_HASH");
/// Cargo profile the binary was built with (`debug` or `release`).
pub const BUILD_PROFILE: &str = env!("CLAIMS_INDEXER_BUILD_PROFILE");
pub const VERSION_WITH_COMMIT: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "+",
    env!("CLAIMS_INDEXER_GIT_COMMIT_HASH")
);

const SHORT_HASH_LEN: usize = 12;

pub fn short_commit_hash() -> &'static str {
    match GIT_COMMIT_HASH.get(..SHORT_HASH_LEN) {
        Some(short) if GIT_COMMIT_HASH != "unknown" => short,
        _ => GIT_COMMIT_HASH,
    }
}

/// `claims_indexer/<semver>+<short hash>`, sent with every ledger query so node operators
/// can tell the extraction traffic apart.
pub fn user_agent() -> String {
    format!("{}/{}+{}", env!("CARGO_PKG_NAME"), VERSION, short_commit_hash())
}
