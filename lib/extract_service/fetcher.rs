use std::sync::Arc;

use futures::future::BoxFuture;

use crate::ledger_client::{BlockResults, LedgerClient, LedgerClientError};

use super::types::GlobalRateLimiter;

/// Fetches the block results of one height.
///
/// Workers only see this trait, so batch processing runs against scripted fetchers in tests.
pub trait BlockFetcher: Send + Sync {
    fn fetch_block<'a>(
        &'a self,
        height: i64,
    ) -> BoxFuture<'a, Result<BlockResults, LedgerClientError>>;
}

impl<T> BlockFetcher for Arc<T>
where
    T: BlockFetcher + ?Sized,
{
    fn fetch_block<'a>(
        &'a self,
        height: i64,
    ) -> BoxFuture<'a, Result<BlockResults, LedgerClientError>> {
        (**self).fetch_block(height)
    }
}

/// RPC-backed fetcher used by the extraction binary.
pub struct LedgerBlockFetcher {
    client: LedgerClient,
    rate_limiter: Option<GlobalRateLimiter>,
}

impl LedgerBlockFetcher {
    /// `rate_limiter`, when set, is one budget shared by every worker holding this fetcher.
    pub fn new(client: LedgerClient, rate_limiter: Option<GlobalRateLimiter>) -> Self {
        Self {
            client,
            rate_limiter,
        }
    }
}

impl BlockFetcher for LedgerBlockFetcher {
    fn fetch_block<'a>(
        &'a self,
        height: i64,
    ) -> BoxFuture<'a, Result<BlockResults, LedgerClientError>> {
        Box::pin(async move {
            if let Some(limiter) = &self.rate_limiter {
                limiter.until_ready().await;
            }
            self.client.get_block_results(height).await
        })
    }
}
