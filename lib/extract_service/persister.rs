use std::sync::Arc;

use futures::future::BoxFuture;

use crate::db::models::ErrorRecord;
use crate::db::{Store, StoreError};

use super::types::BatchEvents;

/// Durable sink for batch results.
///
/// `persist_events` is all-or-nothing for the batch. `persist_error` writes one error record
/// in its own transaction, independent of any batch.
pub trait EventStore: Send + Sync {
    fn persist_events<'a>(
        &'a self,
        events: &'a BatchEvents,
    ) -> BoxFuture<'a, Result<(), StoreError>>;

    fn persist_error<'a>(
        &'a self,
        record: &'a ErrorRecord,
    ) -> BoxFuture<'a, Result<(), StoreError>>;
}

impl<T> EventStore for Arc<T>
where
    T: EventStore + ?Sized,
{
    fn persist_events<'a>(
        &'a self,
        events: &'a BatchEvents,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        (**self).persist_events(events)
    }

    fn persist_error<'a>(
        &'a self,
        record: &'a ErrorRecord,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        (**self).persist_error(record)
    }
}

impl EventStore for Store {
    fn persist_events<'a>(
        &'a self,
        events: &'a BatchEvents,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move { self.insert_events(&events.merged, &events.claims).await })
    }

    fn persist_error<'a>(
        &'a self,
        record: &'a ErrorRecord,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move { self.insert_error(record).await })
    }
}
