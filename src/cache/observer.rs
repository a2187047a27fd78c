use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{watch, Mutex};
use tracing::debug;

use super::{downcast, Fetcher, QueryClient, QueryKey, QueryResult, ReadMode, SharedError};

/// Point-in-time view of one cache entry.
#[derive(Debug)]
pub struct QueryState<T> {
    pub data: Option<Arc<T>>,
    pub error: Option<SharedError>,
    pub is_fetching: bool,
    pub is_stale: bool,
    pub updated_at: Option<Instant>,
}

impl<T> QueryState<T> {
    pub(crate) fn idle() -> Self {
        Self {
            data: None,
            error: None,
            is_fetching: false,
            is_stale: true,
            updated_at: None,
        }
    }

    /// No data and no error yet: the first fetch has not settled.
    pub fn is_loading(&self) -> bool {
        self.data.is_none() && self.error.is_none()
    }
}

impl<T> Clone for QueryState<T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            error: self.error.clone(),
            is_fetching: self.is_fetching,
            is_stale: self.is_stale,
            updated_at: self.updated_at,
        }
    }
}

/// A view's subscription to one key.
///
/// While an observer is alive, invalidating its key refetches immediately.
/// Dropping it unsubscribes; a fetch it started that settles afterwards is
/// not written back unless another observer still watches the key. If the
/// entry is removed from under it, the next read subscribes to the new one.
pub struct QueryObserver<T> {
    client: QueryClient,
    key: QueryKey,
    fetcher: Fetcher,
    receiver: Mutex<watch::Receiver<u64>>,
    alive: Arc<()>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> QueryObserver<T> {
    pub(super) fn new(
        client: QueryClient,
        key: QueryKey,
        fetcher: Fetcher,
        receiver: watch::Receiver<u64>,
    ) -> Self {
        Self {
            client,
            key,
            fetcher,
            receiver: Mutex::new(receiver),
            alive: Arc::new(()),
            _marker: PhantomData,
        }
    }

    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    /// Mount-time read: stale-while-revalidate, waiting only when nothing is
    /// cached yet. Errors are recorded on the key and show up in the state.
    pub async fn load(&self) -> QueryState<T> {
        let _ = self.read(ReadMode::StaleWhileRevalidate).await;
        self.state().await
    }

    /// Explicit user refresh: waits for a new response.
    pub async fn refetch(&self) -> QueryResult<T> {
        self.read(ReadMode::Fresh).await
    }

    pub async fn state(&self) -> QueryState<T> {
        self.client.snapshot(&self.key).await
    }

    /// Waits until the entry changes. Returns `false` once the entry has
    /// been removed from the cache.
    pub async fn changed(&mut self) -> bool {
        self.receiver.get_mut().changed().await.is_ok()
    }

    /// A closed channel means the entry was dropped by `remove_queries` or
    /// `clear`; re-registering makes invalidation see this observer again.
    async fn resubscribe_if_removed(&self) {
        let mut receiver = self.receiver.lock().await;
        if receiver.has_changed().is_err() {
            debug!(key = %self.key, "entry was removed; resubscribing");
            *receiver = self
                .client
                .subscribe(&self.key, Arc::clone(&self.fetcher))
                .await;
        }
    }

    async fn read(&self, mode: ReadMode) -> QueryResult<T> {
        self.resubscribe_if_removed().await;
        let value = self
            .client
            .resolve(
                &self.key,
                Arc::clone(&self.fetcher),
                Some(Arc::downgrade(&self.alive)),
                mode,
            )
            .await?;
        downcast(&self.key, value)
    }
}
