//! Client-side query cache.
//!
//! Entries are indexed by [`QueryKey`]. Reads return cached data when it is
//! fresh, hand back stale data while a background refresh runs, and attach to
//! an in-flight request instead of issuing a duplicate. Mutations invalidate
//! keys by prefix once they succeed; observed entries refetch right away,
//! unobserved ones on their next read.
//!
//! Entries nobody observes are evicted once they have sat idle for the
//! client's gc window. The sweep runs whenever the map is locked for a read,
//! an observer registration or an invalidation.
//!
//! Every fetch runs as its own tokio task and settles into the map under the
//! map's lock, which is never held across a network call. Completion order
//! decides the stored value for a key; results of a fetch issued before an
//! invalidation are kept but stay marked stale.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use futures_util::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::{watch, Mutex};
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use crate::error::{ApiError, ApiResult};

mod key;
mod mutation;
mod observer;

pub use key::{keys, QueryKey};
pub use mutation::{Mutation, MutationStatus};
pub use observer::{QueryObserver, QueryState};

pub type SharedError = Arc<ApiError>;
pub type QueryResult<T> = Result<Arc<T>, SharedError>;

type AnyValue = Arc<dyn Any + Send + Sync>;
type FetchOutcome = Result<AnyValue, SharedError>;
type SharedFetch = Shared<BoxFuture<'static, FetchOutcome>>;
type Fetcher = Arc<dyn Fn() -> BoxFuture<'static, FetchOutcome> + Send + Sync>;

struct InFlight {
    id: u64,
    future: SharedFetch,
    abort: AbortHandle,
}

struct Entry {
    data: Option<AnyValue>,
    error: Option<SharedError>,
    updated_at: Option<Instant>,
    invalidated: bool,
    generation: u64,
    in_flight: Option<InFlight>,
    fetcher: Option<Fetcher>,
    notify: watch::Sender<u64>,
    idle_since: Instant,
}

impl Entry {
    fn new() -> Self {
        let (notify, _) = watch::channel(0);
        Self {
            data: None,
            error: None,
            updated_at: None,
            invalidated: false,
            generation: 0,
            in_flight: None,
            fetcher: None,
            notify,
            idle_since: Instant::now(),
        }
    }

    fn is_fresh(&self, stale_time: Duration) -> bool {
        !self.invalidated
            && self
                .updated_at
                .is_some_and(|updated| updated.elapsed() < stale_time)
    }

    fn is_observed(&self) -> bool {
        self.notify.receiver_count() > 0
    }

    fn bump(&self) {
        self.notify.send_modify(|version| *version += 1);
    }

    fn touch(&mut self) {
        self.idle_since = Instant::now();
    }

    /// Observed or in-flight entries count as in use and restart their
    /// idle clock.
    fn is_collectable(&mut self, gc_time: Duration) -> bool {
        if self.is_observed() || self.in_flight.is_some() {
            self.touch();
            return false;
        }
        self.idle_since.elapsed() >= gc_time
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ReadMode {
    StaleWhileRevalidate,
    Fresh,
}

struct Inner {
    entries: Mutex<HashMap<QueryKey, Entry>>,
    stale_time: Duration,
    gc_time: Duration,
    next_fetch_id: AtomicU64,
}

impl Inner {
    fn sweep(&self, entries: &mut HashMap<QueryKey, Entry>) {
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_collectable(self.gc_time));
        let evicted = before - entries.len();
        if evicted > 0 {
            debug!(evicted, remaining = entries.len(), "evicted idle queries");
        }
    }

    fn start_fetch(
        self: &Arc<Self>,
        key: &QueryKey,
        entry: &mut Entry,
        fetcher: Fetcher,
        origin: Option<Weak<()>>,
    ) -> SharedFetch {
        let id = self.next_fetch_id.fetch_add(1, Ordering::Relaxed);
        let generation = entry.generation;
        let inner = Arc::clone(self);
        let settle_key = key.clone();
        debug!(key = %key, fetch_id = id, "starting fetch");

        let handle = tokio::spawn(async move {
            let outcome = fetcher().await;
            inner
                .settle(&settle_key, id, generation, &outcome, origin)
                .await;
            outcome
        });
        let abort = handle.abort_handle();
        let future = async move {
            match handle.await {
                Ok(outcome) => outcome,
                Err(_) => Err(Arc::new(ApiError::Aborted)),
            }
        }
        .boxed()
        .shared();

        entry.in_flight = Some(InFlight {
            id,
            future: future.clone(),
            abort,
        });
        entry.bump();
        future
    }

    async fn settle(
        &self,
        key: &QueryKey,
        id: u64,
        generation: u64,
        outcome: &FetchOutcome,
        origin: Option<Weak<()>>,
    ) {
        let mut entries = self.entries.lock().await;
        let Some(entry) = entries.get_mut(key) else {
            debug!(key = %key, fetch_id = id, "entry removed before fetch settled");
            return;
        };
        if entry.in_flight.as_ref().is_some_and(|f| f.id == id) {
            entry.in_flight = None;
        }

        let initiator_gone = origin.is_some_and(|origin| origin.strong_count() == 0);
        if initiator_gone && !entry.is_observed() {
            debug!(key = %key, fetch_id = id, "observer detached; result discarded");
            return;
        }

        entry.touch();
        match outcome {
            Ok(value) => {
                entry.data = Some(Arc::clone(value));
                entry.error = None;
                entry.updated_at = Some(Instant::now());
                entry.invalidated = generation != entry.generation;
            }
            Err(err) => {
                warn!(key = %key, fetch_id = id, error = %err, "query failed");
                entry.error = Some(Arc::clone(err));
            }
        }
        entry.bump();
    }
}

/// The store every view reads through. Constructed once per application and
/// cloned by handle; [`QueryClient::clear`] tears it down.
#[derive(Clone)]
pub struct QueryClient {
    inner: Arc<Inner>,
}

impl QueryClient {
    pub fn new(stale_time: Duration, gc_time: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: Mutex::new(HashMap::new()),
                stale_time,
                gc_time,
                next_fetch_id: AtomicU64::new(0),
            }),
        }
    }

    /// Stale-while-revalidate read: cached data comes back immediately
    /// (starting a background refresh when stale); without data the caller
    /// waits on the shared request for the key.
    pub async fn query<T, F, Fut>(&self, key: QueryKey, fetcher: F) -> QueryResult<T>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ApiResult<T>> + Send + 'static,
    {
        let value = self
            .resolve(&key, erase(fetcher), None, ReadMode::StaleWhileRevalidate)
            .await?;
        downcast(&key, value)
    }

    /// Waits for data that reflects a fetch made after the last
    /// invalidation. Concurrent callers still share one request.
    pub async fn fetch_query<T, F, Fut>(&self, key: QueryKey, fetcher: F) -> QueryResult<T>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ApiResult<T>> + Send + 'static,
    {
        let value = self
            .resolve(&key, erase(fetcher), None, ReadMode::Fresh)
            .await?;
        downcast(&key, value)
    }

    /// Registers an observer for `key`. The fetcher is remembered so that
    /// invalidation can refetch while the observer is alive.
    pub async fn observe<T, F, Fut>(&self, key: QueryKey, fetcher: F) -> QueryObserver<T>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ApiResult<T>> + Send + 'static,
    {
        let fetcher = erase(fetcher);
        let receiver = self.subscribe(&key, Arc::clone(&fetcher)).await;
        QueryObserver::new(self.clone(), key, fetcher, receiver)
    }

    /// Subscribes to the entry for `key`, creating it if needed. Observers
    /// call this again when the entry they watched has been removed.
    async fn subscribe(&self, key: &QueryKey, fetcher: Fetcher) -> watch::Receiver<u64> {
        let mut entries = self.inner.entries.lock().await;
        self.inner.sweep(&mut entries);
        let entry = entries.entry(key.clone()).or_insert_with(Entry::new);
        entry.fetcher = Some(fetcher);
        entry.notify.subscribe()
    }

    /// Runs a one-shot mutation. On success every key in `invalidates` is
    /// invalidated; on failure the cache is left untouched.
    pub async fn mutate<T, Fut>(&self, mutation: Fut, invalidates: &[QueryKey]) -> ApiResult<T>
    where
        Fut: Future<Output = ApiResult<T>>,
    {
        match mutation.await {
            Ok(value) => {
                for key in invalidates {
                    self.invalidate(key).await;
                }
                Ok(value)
            }
            Err(err) => {
                warn!(error = %err, "mutation failed; cache left untouched");
                Err(err)
            }
        }
    }

    /// Marks every entry under `prefix` stale. Observed entries refetch now;
    /// the others drop any pre-invalidation request so their next read
    /// issues a new one. Returns the number of entries touched.
    pub async fn invalidate(&self, prefix: &QueryKey) -> usize {
        let mut entries = self.inner.entries.lock().await;
        self.inner.sweep(&mut entries);
        let mut touched = 0;
        for (key, entry) in entries.iter_mut() {
            if !key.starts_with(prefix) {
                continue;
            }
            touched += 1;
            entry.invalidated = true;
            entry.generation += 1;

            let refetch = entry.fetcher.clone().filter(|_| entry.is_observed());
            match refetch {
                Some(fetcher) => {
                    self.inner.start_fetch(key, entry, fetcher, None);
                }
                None => {
                    entry.in_flight = None;
                    entry.bump();
                }
            }
        }
        info!(prefix = %prefix, touched, "invalidated queries");
        touched
    }

    pub async fn get_query_data<T: Send + Sync + 'static>(&self, key: &QueryKey) -> Option<Arc<T>> {
        let entries = self.inner.entries.lock().await;
        let value = entries.get(key)?.data.clone()?;
        value.downcast::<T>().ok()
    }

    pub async fn set_query_data<T: Send + Sync + 'static>(&self, key: QueryKey, value: T) {
        let mut entries = self.inner.entries.lock().await;
        let entry = entries.entry(key).or_insert_with(Entry::new);
        entry.data = Some(Arc::new(value));
        entry.error = None;
        entry.updated_at = Some(Instant::now());
        entry.invalidated = false;
        entry.touch();
        entry.bump();
    }

    pub async fn is_fetching(&self, key: &QueryKey) -> bool {
        let entries = self.inner.entries.lock().await;
        entries
            .get(key)
            .is_some_and(|entry| entry.in_flight.is_some())
    }

    /// Drops every entry under `prefix`, aborting their requests.
    pub async fn remove_queries(&self, prefix: &QueryKey) {
        let mut entries = self.inner.entries.lock().await;
        entries.retain(|key, entry| {
            let keep = !key.starts_with(prefix);
            if !keep {
                if let Some(in_flight) = entry.in_flight.take() {
                    in_flight.abort.abort();
                }
            }
            keep
        });
    }

    /// Teardown: aborts every request and forgets all entries.
    pub async fn clear(&self) {
        let mut entries = self.inner.entries.lock().await;
        for entry in entries.values_mut() {
            if let Some(in_flight) = entry.in_flight.take() {
                in_flight.abort.abort();
            }
        }
        let count = entries.len();
        entries.clear();
        debug!(count, "query cache cleared");
    }

    pub(crate) async fn snapshot<T: Send + Sync + 'static>(&self, key: &QueryKey) -> QueryState<T> {
        let entries = self.inner.entries.lock().await;
        let Some(entry) = entries.get(key) else {
            return QueryState::idle();
        };
        let data = entry.data.clone().and_then(|value| value.downcast::<T>().ok());
        let error = match (&entry.data, &data) {
            (Some(_), None) => Some(Arc::new(ApiError::KeyTypeMismatch {
                key: key.to_string(),
            })),
            _ => entry.error.clone(),
        };
        QueryState {
            data,
            error,
            is_fetching: entry.in_flight.is_some(),
            is_stale: !entry.is_fresh(self.inner.stale_time),
            updated_at: entry.updated_at,
        }
    }

    async fn resolve(
        &self,
        key: &QueryKey,
        fetcher: Fetcher,
        origin: Option<Weak<()>>,
        mode: ReadMode,
    ) -> FetchOutcome {
        let pending = {
            let mut entries = self.inner.entries.lock().await;
            self.inner.sweep(&mut entries);
            let entry = entries.entry(key.clone()).or_insert_with(Entry::new);
            entry.fetcher = Some(Arc::clone(&fetcher));
            entry.touch();

            let cached = entry.data.clone();
            let in_flight = entry.in_flight.as_ref().map(|f| f.future.clone());

            if let Some(data) = cached {
                if entry.is_fresh(self.inner.stale_time) {
                    debug!(key = %key, "cache hit");
                    return Ok(data);
                }
                if mode == ReadMode::StaleWhileRevalidate {
                    if in_flight.is_none() {
                        self.inner.start_fetch(key, entry, fetcher, origin);
                    }
                    debug!(key = %key, "serving stale data while revalidating");
                    return Ok(data);
                }
            }

            match in_flight {
                Some(future) => {
                    debug!(key = %key, "attaching to in-flight request");
                    future
                }
                None => self.inner.start_fetch(key, entry, fetcher, origin),
            }
        };
        pending.await
    }
}

fn erase<T, F, Fut>(fetcher: F) -> Fetcher
where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ApiResult<T>> + Send + 'static,
{
    Arc::new(move || {
        let request = fetcher();
        async move {
            request
                .await
                .map(|value| Arc::new(value) as AnyValue)
                .map_err(Arc::new)
        }
        .boxed()
    })
}

fn downcast<T: Send + Sync + 'static>(key: &QueryKey, value: AnyValue) -> QueryResult<T> {
    value.downcast::<T>().map_err(|_| {
        Arc::new(ApiError::KeyTypeMismatch {
            key: key.to_string(),
        })
    })
}
