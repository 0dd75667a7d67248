use crate::executor::{FetchError, Fetched};
use chrono::{DateTime, Utc};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Point-in-time view of one cache entry, shaped like the `{data, isLoading,
/// error}` triple the consuming views read.
#[derive(Debug, Clone)]
pub struct QuerySnapshot<T> {
    pub data: Option<T>,
    pub is_loading: bool,
    pub is_stale: bool,
    pub degraded: bool,
    pub error: Option<Arc<FetchError>>,
    pub fetched_at: Option<DateTime<Utc>>,
}

impl<T> QuerySnapshot<T> {
    pub fn empty() -> Self {
        Self {
            data: None,
            is_loading: false,
            is_stale: false,
            degraded: false,
            error: None,
            fetched_at: None,
        }
    }
}

struct CacheEntry<T> {
    data: Option<T>,
    degraded: bool,
    error: Option<Arc<FetchError>>,
    fetched_at: Option<DateTime<Utc>>,
    marked_stale: bool,
    in_flight: bool,
    waiters: Vec<oneshot::Sender<QuerySnapshot<T>>>,
}

impl<T: Clone> CacheEntry<T> {
    fn empty() -> Self {
        Self {
            data: None,
            degraded: false,
            error: None,
            fetched_at: None,
            marked_stale: false,
            in_flight: false,
            waiters: Vec::new(),
        }
    }

    fn age(&self) -> Option<Duration> {
        self.fetched_at
            .and_then(|at| (Utc::now() - at).to_std().ok())
    }

    fn is_fresh(&self, stale_after: Duration) -> bool {
        self.data.is_some()
            && !self.marked_stale
            && self.age().is_some_and(|age| age < stale_after)
    }

    fn snapshot(&self, stale_after: Duration) -> QuerySnapshot<T> {
        let aged_out = self.age().is_none_or(|age| age >= stale_after);
        QuerySnapshot {
            data: self.data.clone(),
            is_loading: self.in_flight,
            is_stale: self.data.is_some() && (self.marked_stale || aged_out),
            degraded: self.degraded,
            error: self.error.clone(),
            fetched_at: self.fetched_at,
        }
    }

    /// A completed fetch is the only place entry state advances, always under
    /// the cache lock. A failure never discards previously cached data.
    fn apply(&mut self, result: Result<Fetched<T>, FetchError>) {
        self.in_flight = false;
        match result {
            Ok(fetched) => {
                self.data = Some(fetched.data);
                self.degraded = fetched.degraded;
                self.error = None;
                self.marked_stale = false;
                self.fetched_at = Some(Utc::now());
            }
            Err(e) => {
                if self.data.is_some() {
                    self.marked_stale = true;
                }
                self.error = Some(Arc::new(e));
            }
        }
    }
}

enum Plan<T> {
    Ready(QuerySnapshot<T>),
    Wait(oneshot::Receiver<QuerySnapshot<T>>),
    Load(oneshot::Receiver<QuerySnapshot<T>>),
}

/// In-memory result cache with per-key staleness tracking and coalescing of
/// concurrent fetches. Keys embed the DAO context and every query parameter,
/// so a context or parameter change reads a different entry instead of
/// refreshing the old one.
pub struct QueryCache<T> {
    name: &'static str,
    stale_after: Duration,
    entries: Arc<Mutex<HashMap<String, CacheEntry<T>>>>,
}

impl<T: Clone + Send + 'static> QueryCache<T> {
    pub fn new(name: &'static str, stale_after: Duration) -> Self {
        Self {
            name,
            stale_after,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Serve from cache while fresh, otherwise run `load` and record the
    /// outcome. Callers hitting a key with a fetch already in flight attach
    /// to that fetch instead of starting a duplicate one.
    pub async fn fetch<F, Fut>(&self, key: &str, load: F) -> QuerySnapshot<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Fetched<T>, FetchError>> + Send + 'static,
    {
        self.fetch_inner(key, load, false).await
    }

    /// Bypass the staleness window (periodic refresh, explicit user refresh).
    /// Still coalesces with any fetch already in flight.
    pub async fn refresh<F, Fut>(&self, key: &str, load: F) -> QuerySnapshot<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Fetched<T>, FetchError>> + Send + 'static,
    {
        self.fetch_inner(key, load, true).await
    }

    async fn fetch_inner<F, Fut>(&self, key: &str, load: F, force: bool) -> QuerySnapshot<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Fetched<T>, FetchError>> + Send + 'static,
    {
        let plan = {
            let mut entries = self.entries.lock().unwrap();
            let entry = entries
                .entry(key.to_string())
                .or_insert_with(CacheEntry::empty);

            if entry.in_flight {
                let (tx, rx) = oneshot::channel();
                entry.waiters.push(tx);
                Plan::Wait(rx)
            } else if !force && entry.is_fresh(self.stale_after) {
                Plan::Ready(entry.snapshot(self.stale_after))
            } else {
                entry.in_flight = true;
                let (tx, rx) = oneshot::channel();
                entry.waiters.push(tx);
                Plan::Load(rx)
            }
        };

        match plan {
            Plan::Ready(snapshot) => snapshot,
            Plan::Wait(rx) => {
                debug!(cache = self.name, key, "Attached to in-flight fetch");
                match rx.await {
                    Ok(snapshot) => snapshot,
                    Err(_) => self.snapshot(key),
                }
            }
            Plan::Load(rx) => {
                // The fetch runs in its own task so an abandoned caller (a
                // disconnected view) cannot strand the in-flight marker; the
                // late result is still recorded and waiters still drain.
                let entries = self.entries.clone();
                let stale_after = self.stale_after;
                let name = self.name;
                let key_owned = key.to_string();
                let future = load();
                tokio::spawn(async move {
                    let result = future.await;
                    if let Err(e) = &result {
                        warn!(cache = name, key = key_owned.as_str(), error = %e, "Fetch failed");
                    }
                    let mut entries = entries.lock().unwrap();
                    let entry = entries
                        .get_mut(&key_owned)
                        .expect("In-flight cache entry should exist");
                    entry.apply(result);
                    let snapshot = entry.snapshot(stale_after);
                    for waiter in entry.waiters.drain(..) {
                        let _ = waiter.send(snapshot.clone());
                    }
                });

                match rx.await {
                    Ok(snapshot) => snapshot,
                    Err(_) => self.snapshot(key),
                }
            }
        }
    }

    /// Current state without triggering a fetch.
    pub fn snapshot(&self, key: &str) -> QuerySnapshot<T> {
        let entries = self.entries.lock().unwrap();
        entries
            .get(key)
            .map(|entry| entry.snapshot(self.stale_after))
            .unwrap_or_else(QuerySnapshot::empty)
    }

    /// Force the next read of `key` to fetch, regardless of age.
    pub fn invalidate(&self, key: &str) {
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.get_mut(key) {
            entry.marked_stale = true;
        }
    }

    pub fn invalidate_all(&self) {
        let mut entries = self.entries.lock().unwrap();
        for entry in entries.values_mut() {
            entry.marked_stale = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn failure() -> FetchError {
        FetchError::Status {
            url: "https://indexer.example".to_string(),
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: String::new(),
        }
    }

    #[tokio::test]
    async fn concurrent_requests_coalesce_into_one_fetch() {
        let cache = Arc::new(QueryCache::<u64>::new("test", Duration::from_secs(30)));
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .fetch("nouns:block", move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(Fetched::live(18_500_000))
                    })
                    .await
            }));
        }

        for handle in handles {
            let snapshot = handle.await.unwrap();
            assert_eq!(snapshot.data, Some(18_500_000));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fresh_entries_are_served_without_a_fetch() {
        let cache = QueryCache::<u64>::new("test", Duration::from_secs(30));
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let calls = calls.clone();
            cache
                .fetch("key", move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(Fetched::live(7))
                })
                .await;
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_data_and_marks_it_stale() {
        let cache = QueryCache::<u64>::new("test", Duration::from_secs(30));

        let first = cache
            .fetch("key", || async { Ok(Fetched::live(100)) })
            .await;
        assert_eq!(first.data, Some(100));
        assert!(!first.is_stale);

        let second = cache
            .refresh("key", || async { Err(failure()) })
            .await;
        assert_eq!(second.data, Some(100));
        assert!(second.is_stale);
        assert!(second.error.is_some());
    }

    #[tokio::test]
    async fn successful_refresh_replaces_data_and_clears_errors() {
        let cache = QueryCache::<u64>::new("test", Duration::from_secs(30));

        cache
            .fetch("key", || async { Ok(Fetched::live(100)) })
            .await;
        cache.refresh("key", || async { Err(failure()) }).await;

        let third = cache
            .refresh("key", || async { Ok(Fetched::live(200)) })
            .await;
        assert_eq!(third.data, Some(200));
        assert!(!third.is_stale);
        assert!(third.error.is_none());
    }

    #[tokio::test]
    async fn terminal_failure_with_no_predecessor_is_an_error_state() {
        let cache = QueryCache::<u64>::new("test", Duration::from_secs(30));

        let snapshot = cache.fetch("key", || async { Err(failure()) }).await;
        assert!(snapshot.data.is_none());
        assert!(snapshot.error.is_some());
        assert!(!snapshot.is_stale);
    }

    #[tokio::test]
    async fn invalidation_forces_a_refetch() {
        let cache = QueryCache::<u64>::new("test", Duration::from_secs(3600));
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let calls = calls.clone();
            cache
                .fetch("key", move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(Fetched::live(1))
                })
                .await;
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        cache.invalidate("key");
        let calls_after = calls.clone();
        cache
            .fetch("key", move || async move {
                calls_after.fetch_add(1, Ordering::SeqCst);
                Ok(Fetched::live(2))
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn distinct_keys_fetch_independently() {
        let cache = Arc::new(QueryCache::<&'static str>::new("test", Duration::from_secs(30)));

        let nouns = cache.fetch("nouns:proposals:p1", || async {
            Ok(Fetched::live("nouns data"))
        });
        let lilnouns = cache.fetch("lilnouns:proposals:p1", || async {
            Ok(Fetched::live("lilnouns data"))
        });

        let (nouns, lilnouns) = tokio::join!(nouns, lilnouns);
        assert_eq!(nouns.data, Some("nouns data"));
        assert_eq!(lilnouns.data, Some("lilnouns data"));
    }

    #[tokio::test]
    async fn degraded_flag_survives_into_the_snapshot() {
        let cache = QueryCache::<u64>::new("test", Duration::from_secs(30));
        let snapshot = cache
            .fetch("key", || async {
                Ok(Fetched {
                    data: 5,
                    degraded: true,
                })
            })
            .await;
        assert!(snapshot.degraded);
        assert_eq!(snapshot.data, Some(5));
    }
}
