//! Time-boxed cache in front of the content store.
//!
//! Entries are served until they are older than the revalidation window,
//! after which the next read goes back to the store. Failures are never
//! cached.

use std::{
    hash::Hash,
    num::NonZeroUsize,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use async_trait::async_trait;
use lru::LruCache;
use metrics::counter;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::{
    application::content::{ContentError, ContentQuery},
    domain::{
        pagination::PageRequest,
        posts::{PostDetail, PostSummary},
    },
};

const SOURCE: &str = "infra::cache";

struct Entry<T> {
    value: T,
    stored_at: Instant,
}

struct Shelf<K: Hash + Eq, T> {
    entries: Mutex<LruCache<K, Entry<T>>>,
}

impl<K: Hash + Eq, T: Clone> Shelf<K, T> {
    fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn fresh(&self, key: &K, ttl: Duration, op: &'static str) -> Option<T> {
        let mut entries = mutex_lock(&self.entries, op);
        let entry = entries.get(key)?;
        if entry.stored_at.elapsed() < ttl {
            Some(entry.value.clone())
        } else {
            None
        }
    }

    fn store(&self, key: K, value: T, op: &'static str) {
        mutex_lock(&self.entries, op).put(
            key,
            Entry {
                value,
                stored_at: Instant::now(),
            },
        );
    }
}

fn mutex_lock<'a, T>(lock: &'a Mutex<T>, op: &'static str) -> MutexGuard<'a, T> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!(
                target = "travelora::cache",
                op,
                target_module = SOURCE,
                result = "poisoned_recovered",
                "Recovered from poisoned cache lock"
            );
            poisoned.into_inner()
        }
    }
}

/// [`ContentQuery`] decorator that reuses results for `ttl`.
pub struct RevalidatingContent {
    inner: Arc<dyn ContentQuery>,
    ttl: Duration,
    pages: Shelf<PageRequest, Vec<PostSummary>>,
    posts: Shelf<String, Option<PostDetail>>,
}

impl RevalidatingContent {
    pub fn new(inner: Arc<dyn ContentQuery>, ttl: Duration, capacity: NonZeroUsize) -> Self {
        Self {
            inner,
            ttl,
            pages: Shelf::new(capacity),
            posts: Shelf::new(capacity),
        }
    }
}

fn record_hit(kind: &'static str) {
    counter!("travelora_content_cache_hit_total", "kind" => kind).increment(1);
}

fn record_miss(kind: &'static str) {
    counter!("travelora_content_cache_miss_total", "kind" => kind).increment(1);
}

#[async_trait]
impl ContentQuery for RevalidatingContent {
    async fn fetch_page(&self, range: PageRequest) -> Result<Vec<PostSummary>, ContentError> {
        if let Some(page) = self.pages.fresh(&range, self.ttl, "fetch_page") {
            record_hit("page");
            debug!(target = "travelora::cache", range = %range, "page served from cache");
            return Ok(page);
        }

        record_miss("page");
        let page = self.inner.fetch_page(range).await?;
        self.pages.store(range, page.clone(), "fetch_page");
        Ok(page)
    }

    async fn fetch_post(&self, slug: &str) -> Result<Option<PostDetail>, ContentError> {
        let key = slug.to_string();
        if let Some(detail) = self.posts.fresh(&key, self.ttl, "fetch_post") {
            record_hit("post");
            debug!(target = "travelora::cache", slug, "post served from cache");
            return Ok(detail);
        }

        record_miss("post");
        let detail = self.inner.fetch_post(slug).await?;
        self.posts.store(key, detail.clone(), "fetch_post");
        Ok(detail)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use super::*;
    use crate::domain::pagination::PageSize;

    #[derive(Default)]
    struct CountingContent {
        page_calls: AtomicUsize,
        post_calls: AtomicUsize,
        fail: AtomicBool,
    }

    #[async_trait]
    impl ContentQuery for CountingContent {
        async fn fetch_page(&self, _range: PageRequest) -> Result<Vec<PostSummary>, ContentError> {
            self.page_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(ContentError::transport("offline"));
            }
            Ok(Vec::new())
        }

        async fn fetch_post(&self, _slug: &str) -> Result<Option<PostDetail>, ContentError> {
            self.post_calls.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }
    }

    fn cached(inner: Arc<CountingContent>) -> RevalidatingContent {
        let capacity = NonZeroUsize::MIN.saturating_add(7);
        RevalidatingContent::new(inner, Duration::from_secs(60), capacity)
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_entries_skip_the_store() {
        let inner = Arc::new(CountingContent::default());
        let cache = cached(inner.clone());
        let range = PageRequest::first(PageSize::default());

        cache.fetch_page(range).await.expect("first");
        cache.fetch_page(range).await.expect("second");
        cache.fetch_post("lisbon").await.expect("post");
        cache.fetch_post("lisbon").await.expect("post again");

        assert_eq!(inner.page_calls.load(Ordering::SeqCst), 1);
        assert_eq!(inner.post_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entries_are_refetched() {
        let inner = Arc::new(CountingContent::default());
        let cache = cached(inner.clone());
        let range = PageRequest::first(PageSize::default());

        cache.fetch_page(range).await.expect("first");
        tokio::time::advance(Duration::from_secs(61)).await;
        cache.fetch_page(range).await.expect("after expiry");

        assert_eq!(inner.page_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_are_not_cached() {
        let inner = Arc::new(CountingContent::default());
        inner.fail.store(true, Ordering::SeqCst);
        let cache = cached(inner.clone());
        let range = PageRequest::first(PageSize::default());

        assert!(cache.fetch_page(range).await.is_err());
        inner.fail.store(false, Ordering::SeqCst);
        assert!(cache.fetch_page(range).await.is_ok());

        assert_eq!(inner.page_calls.load(Ordering::SeqCst), 2);
    }
}
