use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Fragment name of the rendered global feed.
pub const INDEX_FRAGMENT: &str = "index_page";

pub const DEFAULT_TTL: Duration = Duration::from_secs(20);

/// Identity of one cached fragment: which fragment, which page of it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FragmentKey {
    pub fragment: &'static str,
    pub page_number: u64,
    pub page_size: u64,
}

impl FragmentKey {
    pub fn new(fragment: &'static str, page_number: u64, page_size: u64) -> Self {
        Self { fragment, page_number, page_size }
    }
}

struct Entry {
    html: Arc<str>,
    stored_at: Instant,
}

/// Time-bounded memo of rendered HTML fragments.
///
/// Nothing invalidates entries on writes: a post created or edited after a
/// fragment was stored shows up once the entry expires or the cache is
/// cleared. A TTL of zero disables caching.
#[derive(Clone)]
pub struct FragmentCache {
    store: Arc<DashMap<FragmentKey, Entry>>,
    ttl: Duration,
}

impl FragmentCache {
    pub fn new(ttl: Duration) -> Self {
        Self { store: Arc::new(DashMap::new()), ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, key: &FragmentKey) -> Option<Arc<str>> {
        if self.ttl.is_zero() {
            return None;
        }
        let fresh = match self.store.get(key) {
            Some(e) if e.stored_at.elapsed() < self.ttl => Some(e.html.clone()),
            Some(_) => None,
            None => return None,
        };
        if fresh.is_none() {
            // expired; drop it so the map does not grow with dead pages
            self.store.remove_if(key, |_, e| e.stored_at.elapsed() >= self.ttl);
        }
        fresh
    }

    pub fn insert(&self, key: FragmentKey, html: impl Into<Arc<str>>) {
        if self.ttl.is_zero() {
            return;
        }
        self.store.insert(key, Entry { html: html.into(), stored_at: Instant::now() });
    }

    /// Returns the cached fragment or renders, stores and returns a fresh one.
    /// A render error is passed through and nothing is stored.
    ///
    /// No lock is held while `render` runs, so two concurrent misses may both
    /// render; the later insert wins.
    pub async fn get_or_render<E, F, Fut>(&self, key: FragmentKey, render: F) -> Result<Arc<str>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, E>>,
    {
        if let Some(html) = self.get(&key) {
            metrics::increment_counter!("fragment_cache_hits_total", "fragment" => key.fragment);
            return Ok(html);
        }
        metrics::increment_counter!("fragment_cache_misses_total", "fragment" => key.fragment);
        let html: Arc<str> = render().await?.into();
        self.insert(key, html.clone());
        Ok(html)
    }

    pub fn invalidate(&self, key: &FragmentKey) {
        self.store.remove(key);
    }

    pub fn clear(&self) {
        self.store.clear();
    }

    /// Drops every expired entry; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.store.len();
        let ttl = self.ttl;
        self.store.retain(|_, e| e.stored_at.elapsed() < ttl);
        let removed = before.saturating_sub(self.store.len());
        if removed > 0 {
            tracing::debug!(removed, "purged expired fragments");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

impl Default for FragmentCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}
