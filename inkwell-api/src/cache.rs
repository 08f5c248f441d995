//! Short-lived cache of the rendered home feed.
//!
//! The cache is not invalidated by writes. Within one TTL window every
//! request receives the body rendered by the first one, whatever its page
//! number or viewer.

use axum::body::Bytes;
use std::future::Future;
use tokio::{
    sync::RwLock,
    time::{Duration, Instant},
};
use tracing::debug;

pub const INDEX_PAGE_KEY: &str = "index_page";

#[derive(Clone, Debug)]
struct Entry {
    body: Bytes,
    stored_at: Instant,
}

#[derive(Debug)]
pub struct FeedCache {
    key: &'static str,
    ttl: Duration,
    slot: RwLock<Option<Entry>>,
}

impl FeedCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            key: INDEX_PAGE_KEY,
            ttl,
            slot: RwLock::new(None),
        }
    }

    /// The stored body, unless there is none or it expired.
    pub async fn get(&self) -> Option<Bytes> {
        let slot = self.slot.read().await;
        slot.as_ref()
            .filter(|entry| entry.stored_at.elapsed() < self.ttl)
            .map(|entry| entry.body.clone())
    }

    pub async fn store(&self, body: Bytes) {
        *self.slot.write().await = Some(Entry {
            body,
            stored_at: Instant::now(),
        });
    }

    pub async fn clear(&self) {
        *self.slot.write().await = None;
        debug!(key = self.key, "Cache cleared");
    }

    /// Returns the stored body or renders and stores a new one.
    ///
    /// Failed renders are passed through and leave the cache untouched.
    pub async fn get_or_render<F, Fut, E>(&self, render: F) -> Result<Bytes, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Bytes, E>>,
    {
        if let Some(body) = self.get().await {
            debug!(key = self.key, "Cache hit");
            return Ok(body);
        }

        debug!(key = self.key, "Cache miss");
        let body = render().await?;
        self.store(body.clone()).await;

        Ok(body)
    }
}
