//! Cached cart views.
//!
//! Resolved carts are cached per user for a short TTL. Writers never update
//! cached entries; they invalidate through [`CartViewInvalidator`] after their
//! unit of work has committed, and the next read reloads from the store.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use tokio::sync::Mutex;
use tracing::debug;

use partshop_core::UserId;

use crate::models::CartWithItems;

/// Invalidation hook called after successful cart mutations.
#[async_trait]
pub trait CartViewInvalidator: Send + Sync {
    /// Drop the cached view of one user's cart.
    async fn invalidate_user(&self, user_id: &UserId);

    /// Drop every cached cart view.
    async fn invalidate_all(&self);
}

/// Invalidator for callers that keep no cache.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopInvalidator;

#[async_trait]
impl CartViewInvalidator for NoopInvalidator {
    async fn invalidate_user(&self, _user_id: &UserId) {}

    async fn invalidate_all(&self) {}
}

/// Per-user cache of resolved carts. `None` caches "user has no cart".
#[derive(Clone)]
pub struct CartCache {
    views: Cache<UserId, Option<CartWithItems>>,
    /// Bumped on every invalidation. A load that started before a bump does
    /// not store its result. Held while checking and storing, and while
    /// bumping and invalidating, so the two never interleave.
    generation: Arc<Mutex<u64>>,
}

impl CartCache {
    /// Create a cache holding at most `capacity` views for `ttl` each.
    #[must_use]
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        Self {
            views: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
            generation: Arc::new(Mutex::new(0)),
        }
    }

    /// Return the cached view for `user_id`, or run `load` and cache its result.
    ///
    /// # Errors
    ///
    /// Returns whatever `load` returns; failures are not cached.
    pub async fn get_or_load<F, E>(
        &self,
        user_id: &UserId,
        load: F,
    ) -> Result<Option<CartWithItems>, E>
    where
        F: Future<Output = Result<Option<CartWithItems>, E>>,
    {
        if let Some(view) = self.views.get(user_id).await {
            debug!(user_id = %user_id, "Cart view cache hit");
            return Ok(view);
        }

        let started = *self.generation.lock().await;
        let view = load.await?;

        let current = self.generation.lock().await;
        if *current == started {
            self.views.insert(user_id.clone(), view.clone()).await;
        }
        Ok(view)
    }
}

impl std::fmt::Debug for CartCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartCache")
            .field("entries", &self.views.entry_count())
            .field("generation", &self.generation.try_lock().map(|g| *g).ok())
            .finish()
    }
}

#[async_trait]
impl CartViewInvalidator for CartCache {
    async fn invalidate_user(&self, user_id: &UserId) {
        let mut generation = self.generation.lock().await;
        *generation += 1;
        self.views.invalidate(user_id).await;
    }

    async fn invalidate_all(&self) {
        let mut generation = self.generation.lock().await;
        *generation += 1;
        self.views.invalidate_all();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn cache() -> CartCache {
        CartCache::new(100, Duration::from_secs(60))
    }

    fn uid(s: &str) -> UserId {
        UserId::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_second_read_is_served_from_cache() {
        let cache = cache();
        let loads = AtomicUsize::new(0);
        let user = uid("u1");

        for _ in 0..2 {
            let view = cache
                .get_or_load(&user, async {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, Infallible>(None)
                })
                .await
                .unwrap();
            assert!(view.is_none());
        }

        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidation_forces_reload() {
        let cache = cache();
        let counter = AtomicUsize::new(0);
        let loads = &counter;
        let user = uid("u1");
        let load = move || async move {
            loads.fetch_add(1, Ordering::SeqCst);
            Ok::<_, Infallible>(None)
        };

        cache.get_or_load(&user, load()).await.unwrap();
        cache.invalidate_user(&user).await;
        cache.get_or_load(&user, load()).await.unwrap();
        cache.invalidate_all().await;
        cache.get_or_load(&user, load()).await.unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_load_racing_an_invalidation_is_not_stored() {
        let cache = cache();
        let user = uid("u1");

        cache
            .get_or_load(&user, async {
                cache.invalidate_all().await;
                Ok::<_, Infallible>(None)
            })
            .await
            .unwrap();

        assert!(cache.views.get(&user).await.is_none());
    }

    #[tokio::test]
    async fn test_invalidation_waits_for_an_in_flight_store() {
        let cache = cache();
        let user = uid("u1");

        // A load holds the generation while it stores its view.
        let storing = cache.generation.lock().await;
        let invalidation = tokio::spawn({
            let cache = cache.clone();
            let user = user.clone();
            async move { cache.invalidate_user(&user).await }
        });
        tokio::task::yield_now().await;
        cache.views.insert(user.clone(), None).await;
        drop(storing);

        invalidation.await.unwrap();
        assert!(cache.views.get(&user).await.is_none());
        assert_eq!(*cache.generation.lock().await, 1);
    }

    #[tokio::test]
    async fn test_failed_load_is_not_cached() {
        let cache = cache();
        let user = uid("u1");

        let result = cache.get_or_load(&user, async { Err::<_, &str>("boom") }).await;
        assert!(result.is_err());
        assert!(cache.views.get(&user).await.is_none());
    }
}
