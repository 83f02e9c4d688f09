//! Application state shared across handlers.

use std::sync::Arc;

use crate::actions::ShopActions;
use crate::config::CartCacheConfig;
use crate::db::ShopStore;
use crate::services::CartCache;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to the
/// shop store and the cached cart operations built on it.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    store: Arc<dyn ShopStore>,
    actions: ShopActions,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `store` - Persistence gateway (`PostgreSQL` in production)
    /// * `cache` - Cart view cache settings
    #[must_use]
    pub fn new(store: Arc<dyn ShopStore>, cache: CartCacheConfig) -> Self {
        let views = CartCache::new(cache.capacity, cache.ttl);
        Self {
            inner: Arc::new(AppStateInner {
                actions: ShopActions::new(Arc::clone(&store), views),
                store,
            }),
        }
    }

    /// Get a reference to the shop store.
    #[must_use]
    pub fn store(&self) -> &dyn ShopStore {
        self.inner.store.as_ref()
    }

    /// Get a reference to the cart operations.
    #[must_use]
    pub fn actions(&self) -> &ShopActions {
        &self.inner.actions
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("actions", &self.inner.actions)
            .finish_non_exhaustive()
    }
}
