//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::AccountsConfig;
use crate::services::auth::{AuthService, UserCache, user_cache};
use crate::services::products::ProductCatalog;
use crate::store::AccountStore;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to the
/// account store, the user cache, the product catalog and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AccountsConfig,
    store: Arc<dyn AccountStore>,
    users: UserCache,
    products: ProductCatalog,
}

impl AppState {
    /// Create a new application state over any account store.
    #[must_use]
    pub fn new(config: AccountsConfig, store: Arc<dyn AccountStore>) -> Self {
        let products = ProductCatalog::new(config.catalog_path.clone());
        Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                users: user_cache(),
                products,
            }),
        }
    }

    /// Get a reference to the accounts configuration.
    #[must_use]
    pub fn config(&self) -> &AccountsConfig {
        &self.inner.config
    }

    /// Get a reference to the account store.
    #[must_use]
    pub fn store(&self) -> &dyn AccountStore {
        self.inner.store.as_ref()
    }

    /// The product catalog and its response cache.
    #[must_use]
    pub fn products(&self) -> &ProductCatalog {
        &self.inner.products
    }

    /// Authentication service over this state's store and cache.
    #[must_use]
    pub fn auth(&self) -> AuthService<'_> {
        AuthService::new(self.inner.store.as_ref(), &self.inner.users)
    }
}
