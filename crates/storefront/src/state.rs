//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::catalog::Catalog;
use crate::config::StorefrontConfig;
use crate::services::AccountsClient;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like the catalog, the accounts client and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    catalog: Catalog,
    accounts: AccountsClient,
    pool: Option<PgPool>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Storefront configuration
    /// * `catalog` - Loaded product catalog
    /// * `accounts` - Accounts API client
    /// * `pool` - Session store pool, when sessions are kept in `PostgreSQL`
    #[must_use]
    pub fn new(
        config: StorefrontConfig,
        catalog: Catalog,
        accounts: AccountsClient,
        pool: Option<PgPool>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                catalog,
                accounts,
                pool,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the product catalog.
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.inner.catalog
    }

    /// Get a reference to the accounts API client.
    #[must_use]
    pub fn accounts(&self) -> &AccountsClient {
        &self.inner.accounts
    }

    /// Get the session store pool, if sessions live in `PostgreSQL`.
    #[must_use]
    pub fn pool(&self) -> Option<&PgPool> {
        self.inner.pool.as_ref()
    }
}
