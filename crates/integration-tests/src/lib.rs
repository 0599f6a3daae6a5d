//! Integration tests for Shopfront.
//!
//! Each test starts its own accounts API and storefront on ephemeral local
//! ports, both with in-memory stores and rate limiting off, and drives them
//! over real HTTP.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p shopfront-integration-tests
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! #[tokio::test]
//! async fn test_storefront_health() {
//!     let ctx = TestContext::start().await;
//!     let resp = ctx.client.get(ctx.storefront("/health")).send().await.unwrap();
//!     assert_eq!(resp.status(), 200);
//! }
//! ```

#![allow(clippy::missing_panics_doc, clippy::expect_used)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use axum::Router;
use reqwest::Client;
use reqwest::cookie::{CookieStore, Jar};
use tokio::net::TcpListener;
use tower_sessions::session::Id;
use tower_sessions::{MemoryStore, Session, SessionStore};

use shopfront_accounts::config::AccountsConfig;
use shopfront_accounts::store::MemoryAccountStore;
use shopfront_storefront::catalog::Catalog;
use shopfront_storefront::config::StorefrontConfig;
use shopfront_storefront::middleware::session::SESSION_COOKIE_NAME;
use shopfront_storefront::services::AccountsClient;

/// Password used by [`TestContext::register`].
pub const TEST_PASSWORD: &str = "secret123";

/// Two running servers and a cookie-keeping browser client.
pub struct TestContext {
    /// Client with a cookie store that follows redirects.
    pub client: Client,
    /// Storefront origin, e.g. `http://127.0.0.1:41234`.
    pub storefront_url: String,
    /// Accounts API origin.
    pub accounts_url: String,
    /// The accounts API's store, shared with the running server.
    pub accounts_store: MemoryAccountStore,
    jar: Arc<Jar>,
}

impl TestContext {
    /// Start the accounts API and a storefront pointed at it.
    pub async fn start() -> Self {
        Self::start_with_session_store(MemoryStore::default()).await
    }

    /// Start both servers with the storefront keeping sessions in `store`.
    pub async fn start_with_session_store<S: SessionStore + Clone>(store: S) -> Self {
        let accounts_store = MemoryAccountStore::new();
        let (accounts_listener, accounts_addr) = bind().await;
        let accounts_url = format!("http://{accounts_addr}");
        serve(accounts_listener, accounts_app(accounts_store.clone()));

        let (storefront_listener, storefront_addr) = bind().await;
        let storefront_url = format!("http://{storefront_addr}");
        serve(
            storefront_listener,
            storefront_app(&storefront_url, &accounts_url, store),
        );

        let jar = Arc::new(Jar::default());
        Self {
            client: jar_client(&jar),
            storefront_url,
            accounts_url,
            accounts_store,
            jar,
        }
    }

    /// The same servers seen from a second browser with no cookies.
    #[must_use]
    pub fn another_browser(&self) -> Self {
        let jar = Arc::new(Jar::default());
        Self {
            client: jar_client(&jar),
            storefront_url: self.storefront_url.clone(),
            accounts_url: self.accounts_url.clone(),
            accounts_store: self.accounts_store.clone(),
            jar,
        }
    }

    /// Open the client's storefront session directly in `store`.
    ///
    /// Changes only reach the server once the session is saved.
    pub fn storefront_session<S: SessionStore>(&self, store: S) -> Session {
        let url = reqwest::Url::parse(&self.storefront_url).expect("Invalid storefront URL");
        let header = self.jar.cookies(&url).expect("No storefront cookies");
        let prefix = format!("{SESSION_COOKIE_NAME}=");
        let id = header
            .to_str()
            .expect("Cookie header is not ASCII")
            .split("; ")
            .find_map(|cookie| cookie.strip_prefix(prefix.as_str()))
            .expect("No session cookie");
        let id = Id::from_str(id).expect("Invalid session id");
        Session::new(Some(id), Arc::new(store), None)
    }

    /// Absolute storefront URL for `path`.
    #[must_use]
    pub fn storefront(&self, path: &str) -> String {
        format!("{}{path}", self.storefront_url)
    }

    /// Absolute accounts API URL for `path`.
    #[must_use]
    pub fn accounts(&self, path: &str) -> String {
        format!("{}{path}", self.accounts_url)
    }

    /// GET a storefront page and return its status and body.
    pub async fn get_page(&self, path: &str) -> (reqwest::StatusCode, String) {
        let resp = self
            .client
            .get(self.storefront(path))
            .send()
            .await
            .expect("Failed to send request");
        let status = resp.status();
        (status, resp.text().await.expect("Failed to read response"))
    }

    /// POST a form to the storefront and return the final status and body.
    pub async fn post_form(&self, path: &str, form: &[(&str, &str)]) -> (reqwest::StatusCode, String) {
        let resp = self
            .client
            .post(self.storefront(path))
            .form(form)
            .send()
            .await
            .expect("Failed to send request");
        let status = resp.status();
        (status, resp.text().await.expect("Failed to read response"))
    }

    /// Register through the storefront form, which signs the client in.
    pub async fn register(&self, name: &str, email: &str) -> String {
        let (status, body) = self
            .post_form(
                "/auth/register",
                &[("name", name), ("email", email), ("password", TEST_PASSWORD)],
            )
            .await;
        assert!(status.is_success(), "register returned {status}");
        body
    }

    /// Sign in through the storefront form.
    pub async fn login(&self, email: &str, password: &str) -> (reqwest::StatusCode, String) {
        self.post_form("/auth/login", &[("email", email), ("password", password)])
            .await
    }

    /// Add one item of the first catalog product (size `m`, color `gray`).
    pub async fn add_to_cart(&self, quantity: &str) -> (reqwest::StatusCode, String) {
        self.post_form(
            "/cart/add",
            &[
                ("product_id", "1"),
                ("size", "m"),
                ("color", "gray"),
                ("quantity", quantity),
            ],
        )
        .await
    }
}

/// A fresh client with its own cookie jar.
#[must_use]
pub fn browser() -> Client {
    Client::builder()
        .cookie_store(true)
        .build()
        .expect("Failed to create HTTP client")
}

fn jar_client(jar: &Arc<Jar>) -> Client {
    Client::builder()
        .cookie_provider(Arc::clone(jar))
        .build()
        .expect("Failed to create HTTP client")
}

async fn bind() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to address");
    let addr = listener.local_addr().expect("Failed to read local address");
    (listener, addr)
}

fn serve(listener: TcpListener, router: Router) {
    tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .expect("Server error");
    });
}

fn lookup(vars: HashMap<&'static str, String>) -> impl Fn(&str) -> Option<String> {
    move |key| vars.get(key).cloned()
}

fn accounts_app(store: MemoryAccountStore) -> Router {
    let vars = HashMap::from([
        ("ACCOUNTS_RATE_LIMIT", "false".to_string()),
        ("ACCOUNTS_CATALOG_PATH", catalog_path().display().to_string()),
    ]);
    let config = AccountsConfig::from_lookup(lookup(vars)).expect("Invalid accounts config");
    let state = shopfront_accounts::state::AppState::new(config, Arc::new(store));
    shopfront_accounts::app(state)
}

fn catalog_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../storefront/content/products.json")
}

fn storefront_app<S: SessionStore + Clone>(
    storefront_url: &str,
    accounts_url: &str,
    store: S,
) -> Router {
    let vars = HashMap::from([
        ("STOREFRONT_BASE_URL", storefront_url.to_string()),
        ("ACCOUNTS_API_URL", accounts_url.to_string()),
        ("STOREFRONT_RATE_LIMIT", "false".to_string()),
        ("STOREFRONT_CATALOG_PATH", catalog_path().display().to_string()),
    ]);
    let config = StorefrontConfig::from_lookup(lookup(vars)).expect("Invalid storefront config");
    let catalog = Catalog::load(&config.catalog_path).expect("Failed to load catalog");
    let accounts = AccountsClient::new(&config.accounts_api_url).expect("Failed to build accounts client");
    let state = shopfront_storefront::state::AppState::new(config, catalog, accounts, None);
    shopfront_storefront::app(state, store)
}
