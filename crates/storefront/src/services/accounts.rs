//! Accounts API client.
//!
//! Talks to the accounts service over JSON. Tokens are sent both as an
//! `Authorization: Bearer` header and as the cookies the API would have set
//! on a browser, so either transport the API prefers works.
//!
//! Requests are single-shot: no retry, no backoff.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, COOKIE, HeaderMap, HeaderValue, USER_AGENT};
use serde::{Deserialize, de::DeserializeOwned};
use thiserror::Error;
use url::Url;

use shopfront_core::{AuthTokens, LoginForm, RegisterForm, SessionUser};

use crate::middleware::Visitor;

/// Request timeout for accounts API calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors that can occur when talking to the accounts API.
#[derive(Debug, Error)]
pub enum AccountsError {
    /// The request never produced a usable response.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The API answered with an error status.
    #[error("accounts API rejected the request ({status}): {message}")]
    Rejected { status: StatusCode, message: String },

    /// A token could not be placed in a header.
    #[error("invalid token format")]
    InvalidToken,
}

impl AccountsError {
    /// The API's message, if this is a rejection.
    #[must_use]
    pub fn rejection_message(&self) -> Option<&str> {
        match self {
            Self::Rejected { message, .. } => Some(message),
            _ => None,
        }
    }

    /// Whether the API refused the credentials.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Rejected { status, .. } if *status == StatusCode::UNAUTHORIZED)
    }
}

/// Error body returned by the accounts API.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// Accounts API client.
#[derive(Debug, Clone)]
pub struct AccountsClient {
    client: reqwest::Client,
    base_url: String,
}

impl AccountsClient {
    /// Create a new accounts API client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(base_url: &Url) -> Result<Self, AccountsError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("Shopfront-Storefront/1.0"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    /// Create an account. The API logs the new user in and returns tokens.
    ///
    /// # Errors
    ///
    /// Returns `AccountsError::Rejected` with the API message on 4xx/5xx.
    pub async fn register(
        &self,
        form: &RegisterForm,
        visitor: &Visitor,
    ) -> Result<AuthTokens, AccountsError> {
        let response = self
            .client
            .post(self.url("register"))
            .headers(visitor_headers(visitor))
            .json(form)
            .send()
            .await?;
        read_json(response).await
    }

    /// Exchange credentials for a token pair.
    ///
    /// # Errors
    ///
    /// Returns `AccountsError::Rejected` with the API message on 4xx/5xx.
    pub async fn login(
        &self,
        form: &LoginForm,
        visitor: &Visitor,
    ) -> Result<AuthTokens, AccountsError> {
        let response = self
            .client
            .post(self.url("login"))
            .headers(visitor_headers(visitor))
            .json(form)
            .send()
            .await?;
        read_json(response).await
    }

    /// Resolve an access token to the user and session behind it.
    ///
    /// # Errors
    ///
    /// Returns `AccountsError::Rejected` if the token is not valid.
    pub async fn me(&self, access_token: &str) -> Result<SessionUser, AccountsError> {
        let response = self
            .client
            .get(self.url("me"))
            .headers(token_headers(access_token, &[("access_token", access_token)])?)
            .send()
            .await?;
        read_json(response).await
    }

    /// Rotate the token pair.
    ///
    /// # Errors
    ///
    /// Returns `AccountsError::Rejected` if the refresh token is not valid.
    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthTokens, AccountsError> {
        let response = self
            .client
            .post(self.url("refresh"))
            .headers(token_headers(
                refresh_token,
                &[("refresh_token", refresh_token)],
            )?)
            .send()
            .await?;
        read_json(response).await
    }

    /// End the session behind the token pair.
    ///
    /// # Errors
    ///
    /// Returns `AccountsError` if the API could not be reached or refused.
    pub async fn logout(&self, access_token: &str, refresh_token: &str) -> Result<(), AccountsError> {
        let response = self
            .client
            .post(self.url("logout"))
            .headers(token_headers(
                access_token,
                &[("access_token", access_token), ("refresh_token", refresh_token)],
            )?)
            .send()
            .await?;
        check_status(response).await.map(|_| ())
    }
}

/// Forward the shopper's address and user agent so the session the API
/// opens describes their device.
fn visitor_headers(visitor: &Visitor) -> HeaderMap {
    let mut headers = HeaderMap::new();

    if let Some(ip) = visitor.ip
        && let Ok(value) = HeaderValue::from_str(&ip.to_string())
    {
        headers.insert("x-forwarded-for", value);
    }
    if let Some(ua) = &visitor.user_agent
        && let Ok(value) = HeaderValue::from_str(ua)
    {
        headers.insert(USER_AGENT, value);
    }

    headers
}

/// Build `Authorization` and `Cookie` headers for a token request.
fn token_headers(bearer: &str, cookies: &[(&str, &str)]) -> Result<HeaderMap, AccountsError> {
    let mut headers = HeaderMap::new();

    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {bearer}"))
            .map_err(|_| AccountsError::InvalidToken)?,
    );

    let cookie = cookies
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("; ");
    headers.insert(
        COOKIE,
        HeaderValue::from_str(&cookie).map_err(|_| AccountsError::InvalidToken)?,
    );

    Ok(headers)
}

/// Turn a non-success status into `AccountsError::Rejected`.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, AccountsError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .ok()
        .map(|body| body.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Request failed").to_string());

    Err(AccountsError::Rejected { status, message })
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, AccountsError> {
    Ok(check_status(response).await?.json().await?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_without_double_slash() {
        let client = AccountsClient::new(&Url::parse("http://localhost:8080/").unwrap()).unwrap();
        assert_eq!(client.url("login"), "http://localhost:8080/login");

        let client =
            AccountsClient::new(&Url::parse("http://localhost:8080/api").unwrap()).unwrap();
        assert_eq!(client.url("me"), "http://localhost:8080/api/me");
    }

    #[test]
    fn test_token_headers() {
        let headers = token_headers("abc", &[("access_token", "abc"), ("refresh_token", "def")])
            .unwrap();
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer abc");
        assert_eq!(
            headers.get(COOKIE).unwrap(),
            "access_token=abc; refresh_token=def"
        );
    }

    #[test]
    fn test_token_headers_reject_control_chars() {
        assert!(matches!(
            token_headers("bad\ntoken", &[]),
            Err(AccountsError::InvalidToken)
        ));
    }

    #[test]
    fn test_visitor_headers() {
        let headers = visitor_headers(&Visitor {
            ip: Some("203.0.113.7".parse().unwrap()),
            user_agent: Some("Mozilla/5.0".to_string()),
        });
        assert_eq!(headers.get("x-forwarded-for").unwrap(), "203.0.113.7");
        assert_eq!(headers.get(USER_AGENT).unwrap(), "Mozilla/5.0");

        assert!(visitor_headers(&Visitor::default()).is_empty());
    }

    #[test]
    fn test_rejection_helpers() {
        let err = AccountsError::Rejected {
            status: StatusCode::UNAUTHORIZED,
            message: "Invalid email or password".to_string(),
        };
        assert!(err.is_unauthorized());
        assert_eq!(err.rejection_message(), Some("Invalid email or password"));
        assert!(!AccountsError::InvalidToken.is_unauthorized());
    }
}
