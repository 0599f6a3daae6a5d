//! Token cookies.
//!
//! `access_token` lives for 15 minutes and `refresh_token` for 7 days. Both
//! are `HttpOnly`, `SameSite=Lax` and scoped to `/`.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::Duration;

use crate::tokens::{ACCESS_TOKEN_TTL_SECS, REFRESH_TOKEN_TTL_SECS};

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";

fn build(name: &'static str, value: String, max_age: Duration, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(max_age)
        .build()
}

/// Add both token cookies to `jar`.
#[must_use]
pub fn set_tokens(jar: CookieJar, access: &str, refresh: &str, secure: bool) -> CookieJar {
    jar.add(build(
        ACCESS_TOKEN_COOKIE,
        access.to_string(),
        Duration::seconds(ACCESS_TOKEN_TTL_SECS),
        secure,
    ))
    .add(build(
        REFRESH_TOKEN_COOKIE,
        refresh.to_string(),
        Duration::seconds(REFRESH_TOKEN_TTL_SECS),
        secure,
    ))
}

/// Expire both token cookies.
#[must_use]
pub fn clear_tokens(jar: CookieJar, secure: bool) -> CookieJar {
    jar.add(build(ACCESS_TOKEN_COOKIE, String::new(), Duration::ZERO, secure))
        .add(build(REFRESH_TOKEN_COOKIE, String::new(), Duration::ZERO, secure))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::header::SET_COOKIE;
    use axum::response::IntoResponse;

    use super::*;

    fn set_cookie_headers(jar: CookieJar) -> Vec<String> {
        let response = (jar, ()).into_response();
        response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_set_tokens() {
        let headers = set_cookie_headers(set_tokens(CookieJar::new(), "aaa", "rrr", false));
        assert_eq!(headers.len(), 2);

        let access = headers
            .iter()
            .find(|h| h.starts_with("access_token=aaa"))
            .unwrap();
        assert!(access.contains("HttpOnly"));
        assert!(access.contains("SameSite=Lax"));
        assert!(access.contains("Path=/"));
        assert!(access.contains("Max-Age=900"));
        assert!(!access.contains("Secure"));

        let refresh = headers
            .iter()
            .find(|h| h.starts_with("refresh_token=rrr"))
            .unwrap();
        assert!(refresh.contains("Max-Age=604800"));
    }

    #[test]
    fn test_clear_tokens() {
        let headers = set_cookie_headers(clear_tokens(CookieJar::new(), true));
        assert_eq!(headers.len(), 2);
        assert!(headers.iter().all(|h| h.contains("Max-Age=0")));
        assert!(headers.iter().all(|h| h.contains("Secure")));
    }
}
