//! Authentication service.
//!
//! Registration, login, token refresh and logout over an [`AccountStore`].
//! Every successful register or login opens a new device session and issues
//! a fresh access/refresh pair for it.

mod error;

pub use error::AuthError;

use std::time::Duration;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::Utc;
use moka::future::Cache;

use shopfront_core::{AuthTokens, Email, RegisterForm, SessionUser, TokenKind, UserId};

use crate::store::{AccountStore, DeviceSession, NewSession, NewUser, StoreError, StoredToken, User};
use crate::tokens;

/// Users looked up while authenticating, keyed by id.
pub type UserCache = Cache<UserId, User>;

/// Build the user cache: up to 1000 accounts for five minutes.
#[must_use]
pub fn user_cache() -> UserCache {
    Cache::builder()
        .max_capacity(1000)
        .time_to_live(Duration::from_secs(300))
        .build()
}

/// A freshly issued token pair and the session it belongs to.
pub struct IssuedPair {
    pub access_token: String,
    pub refresh_token: String,
    pub user: User,
    pub session: DeviceSession,
}

impl IssuedPair {
    /// Response body for register, login and refresh.
    #[must_use]
    pub fn to_auth_tokens(&self) -> AuthTokens {
        AuthTokens {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
            user: self.user.to_public(),
        }
    }
}

/// The account, session and token behind a validated token.
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub user: User,
    pub session: DeviceSession,
    pub token: StoredToken,
}

impl Authenticated {
    /// Identity as reported by `GET /me`.
    #[must_use]
    pub fn session_user(&self) -> SessionUser {
        SessionUser {
            id: self.user.id,
            name: self.user.name.clone(),
            email: self.user.email.to_string(),
            session_id: self.session.id,
            token_type: self.token.kind,
            exp: self.token.expires_at.timestamp(),
            iat: self.token.issued_at.timestamp(),
        }
    }
}

/// Authentication service.
pub struct AuthService<'a> {
    store: &'a dyn AccountStore,
    users: &'a UserCache,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(store: &'a dyn AccountStore, users: &'a UserCache) -> Self {
        Self { store, users }
    }

    // =========================================================================
    // Password Authentication
    // =========================================================================

    /// Register a new account and sign it in on `device`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MissingRegistrationFields` if a field is empty.
    /// Returns `AuthError::Invalid` if a field fails validation.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    pub async fn register(
        &self,
        form: &RegisterForm,
        device: NewSession,
    ) -> Result<IssuedPair, AuthError> {
        if form.name.trim().is_empty() || form.email.trim().is_empty() || form.password.is_empty()
        {
            return Err(AuthError::MissingRegistrationFields);
        }
        form.validate().map_err(|errors| {
            AuthError::Invalid(errors.first_message().unwrap_or_default().to_string())
        })?;

        let email = Email::parse(&form.email).map_err(|e| AuthError::Invalid(e.to_string()))?;
        let password_hash = hash_password(&form.password)?;

        let (user, session) = self
            .store
            .create_user_with_session(
                NewUser {
                    name: form.name.trim().to_string(),
                    email,
                    password_hash,
                },
                device,
            )
            .await
            .map_err(|e| match e {
                StoreError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Store(other),
            })?;

        tracing::info!(user_id = %user.id, session_id = %session.id, "Account registered");
        self.issue_pair(user, session).await
    }

    /// Login with email and password, opening a new session on `device`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        device: NewSession,
    ) -> Result<IssuedPair, AuthError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AuthError::MissingLoginFields);
        }

        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;
        let user = self
            .store
            .find_user_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &user.password_hash)?;

        let session = self.store.create_session(user.id, device).await?;
        tracing::info!(user_id = %user.id, session_id = %session.id, "Signed in");
        self.issue_pair(user, session).await
    }

    // =========================================================================
    // Tokens
    // =========================================================================

    /// Resolve a token of `kind` to its account and session.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` if the token is unknown, revoked,
    /// expired or of another kind, and `AuthError::InvalidSession` if its
    /// session is inactive or expired.
    pub async fn authenticate(
        &self,
        token: &str,
        kind: TokenKind,
    ) -> Result<Authenticated, AuthError> {
        let now = Utc::now();

        let stored = self
            .store
            .find_token(&tokens::digest(token))
            .await?
            .filter(|t| t.is_usable_at(kind, now))
            .ok_or(AuthError::InvalidToken(kind))?;

        let session = self
            .store
            .find_session(stored.session_id)
            .await?
            .filter(|s| s.is_live_at(now))
            .ok_or(AuthError::InvalidSession)?;

        let user = self
            .user(stored.user_id)
            .await?
            .ok_or(AuthError::InvalidToken(kind))?;

        Ok(Authenticated {
            user,
            session,
            token: stored,
        })
    }

    /// Exchange a refresh token for a new pair, revoking the old one.
    ///
    /// # Errors
    ///
    /// Same as [`Self::authenticate`] for refresh tokens.
    pub async fn refresh(&self, refresh_token: &str) -> Result<IssuedPair, AuthError> {
        let auth = self.authenticate(refresh_token, TokenKind::Refresh).await?;

        // Only the caller that wins the revocation may mint a new pair.
        if !self.store.revoke_token(&auth.token.digest).await? {
            return Err(AuthError::InvalidToken(TokenKind::Refresh));
        }

        tracing::debug!(session_id = %auth.session.id, "Rotating token pair");
        self.issue_pair(auth.user, auth.session).await
    }

    /// End the session behind `auth`, revoking its access token and the
    /// refresh token if one was presented.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Store` if the store fails.
    pub async fn logout(
        &self,
        auth: &Authenticated,
        refresh_token: Option<&str>,
    ) -> Result<(), AuthError> {
        self.store.deactivate_session(auth.session.id).await?;
        self.store.revoke_token(&auth.token.digest).await?;

        if let Some(refresh_token) = refresh_token {
            let digest = tokens::digest(refresh_token);
            // Only revoke a refresh token that belongs to the same session.
            if let Some(stored) = self.store.find_token(&digest).await?
                && stored.session_id == auth.session.id
            {
                self.store.revoke_token(&digest).await?;
            }
        }

        tracing::info!(user_id = %auth.user.id, session_id = %auth.session.id, "Signed out");
        Ok(())
    }

    async fn issue_pair(&self, user: User, session: DeviceSession) -> Result<IssuedPair, AuthError> {
        let now = Utc::now();
        let access = tokens::issue(TokenKind::Access, &session, now);
        let refresh = tokens::issue(TokenKind::Refresh, &session, now);

        self.store
            .insert_tokens(&[access.record, refresh.record])
            .await?;
        self.users.insert(user.id, user.clone()).await;

        Ok(IssuedPair {
            access_token: access.token,
            refresh_token: refresh.token,
            user,
            session,
        })
    }

    async fn user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        if let Some(user) = self.users.get(&id).await {
            return Ok(Some(user));
        }

        let user = self.store.find_user(id).await?;
        if let Some(user) = &user {
            self.users.insert(id, user.clone()).await;
        }
        Ok(user)
    }
}

// =============================================================================
// Password Hashing
// =============================================================================

fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}
