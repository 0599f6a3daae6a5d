//! In-process account store for development and tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use shopfront_core::{Email, SessionId, UserId};

use super::{
    AccountStore, DeviceSession, NewSession, NewToken, NewUser, StoreError, StoredToken, User,
};

#[derive(Default)]
struct Tables {
    users: HashMap<UserId, User>,
    sessions: HashMap<SessionId, DeviceSession>,
    tokens: HashMap<String, StoredToken>,
    next_user_id: i32,
    next_session_id: i32,
}

impl Tables {
    fn open_session(&mut self, user_id: UserId, session: NewSession) -> DeviceSession {
        self.next_session_id += 1;
        let session = DeviceSession {
            id: SessionId::new(self.next_session_id),
            user_id,
            ip_address: session.ip_address,
            device: session.device,
            device_id: session.device_id,
            expires_at: session.expires_at,
            is_active: true,
            created_at: Utc::now(),
        };
        self.sessions.insert(session.id, session.clone());
        session
    }
}

/// Account store backed by hash maps behind a mutex.
///
/// Cloning shares the underlying tables.
#[derive(Clone, Default)]
pub struct MemoryAccountStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryAccountStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn find_user_by_email(&self, email: &Email) -> Result<Option<User>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.users.values().find(|u| &u.email == email).cloned())
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.tables.lock().await.users.get(&id).cloned())
    }

    async fn create_user_with_session(
        &self,
        user: NewUser,
        session: NewSession,
    ) -> Result<(User, DeviceSession), StoreError> {
        let mut tables = self.tables.lock().await;

        if tables.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict("email already exists".to_owned()));
        }

        tables.next_user_id += 1;
        let user = User {
            id: UserId::new(tables.next_user_id),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            created_at: Utc::now(),
        };
        tables.users.insert(user.id, user.clone());
        let session = tables.open_session(user.id, session);

        Ok((user, session))
    }

    async fn create_session(
        &self,
        user_id: UserId,
        session: NewSession,
    ) -> Result<DeviceSession, StoreError> {
        let mut tables = self.tables.lock().await;
        if !tables.users.contains_key(&user_id) {
            return Err(StoreError::NotFound);
        }
        Ok(tables.open_session(user_id, session))
    }

    async fn find_session(&self, id: SessionId) -> Result<Option<DeviceSession>, StoreError> {
        Ok(self.tables.lock().await.sessions.get(&id).cloned())
    }

    async fn deactivate_session(&self, id: SessionId) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        let session = tables.sessions.get_mut(&id).ok_or(StoreError::NotFound)?;
        session.is_active = false;
        Ok(())
    }

    async fn insert_tokens(&self, tokens: &[NewToken]) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        for token in tokens {
            tables.tokens.insert(
                token.digest.clone(),
                StoredToken {
                    digest: token.digest.clone(),
                    session_id: token.session_id,
                    user_id: token.user_id,
                    kind: token.kind,
                    issued_at: token.issued_at,
                    expires_at: token.expires_at,
                    revoked: false,
                },
            );
        }
        Ok(())
    }

    async fn find_token(&self, digest: &str) -> Result<Option<StoredToken>, StoreError> {
        Ok(self.tables.lock().await.tokens.get(digest).cloned())
    }

    async fn revoke_token(&self, digest: &str) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock().await;
        match tables.tokens.get_mut(digest) {
            Some(token) if !token.revoked => {
                token.revoked = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeDelta;
    use shopfront_core::TokenKind;

    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "John Doe".to_string(),
            email: Email::parse(email).unwrap(),
            password_hash: "hash".to_string(),
        }
    }

    fn new_session() -> NewSession {
        NewSession {
            ip_address: "127.0.0.1".to_string(),
            device: "Unknown Device".to_string(),
            device_id: "device".to_string(),
            expires_at: Utc::now() + TimeDelta::days(7),
        }
    }

    #[tokio::test]
    async fn test_create_user_with_session() {
        let store = MemoryAccountStore::new();
        let (user, session) = store
            .create_user_with_session(new_user("john@doe.com"), new_session())
            .await
            .unwrap();

        assert_eq!(session.user_id, user.id);
        assert!(session.is_active);
        assert_eq!(
            store
                .find_user_by_email(&Email::parse("JOHN@doe.com").unwrap())
                .await
                .unwrap(),
            Some(user.clone())
        );
        assert_eq!(store.find_user(user.id).await.unwrap(), Some(user));
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let store = MemoryAccountStore::new();
        store
            .create_user_with_session(new_user("john@doe.com"), new_session())
            .await
            .unwrap();

        let err = store
            .create_user_with_session(new_user("john@doe.com"), new_session())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_sessions_are_per_login() {
        let store = MemoryAccountStore::new();
        let (user, first) = store
            .create_user_with_session(new_user("john@doe.com"), new_session())
            .await
            .unwrap();
        let second = store.create_session(user.id, new_session()).await.unwrap();
        assert_ne!(first.id, second.id);

        store.deactivate_session(first.id).await.unwrap();
        assert!(!store.find_session(first.id).await.unwrap().unwrap().is_active);
        assert!(store.find_session(second.id).await.unwrap().unwrap().is_active);

        assert!(matches!(
            store.create_session(UserId::new(99), new_session()).await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_revoke_token() {
        let store = MemoryAccountStore::new();
        let now = Utc::now();
        store
            .insert_tokens(&[NewToken {
                digest: "abc".to_string(),
                session_id: SessionId::new(1),
                user_id: UserId::new(1),
                kind: TokenKind::Refresh,
                issued_at: now,
                expires_at: now + TimeDelta::days(7),
            }])
            .await
            .unwrap();

        assert!(!store.find_token("abc").await.unwrap().unwrap().revoked);
        assert!(store.revoke_token("abc").await.unwrap());
        assert!(!store.revoke_token("abc").await.unwrap());
        assert!(!store.revoke_token("unknown").await.unwrap());
        assert!(store.find_token("abc").await.unwrap().unwrap().revoked);
    }
}
