//! One-shot toast notifications.
//!
//! Handlers queue a message before redirecting; the next rendered page takes
//! the queue out of the session and shows it.

use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::models::session_keys;

/// Toast severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashLevel {
    Success,
    Error,
    Info,
}

impl FlashLevel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Info => "info",
        }
    }
}

/// A queued toast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub level: FlashLevel,
    pub message: String,
}

impl Flash {
    /// CSS modifier class for the toast.
    #[must_use]
    pub fn class(&self) -> String {
        format!("toast toast--{}", self.level.as_str())
    }
}

/// Queue a toast for the next rendered page.
pub async fn push(session: &Session, level: FlashLevel, message: impl Into<String>) {
    let mut flashes: Vec<Flash> = session
        .get(session_keys::FLASHES)
        .await
        .ok()
        .flatten()
        .unwrap_or_default();
    flashes.push(Flash {
        level,
        message: message.into(),
    });

    if let Err(e) = session.insert(session_keys::FLASHES, flashes).await {
        tracing::warn!("Failed to queue flash message: {e}");
    }
}

pub async fn success(session: &Session, message: impl Into<String>) {
    push(session, FlashLevel::Success, message).await;
}

pub async fn error(session: &Session, message: impl Into<String>) {
    push(session, FlashLevel::Error, message).await;
}

pub async fn info(session: &Session, message: impl Into<String>) {
    push(session, FlashLevel::Info, message).await;
}

/// Take every queued toast, leaving the queue empty.
pub async fn take(session: &Session) -> Vec<Flash> {
    match session.remove::<Vec<Flash>>(session_keys::FLASHES).await {
        Ok(flashes) => flashes.unwrap_or_default(),
        Err(e) => {
            tracing::warn!("Failed to read flash messages: {e}");
            Vec::new()
        }
    }
}
