//! Server-side sessions.
//!
//! A session id travels in a cookie; everything else (user id, username, role)
//! stays in [`SessionStore`]. Handlers receive a [`SessionContext`] extracted per
//! request instead of reading shared state.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap, HeaderValue},
};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

pub use crate::domain::aggregates::Role;
use crate::domain::aggregates::User;
use crate::http::AppState;
use crate::StorefrontError;

/// The authenticated caller of one request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SessionContext {
    #[serde(skip)]
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub username: String,
    pub role: Role,
}

impl SessionContext {
    pub fn require_admin(&self) -> crate::Result<()> {
        if self.role != Role::Admin {
            tracing::warn!(user_id = %self.user_id, role = %self.role, "admin route denied");
            return Err(StorefrontError::Forbidden);
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
struct SessionRecord {
    context: SessionContext,
    expires_at: Instant,
}

/// Session map with sliding TTL expiry.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<Uuid, SessionRecord>>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self { sessions: Arc::default(), ttl }
    }

    pub fn ttl(&self) -> Duration { self.ttl }

    pub fn create(&self, user: &User) -> SessionContext {
        let context = SessionContext {
            session_id: Uuid::new_v4(),
            user_id: user.id,
            username: user.username.clone(),
            role: user.role,
        };
        let record = SessionRecord { context: context.clone(), expires_at: Instant::now() + self.ttl };
        self.sessions.lock().insert(context.session_id, record);
        context
    }

    /// Expired sessions are evicted on read; live ones get their expiry pushed out.
    pub fn get(&self, session_id: Uuid) -> Option<SessionContext> {
        let mut sessions = self.sessions.lock();
        let now = Instant::now();
        match sessions.get_mut(&session_id) {
            Some(record) if record.expires_at > now => {
                record.expires_at = now + self.ttl;
                Some(record.context.clone())
            }
            Some(_) => {
                sessions.remove(&session_id);
                None
            }
            None => None,
        }
    }

    pub fn remove(&self, session_id: Uuid) -> bool {
        self.sessions.lock().remove(&session_id).is_some()
    }

    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut sessions = self.sessions.lock();
        let before = sessions.len();
        sessions.retain(|_, record| record.expires_at > now);
        before - sessions.len()
    }

    pub fn len(&self) -> usize { self.sessions.lock().len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    pub fn spawn_sweeper(&self, every: Duration) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                let evicted = store.sweep_expired();
                if evicted > 0 {
                    tracing::debug!(evicted, "expired sessions swept");
                }
            }
        })
    }
}

/// Finds the session id in any `Cookie` header.
pub fn session_id_from_headers(headers: &HeaderMap, cookie_name: &str) -> Option<Uuid> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|raw| raw.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == cookie_name)
        .and_then(|(_, value)| Uuid::parse_str(value.trim()).ok())
}

pub fn session_cookie(cookie_name: &str, session_id: Uuid, ttl: Duration) -> HeaderValue {
    let cookie = format!(
        "{cookie_name}={session_id}; HttpOnly; Path=/; SameSite=Lax; Max-Age={}",
        ttl.as_secs()
    );
    HeaderValue::from_str(&cookie).unwrap_or_else(|_| HeaderValue::from_static(""))
}

pub fn expired_cookie(cookie_name: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("{cookie_name}=; HttpOnly; Path=/; SameSite=Lax; Max-Age=0"))
        .unwrap_or_else(|_| HeaderValue::from_static(""))
}

#[async_trait]
impl FromRequestParts<AppState> for SessionContext {
    type Rejection = StorefrontError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let session_id = session_id_from_headers(&parts.headers, &state.config.session_cookie)
            .ok_or(StorefrontError::Unauthorized)?;
        state.sessions.get(session_id).ok_or(StorefrontError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::NewUser;

    fn user(role: Role) -> User {
        NewUser { username: "ada".into(), email: "ada@example.com".into(), password_hash: String::new(), role }
            .into_user()
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_expires_after_ttl() {
        let store = SessionStore::new(Duration::from_secs(60));
        let ctx = store.create(&user(Role::User));
        assert_eq!(store.get(ctx.session_id).unwrap().username, "ada");

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(store.get(ctx.session_id).is_none());
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reads_slide_expiry() {
        let store = SessionStore::new(Duration::from_secs(60));
        let ctx = store.create(&user(Role::User));
        tokio::time::advance(Duration::from_secs(45)).await;
        assert!(store.get(ctx.session_id).is_some());
        tokio::time::advance(Duration::from_secs(45)).await;
        assert!(store.get(ctx.session_id).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_expired() {
        let store = SessionStore::new(Duration::from_secs(10));
        store.create(&user(Role::User));
        store.create(&user(Role::Admin));
        tokio::time::advance(Duration::from_secs(11)).await;
        let fresh = store.create(&user(Role::User));
        assert_eq!(store.sweep_expired(), 2);
        assert!(store.get(fresh.session_id).is_some());
    }

    #[test]
    fn test_require_admin() {
        let store = SessionStore::new(Duration::from_secs(10));
        assert!(store.create(&user(Role::Admin)).require_admin().is_ok());
        assert!(matches!(store.create(&user(Role::User)).require_admin(), Err(StorefrontError::Forbidden)));
    }

    #[test]
    fn test_cookie_parsing() {
        let id = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(&format!("theme=dark; sid={id}")).unwrap());
        assert_eq!(session_id_from_headers(&headers, "sid"), Some(id));
        assert_eq!(session_id_from_headers(&headers, "other"), None);
    }
}
