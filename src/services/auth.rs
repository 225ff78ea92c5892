//! Registration, login and password hashing.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::domain::aggregates::{NewUser, Registration, Role, User};
use crate::session::{SessionContext, SessionStore};
use crate::store::Store;
use crate::{Result, StorefrontError};

#[derive(Clone, Debug, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn Store>,
    sessions: SessionStore,
    allow_admin_signup: bool,
}

impl AuthService {
    pub fn new(store: Arc<dyn Store>, sessions: SessionStore, allow_admin_signup: bool) -> Self {
        Self { store, sessions, allow_admin_signup }
    }

    /// A requested admin role is only honoured when admin signup is enabled.
    #[instrument(name = "auth::register", skip(self, registration), fields(username = %registration.username))]
    pub async fn register(&self, registration: Registration) -> Result<User> {
        registration.validate()?;
        let requested = registration.role.unwrap_or_default();
        let role = if self.allow_admin_signup { requested } else { Role::User };
        if role != requested {
            warn!(requested = %requested, "admin signup disabled, registering as user");
        }

        let password_hash = hash_password(&registration.password)?;
        let user = self
            .store
            .create_user(NewUser {
                username: registration.username,
                email: registration.email,
                password_hash,
                role,
            })
            .await?
            .ok_or_else(|| StorefrontError::Validation("Username already exists".into()))?;
        info!(user_id = %user.id, role = %user.role, "user registered");
        Ok(user)
    }

    /// Unknown user and wrong password fail the same way.
    #[instrument(name = "auth::login", skip(self, credentials), fields(username = %credentials.username))]
    pub async fn login(&self, credentials: Credentials) -> Result<SessionContext> {
        let Some(user) = self.store.find_user_by_username(&credentials.username).await? else {
            warn!("login for unknown user");
            return Err(StorefrontError::InvalidCredentials);
        };
        if !verify_password(&user.password_hash, &credentials.password)? {
            warn!(user_id = %user.id, "login with wrong password");
            return Err(StorefrontError::InvalidCredentials);
        }
        let session = self.sessions.create(&user);
        info!(user_id = %user.id, "session started");
        Ok(session)
    }

    pub fn logout(&self, session_id: Uuid) -> bool {
        self.sessions.remove(session_id)
    }
}

#[instrument(name = "auth::hash_password", skip(password), err(Display))]
pub fn hash_password(password: &str) -> Result<String> {
    if password.is_empty() {
        return Err(StorefrontError::Validation("Password cannot be empty".into()));
    }
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!(error = %e, "argon2 hashing failed");
            StorefrontError::Internal(format!("Password hashing failed: {e}"))
        })
}

/// `Ok(false)` on a mismatch; `Err` only when the stored hash is unusable.
#[instrument(name = "auth::verify_password", skip_all)]
pub fn verify_password(stored_hash: &str, password: &str) -> Result<bool> {
    let parsed = PasswordHash::new(stored_hash).map_err(|e| {
        error!(error = %e, "stored password hash is malformed");
        StorefrontError::Internal(format!("Invalid stored password hash: {e}"))
    })?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(StorefrontError::Internal(format!("Password verification failed: {e}"))),
    }
}
