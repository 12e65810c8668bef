//! Authentication: credentials, signed session tokens and the session slot.
//!
//! Session resolution happens once per process. The resulting
//! `SessionState` is handed to every service call instead of being re-read
//! from disk inside each operation.

pub mod password;
pub mod session;
pub mod token;

pub use password::{hash_password, verify_password};
pub use session::SessionStore;
pub use token::{Claims, TokenCodec, TokenError};

use chrono::Duration;
use tracing::{info, warn};

use crate::db::{DbPool, Role, User};
use crate::error::CrmError;

/// Outcome of resolving the stored session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Authenticated(Claims),
    Anonymous,
    /// A token was stored but is expired or corrupt
    Invalid(TokenError),
}

impl SessionState {
    pub fn claims(&self) -> Option<&Claims> {
        match self {
            SessionState::Authenticated(claims) => Some(claims),
            _ => None,
        }
    }

    /// The claims, or an `Unauthenticated` error describing why there are none
    pub fn require(&self) -> Result<&Claims, CrmError> {
        match self {
            SessionState::Authenticated(claims) => Ok(claims),
            SessionState::Anonymous => Err(CrmError::unauthenticated("Not logged in")),
            SessionState::Invalid(TokenError::Expired) => Err(CrmError::unauthenticated(
                "Session expired, please log in again",
            )),
            SessionState::Invalid(_) => Err(CrmError::unauthenticated(
                "Session is invalid, please log in again",
            )),
        }
    }
}

/// Orchestrates login, logout and session resolution
#[derive(Debug, Clone)]
pub struct Authenticator {
    db: DbPool,
    codec: TokenCodec,
    store: SessionStore,
    ttl: Duration,
}

impl Authenticator {
    pub fn new(db: DbPool, codec: TokenCodec, store: SessionStore, ttl: Duration) -> Self {
        Self {
            db,
            codec,
            store,
            ttl,
        }
    }

    /// Verify credentials, then issue and persist a session token.
    ///
    /// Unknown emails and wrong passwords fail with the same error.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, CrmError> {
        let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = ?")
            .bind(email.trim())
            .fetch_optional(&self.db)
            .await?;

        let user = match user {
            Some(user) if verify_password(password, &user.password_hash) => user,
            _ => {
                warn!("Failed login attempt for {}", email);
                return Err(CrmError::auth_failure());
            }
        };

        let token = self
            .codec
            .issue(&user.email, user.role, self.ttl)
            .map_err(|e| CrmError::internal(e.to_string()))?;
        self.store
            .persist(&token)
            .map_err(|e| CrmError::internal(format!("{:#}", e)))?;

        info!("User {} logged in ({})", user.email, user.role);
        Ok(user)
    }

    /// Clear the session slot. Returns `false` if nobody was logged in.
    pub fn logout(&self) -> Result<bool, CrmError> {
        let cleared = self
            .store
            .clear()
            .map_err(|e| CrmError::internal(format!("{:#}", e)))?;
        if cleared {
            info!("Session cleared");
        }
        Ok(cleared)
    }

    /// Read and verify the stored token
    pub fn resolve_session(&self) -> SessionState {
        let token = match self.store.current() {
            Ok(Some(token)) => token,
            Ok(None) => return SessionState::Anonymous,
            Err(e) => {
                warn!("Could not read session: {:#}", e);
                return SessionState::Invalid(TokenError::Invalid);
            }
        };

        match self.codec.parse(&token) {
            Ok(claims) => SessionState::Authenticated(claims),
            Err(e) => {
                info!("Stored session rejected: {}", e);
                SessionState::Invalid(e)
            }
        }
    }

    /// The current claims; expired or corrupt sessions count as none
    pub fn current_claim(&self) -> Option<Claims> {
        match self.resolve_session() {
            SessionState::Authenticated(claims) => Some(claims),
            _ => None,
        }
    }
}

/// Create the bootstrap management account if no user exists yet
pub async fn ensure_admin_user(
    db: &DbPool,
    email: &str,
    password: &str,
    name: &str,
) -> anyhow::Result<()> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(db)
        .await?;
    if count.0 > 0 {
        return Ok(());
    }

    let id = uuid::Uuid::new_v4().to_string();
    let password_hash = hash_password(password)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?;
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO users (id, name, email, password_hash, role, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(name)
    .bind(email)
    .bind(&password_hash)
    .bind(Role::Management)
    .bind(&now)
    .bind(&now)
    .execute(db)
    .await?;

    info!("Created bootstrap management user: {}", email);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use tempfile::TempDir;

    async fn authenticator(dir: &TempDir) -> Authenticator {
        let db = test_pool().await;
        ensure_admin_user(&db, "admin@epic.io", "adminpass1", "Admin").await.unwrap();
        Authenticator::new(
            db,
            TokenCodec::new("auth-test-secret"),
            SessionStore::new(dir.path().join(".token")),
            Duration::hours(1),
        )
    }

    #[tokio::test]
    async fn test_login_then_logout() {
        let dir = TempDir::new().unwrap();
        let auth = authenticator(&dir).await;
        assert_eq!(auth.resolve_session(), SessionState::Anonymous);

        let user = auth.login("admin@epic.io", "adminpass1").await.unwrap();
        assert_eq!(user.role, Role::Management);

        let claims = auth.current_claim().unwrap();
        assert_eq!(claims.email, "admin@epic.io");
        assert_eq!(claims.role, Role::Management);

        assert!(auth.logout().unwrap());
        assert_eq!(auth.current_claim(), None);
        assert!(!auth.logout().unwrap());
    }

    #[tokio::test]
    async fn test_login_failures_are_uniform() {
        let dir = TempDir::new().unwrap();
        let auth = authenticator(&dir).await;

        let unknown = auth.login("nobody@epic.io", "adminpass1").await.unwrap_err();
        let wrong = auth.login("admin@epic.io", "wrongpass1").await.unwrap_err();
        assert_eq!(unknown.code(), crate::error::ErrorCode::AuthFailure);
        assert_eq!(unknown.code(), wrong.code());
        assert_eq!(unknown.message(), wrong.message());
        assert_eq!(auth.resolve_session(), SessionState::Anonymous);
    }

    #[tokio::test]
    async fn test_relogin_overwrites_session() {
        let dir = TempDir::new().unwrap();
        let auth = authenticator(&dir).await;
        auth.login("admin@epic.io", "adminpass1").await.unwrap();
        auth.login("admin@epic.io", "adminpass1").await.unwrap();
        assert!(auth.current_claim().is_some());
    }

    #[tokio::test]
    async fn test_corrupt_session_is_invalid() {
        let dir = TempDir::new().unwrap();
        let auth = authenticator(&dir).await;
        std::fs::write(dir.path().join(".token"), "garbage").unwrap();

        let state = auth.resolve_session();
        assert_eq!(state, SessionState::Invalid(TokenError::Invalid));
        assert_eq!(auth.current_claim(), None);
        assert_eq!(
            state.require().unwrap_err().code(),
            crate::error::ErrorCode::Unauthenticated
        );
    }

    #[tokio::test]
    async fn test_expired_session_is_invalid() {
        let dir = TempDir::new().unwrap();
        let auth = authenticator(&dir).await;
        let token = TokenCodec::new("auth-test-secret")
            .issue_at(
                "admin@epic.io",
                Role::Management,
                chrono::Utc::now() - Duration::hours(3),
                Duration::hours(1),
            )
            .unwrap();
        std::fs::write(dir.path().join(".token"), token).unwrap();

        assert_eq!(auth.resolve_session(), SessionState::Invalid(TokenError::Expired));
    }

    #[tokio::test]
    async fn test_ensure_admin_user_only_seeds_empty_store() {
        let db = test_pool().await;
        ensure_admin_user(&db, "first@epic.io", "adminpass1", "First").await.unwrap();
        ensure_admin_user(&db, "second@epic.io", "adminpass1", "Second").await.unwrap();

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&db)
            .await
            .unwrap();
        assert_eq!(count.0, 1);
    }
}
