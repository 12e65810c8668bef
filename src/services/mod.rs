//! Access-controlled entity services.
//!
//! Every operation takes the caller's `SessionState`, asks the policy table
//! for a scope, resolves the acting user once, and only then touches the
//! store. Denials are always `Forbidden`, never an empty result.

pub mod clients;
pub mod contracts;
pub mod events;
pub mod policy;
pub mod users;

pub use policy::{Action, OwnerLink, Resource, Scope};

use crate::auth::SessionState;
use crate::db::{DbPool, Role, User};
use crate::error::CrmError;
use crate::validation::validate_uuid;

/// The user an operation runs as
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    pub email: String,
    pub role: Role,
}

/// A granted permission: who is acting and how far their reach goes
#[derive(Debug, Clone)]
pub(crate) struct Grant {
    pub actor: Actor,
    pub scope: Scope,
}

impl Grant {
    /// Whether the record owned by `owner_id` is within reach
    pub fn covers(&self, owner_id: Option<&str>) -> bool {
        match self.scope {
            Scope::All => true,
            Scope::Own => owner_id == Some(self.actor.id.as_str()),
            Scope::Denied => false,
        }
    }

    /// Which column marks a record as the actor's own
    pub fn owner_link(&self) -> Option<OwnerLink> {
        policy::owner_link(self.actor.role)
    }

    /// `Forbidden` unless the record owned by `owner_id` is within reach
    pub fn require_covers(&self, owner_id: Option<&str>, what: &str) -> Result<(), CrmError> {
        if self.covers(owner_id) {
            Ok(())
        } else {
            tracing::warn!("{} denied access to {} they do not own", self.actor.email, what);
            Err(CrmError::forbidden(format!("You are not assigned to this {}", what)))
        }
    }
}

/// Check the policy for `resource`/`action` and resolve the acting user
pub(crate) async fn authorize(
    db: &DbPool,
    session: &SessionState,
    resource: Resource,
    action: Action,
) -> Result<Grant, CrmError> {
    let claims = session.require()?;
    let scope = policy::check(claims.role, resource, action)?;

    let user: User = sqlx::query_as("SELECT * FROM users WHERE email = ?")
        .bind(&claims.email)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| CrmError::unauthenticated("Your account no longer exists, please log in again"))?;

    Ok(Grant {
        actor: Actor {
            id: user.id,
            email: user.email,
            role: claims.role,
        },
        scope,
    })
}

/// Validate an identifier taken from user input
pub(crate) fn require_id(id: &str, field: &str) -> Result<(), CrmError> {
    validate_uuid(id, field).map_err(|e| CrmError::validation_field(field, e))
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::auth::TokenError;
    use crate::db::test_pool;
    use crate::error::ErrorCode;

    #[tokio::test]
    async fn test_authorize_requires_session() {
        let db = test_pool().await;
        let err = authorize(&db, &SessionState::Anonymous, Resource::Client, Action::List)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Unauthenticated);

        let err = authorize(
            &db,
            &SessionState::Invalid(TokenError::Expired),
            Resource::Client,
            Action::List,
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Unauthenticated);
    }

    #[tokio::test]
    async fn test_authorize_resolves_actor() {
        let db = test_pool().await;
        let alice = seed_user(&db, "Alice", Role::Sales).await;
        let grant = authorize(&db, &session_for(&alice), Resource::Client, Action::List)
            .await
            .unwrap();
        assert_eq!(grant.actor.id, alice.id);
        assert_eq!(grant.scope, Scope::Own);
        assert!(grant.covers(Some(alice.id.as_str())));
        assert!(!grant.covers(Some("someone-else")));
        assert!(!grant.covers(None));
        assert_eq!(grant.owner_link(), Some(OwnerLink::Commercial));
    }

    #[tokio::test]
    async fn test_authorize_rejects_deleted_account() {
        let db = test_pool().await;
        let alice = seed_user(&db, "Alice", Role::Sales).await;
        let session = session_for(&alice);
        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(&alice.id)
            .execute(&db)
            .await
            .unwrap();

        let err = authorize(&db, &session, Resource::Client, Action::List)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Unauthenticated);
    }
}
