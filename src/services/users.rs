//! User administration (management only).

use tracing::info;

use super::{authorize, require_id, Action, Resource};
use crate::auth::{hash_password, SessionState};
use crate::db::{now_rfc3339, CreateUserRequest, DbPool, FieldChanges, UpdateUserRequest, User, UserResponse};
use crate::error::{CrmError, ErrorCode};

async fn fetch_user(db: &DbPool, id: &str) -> Result<User, CrmError> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| CrmError::not_found("User not found"))
}

/// Reword the store's unique-violation conflict for the email column
fn email_taken(e: sqlx::Error) -> CrmError {
    let err = CrmError::from(e);
    if err.code() == ErrorCode::Conflict {
        CrmError::conflict("A user with this email already exists")
    } else {
        err
    }
}

fn hash(password: &str) -> Result<String, CrmError> {
    hash_password(password).map_err(|e| CrmError::internal(format!("Failed to hash password: {}", e)))
}

pub async fn create_user(
    db: &DbPool,
    session: &SessionState,
    req: CreateUserRequest,
) -> Result<UserResponse, CrmError> {
    let grant = authorize(db, session, Resource::User, Action::Create).await?;
    req.validate()?;

    let id = uuid::Uuid::new_v4().to_string();
    let now = now_rfc3339();
    let password_hash = hash(&req.password)?;

    sqlx::query(
        r#"
        INSERT INTO users (id, name, email, password_hash, role, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(req.name.trim())
    .bind(req.email.trim())
    .bind(&password_hash)
    .bind(req.role)
    .bind(&now)
    .bind(&now)
    .execute(db)
    .await
    .map_err(email_taken)?;

    let user = fetch_user(db, &id).await?;
    info!("User {} ({}) created by {}", user.email, user.role, grant.actor.email);
    Ok(user.into())
}

pub async fn list_users(db: &DbPool, session: &SessionState) -> Result<Vec<UserResponse>, CrmError> {
    authorize(db, session, Resource::User, Action::List).await?;

    let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY role, name")
        .fetch_all(db)
        .await?;
    Ok(users.into_iter().map(UserResponse::from).collect())
}

pub async fn update_user(
    db: &DbPool,
    session: &SessionState,
    id: &str,
    changes: FieldChanges,
) -> Result<UserResponse, CrmError> {
    let grant = authorize(db, session, Resource::User, Action::Update).await?;
    require_id(id, "user_id")?;
    let existing = fetch_user(db, id).await?;

    let req = UpdateUserRequest::from_changes(changes)?;
    if req.is_empty() {
        return Ok(existing.into());
    }
    let password_hash = req.password.as_deref().map(hash).transpose()?;

    sqlx::query(
        r#"
        UPDATE users SET
            name = COALESCE(?, name),
            email = COALESCE(?, email),
            password_hash = COALESCE(?, password_hash),
            role = COALESCE(?, role),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&req.name)
    .bind(&req.email)
    .bind(&password_hash)
    .bind(req.role)
    .bind(now_rfc3339())
    .bind(id)
    .execute(db)
    .await
    .map_err(email_taken)?;

    let user = fetch_user(db, id).await?;
    info!("User {} updated by {}", user.email, grant.actor.email);
    Ok(user.into())
}

/// Delete a user. Their clients and contracts keep existing without an owner.
pub async fn delete_user(db: &DbPool, session: &SessionState, id: &str) -> Result<(), CrmError> {
    let grant = authorize(db, session, Resource::User, Action::Delete).await?;
    require_id(id, "user_id")?;

    if grant.actor.id == id {
        return Err(CrmError::forbidden("You cannot delete your own account"));
    }

    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(CrmError::not_found("User not found"));
    }

    info!("User {} deleted by {}", id, grant.actor.email);
    Ok(())
}
