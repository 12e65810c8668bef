//! Client operations. Sales users own the clients they create.

use tracing::info;

use super::{authorize, require_id, Action, Resource, Scope};
use crate::auth::SessionState;
use crate::db::{now_rfc3339, Client, CreateClientRequest, DbPool, FieldChanges, UpdateClientRequest};
use crate::error::CrmError;

pub(crate) async fn fetch_client(db: &DbPool, id: &str) -> Result<Client, CrmError> {
    sqlx::query_as::<_, Client>("SELECT * FROM clients WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| CrmError::not_found("Client not found"))
}

/// Create a client owned by the acting sales user
pub async fn create_client(
    db: &DbPool,
    session: &SessionState,
    req: CreateClientRequest,
) -> Result<Client, CrmError> {
    let grant = authorize(db, session, Resource::Client, Action::Create).await?;
    req.validate()?;

    let id = uuid::Uuid::new_v4().to_string();
    let now = now_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO clients (id, full_name, email, phone, company, commercial_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(req.full_name.trim())
    .bind(req.email.trim())
    .bind(req.phone.as_deref().map(str::trim))
    .bind(req.company.as_deref().map(str::trim))
    .bind(&grant.actor.id)
    .bind(&now)
    .bind(&now)
    .execute(db)
    .await?;

    let client = fetch_client(db, &id).await?;
    info!("Client {} ({}) created by {}", client.id, client.full_name, grant.actor.email);
    Ok(client)
}

/// All clients for management, only their own for sales
pub async fn list_clients(db: &DbPool, session: &SessionState) -> Result<Vec<Client>, CrmError> {
    let grant = authorize(db, session, Resource::Client, Action::List).await?;

    let clients = match grant.scope {
        Scope::All => {
            sqlx::query_as::<_, Client>("SELECT * FROM clients ORDER BY created_at DESC")
                .fetch_all(db)
                .await?
        }
        _ => {
            sqlx::query_as::<_, Client>(
                "SELECT * FROM clients WHERE commercial_id = ? ORDER BY created_at DESC",
            )
            .bind(&grant.actor.id)
            .fetch_all(db)
            .await?
        }
    };

    Ok(clients)
}

pub async fn update_client(
    db: &DbPool,
    session: &SessionState,
    id: &str,
    changes: FieldChanges,
) -> Result<Client, CrmError> {
    let grant = authorize(db, session, Resource::Client, Action::Update).await?;
    require_id(id, "client_id")?;

    let existing = fetch_client(db, id).await?;
    grant.require_covers(existing.commercial_id.as_deref(), "client")?;

    let req = UpdateClientRequest::from_changes(changes)?;
    if req.is_empty() {
        return Ok(existing);
    }

    sqlx::query(
        r#"
        UPDATE clients SET
            full_name = COALESCE(?, full_name),
            email = COALESCE(?, email),
            phone = COALESCE(?, phone),
            company = COALESCE(?, company),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&req.full_name)
    .bind(&req.email)
    .bind(&req.phone)
    .bind(&req.company)
    .bind(now_rfc3339())
    .bind(id)
    .execute(db)
    .await?;

    let client = fetch_client(db, id).await?;
    info!("Client {} updated by {}", client.id, grant.actor.email);
    Ok(client)
}

/// Delete a client and, through the foreign keys, its contracts and events
pub async fn delete_client(db: &DbPool, session: &SessionState, id: &str) -> Result<(), CrmError> {
    let grant = authorize(db, session, Resource::Client, Action::Delete).await?;
    require_id(id, "client_id")?;

    let result = sqlx::query("DELETE FROM clients WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(CrmError::not_found("Client not found"));
    }

    info!("Client {} deleted by {}", id, grant.actor.email);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{test_pool, Role};
    use crate::error::ErrorCode;
    use crate::services::testing::{seed_user, session_for};

    fn acme() -> CreateClientRequest {
        CreateClientRequest {
            full_name: "Kevin Casey".into(),
            email: "kevin@acme.io".into(),
            phone: Some("+678 123 456 78".into()),
            company: Some("Acme Corp".into()),
        }
    }

    #[tokio::test]
    async fn test_sales_creates_owned_client() {
        let db = test_pool().await;
        let alice = seed_user(&db, "Alice", Role::Sales).await;

        let client = create_client(&db, &session_for(&alice), acme()).await.unwrap();
        assert_eq!(client.commercial_id.as_deref(), Some(alice.id.as_str()));
        assert_eq!(client.company.as_deref(), Some("Acme Corp"));
        assert!(!client.created_at.is_empty());
    }

    #[tokio::test]
    async fn test_only_sales_create_clients() {
        let db = test_pool().await;
        for role in [Role::Management, Role::Support] {
            let user = seed_user(&db, role.as_str(), role).await;
            let err = create_client(&db, &session_for(&user), acme()).await.unwrap_err();
            assert_eq!(err.code(), ErrorCode::Forbidden);
        }
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM clients")
            .fetch_one(&db)
            .await
            .unwrap();
        assert_eq!(count.0, 0);
    }

    #[tokio::test]
    async fn test_sales_list_only_own_clients() {
        let db = test_pool().await;
        let alice = seed_user(&db, "Alice", Role::Sales).await;
        let bob = seed_user(&db, "Bob", Role::Sales).await;
        let boss = seed_user(&db, "Boss", Role::Management).await;

        for i in 0..3 {
            let mut req = acme();
            req.email = format!("a{}@acme.io", i);
            create_client(&db, &session_for(&alice), req).await.unwrap();
        }
        for i in 0..2 {
            let mut req = acme();
            req.email = format!("b{}@globex.io", i);
            create_client(&db, &session_for(&bob), req).await.unwrap();
        }

        let mine = list_clients(&db, &session_for(&alice)).await.unwrap();
        assert_eq!(mine.len(), 3);
        assert!(mine.iter().all(|c| c.commercial_id.as_deref() == Some(alice.id.as_str())));

        let bobs = list_clients(&db, &session_for(&bob)).await.unwrap();
        assert_eq!(bobs.len(), 2);

        let all = list_clients(&db, &session_for(&boss)).await.unwrap();
        assert_eq!(all.len(), 5);
    }

    #[tokio::test]
    async fn test_support_cannot_list_clients() {
        let db = test_pool().await;
        let sam = seed_user(&db, "Sam", Role::Support).await;
        let err = list_clients(&db, &session_for(&sam)).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::Forbidden);
    }

    #[tokio::test]
    async fn test_update_other_sales_client_is_forbidden() {
        let db = test_pool().await;
        let alice = seed_user(&db, "Alice", Role::Sales).await;
        let bob = seed_user(&db, "Bob", Role::Sales).await;
        let client = create_client(&db, &session_for(&alice), acme()).await.unwrap();

        let err = update_client(
            &db,
            &session_for(&bob),
            &client.id,
            FieldChanges::new().set("company", "Hijacked"),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Forbidden);

        let after = fetch_client(&db, &client.id).await.unwrap();
        assert_eq!(after.company, client.company);
        assert_eq!(after.updated_at, client.updated_at);
    }

    #[tokio::test]
    async fn test_partial_update_keeps_absent_fields() {
        let db = test_pool().await;
        let alice = seed_user(&db, "Alice", Role::Sales).await;
        let boss = seed_user(&db, "Boss", Role::Management).await;
        let client = create_client(&db, &session_for(&alice), acme()).await.unwrap();

        let updated = update_client(
            &db,
            &session_for(&alice),
            &client.id,
            FieldChanges::new().set("phone", "+33 1 23 45 67 89").set("email", ""),
        )
        .await
        .unwrap();
        assert_eq!(updated.phone.as_deref(), Some("+33 1 23 45 67 89"));
        assert_eq!(updated.email, client.email);
        assert_eq!(updated.full_name, client.full_name);

        let by_boss = update_client(
            &db,
            &session_for(&boss),
            &client.id,
            FieldChanges::new().set("company", "Acme Holdings"),
        )
        .await
        .unwrap();
        assert_eq!(by_boss.company.as_deref(), Some("Acme Holdings"));
    }

    #[tokio::test]
    async fn test_update_rejects_unknown_field() {
        let db = test_pool().await;
        let alice = seed_user(&db, "Alice", Role::Sales).await;
        let client = create_client(&db, &session_for(&alice), acme()).await.unwrap();

        let err = update_client(
            &db,
            &session_for(&alice),
            &client.id,
            FieldChanges::new().set("commercial_id", "x"),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn test_delete_client() {
        let db = test_pool().await;
        let alice = seed_user(&db, "Alice", Role::Sales).await;
        let boss = seed_user(&db, "Boss", Role::Management).await;
        let client = create_client(&db, &session_for(&alice), acme()).await.unwrap();

        let err = delete_client(&db, &session_for(&alice), &client.id).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::Forbidden);

        delete_client(&db, &session_for(&boss), &client.id).await.unwrap();
        let err = fetch_client(&db, &client.id).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }
}
