//! Contract operations.
//!
//! A contract's sales owner is copied from its client when the contract is
//! created, so ownership stays stable if the client is reassigned later.

use tracing::{info, warn};

use super::clients::fetch_client;
use super::{authorize, require_id, Action, Resource, Scope};
use crate::auth::SessionState;
use crate::db::{
    now_rfc3339, Amount, Contract, ContractFilter, CreateContractRequest, DbPool, FieldChanges,
    UpdateContractRequest,
};
use crate::error::CrmError;

pub(crate) async fn fetch_contract(db: &DbPool, id: &str) -> Result<Contract, CrmError> {
    sqlx::query_as::<_, Contract>("SELECT * FROM contracts WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| CrmError::not_found("Contract not found"))
}

// Overpayment is accepted as-is, only flagged.
fn warn_if_overdrawn(id: &str, total: Amount, remaining: Amount) {
    if remaining > total {
        warn!(
            "Contract {} has remaining amount {} above its total {}",
            id, remaining, total
        );
    }
}

pub async fn create_contract(
    db: &DbPool,
    session: &SessionState,
    req: CreateContractRequest,
) -> Result<Contract, CrmError> {
    let grant = authorize(db, session, Resource::Contract, Action::Create).await?;
    req.validate()?;

    let client = fetch_client(db, &req.client_id).await?;
    grant.require_covers(client.commercial_id.as_deref(), "client")?;

    let id = uuid::Uuid::new_v4().to_string();
    let now = now_rfc3339();
    let remaining = req.resolved_remaining();
    warn_if_overdrawn(&id, req.total_amount, remaining);

    sqlx::query(
        r#"
        INSERT INTO contracts (id, client_id, commercial_id, total_amount, remaining_amount, signed, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, 0, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&client.id)
    .bind(&client.commercial_id)
    .bind(req.total_amount)
    .bind(remaining)
    .bind(&now)
    .bind(&now)
    .execute(db)
    .await?;

    let contract = fetch_contract(db, &id).await?;
    info!(
        "Contract {} for client {} ({}) created by {}",
        contract.id, client.full_name, contract.total_amount, grant.actor.email
    );
    Ok(contract)
}

/// All contracts for management, only their own for sales
pub async fn list_contracts(
    db: &DbPool,
    session: &SessionState,
    filter: ContractFilter,
) -> Result<Vec<Contract>, CrmError> {
    let grant = authorize(db, session, Resource::Contract, Action::List).await?;

    let contracts = match grant.scope {
        Scope::All => {
            sqlx::query_as::<_, Contract>("SELECT * FROM contracts ORDER BY created_at DESC")
                .fetch_all(db)
                .await?
        }
        _ => {
            sqlx::query_as::<_, Contract>(
                "SELECT * FROM contracts WHERE commercial_id = ? ORDER BY created_at DESC",
            )
            .bind(&grant.actor.id)
            .fetch_all(db)
            .await?
        }
    };

    Ok(contracts.into_iter().filter(|c| filter.matches(c)).collect())
}

pub async fn update_contract(
    db: &DbPool,
    session: &SessionState,
    id: &str,
    changes: FieldChanges,
) -> Result<Contract, CrmError> {
    let grant = authorize(db, session, Resource::Contract, Action::Update).await?;
    require_id(id, "contract_id")?;

    let existing = fetch_contract(db, id).await?;
    grant.require_covers(existing.commercial_id.as_deref(), "contract")?;

    let req = UpdateContractRequest::from_changes(changes)?;
    if req.is_empty() {
        return Ok(existing);
    }
    warn_if_overdrawn(
        id,
        req.total_amount.unwrap_or(existing.total_amount),
        req.remaining_amount.unwrap_or(existing.remaining_amount),
    );

    sqlx::query(
        r#"
        UPDATE contracts SET
            total_amount = COALESCE(?, total_amount),
            remaining_amount = COALESCE(?, remaining_amount),
            signed = COALESCE(?, signed),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(req.total_amount)
    .bind(req.remaining_amount)
    .bind(req.signed)
    .bind(now_rfc3339())
    .bind(id)
    .execute(db)
    .await?;

    let contract = fetch_contract(db, id).await?;
    if req.signed == Some(true) && !existing.signed {
        info!("Contract {} signed, updated by {}", contract.id, grant.actor.email);
    } else {
        info!("Contract {} updated by {}", contract.id, grant.actor.email);
    }
    Ok(contract)
}

pub async fn delete_contract(db: &DbPool, session: &SessionState, id: &str) -> Result<(), CrmError> {
    let grant = authorize(db, session, Resource::Contract, Action::Delete).await?;
    require_id(id, "contract_id")?;

    let result = sqlx::query("DELETE FROM contracts WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(CrmError::not_found("Contract not found"));
    }

    info!("Contract {} deleted by {}", id, grant.actor.email);
    Ok(())
}
