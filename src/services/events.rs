//! Event operations.
//!
//! Sales users open events on their own signed contracts. Management assigns
//! a support user afterwards, and that support user maintains the event.

use tracing::{info, warn};

use super::clients::fetch_client;
use super::contracts::fetch_contract;
use super::{authorize, require_id, Action, OwnerLink, Resource, Scope};
use crate::auth::SessionState;
use crate::db::{
    format_timestamp, now_rfc3339, CreateEventRequest, DbPool, Event, EventFilter, FieldChanges,
    Role, UpdateEventRequest, User,
};
use crate::error::CrmError;

pub(crate) async fn fetch_event(db: &DbPool, id: &str) -> Result<Event, CrmError> {
    sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| CrmError::not_found("Event not found"))
}

/// The user being assigned must exist and hold the support role
async fn check_support_user(db: &DbPool, id: &str) -> Result<(), CrmError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| CrmError::not_found("Support user not found"))?;

    if user.role != Role::Support {
        return Err(CrmError::validation_field(
            "support_id",
            format!("{} has role {}, expected support", user.email, user.role),
        ));
    }
    Ok(())
}

pub async fn create_event(
    db: &DbPool,
    session: &SessionState,
    req: CreateEventRequest,
) -> Result<Event, CrmError> {
    let grant = authorize(db, session, Resource::Event, Action::Create).await?;
    req.validate()?;

    let contract = fetch_contract(db, &req.contract_id).await?;
    grant.require_covers(contract.commercial_id.as_deref(), "contract")?;
    if !contract.signed {
        warn!(
            "{} tried to open an event on unsigned contract {}",
            grant.actor.email, contract.id
        );
        return Err(CrmError::forbidden(
            "Events can only be created for signed contracts",
        ));
    }

    let client = fetch_client(db, &contract.client_id).await?;
    let id = uuid::Uuid::new_v4().to_string();
    let now = now_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO events (
            id, contract_id, support_id, client_name, client_contact,
            starts_at, ends_at, location, attendees, notes, created_at, updated_at
        )
        VALUES (?, ?, NULL, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&contract.id)
    .bind(&client.full_name)
    .bind(client.contact_line())
    .bind(format_timestamp(&req.starts_at))
    .bind(format_timestamp(&req.ends_at))
    .bind(req.location.trim())
    .bind(req.attendees)
    .bind(req.notes.as_deref().map(str::trim).filter(|n| !n.is_empty()))
    .bind(&now)
    .bind(&now)
    .execute(db)
    .await?;

    let event = fetch_event(db, &id).await?;
    info!(
        "Event {} on contract {} created by {}",
        event.id, contract.id, grant.actor.email
    );
    Ok(event)
}

/// Management sees every event, sales the events on their contracts, support
/// the events assigned to them
pub async fn list_events(
    db: &DbPool,
    session: &SessionState,
    filter: EventFilter,
) -> Result<Vec<Event>, CrmError> {
    let grant = authorize(db, session, Resource::Event, Action::List).await?;

    let events = match (grant.scope, grant.owner_link()) {
        (Scope::All, _) => {
            sqlx::query_as::<_, Event>("SELECT * FROM events ORDER BY starts_at")
                .fetch_all(db)
                .await?
        }
        (_, Some(OwnerLink::Commercial)) => {
            sqlx::query_as::<_, Event>(
                r#"
                SELECT e.* FROM events e
                JOIN contracts c ON c.id = e.contract_id
                WHERE c.commercial_id = ?
                ORDER BY e.starts_at
                "#,
            )
            .bind(&grant.actor.id)
            .fetch_all(db)
            .await?
        }
        _ => {
            sqlx::query_as::<_, Event>(
                "SELECT * FROM events WHERE support_id = ? ORDER BY starts_at",
            )
            .bind(&grant.actor.id)
            .fetch_all(db)
            .await?
        }
    };

    Ok(events.into_iter().filter(|e| filter.matches(e)).collect())
}

pub async fn update_event(
    db: &DbPool,
    session: &SessionState,
    id: &str,
    changes: FieldChanges,
) -> Result<Event, CrmError> {
    let grant = authorize(db, session, Resource::Event, Action::Update).await?;
    require_id(id, "event_id")?;

    let existing = fetch_event(db, id).await?;
    grant.require_covers(existing.support_id.as_deref(), "event")?;

    let req = UpdateEventRequest::from_changes(changes)?;
    if let Some(support_id) = &req.support_id {
        if grant.scope != Scope::All {
            warn!("{} tried to reassign support on event {}", grant.actor.email, id);
            return Err(CrmError::forbidden("Only management can assign support to an event"));
        }
        check_support_user(db, support_id).await?;
    }
    if req.is_empty() {
        return Ok(existing);
    }
    req.check_against(&existing)?;

    sqlx::query(
        r#"
        UPDATE events SET
            starts_at = COALESCE(?, starts_at),
            ends_at = COALESCE(?, ends_at),
            location = COALESCE(?, location),
            attendees = COALESCE(?, attendees),
            notes = COALESCE(?, notes),
            support_id = COALESCE(?, support_id),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(req.starts_at.as_ref().map(format_timestamp))
    .bind(req.ends_at.as_ref().map(format_timestamp))
    .bind(&req.location)
    .bind(req.attendees)
    .bind(&req.notes)
    .bind(&req.support_id)
    .bind(now_rfc3339())
    .bind(id)
    .execute(db)
    .await?;

    let event = fetch_event(db, id).await?;
    match &req.support_id {
        Some(support_id) => info!(
            "Event {} assigned to support {} by {}",
            event.id, support_id, grant.actor.email
        ),
        None => info!("Event {} updated by {}", event.id, grant.actor.email),
    }
    Ok(event)
}
