//! Event model.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::common::FieldChanges;
use crate::error::{CrmError, ValidationErrorBuilder};
use crate::validation::{
    parse_attendees, parse_timestamp, validate_name, validate_uuid, TIMESTAMP_FORMAT,
};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: String,
    pub contract_id: String,
    /// Assigned later by management
    pub support_id: Option<String>,
    /// Client name and contact captured at creation
    pub client_name: String,
    pub client_contact: String,
    pub starts_at: String,
    pub ends_at: String,
    pub location: String,
    pub attendees: i64,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Event {
    pub fn starts_at(&self) -> Option<NaiveDateTime> {
        parse_timestamp(&self.starts_at).ok()
    }

    pub fn ends_at(&self) -> Option<NaiveDateTime> {
        parse_timestamp(&self.ends_at).ok()
    }
}

/// Format a timestamp the way events store it
pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

fn check_schedule(starts_at: &NaiveDateTime, ends_at: &NaiveDateTime) -> Result<(), String> {
    if ends_at < starts_at {
        return Err("Event cannot end before it starts".to_string());
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct CreateEventRequest {
    pub contract_id: String,
    pub starts_at: NaiveDateTime,
    pub ends_at: NaiveDateTime,
    pub location: String,
    pub attendees: i64,
    pub notes: Option<String>,
}

impl CreateEventRequest {
    pub fn validate(&self) -> Result<(), CrmError> {
        let mut errors = ValidationErrorBuilder::new();
        errors.check("contract_id", validate_uuid(&self.contract_id, "contract_id"));
        errors.check("ends_at", check_schedule(&self.starts_at, &self.ends_at));
        errors.check("location", validate_name(&self.location, "Location"));
        if self.attendees < 0 {
            errors.add("attendees", "Attendee count cannot be negative");
        }
        errors.finish()
    }
}

/// Filters for event listings
#[derive(Debug, Clone, Copy, Default)]
pub struct EventFilter {
    /// Only events that still need a support user
    pub unassigned_only: bool,
}

impl EventFilter {
    pub fn matches(&self, event: &Event) -> bool {
        !self.unassigned_only || event.support_id.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct UpdateEventRequest {
    pub starts_at: Option<NaiveDateTime>,
    pub ends_at: Option<NaiveDateTime>,
    pub location: Option<String>,
    pub attendees: Option<i64>,
    pub notes: Option<String>,
    /// Management only
    pub support_id: Option<String>,
}

impl UpdateEventRequest {
    pub const FIELDS: [&'static str; 6] = [
        "starts_at",
        "ends_at",
        "location",
        "attendees",
        "notes",
        "support_id",
    ];

    pub fn from_changes(mut changes: FieldChanges) -> Result<Self, CrmError> {
        let mut errors = ValidationErrorBuilder::new();
        let mut req = Self::default();

        if let Some(starts_at) = changes.take("starts_at") {
            req.starts_at = errors.check("starts_at", parse_timestamp(&starts_at));
        }
        if let Some(ends_at) = changes.take("ends_at") {
            req.ends_at = errors.check("ends_at", parse_timestamp(&ends_at));
        }
        if let Some(location) = changes.take("location") {
            req.location = errors.check("location", validate_name(&location, "Location").map(|_| location));
        }
        if let Some(attendees) = changes.take("attendees") {
            req.attendees = errors.check("attendees", parse_attendees(&attendees));
        }
        req.notes = changes.take("notes");
        if let Some(support_id) = changes.take("support_id") {
            req.support_id = errors.check("support_id", validate_uuid(&support_id, "support_id").map(|_| support_id));
        }

        changes.reject_unknown(&mut errors, &Self::FIELDS);
        errors.finish()?;
        Ok(req)
    }

    pub fn is_empty(&self) -> bool {
        self.starts_at.is_none()
            && self.ends_at.is_none()
            && self.location.is_none()
            && self.attendees.is_none()
            && self.notes.is_none()
            && self.support_id.is_none()
    }

    /// Check the schedule that results from applying this update to `event`
    pub fn check_against(&self, event: &Event) -> Result<(), CrmError> {
        let starts_at = self.starts_at.or_else(|| event.starts_at());
        let ends_at = self.ends_at.or_else(|| event.ends_at());
        if let (Some(starts_at), Some(ends_at)) = (starts_at, ends_at) {
            check_schedule(&starts_at, &ends_at)
                .map_err(|e| CrmError::validation_field("ends_at", e))?;
        }
        Ok(())
    }
}
