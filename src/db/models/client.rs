//! Client model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::common::FieldChanges;
use crate::error::{CrmError, ValidationErrorBuilder};
use crate::validation::{validate_email, validate_name, validate_phone};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Client {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    /// Owning sales user; only null after that user was deleted
    pub commercial_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Client {
    /// Contact line copied onto events created for this client
    pub fn contact_line(&self) -> String {
        format!("{} / {}", self.email, self.phone.as_deref().unwrap_or("-"))
    }
}

#[derive(Debug, Clone)]
pub struct CreateClientRequest {
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
}

impl CreateClientRequest {
    pub fn validate(&self) -> Result<(), CrmError> {
        let mut errors = ValidationErrorBuilder::new();
        errors.check("full_name", validate_name(&self.full_name, "Full name"));
        errors.check("email", validate_email(&self.email));
        if let Some(phone) = &self.phone {
            errors.check("phone", validate_phone(phone));
        }
        if let Some(company) = &self.company {
            errors.check("company", validate_name(company, "Company"));
        }
        errors.finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct UpdateClientRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
}

impl UpdateClientRequest {
    pub const FIELDS: [&'static str; 4] = ["full_name", "email", "phone", "company"];

    pub fn from_changes(mut changes: FieldChanges) -> Result<Self, CrmError> {
        let mut errors = ValidationErrorBuilder::new();
        let mut req = Self::default();

        if let Some(name) = changes.take("full_name") {
            req.full_name = errors.check("full_name", validate_name(&name, "Full name").map(|_| name));
        }
        if let Some(email) = changes.take("email") {
            req.email = errors.check("email", validate_email(&email).map(|_| email));
        }
        if let Some(phone) = changes.take("phone") {
            req.phone = errors.check("phone", validate_phone(&phone).map(|_| phone));
        }
        if let Some(company) = changes.take("company") {
            req.company = errors.check("company", validate_name(&company, "Company").map(|_| company));
        }

        changes.reject_unknown(&mut errors, &Self::FIELDS);
        errors.finish()?;
        Ok(req)
    }

    pub fn is_empty(&self) -> bool {
        self.full_name.is_none() && self.email.is_none() && self.phone.is_none() && self.company.is_none()
    }
}
