//! User model and the three staff roles.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::common::FieldChanges;
use crate::error::{CrmError, ValidationErrorBuilder};
use crate::validation::{validate_email, validate_name, validate_password};

/// Staff roles. Authorization is decided per role by the policy table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    /// "Gestion": unrestricted visibility and mutation rights
    Management,
    /// "Commercial": owns the clients and contracts it creates
    Sales,
    /// Fulfils events once assigned to them
    Support,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Management, Role::Sales, Role::Support];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Management => "management",
            Role::Sales => "sales",
            Role::Support => "support",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "management" | "gestion" => Ok(Role::Management),
            "sales" | "commercial" => Ok(Role::Sales),
            "support" => Ok(Role::Support),
            _ => {
                let known: Vec<&str> = Role::ALL.iter().map(Role::as_str).collect();
                Err(format!("Unknown role: {}. Must be one of: {}", s, known.join(", ")))
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub created_at: String,
    pub updated_at: String,
}

/// User without credentials, for listings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

impl CreateUserRequest {
    pub fn validate(&self) -> Result<(), CrmError> {
        let mut errors = ValidationErrorBuilder::new();
        errors.check("name", validate_name(&self.name, "Name"));
        errors.check("email", validate_email(&self.email));
        errors.check("password", validate_password(&self.password));
        errors.finish()
    }
}

/// Partial user update; `None` leaves the column untouched
#[derive(Debug, Clone, Default)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
}

impl UpdateUserRequest {
    pub const FIELDS: [&'static str; 4] = ["name", "email", "password", "role"];

    pub fn from_changes(mut changes: FieldChanges) -> Result<Self, CrmError> {
        let mut errors = ValidationErrorBuilder::new();
        let mut req = Self::default();

        if let Some(name) = changes.take("name") {
            req.name = errors.check("name", validate_name(&name, "Name").map(|_| name));
        }
        if let Some(email) = changes.take("email") {
            req.email = errors.check("email", validate_email(&email).map(|_| email));
        }
        if let Some(password) = changes.take("password") {
            req.password = errors.check("password", validate_password(&password).map(|_| password));
        }
        if let Some(role) = changes.take("role") {
            req.role = errors.check("role", role.parse());
        }

        changes.reject_unknown(&mut errors, &Self::FIELDS);
        errors.finish()?;
        Ok(req)
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.password.is_none() && self.role.is_none()
    }
}
