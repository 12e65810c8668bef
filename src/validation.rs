//! Input validation for values entered at the CLI boundary.
//!
//! Checks return `Err(message)` so several of them can be collected with
//! `ValidationErrorBuilder` before an operation is rejected.

use chrono::NaiveDateTime;
use lazy_static::lazy_static;
use regex::Regex;

/// Format accepted for event start/end timestamps
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

lazy_static! {
    /// Pragmatic email check: something@domain.tld, no whitespace
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(\.[A-Za-z0-9-]+)*\.[A-Za-z]{2,}$"
    ).unwrap();

    /// Digits with optional leading +, spaces, dots, dashes and parentheses
    static ref PHONE_REGEX: Regex = Regex::new(
        r"^\+?[0-9 ().-]{4,20}$"
    ).unwrap();
}

/// Validate a required display name (users, client contacts, companies)
pub fn validate_name(name: &str, label: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err(format!("{} is required", label));
    }

    if name.chars().count() > 100 {
        return Err(format!("{} is too long (max 100 characters)", label));
    }

    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 100 {
        return Err("Email is too long (max 100 characters)".to_string());
    }

    if !EMAIL_REGEX.is_match(email) {
        return Err("Invalid email format".to_string());
    }

    Ok(())
}

pub fn validate_phone(phone: &str) -> Result<(), String> {
    if !PHONE_REGEX.is_match(phone) {
        return Err("Invalid phone number".to_string());
    }
    Ok(())
}

/// Passwords need a minimum length plus a letter and a digit
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.chars().count() < 8 {
        return Err("Password must be at least 8 characters".to_string());
    }

    if !password.chars().any(|c| c.is_alphabetic()) {
        return Err("Password must contain at least one letter".to_string());
    }

    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err("Password must contain at least one digit".to_string());
    }

    Ok(())
}

/// Validate a record identifier
pub fn validate_uuid(id: &str, field_name: &str) -> Result<(), String> {
    if id.is_empty() {
        return Err(format!("{} is required", field_name));
    }

    if uuid::Uuid::parse_str(id).is_err() {
        return Err(format!("Invalid {} format", field_name));
    }

    Ok(())
}

/// Parse an event timestamp (`YYYY-MM-DD HH:MM`)
pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(value.trim(), TIMESTAMP_FORMAT)
        .map_err(|_| "Invalid date/time, expected YYYY-MM-DD HH:MM".to_string())
}

/// Parse the contract signed flag
pub fn parse_bool(value: &str) -> Result<bool, String> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "y" | "1" => Ok(true),
        "false" | "no" | "n" | "0" => Ok(false),
        _ => Err("Expected one of: true, false, yes, no, 1, 0".to_string()),
    }
}

pub fn parse_attendees(value: &str) -> Result<i64, String> {
    let count: i64 = value
        .trim()
        .parse()
        .map_err(|_| "Attendee count must be a whole number".to_string())?;
    if count < 0 {
        return Err("Attendee count cannot be negative".to_string());
    }
    Ok(count)
}
