//! Value types shared across the entity models.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

use crate::error::ValidationErrorBuilder;

/// A non-negative monetary amount, stored as integer cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, sqlx::Type)]
#[sqlx(transparent)]
pub struct Amount(i64);

impl Amount {
    pub fn from_cents(cents: i64) -> Option<Self> {
        (cents >= 0).then_some(Self(cents))
    }

    pub fn cents(&self) -> i64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl std::str::FromStr for Amount {
    type Err = String;

    /// Accepts `1000`, `1000.5` or `1000.50`; rejects negatives and more
    /// than two fractional digits.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("Amount is required".to_string());
        }
        if s.starts_with('-') {
            return Err("Amount cannot be negative".to_string());
        }

        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        let digits_only = |part: &str| part.chars().all(|c| c.is_ascii_digit());
        if whole.is_empty() || !digits_only(whole) || !digits_only(frac) {
            return Err(format!("Invalid amount: {}", s));
        }
        if frac.len() > 2 {
            return Err("Amount has more than two decimal places".to_string());
        }

        let whole: i64 = whole
            .parse()
            .map_err(|_| format!("Amount is too large: {}", s))?;
        let frac: i64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().unwrap_or(0) * 10,
            _ => frac.parse::<i64>().unwrap_or(0),
        };

        whole
            .checked_mul(100)
            .and_then(|c| c.checked_add(frac))
            .map(Amount)
            .ok_or_else(|| format!("Amount is too large: {}", s))
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A partial update: field name to new value.
///
/// Only present, non-empty values are applied; everything else is left
/// untouched. Field names the entity does not know are rejected.
#[derive(Debug, Clone, Default)]
pub struct FieldChanges(BTreeMap<String, String>);

impl FieldChanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    /// Parse a `field=value` assignment as given on the command line
    pub fn parse_assignment(arg: &str) -> Result<(String, String), String> {
        let (field, value) = arg
            .split_once('=')
            .ok_or_else(|| format!("Expected field=value, got '{}'", arg))?;
        let field = field.trim();
        if field.is_empty() {
            return Err(format!("Missing field name in '{}'", arg));
        }
        Ok((field.to_string(), value.to_string()))
    }

    /// Remove `field`, returning its trimmed value when non-empty
    pub(crate) fn take(&mut self, field: &str) -> Option<String> {
        self.0
            .remove(field)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Report any field nobody consumed as unknown
    pub(crate) fn reject_unknown(self, errors: &mut ValidationErrorBuilder, known: &[&str]) {
        for field in self.0.into_keys() {
            errors.add(
                field.clone(),
                format!("Unknown field '{}'. Expected one of: {}", field, known.join(", ")),
            );
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, String)> for FieldChanges {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Current time as stored in `created_at`/`updated_at`
pub(crate) fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}
