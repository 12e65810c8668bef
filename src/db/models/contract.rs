//! Contract model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::common::{Amount, FieldChanges};
use crate::error::{CrmError, ValidationErrorBuilder};
use crate::validation::{parse_bool, validate_uuid};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Contract {
    pub id: String,
    pub client_id: String,
    /// Sales owner, copied from the client when the contract is created
    pub commercial_id: Option<String>,
    pub total_amount: Amount,
    pub remaining_amount: Amount,
    pub signed: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl Contract {
    pub fn is_fully_paid(&self) -> bool {
        self.remaining_amount.is_zero()
    }
}

#[derive(Debug, Clone)]
pub struct CreateContractRequest {
    pub client_id: String,
    pub total_amount: Amount,
    /// Defaults to `total_amount` when not given
    pub remaining_amount: Option<Amount>,
}

impl CreateContractRequest {
    pub fn validate(&self) -> Result<(), CrmError> {
        let mut errors = ValidationErrorBuilder::new();
        errors.check("client_id", validate_uuid(&self.client_id, "client_id"));
        errors.finish()
    }

    pub fn resolved_remaining(&self) -> Amount {
        self.remaining_amount.unwrap_or(self.total_amount)
    }
}

/// Filters for contract listings
#[derive(Debug, Clone, Copy, Default)]
pub struct ContractFilter {
    pub unsigned_only: bool,
    /// Only contracts with something left to pay
    pub unpaid_only: bool,
}

impl ContractFilter {
    pub fn matches(&self, contract: &Contract) -> bool {
        (!self.unsigned_only || !contract.signed) && (!self.unpaid_only || !contract.is_fully_paid())
    }
}

#[derive(Debug, Clone, Default)]
pub struct UpdateContractRequest {
    pub total_amount: Option<Amount>,
    pub remaining_amount: Option<Amount>,
    pub signed: Option<bool>,
}

impl UpdateContractRequest {
    pub const FIELDS: [&'static str; 3] = ["total_amount", "remaining_amount", "signed"];

    pub fn from_changes(mut changes: FieldChanges) -> Result<Self, CrmError> {
        let mut errors = ValidationErrorBuilder::new();
        let mut req = Self::default();

        if let Some(total) = changes.take("total_amount") {
            req.total_amount = errors.check("total_amount", total.parse());
        }
        if let Some(remaining) = changes.take("remaining_amount") {
            req.remaining_amount = errors.check("remaining_amount", remaining.parse());
        }
        if let Some(signed) = changes.take("signed") {
            req.signed = errors.check("signed", parse_bool(&signed));
        }

        changes.reject_unknown(&mut errors, &Self::FIELDS);
        errors.finish()?;
        Ok(req)
    }

    pub fn is_empty(&self) -> bool {
        self.total_amount.is_none() && self.remaining_amount.is_none() && self.signed.is_none()
    }
}
