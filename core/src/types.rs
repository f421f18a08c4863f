//! Domain records and batch result types for the iVvy API.
//!
//! # Design
//! Every model field is optional: the same record is used to submit partial
//! updates and to decode list responses, where iVvy omits empty fields.
//! Unknown fields are ignored on decode and absent fields are omitted on
//! encode, so `to_parameters` yields exactly what the caller set.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Postal address attached to a company.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
}

/// A company in the iVvy contact book.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trading_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fax: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
}

/// A person in the iVvy contact book.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mobile: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_id: Option<u64>,
}

/// An invoice issued from iVvy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_tax_cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount_paid: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_date: Option<String>,
}

/// Canonical field map of a record, used as job parameters.
///
/// # Errors
/// Fails if the record does not serialize, or serializes to something other
/// than a JSON object.
pub fn to_parameters<T: Serialize>(record: &T) -> Result<Map<String, Value>, serde_json::Error> {
    match serde_json::to_value(record)? {
        Value::Object(map) => Ok(map),
        other => Err(<serde_json::Error as serde::ser::Error>::custom(format!(
            "expected a JSON object for job parameters, got {other}"
        ))),
    }
}

/// Outcome of one job inside a completed batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    pub namespace: String,
    pub action: String,
    #[serde(default)]
    pub request: Value,
    #[serde(default)]
    pub response: Value,
}

impl JobResult {
    /// The `errorCode` of this job's response, if the job itself failed.
    ///
    /// A batch can complete while individual jobs in it were rejected.
    pub fn error_code(&self) -> Option<i64> {
        self.response.get("errorCode").and_then(Value::as_i64)
    }
}

/// Why a batch result could not be returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchError {
    /// The server is still processing the batch; poll again later.
    NotCompleted,
    Unknown,
}

impl BatchError {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchError::NotCompleted => "not_completed",
            BatchError::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for BatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoded response of a batch result poll.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchResult {
    Completed(Vec<JobResult>),
    Failed(BatchError),
}

impl BatchResult {
    pub fn success(&self) -> bool {
        matches!(self, BatchResult::Completed(_))
    }

    pub fn results(&self) -> Option<&[JobResult]> {
        match self {
            BatchResult::Completed(results) => Some(results),
            BatchResult::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<BatchError> {
        match self {
            BatchResult::Completed(_) => None,
            BatchResult::Failed(err) => Some(*err),
        }
    }

    /// True only for the state in which re-polling makes sense.
    pub fn is_pending(&self) -> bool {
        matches!(self, BatchResult::Failed(BatchError::NotCompleted))
    }
}
