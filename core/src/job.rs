//! Jobs: one logical remote call each, and the factory that validates records
//! before turning them into jobs.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ValidationError;
use crate::types::{to_parameters, Company, Contact};
use crate::validator::{
    AddCompanyValidator, AddContactValidator, UpdateCompanyValidator, UpdateContactValidator,
    Validator,
};

/// A single remote call: `namespace.action` with its parameters.
///
/// Serializes to the wire shape `{"namespace", "action", "parameters"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    namespace: String,
    action: String,
    #[serde(default)]
    parameters: Map<String, Value>,
}

impl Job {
    pub fn new(namespace: impl Into<String>, action: impl Into<String>) -> Self {
        Self::with_parameters(namespace, action, Map::new())
    }

    /// `test.ping`, which takes no parameters.
    pub fn ping() -> Self {
        Self::new("test", "ping")
    }

    pub fn with_parameters(
        namespace: impl Into<String>,
        action: impl Into<String>,
        parameters: Map<String, Value>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            action: action.into(),
            parameters,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn parameters(&self) -> &Map<String, Value> {
        &self.parameters
    }
}

/// Builds jobs for the operations the SDK knows about.
///
/// Every record-carrying job is validated first; a record with violations
/// never becomes a job.
pub struct JobFactory {
    add_company: Box<dyn Validator<Company>>,
    update_company: Box<dyn Validator<Company>>,
    add_contact: Box<dyn Validator<Contact>>,
    update_contact: Box<dyn Validator<Contact>>,
}

impl Default for JobFactory {
    fn default() -> Self {
        Self::new(
            Box::new(AddCompanyValidator),
            Box::new(UpdateCompanyValidator),
            Box::new(AddContactValidator),
            Box::new(UpdateContactValidator),
        )
    }
}

impl JobFactory {
    pub fn new(
        add_company: Box<dyn Validator<Company>>,
        update_company: Box<dyn Validator<Company>>,
        add_contact: Box<dyn Validator<Contact>>,
        update_contact: Box<dyn Validator<Contact>>,
    ) -> Self {
        Self {
            add_company,
            update_company,
            add_contact,
            update_contact,
        }
    }

    pub fn ping_job(&self) -> Job {
        Job::ping()
    }

    pub fn add_company_job(&self, company: &Company) -> Result<Job, ValidationError> {
        check(&*self.add_company, company)?;
        record_job("addOrUpdateCompany", company)
    }

    pub fn update_company_job(&self, company: &Company) -> Result<Job, ValidationError> {
        check(&*self.update_company, company)?;
        record_job("addOrUpdateCompany", company)
    }

    pub fn add_contact_job(&self, contact: &Contact) -> Result<Job, ValidationError> {
        check(&*self.add_contact, contact)?;
        record_job("addOrUpdateContact", contact)
    }

    pub fn update_contact_job(&self, contact: &Contact) -> Result<Job, ValidationError> {
        check(&*self.update_contact, contact)?;
        record_job("addOrUpdateContact", contact)
    }
}

fn check<E>(validator: &dyn Validator<E>, entity: &E) -> Result<(), ValidationError> {
    let messages = validator.validate(entity);
    if messages.is_empty() {
        Ok(())
    } else {
        Err(ValidationError { messages })
    }
}

// iVvy adds and updates through the same action; the id decides which.
// A record that cannot be encoded is rejected like any other invalid record.
fn record_job<R: Serialize>(action: &str, record: &R) -> Result<Job, ValidationError> {
    let parameters = to_parameters(record).map_err(|e| ValidationError {
        messages: vec![format!("record cannot be encoded: {e}")],
    })?;
    Ok(Job::with_parameters("contact", action, parameters))
}
