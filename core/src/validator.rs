//! Business rules checked before a record is turned into a job.

use crate::types::{Company, Contact};

/// Checks an entity and returns every rule it violates, in rule order.
pub trait Validator<E> {
    fn validate(&self, entity: &E) -> Vec<String>;
}

impl<E, F> Validator<E> for F
where
    F: Fn(&E) -> Vec<String>,
{
    fn validate(&self, entity: &E) -> Vec<String> {
        self(entity)
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

fn check_email(email: &Option<String>, violations: &mut Vec<String>) {
    if let Some(email) = email {
        if !email.contains('@') {
            violations.push(format!("'{email}' is not a valid email address"));
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AddCompanyValidator;

impl Validator<Company> for AddCompanyValidator {
    fn validate(&self, company: &Company) -> Vec<String> {
        let mut violations = Vec::new();
        if company.id.is_some() {
            violations.push("A new Company cannot have an id".to_string());
        }
        if is_blank(&company.business_name) {
            violations.push("A Company needs a business name".to_string());
        }
        violations
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateCompanyValidator;

impl Validator<Company> for UpdateCompanyValidator {
    fn validate(&self, company: &Company) -> Vec<String> {
        let mut violations = Vec::new();
        if company.id.is_none() {
            violations.push("An id is needed to update a Company".to_string());
        }
        violations
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AddContactValidator;

impl Validator<Contact> for AddContactValidator {
    fn validate(&self, contact: &Contact) -> Vec<String> {
        let mut violations = Vec::new();
        if contact.id.is_some() {
            violations.push("A new Contact cannot have an id".to_string());
        }
        if is_blank(&contact.first_name) {
            violations.push("A Contact needs a first name".to_string());
        }
        if is_blank(&contact.last_name) {
            violations.push("A Contact needs a last name".to_string());
        }
        check_email(&contact.email, &mut violations);
        violations
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateContactValidator;

impl Validator<Contact> for UpdateContactValidator {
    fn validate(&self, contact: &Contact) -> Vec<String> {
        let mut violations = Vec::new();
        if contact.id.is_none() {
            violations.push("An id is needed to update a Contact".to_string());
        }
        check_email(&contact.email, &mut violations);
        violations
    }
}
