//! Client SDK for the iVvy event and booking management API.
//!
//! # Overview
//! Logical API calls are `Job`s. A `JobFactory` validates domain records
//! before turning them into jobs, and `Ivvy` signs, batches and dispatches
//! them, then decodes what comes back: an `asyncId` for a submitted batch,
//! a `BatchResult` when polling it, or typed model lists.
//!
//! # Design
//! - Every request body is a `BatchEnvelope` sealed with a fresh timestamp
//!   and an HMAC signature over the canonical payload.
//! - `Ivvy` splits each operation into pure `build_*` / `parse_*` halves;
//!   the network round-trip goes through the `Transport` trait.
//! - The composed operations never return errors: failures are logged with
//!   `tracing` and reported as `false`, `None` or `BatchResult::Failed`.
//! - The client never polls on its own. A `BatchError::NotCompleted` result
//!   means the caller should ask again later.

pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod http;
pub mod job;
pub mod signer;
pub mod transport;
pub mod types;
pub mod validator;

pub use client::{Ivvy, NOT_COMPLETED_CODE};
pub use config::{Credentials, IvvyConfig};
pub use envelope::BatchEnvelope;
pub use error::{ApiError, ConfigError, TransportError, ValidationError};
pub use http::{HttpRequest, HttpResponse};
pub use job::{Job, JobFactory};
pub use signer::{HmacSigner, Signer};
pub use transport::{Transport, UreqTransport};
pub use types::{Address, BatchError, BatchResult, Company, Contact, Invoice, JobResult};
pub use validator::{
    AddCompanyValidator, AddContactValidator, UpdateCompanyValidator, UpdateContactValidator,
    Validator,
};
