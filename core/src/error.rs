//! Error types for the iVvy client.
//!
//! # Design
//! Each concern gets its own enum. `ValidationError` never reaches the
//! network layer, `TransportError` comes out of a `Transport`, and `ApiError`
//! is what the pure `build_*` / `parse_*` layer of `Ivvy` reports. The
//! composed gateway operations (`ping`, `run`, `result`, list getters) log
//! these and collapse them into `bool` / `Option` / `BatchResult` values, so
//! callers of those operations never handle an error directly.

use thiserror::Error;

/// A domain object failed one or more business rules.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("validation failed: {}", .messages.join("; "))]
pub struct ValidationError {
    pub messages: Vec<String>,
}

/// Failure to get any HTTP response at all.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The request did not complete within the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// Connection refused, DNS failure, TLS failure and the like.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The response body could not be read.
    #[error("failed to read response body: {0}")]
    Body(String),
}

/// Errors reported by the `build_*` / `parse_*` halves of `Ivvy`.
#[derive(Error, Debug)]
pub enum ApiError {
    /// The server answered with a status other than the expected one.
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// The response body was not the JSON shape we expected.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// A 200 body parsed fine but lacked a required field.
    #[error("response is missing `{0}`")]
    MissingField(&'static str),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Problems loading an `IvvyConfig` from the environment.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),

    /// A variable is present but does not deserialize into its setting.
    #[error("failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),
}
