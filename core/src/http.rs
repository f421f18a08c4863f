//! HTTP request and response values.
//!
//! # Design
//! Requests and responses are plain data. `Ivvy` builds `HttpRequest` values
//! and parses `HttpResponse` values without touching the network; a
//! `Transport` performs the round-trip in between. Tests construct
//! `HttpResponse` values directly instead of mocking an HTTP library.

/// A signed iVvy call described as plain data.
///
/// Every iVvy endpoint takes a `POST` with a JSON body, so the method is
/// implied.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpRequest {
    /// A `POST` carrying a JSON body.
    pub fn post_json(url: String, body: String) -> Self {
        Self {
            url,
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body,
        }
    }
}

/// An HTTP response described as plain data.
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    /// A response with the given status and body and no headers.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}
