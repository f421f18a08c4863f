//! The iVvy gateway: signs envelopes, dispatches jobs and batches, and
//! interprets what comes back.
//!
//! # Design
//! Every operation is split into a `build_*` method that produces an
//! `HttpRequest` for a given timestamp and a `parse_*` method that consumes
//! an `HttpResponse`. Both halves are pure and public. The composed
//! operations (`ping`, `run`, `result`, `get_*_list`) stamp the current time,
//! send through the `Transport` exactly once, and fold every failure into a
//! plain outcome (`false`, `None`, `BatchResult::Failed`) after logging it.
//! Polling for a pending batch is left to the caller.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::config::{Credentials, IvvyConfig};
use crate::envelope::BatchEnvelope;
use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse};
use crate::job::Job;
use crate::signer::{HmacSigner, Signer};
use crate::transport::{Transport, UreqTransport};
use crate::types::{BatchError, BatchResult, Company, Contact, Invoice, JobResult};

/// `specificCode` iVvy answers with while a batch is still running.
pub const NOT_COMPLETED_CODE: i64 = 24114;

/// Client for the iVvy API.
#[derive(Debug, Clone)]
pub struct Ivvy<T, S = HmacSigner> {
    credentials: Credentials,
    base_url: String,
    signer: S,
    transport: T,
}

impl Ivvy<UreqTransport, HmacSigner> {
    /// Production client: HMAC signing over a ureq transport.
    pub fn from_config(config: IvvyConfig) -> Self {
        let transport = UreqTransport::new(config.timeout);
        Self::new(config.credentials, &config.base_url, HmacSigner, transport)
    }
}

#[derive(Deserialize)]
struct RunBody {
    #[serde(rename = "asyncId")]
    async_id: Option<String>,
}

#[derive(Deserialize)]
struct ResultsBody<R> {
    results: Option<Vec<R>>,
}

impl<T: Transport, S: Signer> Ivvy<T, S> {
    pub fn new(credentials: Credentials, base_url: &str, signer: S, transport: T) -> Self {
        Self {
            credentials,
            base_url: base_url.trim_end_matches('/').to_string(),
            signer,
            transport,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, namespace: &str, action: &str) -> String {
        format!("{}/{namespace}?action={action}", self.base_url)
    }

    fn signed_request(
        &self,
        url: String,
        payload: Map<String, Value>,
        timestamp: u64,
    ) -> Result<HttpRequest, ApiError> {
        let envelope = BatchEnvelope::seal(&self.credentials, &self.signer, timestamp, payload)
            .and_then(|envelope| envelope.to_json())
            .map_err(|e| ApiError::Serialization(e.to_string()))?;
        Ok(HttpRequest::post_json(url, envelope))
    }

    /// A single job sent straight to its own endpoint, parameters as payload.
    pub fn build_call(&self, job: &Job, timestamp: u64) -> Result<HttpRequest, ApiError> {
        self.signed_request(
            self.endpoint(job.namespace(), job.action()),
            job.parameters().clone(),
            timestamp,
        )
    }

    /// A batch of jobs, executed server-side in slice order.
    pub fn build_run(&self, jobs: &[Job], timestamp: u64) -> Result<HttpRequest, ApiError> {
        let jobs = serde_json::to_value(jobs).map_err(|e| ApiError::Serialization(e.to_string()))?;
        let mut payload = Map::new();
        payload.insert("jobs".to_string(), jobs);
        self.signed_request(self.endpoint("batch", "run"), payload, timestamp)
    }

    pub fn build_result(&self, async_id: &str, timestamp: u64) -> Result<HttpRequest, ApiError> {
        let mut payload = Map::new();
        payload.insert("asyncId".to_string(), Value::String(async_id.to_string()));
        self.signed_request(self.endpoint("batch", "results"), payload, timestamp)
    }

    pub fn parse_ping(&self, response: HttpResponse) -> bool {
        response.is_ok()
    }

    pub fn parse_run(&self, response: HttpResponse) -> Result<String, ApiError> {
        check_status(&response)?;
        let body: RunBody = serde_json::from_str(&response.body)
            .map_err(|e| ApiError::Deserialization(e.to_string()))?;
        body.async_id.ok_or(ApiError::MissingField("asyncId"))
    }

    pub fn parse_result(&self, response: HttpResponse) -> BatchResult {
        match response.status {
            200 => match serde_json::from_str::<ResultsBody<JobResult>>(&response.body) {
                Ok(ResultsBody {
                    results: Some(results),
                }) => BatchResult::Completed(results),
                Ok(_) => {
                    warn!("batch result is missing `results`");
                    BatchResult::Failed(BatchError::Unknown)
                }
                Err(e) => {
                    warn!(error = %e, "batch result body is not valid JSON");
                    BatchResult::Failed(BatchError::Unknown)
                }
            },
            400 if specific_code(&response.body) == Some(NOT_COMPLETED_CODE) => {
                BatchResult::Failed(BatchError::NotCompleted)
            }
            status => {
                warn!(status, "batch result request failed");
                BatchResult::Failed(BatchError::Unknown)
            }
        }
    }

    /// Decode the `results` array of a list response, one model per entry,
    /// in response order.
    pub fn parse_list<M: DeserializeOwned>(&self, response: HttpResponse) -> Result<Vec<M>, ApiError> {
        check_status(&response)?;
        let body: ResultsBody<M> = serde_json::from_str(&response.body)
            .map_err(|e| ApiError::Deserialization(e.to_string()))?;
        body.results.ok_or(ApiError::MissingField("results"))
    }

    fn dispatch(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        debug!(url = %request.url, "sending iVvy request");
        Ok(self.transport.send(&request)?)
    }

    /// True iff the API answered the ping job with HTTP 200.
    pub fn ping(&self) -> bool {
        match self
            .build_call(&Job::ping(), unix_timestamp())
            .and_then(|request| self.dispatch(request))
        {
            Ok(response) => {
                let status = response.status;
                let reachable = self.parse_ping(response);
                if !reachable {
                    warn!(status, "ping rejected");
                }
                reachable
            }
            Err(e) => {
                warn!(error = %e, "ping failed");
                false
            }
        }
    }

    /// Submit `jobs` as one batch and return its `asyncId`.
    ///
    /// `None` covers both an unreachable server and a rejected batch; use
    /// `build_run` / `parse_run` to tell them apart.
    pub fn run(&self, jobs: &[Job]) -> Option<String> {
        if jobs.is_empty() {
            warn!("refusing to submit an empty batch");
            return None;
        }
        let outcome = self
            .build_run(jobs, unix_timestamp())
            .and_then(|request| self.dispatch(request))
            .and_then(|response| self.parse_run(response));
        match outcome {
            Ok(async_id) => {
                info!(async_id = %async_id, jobs = jobs.len(), "batch accepted");
                Some(async_id)
            }
            Err(e) => {
                warn!(error = %e, jobs = jobs.len(), "batch submission failed");
                None
            }
        }
    }

    /// Poll once for the outcome of a submitted batch.
    pub fn result(&self, async_id: &str) -> BatchResult {
        match self
            .build_result(async_id, unix_timestamp())
            .and_then(|request| self.dispatch(request))
        {
            Ok(response) => self.parse_result(response),
            Err(e) => {
                warn!(error = %e, async_id, "batch result poll failed");
                BatchResult::Failed(BatchError::Unknown)
            }
        }
    }

    /// Run a list job directly and decode its `results` into models.
    pub fn get_list<M: DeserializeOwned>(&self, job: &Job) -> Option<Vec<M>> {
        let outcome = self
            .build_call(job, unix_timestamp())
            .and_then(|request| self.dispatch(request))
            .and_then(|response| self.parse_list(response));
        match outcome {
            Ok(items) => Some(items),
            Err(e) => {
                warn!(
                    error = %e,
                    namespace = job.namespace(),
                    action = job.action(),
                    "list request failed"
                );
                None
            }
        }
    }

    pub fn get_company_list(&self) -> Option<Vec<Company>> {
        self.get_list(&Job::new("contact", "getCompanyList"))
    }

    pub fn get_contact_list(&self) -> Option<Vec<Contact>> {
        self.get_list(&Job::new("contact", "getContactList"))
    }

    pub fn get_invoice_list(&self) -> Option<Vec<Invoice>> {
        self.get_list(&Job::new("invoice", "getInvoiceList"))
    }
}

fn check_status(response: &HttpResponse) -> Result<(), ApiError> {
    if response.is_ok() {
        return Ok(());
    }
    Err(ApiError::HttpStatus {
        status: response.status,
        body: response.body.clone(),
    })
}

/// `specificCode` of an error body, accepting a number or a numeric string.
fn specific_code(body: &str) -> Option<i64> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("specificCode")? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use serde_json::json;
    use std::sync::Mutex;

    /// Answers every request with the same canned outcome and records what
    /// it was sent.
    struct StubTransport {
        outcome: Result<HttpResponse, TransportError>,
        sent: Mutex<Vec<HttpRequest>>,
    }

    impl StubTransport {
        fn respond(status: u16, body: &str) -> Self {
            Self {
                outcome: Ok(HttpResponse::new(status, body)),
                sent: Mutex::new(Vec::new()),
            }
        }

        fn fail(err: TransportError) -> Self {
            Self {
                outcome: Err(err),
                sent: Mutex::new(Vec::new()),
            }
        }

        fn sent(&self) -> Vec<HttpRequest> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Transport for StubTransport {
        fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
            self.sent.lock().unwrap().push(request.clone());
            self.outcome.clone()
        }
    }

    struct FixedSigner;

    impl Signer for FixedSigner {
        fn sign(&self, _: &str, _: &str, _: u64, _: &[u8]) -> String {
            "baz".to_string()
        }
    }

    fn ivvy(transport: &StubTransport) -> Ivvy<&StubTransport, FixedSigner> {
        Ivvy::new(
            Credentials::new("foo", "bar"),
            "https://api.ivvy.com/api/1.0/",
            FixedSigner,
            transport,
        )
    }

    fn sent_body(transport: &StubTransport) -> Value {
        let sent = transport.sent();
        assert_eq!(sent.len(), 1, "exactly one request per operation");
        serde_json::from_str(&sent[0].body).unwrap()
    }

    // --- ping ---

    #[test]
    fn ping_success() {
        let transport = StubTransport::respond(200, "");
        assert!(ivvy(&transport).ping());

        let sent = transport.sent();
        assert_eq!(sent[0].url, "https://api.ivvy.com/api/1.0/test?action=ping");
        let body = sent_body(&transport);
        assert_eq!(body["apiKey"], "foo");
        assert_eq!(body["signature"], "baz");
        assert!(body["timestamp"].is_u64());
    }

    #[test]
    fn ping_failure_on_non_200() {
        for status in [201, 400, 401, 404, 500] {
            let transport = StubTransport::respond(status, "");
            assert!(!ivvy(&transport).ping(), "status {status}");
        }
    }

    #[test]
    fn ping_failure_on_transport_error() {
        let transport = StubTransport::fail(TransportError::Timeout);
        assert!(!ivvy(&transport).ping());
    }

    // --- run ---

    #[test]
    fn batch_run_success() {
        let transport = StubTransport::respond(200, r#"{"asyncId":"foo"}"#);
        let jobs = [Job::new("foo", "bar"), Job::new("baz", "qux")];
        assert_eq!(ivvy(&transport).run(&jobs).as_deref(), Some("foo"));
    }

    #[test]
    fn batch_run_preserves_job_order() {
        let transport = StubTransport::respond(200, r#"{"asyncId":"foo"}"#);
        let jobs = [Job::new("foo", "bar"), Job::new("baz", "qux"), Job::new("a", "b")];
        ivvy(&transport).run(&jobs);

        assert_eq!(transport.sent()[0].url, "https://api.ivvy.com/api/1.0/batch?action=run");
        let body = sent_body(&transport);
        assert_eq!(
            body["jobs"],
            json!([
                {"namespace": "foo", "action": "bar", "parameters": {}},
                {"namespace": "baz", "action": "qux", "parameters": {}},
                {"namespace": "a", "action": "b", "parameters": {}},
            ])
        );
    }

    #[test]
    fn batch_run_failure() {
        let transport = StubTransport::respond(400, "");
        let jobs = [Job::new("foo", "bar"), Job::new("baz", "qux")];
        assert!(ivvy(&transport).run(&jobs).is_none());
    }

    #[test]
    fn batch_run_without_async_id_is_none() {
        let transport = StubTransport::respond(200, r#"{"accepted":true}"#);
        assert!(ivvy(&transport).run(&[Job::new("foo", "bar")]).is_none());
    }

    #[test]
    fn batch_run_transport_error_is_none() {
        let transport = StubTransport::fail(TransportError::Connection("refused".to_string()));
        assert!(ivvy(&transport).run(&[Job::new("foo", "bar")]).is_none());
    }

    #[test]
    fn empty_batch_is_never_sent() {
        let transport = StubTransport::respond(200, r#"{"asyncId":"foo"}"#);
        assert!(ivvy(&transport).run(&[]).is_none());
        assert!(transport.sent().is_empty());
    }

    #[test]
    fn parse_run_distinguishes_failures() {
        let transport = StubTransport::respond(200, "");
        let client = ivvy(&transport);
        assert!(matches!(
            client.parse_run(HttpResponse::new(403, "denied")),
            Err(ApiError::HttpStatus { status: 403, .. })
        ));
        assert!(matches!(
            client.parse_run(HttpResponse::new(200, "{}")),
            Err(ApiError::MissingField("asyncId"))
        ));
        assert!(matches!(
            client.parse_run(HttpResponse::new(200, "not json")),
            Err(ApiError::Deserialization(_))
        ));
    }

    // --- result ---

    #[test]
    fn batch_result_success() {
        let transport = StubTransport::respond(
            200,
            r#"{"results":[{"namespace":"foo","action":"bar","request":{},"response":{}}]}"#,
        );
        let result = ivvy(&transport).result("foobar");

        assert!(result.success());
        assert_eq!(
            result,
            BatchResult::Completed(vec![JobResult {
                namespace: "foo".to_string(),
                action: "bar".to_string(),
                request: json!({}),
                response: json!({}),
            }])
        );

        assert_eq!(transport.sent()[0].url, "https://api.ivvy.com/api/1.0/batch?action=results");
        assert_eq!(sent_body(&transport)["asyncId"], "foobar");
    }

    #[test]
    fn batch_result_not_completed() {
        let transport = StubTransport::respond(400, r#"{"errorCode":400,"specificCode":24114}"#);
        let result = ivvy(&transport).result("foobar");
        assert_eq!(result, BatchResult::Failed(BatchError::NotCompleted));
        assert!(result.is_pending());
    }

    #[test]
    fn batch_result_failure_without_body() {
        let transport = StubTransport::respond(400, "");
        let result = ivvy(&transport).result("foobar");
        assert!(!result.success());
        assert_eq!(result.error(), Some(BatchError::Unknown));
    }

    #[test]
    fn batch_result_failure_with_other_specific_code() {
        let transport = StubTransport::respond(400, r#"{"errorCode":400,"specificCode":24115}"#);
        assert_eq!(ivvy(&transport).result("foobar").error(), Some(BatchError::Unknown));
    }

    #[test]
    fn batch_result_other_status_is_unknown() {
        let transport = StubTransport::respond(500, r#"{"errorCode":500,"specificCode":24114}"#);
        assert_eq!(ivvy(&transport).result("foobar").error(), Some(BatchError::Unknown));
    }

    #[test]
    fn batch_result_200_without_results_is_unknown() {
        let transport = StubTransport::respond(200, r#"{"asyncId":"foobar"}"#);
        assert_eq!(ivvy(&transport).result("foobar").error(), Some(BatchError::Unknown));
    }

    #[test]
    fn batch_result_transport_error_is_unknown() {
        let transport = StubTransport::fail(TransportError::Timeout);
        assert_eq!(ivvy(&transport).result("foobar").error(), Some(BatchError::Unknown));
    }

    #[test]
    fn specific_code_accepts_numeric_string() {
        assert_eq!(specific_code(r#"{"specificCode":"24114"}"#), Some(24114));
        assert_eq!(specific_code(r#"{"specificCode":null}"#), None);
        assert_eq!(specific_code(""), None);
    }

    // --- lists ---

    #[test]
    fn get_company_list_success() {
        let transport = StubTransport::respond(
            200,
            r#"{"results":[{"businessName":"foo"},{"businessName":"bar"}]}"#,
        );
        let companies = ivvy(&transport).get_company_list().unwrap();

        assert_eq!(companies.len(), 2);
        assert_eq!(companies[0].business_name.as_deref(), Some("foo"));
        assert_eq!(companies[1].business_name.as_deref(), Some("bar"));
        assert_eq!(
            transport.sent()[0].url,
            "https://api.ivvy.com/api/1.0/contact?action=getCompanyList"
        );
    }

    #[test]
    fn get_company_list_fail() {
        let transport = StubTransport::respond(400, "");
        assert!(ivvy(&transport).get_company_list().is_none());
    }

    #[test]
    fn get_invoice_list_success() {
        let transport =
            StubTransport::respond(200, r#"{"results":[{"reference":"foo"},{"reference":"bar"}]}"#);
        let invoices = ivvy(&transport).get_invoice_list().unwrap();

        assert_eq!(invoices.len(), 2);
        assert_eq!(invoices[0].reference.as_deref(), Some("foo"));
        assert_eq!(invoices[1].reference.as_deref(), Some("bar"));
        assert_eq!(
            transport.sent()[0].url,
            "https://api.ivvy.com/api/1.0/invoice?action=getInvoiceList"
        );
    }

    #[test]
    fn get_invoice_list_fail() {
        let transport = StubTransport::respond(400, "");
        assert!(ivvy(&transport).get_invoice_list().is_none());
    }

    #[test]
    fn get_contact_list_success() {
        let transport = StubTransport::respond(
            200,
            r#"{"meta":{"count":1},"results":[{"id":4,"firstName":"Ada","lastName":"Lovelace"}]}"#,
        );
        let contacts = ivvy(&transport).get_contact_list().unwrap();
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].id, Some(4));
    }

    #[test]
    fn list_with_malformed_body_is_none() {
        let transport = StubTransport::respond(200, r#"{"results":"nope"}"#);
        assert!(ivvy(&transport).get_company_list().is_none());
    }

    #[test]
    fn list_without_results_is_none() {
        let transport = StubTransport::respond(200, "{}");
        assert!(ivvy(&transport).get_company_list().is_none());
    }

    // --- build ---

    #[test]
    fn build_call_sends_job_parameters_as_payload() {
        let transport = StubTransport::respond(200, "");
        let mut params = Map::new();
        params.insert("businessName".to_string(), json!("Acme"));
        let job = Job::with_parameters("contact", "addOrUpdateCompany", params);

        let request = ivvy(&transport).build_call(&job, 1_700_000_000).unwrap();
        assert_eq!(
            request.headers,
            vec![("content-type".to_string(), "application/json".to_string())]
        );
        let body: Value = serde_json::from_str(&request.body).unwrap();
        assert_eq!(
            body,
            json!({
                "apiKey": "foo",
                "timestamp": 1_700_000_000u64,
                "signature": "baz",
                "businessName": "Acme",
            })
        );
    }

    #[test]
    fn trailing_slash_is_stripped() {
        let transport = StubTransport::respond(200, "");
        assert_eq!(ivvy(&transport).base_url(), "https://api.ivvy.com/api/1.0");
    }

    #[test]
    fn from_config_uses_configured_base_url() {
        let config = IvvyConfig::new("key", "secret").with_base_url("http://localhost:3000/api/1.0/");
        assert_eq!(Ivvy::from_config(config).base_url(), "http://localhost:3000/api/1.0");
    }
}
