use std::{collections::HashMap, sync::Arc};

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use sha2::Sha256;
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

/// `specificCode` for a batch that has not finished yet.
pub const NOT_COMPLETED: u32 = 24114;
/// `specificCode` for an `asyncId` the server never issued.
pub const UNKNOWN_BATCH: u32 = 24113;

/// Credentials the mock accepts.
#[derive(Clone, Debug)]
pub struct MockConfig {
    pub api_key: String,
    pub api_secret: String,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            api_key: "test-key".to_string(),
            api_secret: "test-secret".to_string(),
        }
    }
}

struct Batch {
    results: Vec<Value>,
    pending_polls: u32,
}

#[derive(Default)]
struct Store {
    companies: Vec<Map<String, Value>>,
    contacts: Vec<Map<String, Value>>,
    invoices: Vec<Map<String, Value>>,
    batches: HashMap<String, Batch>,
    next_id: u64,
}

struct AppState {
    config: MockConfig,
    store: RwLock<Store>,
}

type Shared = Arc<AppState>;

#[derive(Deserialize)]
struct ActionQuery {
    action: String,
}

#[derive(Deserialize)]
struct WireJob {
    namespace: String,
    action: String,
    #[serde(default)]
    parameters: Map<String, Value>,
}

/// An iVvy-style error body with its HTTP status.
#[derive(Debug)]
struct Failure {
    status: StatusCode,
    specific_code: u32,
    message: String,
}

impl Failure {
    fn new(status: StatusCode, specific_code: u32, message: impl Into<String>) -> Self {
        Self {
            status,
            specific_code,
            message: message.into(),
        }
    }

    fn body(&self) -> Value {
        json!({
            "errorCode": self.status.as_u16(),
            "specificCode": self.specific_code,
            "message": self.message,
        })
    }
}

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        (self.status, Json(self.body())).into_response()
    }
}

/// The signing scheme iVvy clients use: hex HMAC-SHA256 over
/// `apiKey\ntimestamp\npayload`, keyed with the secret.
pub fn sign(api_key: &str, api_secret: &str, timestamp: u64, payload: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(api_secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(format!("{api_key}\n{timestamp}\n").as_bytes());
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

pub fn app(config: MockConfig) -> Router {
    let mut store = Store::default();
    seed_invoices(&mut store);
    let state = Arc::new(AppState {
        config,
        store: RwLock::new(store),
    });
    Router::new()
        .route("/api/1.0/{namespace}", post(dispatch))
        .with_state(state)
}

pub async fn run(listener: TcpListener, config: MockConfig) -> Result<(), std::io::Error> {
    axum::serve(listener, app(config)).await
}

fn seed_invoices(store: &mut Store) {
    for (reference, total) in [("INV-1001", 110.0), ("INV-1002", 42.5)] {
        store.next_id += 1;
        let invoice = json!({
            "id": store.next_id,
            "reference": reference,
            "title": format!("Invoice {reference}"),
            "currency": "AUD",
            "totalCost": total,
            "amountPaid": 0,
            "status": 1,
        });
        if let Value::Object(map) = invoice {
            store.invoices.push(map);
        }
    }
}

async fn dispatch(
    State(state): State<Shared>,
    Path(namespace): Path<String>,
    Query(query): Query<ActionQuery>,
    body: Bytes,
) -> Response {
    let payload = match open_envelope(&state.config, &body) {
        Ok(payload) => payload,
        Err(failure) => {
            tracing::warn!(namespace = %namespace, action = %query.action, message = %failure.message, "rejected request");
            return failure.into_response();
        }
    };
    tracing::debug!(namespace = %namespace, action = %query.action, "request");

    let mut store = state.store.write().await;
    let outcome = match (namespace.as_str(), query.action.as_str()) {
        ("batch", "run") => run_batch(&mut store, payload),
        ("batch", "results") => batch_results(&mut store, &payload),
        (namespace, action) => execute(&mut store, namespace, action, payload),
    };
    match outcome {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(failure) => failure.into_response(),
    }
}

/// Check credentials and signature, returning the payload without the
/// envelope fields.
fn open_envelope(config: &MockConfig, body: &[u8]) -> Result<Map<String, Value>, Failure> {
    let unauthorized = |msg: &str| Failure::new(StatusCode::UNAUTHORIZED, 24010, msg);

    let mut payload = match serde_json::from_slice(body) {
        Ok(Value::Object(map)) => map,
        _ => return Err(Failure::new(StatusCode::BAD_REQUEST, 24001, "body must be a JSON object")),
    };
    let api_key = payload.remove("apiKey");
    let timestamp = payload.remove("timestamp");
    let signature = payload.remove("signature");

    let api_key = api_key.as_ref().and_then(Value::as_str).ok_or_else(|| unauthorized("missing apiKey"))?;
    let timestamp = timestamp.as_ref().and_then(Value::as_u64).ok_or_else(|| unauthorized("missing timestamp"))?;
    let signature = signature.as_ref().and_then(Value::as_str).ok_or_else(|| unauthorized("missing signature"))?;

    if api_key != config.api_key {
        return Err(unauthorized("unknown apiKey"));
    }
    let canonical = serde_json::to_vec(&payload)
        .map_err(|e| Failure::new(StatusCode::BAD_REQUEST, 24001, e.to_string()))?;
    if sign(api_key, &config.api_secret, timestamp, &canonical) != signature {
        return Err(unauthorized("signature mismatch"));
    }
    Ok(payload)
}

fn run_batch(store: &mut Store, mut payload: Map<String, Value>) -> Result<Value, Failure> {
    let jobs: Vec<WireJob> = payload
        .remove("jobs")
        .map(serde_json::from_value::<Vec<WireJob>>)
        .transpose()
        .map_err(|e| Failure::new(StatusCode::BAD_REQUEST, 24002, format!("invalid jobs: {e}")))?
        .ok_or_else(|| Failure::new(StatusCode::BAD_REQUEST, 24002, "missing jobs"))?;

    let results = jobs
        .into_iter()
        .map(|job| {
            let request = Value::Object(job.parameters.clone());
            let response = match execute(store, &job.namespace, &job.action, job.parameters) {
                Ok(response) => response,
                Err(failure) => failure.body(),
            };
            json!({
                "namespace": job.namespace,
                "action": job.action,
                "request": request,
                "response": response,
            })
        })
        .collect::<Vec<_>>();

    let async_id = Uuid::new_v4().to_string();
    tracing::info!(async_id = %async_id, jobs = results.len(), "batch queued");
    store.batches.insert(
        async_id.clone(),
        Batch {
            results,
            pending_polls: 1,
        },
    );
    Ok(json!({ "asyncId": async_id }))
}

fn batch_results(store: &mut Store, payload: &Map<String, Value>) -> Result<Value, Failure> {
    let async_id = payload
        .get("asyncId")
        .and_then(Value::as_str)
        .ok_or_else(|| Failure::new(StatusCode::BAD_REQUEST, 24002, "missing asyncId"))?;
    let batch = store
        .batches
        .get_mut(async_id)
        .ok_or_else(|| Failure::new(StatusCode::BAD_REQUEST, UNKNOWN_BATCH, "unknown asyncId"))?;

    if batch.pending_polls > 0 {
        batch.pending_polls -= 1;
        return Err(Failure::new(StatusCode::BAD_REQUEST, NOT_COMPLETED, "batch not completed"));
    }
    Ok(json!({ "results": batch.results }))
}

/// Run one job against the store.
fn execute(
    store: &mut Store,
    namespace: &str,
    action: &str,
    parameters: Map<String, Value>,
) -> Result<Value, Failure> {
    match (namespace, action) {
        ("test", "ping") => Ok(json!({ "success": true })),
        ("contact", "addOrUpdateCompany") => upsert(store, Collection::Companies, parameters),
        ("contact", "addOrUpdateContact") => upsert(store, Collection::Contacts, parameters),
        ("contact", "getCompanyList") => Ok(list(&store.companies)),
        ("contact", "getContactList") => Ok(list(&store.contacts)),
        ("invoice", "getInvoiceList") => Ok(list(&store.invoices)),
        _ => Err(Failure::new(
            StatusCode::NOT_FOUND,
            24404,
            format!("unknown action {namespace}.{action}"),
        )),
    }
}

#[derive(Clone, Copy)]
enum Collection {
    Companies,
    Contacts,
}

fn upsert(store: &mut Store, collection: Collection, record: Map<String, Value>) -> Result<Value, Failure> {
    let id = match record.get("id").and_then(Value::as_u64) {
        Some(id) => {
            let rows = match collection {
                Collection::Companies => &mut store.companies,
                Collection::Contacts => &mut store.contacts,
            };
            let row = rows
                .iter_mut()
                .find(|row| row.get("id").and_then(Value::as_u64) == Some(id))
                .ok_or_else(|| Failure::new(StatusCode::NOT_FOUND, 24405, format!("no record with id {id}")))?;
            row.extend(record);
            id
        }
        None => {
            store.next_id += 1;
            let id = store.next_id;
            let mut row = record;
            row.insert("id".to_string(), json!(id));
            match collection {
                Collection::Companies => store.companies.push(row),
                Collection::Contacts => store.contacts.push(row),
            }
            id
        }
    };
    Ok(json!({ "success": true, "id": id }))
}

fn list(rows: &[Map<String, Value>]) -> Value {
    json!({
        "meta": {
            "totalResults": rows.len(),
            "start": 0,
            "perPage": rows.len(),
            "count": rows.len(),
        },
        "results": rows,
    })
}
