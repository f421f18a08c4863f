//! The signed request body every iVvy call carries.

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::config::Credentials;
use crate::signer::{canonical_payload, Signer};

const RESERVED_KEYS: [&str; 3] = ["apiKey", "timestamp", "signature"];

/// `{"apiKey", "timestamp", "signature", ...payload}` on the wire.
///
/// The signature covers the key, the timestamp and the canonical payload, so
/// an envelope is valid for exactly one send. Build a new one per request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchEnvelope {
    api_key: String,
    timestamp: u64,
    signature: String,
    #[serde(flatten)]
    payload: Map<String, Value>,
}

impl BatchEnvelope {
    /// Sign `payload` and wrap it. Payload entries that collide with the
    /// envelope's own fields are dropped before signing.
    pub fn seal<S: Signer + ?Sized>(
        credentials: &Credentials,
        signer: &S,
        timestamp: u64,
        mut payload: Map<String, Value>,
    ) -> Result<Self, serde_json::Error> {
        for key in strip_reserved(&mut payload) {
            warn!(key, "dropping payload entry that collides with an envelope field");
        }
        let canonical = canonical_payload(&payload)?;
        let signature = signer.sign(
            &credentials.api_key,
            &credentials.api_secret,
            timestamp,
            &canonical,
        );
        Ok(Self {
            api_key: credentials.api_key.clone(),
            timestamp,
            signature,
            payload,
        })
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Remove the envelope's own field names from `payload`, returning the keys
/// that were present.
fn strip_reserved(payload: &mut Map<String, Value>) -> Vec<&'static str> {
    RESERVED_KEYS
        .into_iter()
        .filter(|key| payload.remove(*key).is_some())
        .collect()
}
