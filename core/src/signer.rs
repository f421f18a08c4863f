//! Request signing.
//!
//! The string to sign is `apiKey`, the decimal timestamp and the canonical
//! payload joined by `\n`. The signature is the lowercase hex HMAC-SHA256 of
//! that string keyed with the API secret.
//!
//! The canonical payload is compact JSON with object keys sorted at every
//! level, so the server can re-derive it from the envelope it receives.

use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Computes the signature bound into every request envelope.
pub trait Signer {
    fn sign(&self, api_key: &str, api_secret: &str, timestamp: u64, payload: &[u8]) -> String;
}

/// The signing scheme the iVvy API expects.
#[derive(Debug, Clone, Copy, Default)]
pub struct HmacSigner;

impl Signer for HmacSigner {
    fn sign(&self, api_key: &str, api_secret: &str, timestamp: u64, payload: &[u8]) -> String {
        // HMAC accepts keys of any length; a failure here means the hash
        // primitive itself is broken and no request can ever be signed.
        let mut mac = HmacSha256::new_from_slice(api_secret.as_bytes())
            .expect("HMAC-SHA256 accepts keys of any length");
        mac.update(api_key.as_bytes());
        mac.update(b"\n");
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b"\n");
        mac.update(payload);
        hex::encode(mac.finalize().into_bytes())
    }
}

/// Serialize `value` to compact JSON with sorted object keys.
///
/// Going through `serde_json::Value` sorts keys (its map is ordered by key),
/// which makes struct field order irrelevant to the signature.
pub fn canonical_payload<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let value = serde_json::to_value(value)?;
    serde_json::to_vec(&value)
}
