//! Hashing - SHA-256 for Jobs and Documents
//!
//! Job hashes are computed over the canonical payload so the same request
//! always logs the same hash, whatever key order it arrived in.

use serde::Serialize;
use serde_json::{to_string, Value};
use sha2::{Digest, Sha256};

use crate::request::RenderRequest;

/// Compute SHA-256 hash of bytes, return hex string
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Convert to canonical JSON (sorted keys, no whitespace)
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let v: Value = serde_json::to_value(value)?;
    to_string(&sort_value(&v))
}

fn sort_value(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut sorted: Vec<_> = map.iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                sorted
                    .into_iter()
                    .map(|(k, v)| (k.clone(), sort_value(v)))
                    .collect(),
            )
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_value).collect()),
        _ => v.clone(),
    }
}

/// job_hash = sha256(template_path + canonical_payload + engine_version)
pub fn compute_job_hash(
    request: &RenderRequest,
    engine_version: &str,
) -> Result<String, serde_json::Error> {
    let canonical_payload = canonical_json(request.payload())?;
    let combined = format!(
        "{}:{}:{}",
        request.template_path, canonical_payload, engine_version
    );
    Ok(sha256_hex(combined.as_bytes()))
}

mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{:02x}", b)).collect()
    }
}
