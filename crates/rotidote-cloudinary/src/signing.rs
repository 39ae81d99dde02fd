//! Upload request signing.
//!
//! Cloudinary signs the sorted `key=value` pairs joined by `&`, followed by
//! the API secret. We use the SHA-256 variant and send
//! `signature_algorithm=sha256` alongside.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

/// Parameters never included in the signature.
const UNSIGNED_PARAMS: [&str; 5] = ["file", "api_key", "signature", "signature_algorithm", "resource_type"];

/// The string that gets hashed, without the secret.
pub fn string_to_sign(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .filter(|(k, v)| !v.is_empty() && !UNSIGNED_PARAMS.contains(&k.as_str()))
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

/// Lowercase hex SHA-256 signature for a set of upload parameters.
pub fn sign(params: &BTreeMap<String, String>, api_secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(string_to_sign(params).as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}
