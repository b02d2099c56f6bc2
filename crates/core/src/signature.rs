//! Deterministic job fingerprints used to deduplicate enqueue requests.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Fingerprint of a job's type and initial parameters.
///
/// Two jobs with the same implementation and the same initial payload get the
/// same signature, so enqueueing the second while the first is still pending
/// is a no-op.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobSignature(String);

impl JobSignature {
    /// Derive a signature from an implementation id and its initial payload.
    ///
    /// `serde_json` renders object keys in a stable order, so logically equal
    /// payloads hash identically.
    pub fn derive(implementation: &str, payload: &Value) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(implementation.as_bytes());
        hasher.update([0x1f]);
        hasher.update(payload.to_string().as_bytes());

        let digest = hasher.finalize();
        let mut hex = String::with_capacity(digest.len() * 2);
        for byte in digest {
            use core::fmt::Write;
            let _ = write!(hex, "{:02x}", byte);
        }
        Self(hex)
    }

    /// Wrap a caller-chosen signature verbatim.
    pub fn raw(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for JobSignature {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn identical_inputs_hash_identically() {
        let a = JobSignature::derive("index.rebuild", &json!({"table": "users"}));
        let b = JobSignature::derive("index.rebuild", &json!({"table": "users"}));
        assert_eq!(a, b);
    }

    #[test]
    fn payload_changes_the_signature() {
        let a = JobSignature::derive("index.rebuild", &json!({"table": "users"}));
        let b = JobSignature::derive("index.rebuild", &json!({"table": "orders"}));
        assert_ne!(a, b);
    }

    #[test]
    fn implementation_changes_the_signature() {
        let a = JobSignature::derive("index.rebuild", &json!({}));
        let b = JobSignature::derive("index.verify", &json!({}));
        assert_ne!(a, b);
    }
}
