//! Content fingerprints for dependency declarations.
//!
//! A fingerprint is the SHA-256 digest of the canonical JSON encoding of a
//! parameter mapping. Object keys are sorted at every nesting level, so the
//! digest does not depend on the order in which parameters were declared.
//!
//! Working folder names carry the first six hex digits of a SHA-1 digest.
//! Existing bundle folders are only found again if these stay bit-exact.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;

/// Number of hex characters used when a digest names a working folder.
pub const SHORT_HASH_LEN: usize = 6;

/// Hex digest identifying one exact set of dependency parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Wrap an already computed hex digest.
    #[must_use]
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    /// The digest as lowercase hex.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute the fingerprint of a parameter mapping.
#[must_use]
pub fn fingerprint(params: &Map<String, Value>) -> Fingerprint {
    let canonical = canonical_json(&Value::Object(params.clone()));
    Fingerprint(sha256_hex(canonical.as_bytes()))
}

/// Short hash of a source locator, used in working folder names.
#[must_use]
pub fn short_hash(input: &str) -> String {
    let mut digest = hex::encode(Sha1::digest(input.as_bytes()));
    digest.truncate(SHORT_HASH_LEN);
    digest
}

/// Short hash of a filesystem path.
#[must_use]
pub fn short_path_hash(path: &Path) -> String {
    short_hash(&path.to_string_lossy())
}

/// SHA-256 of `data` as lowercase hex.
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Serialize `value` with object keys sorted at every level.
fn canonical_json(value: &Value) -> String {
    // serde_json may be built with `preserve_order`, so sort explicitly.
    fn sorted(value: &Value) -> Value {
        match value {
            Value::Object(map) => {
                let ordered: BTreeMap<&String, Value> =
                    map.iter().map(|(k, v)| (k, sorted(v))).collect();
                let mut out = Map::new();
                for (k, v) in ordered {
                    out.insert(k.clone(), v);
                }
                Value::Object(out)
            }
            Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
            other => other.clone(),
        }
    }

    sorted(value).to_string()
}
