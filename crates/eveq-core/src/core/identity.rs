//! Canonical identity of a simulation box.
//!
//! Two [`PhysicalConditions`] describe the same box exactly when their canonical
//! serializations hash to the same digest. The serialization sorts components by
//! identifier, renders physical quantities in fixed units and precision, and
//! writes object keys in sorted order whatever map type `serde_json` is built
//! with, so the digest is stable across processes and builds.

use super::models::conditions::PhysicalConditions;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Namespace tag prepended to box digests in every storage and run-directory key.
pub const BOX_KEY_PREFIX: &str = "u_";

const DIGEST_HEX_LEN: usize = 64;

/// Hex-encoded SHA-256 digest of a box's canonical serialization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CanonicalKey(String);

impl CanonicalKey {
    pub fn digest(&self) -> &str {
        &self.0
    }

    /// The prefixed key under which the box is stored and run.
    pub fn storage_key(&self) -> String {
        format!("{}{}", BOX_KEY_PREFIX, self.0)
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", BOX_KEY_PREFIX, self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{0}' is not a valid box key")]
pub struct ParseKeyError(String);

impl FromStr for CanonicalKey {
    type Err = ParseKeyError;

    /// Accepts both the bare digest and the prefixed `u_<digest>` form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digest = s.strip_prefix(BOX_KEY_PREFIX).unwrap_or(s);
        let valid = digest.len() == DIGEST_HEX_LEN
            && digest
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
        if valid {
            Ok(Self(digest.to_string()))
        } else {
            Err(ParseKeyError(s.to_string()))
        }
    }
}

impl TryFrom<String> for CanonicalKey {
    type Error = ParseKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CanonicalKey> for String {
    fn from(key: CanonicalKey) -> Self {
        key.to_string()
    }
}

/// Compact JSON text with object keys in sorted order.
pub fn canonical_json(value: &Value) -> String {
    sort_keys(value).to_string()
}

// Objects are rebuilt with keys inserted in sorted order.
fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut fields: Vec<(&String, &Value)> = map.iter().collect();
            fields.sort_by(|(a, _), (b, _)| a.cmp(b));
            Value::Object(
                fields
                    .into_iter()
                    .map(|(key, field)| (key.clone(), sort_keys(field)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

/// Lowercase hex SHA-256 of a value's canonical JSON.
pub fn digest_value(value: &Value) -> String {
    let digest = Sha256::digest(canonical_json(value).as_bytes());
    format!("{:x}", digest)
}

pub fn canonical_key(conditions: &PhysicalConditions) -> CanonicalKey {
    CanonicalKey(digest_value(&conditions.canonical_value()))
}
