//! Storage key derivation, selected once per record kind.

use super::error::StoreError;
use super::records::StoredData;
use crate::core::identity::digest_value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStrategy {
    /// `u_<digest>` of the record's physical conditions, shared with the box
    /// and its run directory.
    BoxIdentity,
    /// `<TypeName>_<digest>` of the whole record.
    ContentDigest,
    /// A fresh random identifier; the store retries until it is unused.
    Random,
}

impl KeyStrategy {
    pub fn is_deterministic(&self) -> bool {
        !matches!(self, KeyStrategy::Random)
    }

    pub fn derive(&self, data: &StoredData) -> Result<String, StoreError> {
        match self {
            KeyStrategy::BoxIdentity => match data {
                StoredData::Equilibration(record) => Ok(record.box_key()?.storage_key()),
                other => Err(StoreError::InvalidRecord(format!(
                    "'{}' records carry no box identity",
                    other.kind().type_name()
                ))),
            },
            KeyStrategy::ContentDigest => {
                let value = serde_json::to_value(data).map_err(|e| StoreError::Malformed {
                    context: data.kind().type_name().to_string(),
                    source: e,
                })?;
                Ok(format!("{}_{}", data.kind().type_name(), digest_value(&value)))
            }
            KeyStrategy::Random => Ok(Uuid::new_v4().simple().to_string()),
        }
    }
}
