//! # Storage Module
//!
//! A content-addressed store for equilibration results.
//!
//! Records form a closed set of tagged variants ([`records::StoredData`]). Each
//! [`records::RecordKind`] fixes three capabilities: whether it carries an
//! ancillary directory, whether its key is derived from its content, and whether
//! a colliding record may replace the resident one. The key derivation itself is
//! selected per kind through [`keys::KeyStrategy`].
//!
//! For replaceable records the store always holds the record with the lowest
//! statistical inefficiency ever offered for a key. [`local::LocalStore::merge`]
//! applies the same rule across stores, and [`legacy::import_legacy`] applies it
//! while rebuilding a store from a mixed legacy directory.

pub mod error;
pub mod keys;
pub mod legacy;
pub mod local;
pub mod records;

pub use error::StoreError;
pub use local::{LocalStore, MergeSummary, StoreOutcome};
pub use records::{RecordKind, StoredData, StoredEquilibrationData};
