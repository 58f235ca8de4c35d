//! rama-data crate
//!
//! Typed rows of the PSC and company registries, the registry vocabularies,
//! and the cleaning pass that normalises both tables before linking.

pub mod clean;
pub mod types;
pub mod vocab;

pub use types::{CompanyRecord, PreviousName, PscKind, PscRecord};
