//! Concord IR snapshot (canonical application model)
//!
//! This crate defines the read-only intermediate representation that every
//! raw constraint extraction must resolve against: the canonical entity and
//! field lists, explicit alias tables, and snapshot digests.
//!
//! The snapshot is produced by an external spec→IR extraction component; here
//! it is only loaded, indexed, and digested. Each validation run owns its own
//! snapshot, so nothing in this crate carries cross-run mutable state.

pub mod digest;
pub mod snapshot;

pub use snapshot::{IrEntity, IrError, IrField, IrSnapshot};
