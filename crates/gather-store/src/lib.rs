//! # gather-store
//!
//! The keyed store behind the Gather coordination service.
//!
//! The storage engine itself is abstract: [`KeyedStore`] exposes exactly
//! the primitives a managed key-value service offers — get, put-if-absent,
//! put-if-version-matches, delete-if-present, and a page-limited range
//! query. There are no multi-item transactions, so all concurrency control
//! is optimistic: [`Database`] layers typed records and the
//! read-transform-conditional-write update loop on top.
//!
//! [`MemoryStore`] is the volatile in-process implementation used by the
//! local deployment and by tests.

pub mod database;
pub mod keyed;
pub mod memory;

mod error;

pub use database::{Database, Record};
pub use error::{Result, StoreError};
pub use keyed::{Kind, KeyedStore, Versioned};
pub use memory::MemoryStore;
