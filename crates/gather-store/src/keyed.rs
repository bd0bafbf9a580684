//! The abstract keyed store.
//!
//! Modeled on what a managed key-value service actually provides:
//! per-item conditional writes and range queries within a partition,
//! nothing more. Every implementation — in-memory map, managed cloud
//! table — sits behind [`KeyedStore`].

use async_trait::async_trait;
use serde_json::Value;

use gather_shared::GroupId;

use crate::error::Result;

/// The record collections the service persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Users,
    Groups,
    /// Central connection-id → user-id routing records.
    Connections,
    /// Named singleton values (e.g. the push signing keypair).
    Variables,
    /// Append-only chat log, keyed by `"{group_id}/{timestamp}"` with the
    /// timestamp as range key.
    Messages,
}

/// A stored value plus the version the store holds for it.
///
/// The version is authoritative here, not inside the value: conditional
/// writes compare against it, and [`crate::Database`] mirrors it into the
/// record's own `version` field on read and write.
#[derive(Debug, Clone)]
pub struct Versioned {
    pub version: u64,
    pub value: Value,
}

/// Composite key for a message record.
pub fn message_key(group_id: GroupId, timestamp: u64) -> String {
    format!("{group_id}/{timestamp}")
}

/// Storage primitives. All writes are per-item and conditional; there are
/// no multi-item transactions.
#[async_trait]
pub trait KeyedStore: Send + Sync {
    /// Read one record, or `None` if absent.
    async fn get(&self, kind: Kind, key: &str) -> Result<Option<Versioned>>;

    /// Create a record iff the key is free. The new record has version 1.
    ///
    /// Fails with [`StoreError::AlreadyExists`] if the key is taken.
    ///
    /// [`StoreError::AlreadyExists`]: crate::StoreError::AlreadyExists
    async fn put_if_absent(&self, kind: Kind, key: &str, value: Value) -> Result<()>;

    /// Replace a record iff its stored version equals `expected`. On
    /// success the stored version becomes `expected + 1`.
    ///
    /// Fails with [`StoreError::VersionConflict`] if a concurrent writer
    /// got there first, [`StoreError::NotFound`] if the record vanished.
    ///
    /// [`StoreError::VersionConflict`]: crate::StoreError::VersionConflict
    /// [`StoreError::NotFound`]: crate::StoreError::NotFound
    async fn put_if_version_matches(
        &self,
        kind: Kind,
        key: &str,
        value: Value,
        expected: u64,
    ) -> Result<()>;

    /// Delete a record if it exists. Returns whether anything was deleted;
    /// a missing record is not an error.
    async fn delete_if_present(&self, kind: Kind, key: &str) -> Result<bool>;

    /// Range query within one partition, by range key, in ascending order.
    ///
    /// Returns at most `limit` items plus a flag that is `true` iff
    /// strictly more matching items exist beyond the returned page. Both
    /// bounds are inclusive. Only defined for range-keyed kinds
    /// ([`Kind::Messages`]).
    async fn range(
        &self,
        kind: Kind,
        partition: &str,
        start: u64,
        end: u64,
        limit: usize,
    ) -> Result<(Vec<Value>, bool)>;
}
