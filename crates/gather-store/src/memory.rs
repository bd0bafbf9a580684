//! Volatile in-process store, used by the local deployment and by tests.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::{Result, StoreError};
use crate::keyed::{Kind, KeyedStore, Versioned};

/// In-memory [`KeyedStore`].
///
/// One mutex per collection, held only for the duration of the map
/// operation — never across a network call or a transform body. The
/// conditional-write semantics are exactly those of the managed store the
/// production deployment uses, which is what makes this implementation
/// good enough for concurrency tests.
#[derive(Default)]
pub struct MemoryStore {
    users: Mutex<HashMap<String, Versioned>>,
    groups: Mutex<HashMap<String, Versioned>>,
    connections: Mutex<HashMap<String, Versioned>>,
    variables: Mutex<HashMap<String, Versioned>>,
    /// partition → range key → value
    messages: Mutex<HashMap<String, BTreeMap<u64, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, kind: Kind) -> Result<&Mutex<HashMap<String, Versioned>>> {
        match kind {
            Kind::Users => Ok(&self.users),
            Kind::Groups => Ok(&self.groups),
            Kind::Connections => Ok(&self.connections),
            Kind::Variables => Ok(&self.variables),
            Kind::Messages => Err(StoreError::Unsupported(kind)),
        }
    }
}

/// Split a `"{partition}/{range}"` composite key.
fn split_composite(key: &str) -> Result<(&str, u64)> {
    let (partition, range) = key
        .split_once('/')
        .ok_or(StoreError::Unsupported(Kind::Messages))?;
    let range = range
        .parse::<u64>()
        .map_err(|_| StoreError::Unsupported(Kind::Messages))?;
    Ok((partition, range))
}

#[async_trait]
impl KeyedStore for MemoryStore {
    async fn get(&self, kind: Kind, key: &str) -> Result<Option<Versioned>> {
        if kind == Kind::Messages {
            let (partition, range) = split_composite(key)?;
            let messages = self.messages.lock().await;
            return Ok(messages
                .get(partition)
                .and_then(|log| log.get(&range))
                .map(|value| Versioned {
                    version: 1,
                    value: value.clone(),
                }));
        }
        let table = self.table(kind)?.lock().await;
        Ok(table.get(key).cloned())
    }

    async fn put_if_absent(&self, kind: Kind, key: &str, value: Value) -> Result<()> {
        if kind == Kind::Messages {
            let (partition, range) = split_composite(key)?;
            let mut messages = self.messages.lock().await;
            let log = messages.entry(partition.to_string()).or_default();
            if log.contains_key(&range) {
                return Err(StoreError::AlreadyExists);
            }
            log.insert(range, value);
            return Ok(());
        }
        let mut table = self.table(kind)?.lock().await;
        if table.contains_key(key) {
            return Err(StoreError::AlreadyExists);
        }
        table.insert(key.to_string(), Versioned { version: 1, value });
        Ok(())
    }

    async fn put_if_version_matches(
        &self,
        kind: Kind,
        key: &str,
        value: Value,
        expected: u64,
    ) -> Result<()> {
        let mut table = self.table(kind)?.lock().await;
        let current = table.get_mut(key).ok_or(StoreError::NotFound)?;
        if current.version != expected {
            return Err(StoreError::VersionConflict);
        }
        *current = Versioned {
            version: expected + 1,
            value,
        };
        Ok(())
    }

    async fn delete_if_present(&self, kind: Kind, key: &str) -> Result<bool> {
        if kind == Kind::Messages {
            let (partition, range) = split_composite(key)?;
            let mut messages = self.messages.lock().await;
            return Ok(messages
                .get_mut(partition)
                .map(|log| log.remove(&range).is_some())
                .unwrap_or(false));
        }
        let mut table = self.table(kind)?.lock().await;
        Ok(table.remove(key).is_some())
    }

    async fn range(
        &self,
        kind: Kind,
        partition: &str,
        start: u64,
        end: u64,
        limit: usize,
    ) -> Result<(Vec<Value>, bool)> {
        if kind != Kind::Messages {
            return Err(StoreError::Unsupported(kind));
        }
        let messages = self.messages.lock().await;
        let Some(log) = messages.get(partition) else {
            return Ok((Vec::new(), false));
        };
        let mut items: Vec<Value> = Vec::new();
        let mut has_more = false;
        for (_, value) in log.range(start..=end) {
            if items.len() == limit {
                has_more = true;
                break;
            }
            items.push(value.clone());
        }
        Ok((items, has_more))
    }
}
