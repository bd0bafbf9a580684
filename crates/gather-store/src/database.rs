//! Typed facade over the keyed store, including the optimistic update
//! loop that all User/Group mutations go through.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use gather_shared::constants::{CHAT_PAGE_LIMIT, UPDATE_MAX_RETRIES};
use gather_shared::{ConnectionId, Group, GroupId, Message, User, UserId};

use crate::error::{Result, StoreError};
use crate::keyed::{message_key, Kind, KeyedStore, Versioned};
use crate::memory::MemoryStore;

/// How many adjacent timestamps to probe when two messages land on the
/// same millisecond.
const MESSAGE_KEY_PROBES: u32 = 32;

/// A record type the update loop can operate on.
pub trait Record: Serialize + DeserializeOwned + Send {
    const KIND: Kind;

    /// Mirror the store-held version into the record so that readers see
    /// it.
    fn set_version(&mut self, version: u64);
}

impl Record for User {
    const KIND: Kind = Kind::Users;

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

impl Record for Group {
    const KIND: Kind = Kind::Groups;

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

/// Typed store handle. Cheap to clone; all clones share the underlying
/// [`KeyedStore`].
#[derive(Clone)]
pub struct Database {
    store: Arc<dyn KeyedStore>,
}

impl Database {
    pub fn new(store: Arc<dyn KeyedStore>) -> Self {
        Self { store }
    }

    /// Fresh volatile database, for the local deployment and tests.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    // -- users ------------------------------------------------------------

    pub async fn create_user(&self, user: &User) -> Result<()> {
        self.create_record(&user.user_id.to_string(), user).await
    }

    pub async fn read_user(&self, user_id: UserId) -> Result<Option<User>> {
        self.read_record(&user_id.to_string()).await
    }

    /// Apply `transform` to the user under optimistic concurrency control.
    /// See [`Database::update_group`] for the contract.
    pub async fn update_user<F>(&self, user_id: UserId, transform: F) -> Result<User>
    where
        F: FnMut(&mut User) -> Result<()> + Send,
    {
        self.update_record(&user_id.to_string(), transform).await
    }

    // -- groups -----------------------------------------------------------

    pub async fn create_group(&self, group: &Group) -> Result<()> {
        self.create_record(&group.group_id.to_string(), group).await
    }

    pub async fn read_group(&self, group_id: GroupId) -> Result<Option<Group>> {
        self.read_record(&group_id.to_string()).await
    }

    /// Read-transform-write with bounded retry.
    ///
    /// The transform runs against a working copy of the freshly read
    /// record; a conditional write then commits it only if no concurrent
    /// writer has advanced the version in the meantime. A lost race
    /// re-reads and re-applies the transform, up to
    /// [`UPDATE_MAX_RETRIES`] times.
    ///
    /// The transform must therefore be pure — no I/O — and written against
    /// whatever state it is handed, since it may run several times before
    /// one run commits. Returning an error from the transform aborts the
    /// update with nothing written.
    pub async fn update_group<F>(&self, group_id: GroupId, transform: F) -> Result<Group>
    where
        F: FnMut(&mut Group) -> Result<()> + Send,
    {
        self.update_record(&group_id.to_string(), transform).await
    }

    // -- messages ---------------------------------------------------------

    /// Append a chat message. The (group, timestamp) key must be unique,
    /// so a same-millisecond collision probes forward until a free slot is
    /// found; the returned message carries the timestamp actually written.
    pub async fn create_message(&self, message: &Message) -> Result<Message> {
        let mut message = message.clone();
        for _ in 0..MESSAGE_KEY_PROBES {
            let key = message_key(message.group_id, message.timestamp);
            let value = serde_json::to_value(&message)?;
            match self.store.put_if_absent(Kind::Messages, &key, value).await {
                Ok(()) => return Ok(message),
                Err(StoreError::AlreadyExists) => {
                    message.timestamp += 1;
                }
                Err(e) => return Err(e),
            }
        }
        Err(StoreError::AlreadyExists)
    }

    /// Page of messages for a group with timestamps in `start..=end`,
    /// oldest first. The second value reports whether strictly more
    /// matching messages exist beyond the page.
    pub async fn read_messages(
        &self,
        group_id: GroupId,
        start: u64,
        end: u64,
    ) -> Result<(Vec<Message>, bool)> {
        let (items, has_more) = self
            .store
            .range(
                Kind::Messages,
                &group_id.to_string(),
                start,
                end,
                CHAT_PAGE_LIMIT,
            )
            .await?;
        let mut messages = Vec::with_capacity(items.len());
        for item in items {
            messages.push(serde_json::from_value(item)?);
        }
        Ok((messages, has_more))
    }

    // -- connections ------------------------------------------------------

    /// Record the central connection-id → user-id mapping. A leftover
    /// record under the same id (a gateway reusing an identifier whose
    /// owner never disconnected cleanly) is replaced.
    pub async fn write_connection(
        &self,
        connection_id: &ConnectionId,
        user_id: UserId,
    ) -> Result<()> {
        let value = serde_json::to_value(user_id)?;
        match self
            .store
            .put_if_absent(Kind::Connections, connection_id.as_str(), value.clone())
            .await
        {
            Ok(()) => Ok(()),
            Err(StoreError::AlreadyExists) => {
                debug!(connection = %connection_id, "replacing stale connection record");
                self.store
                    .delete_if_present(Kind::Connections, connection_id.as_str())
                    .await?;
                self.store
                    .put_if_absent(Kind::Connections, connection_id.as_str(), value)
                    .await
            }
            Err(e) => Err(e),
        }
    }

    pub async fn read_connection(&self, connection_id: &ConnectionId) -> Result<Option<UserId>> {
        match self.store.get(Kind::Connections, connection_id.as_str()).await? {
            Some(stored) => Ok(Some(serde_json::from_value(stored.value)?)),
            None => Ok(None),
        }
    }

    pub async fn delete_connection(&self, connection_id: &ConnectionId) -> Result<bool> {
        self.store
            .delete_if_present(Kind::Connections, connection_id.as_str())
            .await
    }

    // -- variables --------------------------------------------------------

    pub async fn read_variable(&self, name: &str) -> Result<Option<String>> {
        match self.store.get(Kind::Variables, name).await? {
            Some(stored) => Ok(Some(serde_json::from_value(stored.value)?)),
            None => Ok(None),
        }
    }

    /// Store a variable iff no value exists yet. Returns `false` if a
    /// concurrent writer won; the caller should re-read and adopt the
    /// winner.
    pub async fn write_variable_if_absent(&self, name: &str, value: &str) -> Result<bool> {
        match self
            .store
            .put_if_absent(Kind::Variables, name, serde_json::to_value(value)?)
            .await
        {
            Ok(()) => Ok(true),
            Err(StoreError::AlreadyExists) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Replace a variable unconditionally (used to repair a malformed
    /// value). Racing replacers are tolerated: each write is
    /// self-consistent, so whichever lands last wins.
    pub async fn overwrite_variable(&self, name: &str, value: &str) -> Result<()> {
        self.store.delete_if_present(Kind::Variables, name).await?;
        match self
            .store
            .put_if_absent(Kind::Variables, name, serde_json::to_value(value)?)
            .await
        {
            Ok(()) | Err(StoreError::AlreadyExists) => Ok(()),
            Err(e) => Err(e),
        }
    }

    // -- the update loop --------------------------------------------------

    async fn create_record<R: Record>(&self, key: &str, record: &R) -> Result<()> {
        let mut value = serde_json::to_value(record)?;
        // New records start at version 1; keep the embedded field in sync.
        value["version"] = serde_json::json!(1);
        self.store.put_if_absent(R::KIND, key, value).await
    }

    async fn read_record<R: Record>(&self, key: &str) -> Result<Option<R>> {
        match self.store.get(R::KIND, key).await? {
            Some(Versioned { value, .. }) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    async fn update_record<R, F>(&self, key: &str, mut transform: F) -> Result<R>
    where
        R: Record,
        F: FnMut(&mut R) -> Result<()> + Send,
    {
        for attempt in 0..UPDATE_MAX_RETRIES {
            let stored = self
                .store
                .get(R::KIND, key)
                .await?
                .ok_or(StoreError::NotFound)?;
            let mut record: R = serde_json::from_value(stored.value)?;

            transform(&mut record)?;
            record.set_version(stored.version + 1);

            let value = serde_json::to_value(&record)?;
            match self
                .store
                .put_if_version_matches(R::KIND, key, value, stored.version)
                .await
            {
                Ok(()) => return Ok(record),
                Err(StoreError::VersionConflict) => {
                    // Lost the race: re-read and re-apply.
                    debug!(key, attempt, "conditional write lost, retrying");
                }
                Err(e) => return Err(e),
            }
        }
        Err(StoreError::TooManyRetries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::Value;

    use gather_shared::{generate_id, Task};

    fn test_group() -> Group {
        Group {
            group_id: generate_id(),
            name: "test".into(),
            members: vec![1],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn update_missing_record_is_not_found() {
        let db = Database::in_memory();
        let err = db.update_group(123, |_| Ok(())).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[tokio::test]
    async fn update_bumps_version_and_persists() {
        let db = Database::in_memory();
        let group = test_group();
        db.create_group(&group).await.unwrap();

        let updated = db
            .update_group(group.group_id, |g| {
                g.name = "renamed".into();
                Ok(())
            })
            .await
            .unwrap();
        assert_eq!(updated.version, 2);

        let read = db.read_group(group.group_id).await.unwrap().unwrap();
        assert_eq!(read.name, "renamed");
        assert_eq!(read.version, 2);
    }

    #[tokio::test]
    async fn rejected_transform_writes_nothing() {
        let db = Database::in_memory();
        let group = test_group();
        db.create_group(&group).await.unwrap();

        let err = db
            .update_group(group.group_id, |g| {
                g.name = "should not stick".into();
                Err(StoreError::Rejected("business rule".into()))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Rejected(_)));

        let read = db.read_group(group.group_id).await.unwrap().unwrap();
        assert_eq!(read.name, "test");
        assert_eq!(read.version, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_updates_lose_nothing() {
        const WRITERS: usize = 32;

        let db = Database::in_memory();
        let group = test_group();
        db.create_group(&group).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..WRITERS {
            let db = db.clone();
            let group_id = group.group_id;
            handles.push(tokio::spawn(async move {
                db.update_group(group_id, |g| {
                    g.tasks.push(Task {
                        task_id: i as u64 + 1,
                        title: format!("task {i}"),
                        assignee: 1,
                        completed: false,
                    });
                    Ok(())
                })
                .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let read = db.read_group(group.group_id).await.unwrap().unwrap();
        // Every write serialized through the version counter: initial 1,
        // plus one per committed mutation, and no appended task lost.
        assert_eq!(read.version, 1 + WRITERS as u64);
        assert_eq!(read.tasks.len(), WRITERS);
        let mut ids: Vec<u64> = read.tasks.iter().map(|t| t.task_id).collect();
        ids.sort_unstable();
        assert_eq!(ids, (1..=WRITERS as u64).collect::<Vec<_>>());
    }

    /// Store whose conditional writes always lose, simulating persistent
    /// contention.
    struct ContestedStore(MemoryStore);

    #[async_trait]
    impl KeyedStore for ContestedStore {
        async fn get(&self, kind: Kind, key: &str) -> Result<Option<Versioned>> {
            self.0.get(kind, key).await
        }

        async fn put_if_absent(&self, kind: Kind, key: &str, value: Value) -> Result<()> {
            self.0.put_if_absent(kind, key, value).await
        }

        async fn put_if_version_matches(
            &self,
            _kind: Kind,
            _key: &str,
            _value: Value,
            _expected: u64,
        ) -> Result<()> {
            Err(StoreError::VersionConflict)
        }

        async fn delete_if_present(&self, kind: Kind, key: &str) -> Result<bool> {
            self.0.delete_if_present(kind, key).await
        }

        async fn range(
            &self,
            kind: Kind,
            partition: &str,
            start: u64,
            end: u64,
            limit: usize,
        ) -> Result<(Vec<Value>, bool)> {
            self.0.range(kind, partition, start, end, limit).await
        }
    }

    #[tokio::test]
    async fn retry_budget_exhaustion_surfaces() {
        let db = Database::new(Arc::new(ContestedStore(MemoryStore::new())));
        let group = test_group();
        db.create_group(&group).await.unwrap();

        let mut runs = 0u32;
        let err = db
            .update_group(group.group_id, |_| {
                runs += 1;
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::TooManyRetries));
        assert_eq!(runs, UPDATE_MAX_RETRIES);
    }

    #[tokio::test]
    async fn message_timestamp_collision_probes_forward() {
        let db = Database::in_memory();
        let message = Message {
            group_id: 9,
            timestamp: 1000,
            sender: 1,
            content: "first".into(),
        };
        let first = db.create_message(&message).await.unwrap();
        assert_eq!(first.timestamp, 1000);

        let second = db
            .create_message(&Message {
                content: "second".into(),
                ..message.clone()
            })
            .await
            .unwrap();
        assert_eq!(second.timestamp, 1001);

        let (messages, has_more) = db.read_messages(9, 0, u64::MAX).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert!(!has_more);
        assert_eq!(messages[0].content, "first");
        assert_eq!(messages[1].content, "second");
    }

    #[tokio::test]
    async fn connection_records_round_trip() {
        let db = Database::in_memory();
        let id = ConnectionId::new();
        db.write_connection(&id, 77).await.unwrap();
        assert_eq!(db.read_connection(&id).await.unwrap(), Some(77));

        // Reused identifier replaces the stale owner.
        db.write_connection(&id, 78).await.unwrap();
        assert_eq!(db.read_connection(&id).await.unwrap(), Some(78));

        assert!(db.delete_connection(&id).await.unwrap());
        assert!(!db.delete_connection(&id).await.unwrap());
        assert_eq!(db.read_connection(&id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn variable_first_writer_wins() {
        let db = Database::in_memory();
        assert!(db.write_variable_if_absent("k", "first").await.unwrap());
        assert!(!db.write_variable_if_absent("k", "second").await.unwrap());
        assert_eq!(db.read_variable("k").await.unwrap().as_deref(), Some("first"));

        db.overwrite_variable("k", "repaired").await.unwrap();
        assert_eq!(
            db.read_variable("k").await.unwrap().as_deref(),
            Some("repaired")
        );
    }
}
