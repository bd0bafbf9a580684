//! The connection registry: who is reachable, and how.
//!
//! Every open channel gets a fresh connection id recorded in two places:
//! centrally (connection id → user id, so any stateless worker can route
//! to it) and on the owning User record (so fan-out can enumerate a
//! member's connections without a scan). The User-side sequence is capped:
//! clients that reconnect without ever disconnecting cleanly would
//! otherwise accumulate identifiers forever and make every notification
//! round pay for their leaks.

use tracing::warn;

use gather_shared::constants::USER_MAX_CONNECTIONS;
use gather_shared::{ConnectionId, UserId};
use gather_store::{Database, StoreError};

#[derive(Clone)]
pub struct ConnectionRegistry {
    db: Database,
}

impl ConnectionRegistry {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Register a freshly opened channel for `user_id`.
    ///
    /// The central routing record is written first; the User's connection
    /// sequence is then appended in one atomic transform, evicting the
    /// oldest entry if the cap is reached.
    pub async fn open(&self, user_id: UserId) -> Result<ConnectionId, StoreError> {
        let connection_id = ConnectionId::new();
        self.db.write_connection(&connection_id, user_id).await?;

        let appended = connection_id.clone();
        self.db
            .update_user(user_id, move |user| {
                while user.connections.len() >= USER_MAX_CONNECTIONS {
                    user.connections.remove(0);
                }
                user.connections.push(appended.clone());
                Ok(())
            })
            .await?;

        Ok(connection_id)
    }

    /// Remove a closed channel.
    ///
    /// The User-side removal is best-effort — eviction may already have
    /// dropped the entry, and a failed user update must not keep the
    /// central record alive.
    pub async fn close(&self, connection_id: &ConnectionId) -> Result<(), StoreError> {
        if let Some(user_id) = self.db.read_connection(connection_id).await? {
            let removed = connection_id.clone();
            let result = self
                .db
                .update_user(user_id, move |user| {
                    user.connections.retain(|c| c != &removed);
                    Ok(())
                })
                .await;
            if let Err(e) = result {
                warn!(connection = %connection_id, user = user_id, error = %e,
                    "could not remove connection from user record");
            }
        }
        self.db.delete_connection(connection_id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gather_shared::User;

    async fn registry_with_user(user_id: UserId) -> (ConnectionRegistry, Database) {
        let db = Database::in_memory();
        db.create_user(&User::new(user_id)).await.unwrap();
        (ConnectionRegistry::new(db.clone()), db)
    }

    #[tokio::test]
    async fn open_records_centrally_and_on_user() {
        let (registry, db) = registry_with_user(1).await;

        let connection_id = registry.open(1).await.unwrap();

        assert_eq!(db.read_connection(&connection_id).await.unwrap(), Some(1));
        let user = db.read_user(1).await.unwrap().unwrap();
        assert_eq!(user.connections, vec![connection_id]);
    }

    #[tokio::test]
    async fn ninth_connection_evicts_the_oldest() {
        let (registry, db) = registry_with_user(1).await;

        let mut opened = Vec::new();
        for _ in 0..USER_MAX_CONNECTIONS + 1 {
            opened.push(registry.open(1).await.unwrap());
        }

        let user = db.read_user(1).await.unwrap().unwrap();
        assert_eq!(user.connections.len(), USER_MAX_CONNECTIONS);
        // The earliest-opened identifier is gone, the rest survive in
        // order.
        assert_eq!(user.connections, &opened[1..]);
    }

    #[tokio::test]
    async fn close_removes_both_records() {
        let (registry, db) = registry_with_user(1).await;

        let keep = registry.open(1).await.unwrap();
        let dropped = registry.open(1).await.unwrap();

        registry.close(&dropped).await.unwrap();

        assert_eq!(db.read_connection(&dropped).await.unwrap(), None);
        let user = db.read_user(1).await.unwrap().unwrap();
        assert_eq!(user.connections, vec![keep]);
    }

    #[tokio::test]
    async fn close_unknown_connection_is_not_an_error() {
        let (registry, _db) = registry_with_user(1).await;
        registry.close(&ConnectionId::from("gone")).await.unwrap();
    }

    #[tokio::test]
    async fn close_survives_a_vanished_user() {
        let db = Database::in_memory();
        let registry = ConnectionRegistry::new(db.clone());

        // Central record pointing at a user that does not exist: close
        // still clears the central record.
        let connection_id = ConnectionId::new();
        db.write_connection(&connection_id, 999).await.unwrap();
        registry.close(&connection_id).await.unwrap();
        assert_eq!(db.read_connection(&connection_id).await.unwrap(), None);
    }
}
