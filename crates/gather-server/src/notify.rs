//! Best-effort fan-out notification over live connections.
//!
//! One committed mutation turns into one notification round: every member
//! of the affected group is resolved concurrently, and the payload is
//! delivered concurrently to every live connection each member holds.
//! Delivery is multicast best-effort — a dead or stale connection fails
//! silently, because the client's next reconnect or poll observes current
//! state anyway. The round's caller blocks until every attempt has
//! finished, but never learns whether any individual one succeeded.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use gather_shared::protocol::{GroupChanged, UserChanged};
use gather_shared::{ConnectionId, Group, GroupId, User, UserId};
use gather_store::{Database, StoreError};

#[derive(Debug, Error)]
#[error("delivery failed: {0}")]
pub struct DeliveryError(pub String);

/// A service capable of pushing a JSON payload to one live connection.
///
/// The only guarantee an implementation gives is "attempted": a returned
/// error is evidence of failure, but success is always inconclusive.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, connection_id: &ConnectionId, payload: &Value)
        -> Result<(), DeliveryError>;
}

/// Single-process [`Notifier`]: connection ids map to the outbound halves
/// of open WebSockets in this process.
///
/// The horizontally-scaled deployment replaces this with a gateway-backed
/// implementation that routes purely on the central connection records;
/// nothing upstream can tell the difference.
#[derive(Default)]
pub struct LocalNotifier {
    sockets: Mutex<HashMap<ConnectionId, mpsc::UnboundedSender<String>>>,
}

impl LocalNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, connection_id: ConnectionId, tx: mpsc::UnboundedSender<String>) {
        self.sockets.lock().await.insert(connection_id, tx);
    }

    pub async fn unregister(&self, connection_id: &ConnectionId) {
        self.sockets.lock().await.remove(connection_id);
    }
}

#[async_trait]
impl Notifier for LocalNotifier {
    async fn deliver(
        &self,
        connection_id: &ConnectionId,
        payload: &Value,
    ) -> Result<(), DeliveryError> {
        let sockets = self.sockets.lock().await;
        let tx = sockets
            .get(connection_id)
            .ok_or_else(|| DeliveryError("no such connection".into()))?;
        tx.send(payload.to_string())
            .map_err(|e| DeliveryError(e.to_string()))
    }
}

/// Send a best-effort notification to all group members.
///
/// `None` substitutes a minimal "this group changed" marker, for callers
/// whose diff is not worth serializing.
pub async fn notify_group(
    db: &Database,
    notifier: &Arc<dyn Notifier>,
    group: &Group,
    payload: Option<Value>,
) {
    let payload = payload.unwrap_or_else(|| {
        serde_json::to_value(GroupChanged::new(group.group_id))
            .expect("plain struct serializes")
    });

    let rounds = group.members.iter().map(|&user_id| {
        let payload = &payload;
        async move {
            let user = match db.read_user(user_id).await {
                Ok(Some(user)) => user,
                // Best-effort: an unknown or unreadable member is skipped.
                _ => return,
            };
            deliver_to_user(notifier, &user, payload).await;
        }
    });
    join_all(rounds).await;
}

async fn deliver_to_user(notifier: &Arc<dyn Notifier>, user: &User, payload: &Value) {
    let attempts = user.connections.iter().map(|connection_id| async move {
        if let Err(e) = notifier.deliver(connection_id, payload).await {
            debug!(connection = %connection_id, error = %e, "notification delivery failed");
        }
    });
    join_all(attempts).await;
}

/// Update a group, then notify its members — in that order, and only in
/// that order: a failed mutation sends nothing, so clients can never
/// observe a notification for state that was not committed.
pub async fn update_and_notify_group<F>(
    db: &Database,
    notifier: &Arc<dyn Notifier>,
    group_id: GroupId,
    transform: F,
) -> Result<Group, StoreError>
where
    F: FnMut(&mut Group) -> Result<(), StoreError> + Send,
{
    let group = db.update_group(group_id, transform).await?;
    notify_group(db, notifier, &group, None).await;
    Ok(group)
}

/// Update a user, then notify every group they belong to that the user
/// changed. Same commit-before-notify ordering as
/// [`update_and_notify_group`].
pub async fn update_user_and_notify_groups<F>(
    db: &Database,
    notifier: &Arc<dyn Notifier>,
    user_id: UserId,
    transform: F,
) -> Result<User, StoreError>
where
    F: FnMut(&mut User) -> Result<(), StoreError> + Send,
{
    let user = db.update_user(user_id, transform).await?;

    let payload =
        serde_json::to_value(UserChanged::new(user_id)).expect("plain struct serializes");
    let rounds = user.groups.iter().map(|&group_id| {
        let payload = &payload;
        async move {
            if let Ok(Some(group)) = db.read_group(group_id).await {
                notify_group(db, notifier, &group, Some(payload.clone())).await;
            }
        }
    });
    join_all(rounds).await;

    Ok(user)
}
