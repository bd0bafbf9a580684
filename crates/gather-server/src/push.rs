//! Store-and-forward delivery over the web-push protocol.
//!
//! Mirrors the live-connection fan-out, but targets each member's stored
//! push subscriptions, so backgrounded and closed clients still hear about
//! changes. Every message is VAPID-signed with a process-wide keypair.
//!
//! The keypair is the one piece of global state this server has, and it
//! must agree across every worker: a public key from one generation paired
//! with a private key from another silently breaks all deliveries. Both
//! halves are therefore co-encoded into a single store Variable, written
//! with put-if-absent — the two values can never tear apart, and a
//! concurrent generator simply adopts the first writer's pair.

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use futures::future::join_all;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::SecretKey;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};
use web_push::{
    ContentEncoding, HyperWebPushClient, SubscriptionInfo, VapidSignatureBuilder, WebPushClient,
    WebPushMessageBuilder,
};

use gather_shared::constants::VAPID_KEYPAIR_VARIABLE;
use gather_shared::{Group, PushSubscription};
use gather_store::{Database, StoreError};

#[derive(Debug, Error)]
pub enum PushError {
    #[error("web push error: {0}")]
    WebPush(#[from] web_push::WebPushError),
}

/// An ES256 keypair in the URL-safe base64 encoding the push protocol
/// uses on the wire: uncompressed SEC1 point for the public half, raw
/// scalar for the private half.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VapidKeypair {
    pub public_key: String,
    pub private_key: String,
}

impl VapidKeypair {
    pub fn generate() -> Self {
        let secret = SecretKey::random(&mut OsRng);
        let point = secret.public_key().to_encoded_point(false);
        Self {
            public_key: URL_SAFE_NO_PAD.encode(point.as_bytes()),
            private_key: URL_SAFE_NO_PAD.encode(secret.to_bytes()),
        }
    }

    /// Both halves decode and have the exact shapes ES256 requires.
    pub fn is_well_formed(&self) -> bool {
        let public = URL_SAFE_NO_PAD.decode(&self.public_key);
        let private = URL_SAFE_NO_PAD.decode(&self.private_key);
        matches!((public, private), (Ok(p), Ok(s)) if p.len() == 65 && p[0] == 0x04 && s.len() == 32)
    }
}

/// One delivery attempt to one stored subscription. No retry, no
/// guarantee beyond "attempted".
#[async_trait]
pub trait PushSender: Send + Sync {
    async fn send(
        &self,
        subscription: &PushSubscription,
        payload: &[u8],
        keys: &VapidKeypair,
    ) -> Result<(), PushError>;
}

/// [`PushSender`] speaking the actual web-push protocol.
pub struct WebPushSender {
    client: HyperWebPushClient,
    /// VAPID `sub` claim: who push services may contact about problems.
    contact: String,
}

impl WebPushSender {
    pub fn new(contact: String) -> Self {
        Self {
            client: HyperWebPushClient::new(),
            contact,
        }
    }
}

#[async_trait]
impl PushSender for WebPushSender {
    async fn send(
        &self,
        subscription: &PushSubscription,
        payload: &[u8],
        keys: &VapidKeypair,
    ) -> Result<(), PushError> {
        let info = SubscriptionInfo::new(
            &subscription.endpoint,
            &subscription.keys.p256dh,
            &subscription.keys.auth,
        );

        let mut signature =
            VapidSignatureBuilder::from_base64(&keys.private_key, web_push::URL_SAFE_NO_PAD, &info)?;
        signature.add_claim("sub", self.contact.as_str());

        let mut builder = WebPushMessageBuilder::new(&info);
        builder.set_payload(ContentEncoding::Aes128Gcm, payload);
        builder.set_vapid_signature(signature.build()?);

        self.client.send(builder.build()?).await?;
        Ok(())
    }
}

/// Fan-out over stored push subscriptions.
pub struct PushFanout {
    db: Database,
    sender: Arc<dyn PushSender>,
}

impl PushFanout {
    pub fn new(db: Database, sender: Arc<dyn PushSender>) -> Self {
        Self { db, sender }
    }

    /// Public key clients subscribe against. Generates and persists the
    /// keypair on first use.
    pub async fn public_key(&self) -> Result<String, StoreError> {
        Ok(self.keypair().await?.public_key)
    }

    /// The process-wide signing keypair, from the store.
    ///
    /// Lazy-generates on miss; put-if-absent makes the first writer win
    /// and every loser adopt the stored pair. A malformed stored value is
    /// regenerated and overwritten — racing repairers are benign because
    /// each write is a self-consistent pair and clients re-fetch the
    /// public key before subscribing.
    pub async fn keypair(&self) -> Result<VapidKeypair, StoreError> {
        if let Some(raw) = self.db.read_variable(VAPID_KEYPAIR_VARIABLE).await? {
            match serde_json::from_str::<VapidKeypair>(&raw) {
                Ok(keys) if keys.is_well_formed() => return Ok(keys),
                _ => {
                    warn!("stored push keypair is malformed, regenerating");
                    let keys = VapidKeypair::generate();
                    self.db
                        .overwrite_variable(VAPID_KEYPAIR_VARIABLE, &serde_json::to_string(&keys)?)
                        .await?;
                    // Converge with any concurrent repairer: whatever is
                    // stored now is what clients will see.
                    if let Some(raw) = self.db.read_variable(VAPID_KEYPAIR_VARIABLE).await? {
                        if let Ok(stored) = serde_json::from_str::<VapidKeypair>(&raw) {
                            if stored.is_well_formed() {
                                return Ok(stored);
                            }
                        }
                    }
                    return Ok(keys);
                }
            }
        }

        let keys = VapidKeypair::generate();
        let encoded = serde_json::to_string(&keys)?;
        if self
            .db
            .write_variable_if_absent(VAPID_KEYPAIR_VARIABLE, &encoded)
            .await?
        {
            info!("generated push signing keypair");
            return Ok(keys);
        }

        // Lost the creation race: adopt the winner.
        if let Some(raw) = self.db.read_variable(VAPID_KEYPAIR_VARIABLE).await? {
            if let Ok(stored) = serde_json::from_str::<VapidKeypair>(&raw) {
                if stored.is_well_formed() {
                    return Ok(stored);
                }
            }
        }
        Ok(keys)
    }

    /// Send `payload` to every push subscription of every group member.
    /// Best-effort and error-swallowing, exactly like the live fan-out.
    pub async fn push_group(&self, group: &Group, payload: &Value) {
        let keys = match self.keypair().await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "push skipped: no signing keypair");
                return;
            }
        };
        let body = payload.to_string().into_bytes();

        let rounds = group.members.iter().map(|&user_id| {
            let keys = &keys;
            let body = body.as_slice();
            async move {
                let user = match self.db.read_user(user_id).await {
                    Ok(Some(user)) => user,
                    _ => return,
                };
                let attempts = user.push_subscriptions.iter().map(|subscription| async move {
                    if let Err(e) = self.sender.send(subscription, body, keys).await {
                        debug!(endpoint = %subscription.endpoint, error = %e,
                            "push delivery failed");
                    }
                });
                join_all(attempts).await;
            }
        });
        join_all(rounds).await;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use gather_shared::{PushSubscriptionKeys, User};
    use tokio::sync::Mutex;

    #[derive(Default)]
    pub(crate) struct RecordingPushSender {
        pub sent: Mutex<Vec<(String, VapidKeypair)>>,
    }

    #[async_trait]
    impl PushSender for RecordingPushSender {
        async fn send(
            &self,
            subscription: &PushSubscription,
            _payload: &[u8],
            keys: &VapidKeypair,
        ) -> Result<(), PushError> {
            self.sent
                .lock()
                .await
                .push((subscription.endpoint.clone(), keys.clone()));
            Ok(())
        }
    }

    fn subscription(endpoint: &str) -> PushSubscription {
        PushSubscription {
            endpoint: endpoint.to_string(),
            keys: PushSubscriptionKeys {
                p256dh: "p".into(),
                auth: "a".into(),
            },
        }
    }

    #[test]
    fn generated_keypairs_are_well_formed_and_distinct() {
        let a = VapidKeypair::generate();
        let b = VapidKeypair::generate();
        assert!(a.is_well_formed());
        assert!(b.is_well_formed());
        assert_ne!(a, b);
    }

    #[test]
    fn malformed_keypairs_are_detected() {
        let keys = VapidKeypair {
            public_key: "not base64!".into(),
            private_key: String::new(),
        };
        assert!(!keys.is_well_formed());

        let truncated = VapidKeypair {
            public_key: URL_SAFE_NO_PAD.encode([4u8; 10]),
            private_key: URL_SAFE_NO_PAD.encode([1u8; 32]),
        };
        assert!(!truncated.is_well_formed());
    }

    #[tokio::test]
    async fn keypair_is_generated_once_and_reused() {
        let db = Database::in_memory();
        let fanout = PushFanout::new(db.clone(), Arc::new(RecordingPushSender::default()));

        let first = fanout.keypair().await.unwrap();
        let second = fanout.keypair().await.unwrap();
        assert_eq!(first, second);

        let raw = db.read_variable(VAPID_KEYPAIR_VARIABLE).await.unwrap().unwrap();
        let stored: VapidKeypair = serde_json::from_str(&raw).unwrap();
        assert_eq!(stored, first);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_generation_converges_on_one_pair() {
        let db = Database::in_memory();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let db = db.clone();
            handles.push(tokio::spawn(async move {
                PushFanout::new(db, Arc::new(RecordingPushSender::default()))
                    .keypair()
                    .await
                    .unwrap()
            }));
        }
        let mut pairs = Vec::new();
        for handle in handles {
            pairs.push(handle.await.unwrap());
        }

        // Everyone got the same pair, and it is the one persisted.
        let raw = db.read_variable(VAPID_KEYPAIR_VARIABLE).await.unwrap().unwrap();
        let stored: VapidKeypair = serde_json::from_str(&raw).unwrap();
        assert!(stored.is_well_formed());
        for pair in pairs {
            assert_eq!(pair, stored);
        }
    }

    #[tokio::test]
    async fn malformed_variable_is_repaired() {
        let db = Database::in_memory();
        db.write_variable_if_absent(VAPID_KEYPAIR_VARIABLE, "{\"torn\": true}")
            .await
            .unwrap();

        let fanout = PushFanout::new(db.clone(), Arc::new(RecordingPushSender::default()));
        let keys = fanout.keypair().await.unwrap();
        assert!(keys.is_well_formed());

        let raw = db.read_variable(VAPID_KEYPAIR_VARIABLE).await.unwrap().unwrap();
        let stored: VapidKeypair = serde_json::from_str(&raw).unwrap();
        assert_eq!(stored, keys);
    }

    #[tokio::test]
    async fn push_targets_every_subscription_of_every_member() {
        let db = Database::in_memory();
        db.create_user(&User {
            user_id: 1,
            push_subscriptions: vec![subscription("https://push.test/a1"), subscription("https://push.test/a2")],
            ..Default::default()
        })
        .await
        .unwrap();
        db.create_user(&User::new(2)).await.unwrap();

        let sender = Arc::new(RecordingPushSender::default());
        let fanout = PushFanout::new(db, sender.clone());

        let group = Group {
            group_id: 9,
            members: vec![1, 2, 3],
            ..Default::default()
        };
        fanout.push_group(&group, &serde_json::json!({"hello": true})).await;

        let sent = sender.sent.lock().await;
        // Two subscriptions for member 1; member 2 has none; member 3
        // does not exist.
        assert_eq!(sent.len(), 2);
        let expected = fanout.keypair().await.unwrap();
        for (_, keys) in sent.iter() {
            assert_eq!(*keys, expected);
        }
    }
}
