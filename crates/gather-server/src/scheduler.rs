//! Deferred activation: wake up later and re-enter the update/notify
//! pipeline without an inbound request.
//!
//! The contract is at-least-once and best-effort — no exactly-once, no
//! precise timing — so every [`Activation`] is written to be idempotent
//! against whatever state it finds when it fires.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, warn};

use gather_shared::protocol::{ActivityReminder, ActivityReminderBody};
use gather_shared::{GroupId, UserId};
use gather_store::{Database, StoreError};

use crate::notify::{notify_group, Notifier};
use crate::push::PushFanout;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("scheduler is shut down")]
    ShutDown,
}

/// Payload carried by a scheduled trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Activation {
    /// Remind members shortly before an activity starts.
    #[serde(rename_all = "camelCase")]
    ActivityReminder { group_id: GroupId, activity_id: u64 },

    /// Re-check that a user's membership list agrees with a group's
    /// roster. Scheduled after every join/leave, because the roster and
    /// the user record are updated in two independent transactions and a
    /// crash between them leaves them disagreeing.
    #[serde(rename_all = "camelCase")]
    MembershipSweep { group_id: GroupId, user_id: UserId },
}

/// Arranges for an [`Activation`] to fire at or after a point in time.
///
/// Implementations range from an in-process timer to an external durable
/// trigger service; callers cannot tell them apart.
#[async_trait]
pub trait Scheduler: Send + Sync {
    async fn schedule(&self, at: DateTime<Utc>, activation: Activation)
        -> Result<(), SchedulerError>;
}

/// The pipeline a fired trigger re-enters: the same database, notifier
/// and push fan-out that inbound requests use.
#[derive(Clone)]
pub struct Pipeline {
    pub db: Database,
    pub notifier: Arc<dyn Notifier>,
    pub push: Arc<PushFanout>,
}

impl Pipeline {
    /// Entry point the host environment invokes when a scheduled time
    /// arrives.
    pub async fn activate(&self, activation: Activation) -> Result<(), StoreError> {
        debug!(?activation, "activation fired");
        match activation {
            Activation::ActivityReminder {
                group_id,
                activity_id,
            } => self.activity_reminder(group_id, activity_id).await,
            Activation::MembershipSweep { group_id, user_id } => {
                self.membership_sweep(group_id, user_id).await
            }
        }
    }

    async fn activity_reminder(
        &self,
        group_id: GroupId,
        activity_id: u64,
    ) -> Result<(), StoreError> {
        let Some(group) = self.db.read_group(group_id).await? else {
            return Ok(());
        };
        // Deleted since it was scheduled: the reminder is moot.
        let Some(activity) = group.activity(activity_id) else {
            return Ok(());
        };

        let payload = serde_json::to_value(ActivityReminder {
            activity: ActivityReminderBody {
                group_id,
                activity_id,
                title: activity.title.clone(),
                date: activity.date.clone(),
                start: activity.start.clone(),
            },
        })
        .expect("plain struct serializes");

        notify_group(&self.db, &self.notifier, &group, Some(payload.clone())).await;
        self.push.push_group(&group, &payload).await;
        Ok(())
    }

    async fn membership_sweep(&self, group_id: GroupId, user_id: UserId) -> Result<(), StoreError> {
        let in_roster = match self.db.read_group(group_id).await? {
            Some(group) => group.is_member(user_id),
            None => false,
        };

        let user = match self.db.read_user(user_id).await? {
            Some(user) => user,
            // Nobody left to reconcile.
            None => return Ok(()),
        };
        if user.groups.contains(&group_id) == in_roster {
            return Ok(());
        }

        let result = self
            .db
            .update_user(user_id, move |user| {
                if in_roster {
                    if !user.groups.contains(&group_id) {
                        user.groups.push(group_id);
                    }
                } else {
                    user.groups.retain(|&g| g != group_id);
                }
                Ok(())
            })
            .await;
        match result {
            Ok(_) => Ok(()),
            Err(StoreError::NotFound) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// [`Scheduler`] for the single long-lived-process deployment: one
/// spawned timer per trigger, all canceled cleanly on shutdown.
pub struct InProcessScheduler {
    pipeline: Pipeline,
    shutdown: watch::Sender<bool>,
}

impl InProcessScheduler {
    pub fn new(pipeline: Pipeline) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self { pipeline, shutdown }
    }

    /// Cancel every pending trigger without firing it.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}

#[async_trait]
impl Scheduler for InProcessScheduler {
    async fn schedule(
        &self,
        at: DateTime<Utc>,
        activation: Activation,
    ) -> Result<(), SchedulerError> {
        if *self.shutdown.borrow() {
            return Err(SchedulerError::ShutDown);
        }

        let delay = (at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        let pipeline = self.pipeline.clone();
        let mut shutdown = self.shutdown.subscribe();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    if let Err(e) = pipeline.activate(activation.clone()).await {
                        warn!(?activation, error = %e, "scheduled activation failed");
                    }
                }
                _ = async { let _ = shutdown.wait_for(|&stop| stop).await; } => {}
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::tests::RecordingNotifier;
    use crate::push::tests::RecordingPushSender;
    use gather_shared::{Activity, Group, User};

    fn pipeline_over(db: &Database) -> (Pipeline, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::default());
        let pipeline = Pipeline {
            db: db.clone(),
            notifier: notifier.clone(),
            push: Arc::new(PushFanout::new(
                db.clone(),
                Arc::new(RecordingPushSender::default()),
            )),
        };
        (pipeline, notifier)
    }

    async fn seed_group_with_activity(db: &Database) {
        db.create_user(&User {
            user_id: 1,
            connections: vec![gather_shared::ConnectionId::from("c1")],
            groups: vec![100],
            ..Default::default()
        })
        .await
        .unwrap();
        db.create_group(&Group {
            group_id: 100,
            members: vec![1],
            activities: vec![Activity {
                activity_id: 5,
                title: "hang out".into(),
                date: "2026-09-01".into(),
                start: "18:00".into(),
                end: "19:00".into(),
                confirmed: vec![],
            }],
            ..Default::default()
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn reminder_reaches_live_connections() {
        let db = Database::in_memory();
        seed_group_with_activity(&db).await;
        let (pipeline, notifier) = pipeline_over(&db);

        pipeline
            .activate(Activation::ActivityReminder {
                group_id: 100,
                activity_id: 5,
            })
            .await
            .unwrap();

        let attempts = notifier.attempts.lock().await;
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].1["activity"]["title"], "hang out");
    }

    #[tokio::test]
    async fn reminder_for_deleted_activity_is_silent() {
        let db = Database::in_memory();
        seed_group_with_activity(&db).await;
        let (pipeline, notifier) = pipeline_over(&db);

        pipeline
            .activate(Activation::ActivityReminder {
                group_id: 100,
                activity_id: 999,
            })
            .await
            .unwrap();
        pipeline
            .activate(Activation::ActivityReminder {
                group_id: 404,
                activity_id: 5,
            })
            .await
            .unwrap();

        assert!(notifier.attempts.lock().await.is_empty());
    }

    #[tokio::test]
    async fn sweep_adds_missing_membership() {
        let db = Database::in_memory();
        db.create_user(&User::new(1)).await.unwrap();
        db.create_group(&Group {
            group_id: 100,
            members: vec![1],
            ..Default::default()
        })
        .await
        .unwrap();
        let (pipeline, _) = pipeline_over(&db);

        let sweep = Activation::MembershipSweep {
            group_id: 100,
            user_id: 1,
        };
        pipeline.activate(sweep.clone()).await.unwrap();
        let user = db.read_user(1).await.unwrap().unwrap();
        assert_eq!(user.groups, vec![100]);

        // Idempotent: firing again changes nothing, not even the version.
        pipeline.activate(sweep).await.unwrap();
        let again = db.read_user(1).await.unwrap().unwrap();
        assert_eq!(again.groups, vec![100]);
        assert_eq!(again.version, user.version);
    }

    #[tokio::test]
    async fn sweep_removes_stale_membership() {
        let db = Database::in_memory();
        db.create_user(&User {
            user_id: 1,
            groups: vec![100, 200],
            ..Default::default()
        })
        .await
        .unwrap();
        // Group 100 exists without the user; group 200 is gone entirely.
        db.create_group(&Group {
            group_id: 100,
            members: vec![],
            ..Default::default()
        })
        .await
        .unwrap();
        let (pipeline, _) = pipeline_over(&db);

        pipeline
            .activate(Activation::MembershipSweep {
                group_id: 100,
                user_id: 1,
            })
            .await
            .unwrap();
        pipeline
            .activate(Activation::MembershipSweep {
                group_id: 200,
                user_id: 1,
            })
            .await
            .unwrap();

        let user = db.read_user(1).await.unwrap().unwrap();
        assert!(user.groups.is_empty());
    }

    #[tokio::test]
    async fn past_due_trigger_fires_promptly() {
        let db = Database::in_memory();
        db.create_user(&User::new(1)).await.unwrap();
        db.create_group(&Group {
            group_id: 100,
            members: vec![1],
            ..Default::default()
        })
        .await
        .unwrap();
        let (pipeline, _) = pipeline_over(&db);
        let scheduler = InProcessScheduler::new(pipeline);

        scheduler
            .schedule(
                Utc::now() - chrono::Duration::seconds(1),
                Activation::MembershipSweep {
                    group_id: 100,
                    user_id: 1,
                },
            )
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        let user = db.read_user(1).await.unwrap().unwrap();
        assert_eq!(user.groups, vec![100]);
    }

    #[tokio::test]
    async fn shutdown_cancels_pending_triggers() {
        let db = Database::in_memory();
        db.create_user(&User::new(1)).await.unwrap();
        db.create_group(&Group {
            group_id: 100,
            members: vec![1],
            ..Default::default()
        })
        .await
        .unwrap();
        let (pipeline, _) = pipeline_over(&db);
        let scheduler = InProcessScheduler::new(pipeline);

        scheduler
            .schedule(
                Utc::now() + chrono::Duration::milliseconds(150),
                Activation::MembershipSweep {
                    group_id: 100,
                    user_id: 1,
                },
            )
            .await
            .unwrap();
        scheduler.shutdown();

        tokio::time::sleep(Duration::from_millis(400)).await;
        let user = db.read_user(1).await.unwrap().unwrap();
        assert!(user.groups.is_empty());

        // And nothing new can be scheduled.
        let err = scheduler
            .schedule(
                Utc::now(),
                Activation::MembershipSweep {
                    group_id: 100,
                    user_id: 1,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SchedulerError::ShutDown));
    }

    #[test]
    fn activation_payload_round_trips() {
        let activation = Activation::ActivityReminder {
            group_id: 1,
            activity_id: 2,
        };
        let json = serde_json::to_string(&activation).unwrap();
        assert_eq!(
            json,
            r#"{"kind":"activityReminder","groupId":1,"activityId":2}"#
        );
        let back: Activation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, activation);
    }
}
