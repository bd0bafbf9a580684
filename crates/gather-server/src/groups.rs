//! Group routes: roster, poll, activities, availabilities, tasks, chat.
//!
//! Every mutation goes through the optimistic update loop and, on commit,
//! fans out a notification round; handlers stay thin on purpose. Business
//! rules that must hold under concurrency (task cap, assignee membership,
//! "no poll" voting) are enforced inside the transforms, where they are
//! re-checked against re-read state on every retry.

use axum::extract::{Path, Query, State};
use axum::middleware;
use axum::routing::{delete, get, patch, post, put};
use axum::{Extension, Json, Router};
use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use gather_shared::constants::{
    CHAT_MESSAGE_MAX_LEN, CHAT_MESSAGE_MIN_LEN, GROUP_MAX_TASKS, NAME_MAX_LEN, NAME_MIN_LEN,
    TASK_TITLE_MAX_LEN, TASK_TITLE_MIN_LEN,
};
use gather_shared::protocol::{
    MessagePushed, MessagePushedBody, MessageReceived, MessageReceivedBody,
};
use gather_shared::validate::{
    check_calendar_mode, check_clock, check_date, check_len, parse_clock, parse_date,
};
use gather_shared::{
    generate_id, unix_millis, Activity, Availability, Group, GroupId, Message, Poll, PollOption,
    Task, UserId,
};
use gather_store::{Database, StoreError};

use crate::api::AppState;
use crate::auth::{self, CurrentUser};
use crate::error::ApiError;
use crate::notify::{notify_group, update_and_notify_group};
use crate::scheduler::Activation;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/group", patch(create_group))
        .route(
            "/api/group/:group_id",
            get(get_group).patch(patch_group).delete(leave_group),
        )
        .route(
            "/api/group/:group_id/poll",
            put(put_poll).patch(vote_poll).delete(delete_poll),
        )
        .route("/api/group/:group_id/activity", patch(create_activity))
        .route(
            "/api/group/:group_id/activity/:activity_id",
            delete(delete_activity),
        )
        .route(
            "/api/group/:group_id/activity/:activity_id/confirm",
            post(confirm_activity),
        )
        .route(
            "/api/group/:group_id/availability",
            patch(create_availability),
        )
        .route(
            "/api/group/:group_id/availability/:availability_id",
            delete(delete_availability),
        )
        .route("/api/group/:group_id/task", patch(create_task))
        .route(
            "/api/group/:group_id/task/:task_id",
            patch(patch_task).delete(delete_task),
        )
        .route("/api/group/:group_id/chat", get(get_chat).patch(post_chat))
        .route_layer(middleware::from_fn_with_state(state, auth::require_user))
}

// -- request / response bodies -------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PatchGroupRequest {
    #[serde(default)]
    name: String,
    #[serde(default)]
    calendar_mode: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GroupCreatedResponse {
    group_id: GroupId,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GroupResponse {
    name: String,
    members: Vec<UserId>,
    poll: Option<PollResponse>,
    availabilities: Vec<AvailabilityResponse>,
    activities: Vec<ActivityResponse>,
    tasks: Vec<TaskResponse>,
    calendar_mode: String,
}

#[derive(Serialize)]
struct PollResponse {
    title: String,
    options: Vec<PollOptionResponse>,
}

#[derive(Serialize)]
struct PollOptionResponse {
    #[serde(rename = "option")]
    name: String,
    votes: Vec<UserId>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AvailabilityResponse {
    availability_id: u64,
    user_id: UserId,
    date: String,
    start: String,
    end: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ActivityResponse {
    activity_id: u64,
    title: String,
    date: String,
    start: String,
    end: String,
    confirmed: Vec<UserId>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TaskResponse {
    task_id: u64,
    title: String,
    assignee: UserId,
    completed: bool,
}

impl From<&Group> for GroupResponse {
    fn from(group: &Group) -> Self {
        Self {
            name: group.name.clone(),
            members: group.members.clone(),
            poll: group.poll.as_ref().map(|poll| PollResponse {
                title: poll.title.clone(),
                options: poll
                    .options
                    .iter()
                    .map(|option| PollOptionResponse {
                        name: option.name.clone(),
                        votes: option.votes.clone(),
                    })
                    .collect(),
            }),
            availabilities: group
                .availabilities
                .iter()
                .map(|a| AvailabilityResponse {
                    availability_id: a.availability_id,
                    user_id: a.user_id,
                    date: a.date.clone(),
                    start: a.start.clone(),
                    end: a.end.clone(),
                })
                .collect(),
            activities: group
                .activities
                .iter()
                .map(|a| ActivityResponse {
                    activity_id: a.activity_id,
                    title: a.title.clone(),
                    date: a.date.clone(),
                    start: a.start.clone(),
                    end: a.end.clone(),
                    confirmed: a.confirmed.clone(),
                })
                .collect(),
            tasks: group
                .tasks
                .iter()
                .map(|t| TaskResponse {
                    task_id: t.task_id,
                    title: t.title.clone(),
                    assignee: t.assignee,
                    completed: t.completed,
                })
                .collect(),
            calendar_mode: group.calendar_mode.clone(),
        }
    }
}

// -- helpers -------------------------------------------------------------

async fn load_group(db: &Database, group_id: GroupId) -> Result<Group, ApiError> {
    db.read_group(group_id)
        .await?
        .ok_or(ApiError::NotFound("no such group"))
}

fn require_member(group: &Group, user_id: UserId) -> Result<(), ApiError> {
    if group.is_member(user_id) {
        Ok(())
    } else {
        Err(ApiError::Unauthorized("not a member of group"))
    }
}

/// The roster and the user record are two independent transactions; the
/// sweep repairs the user side if the second one never lands.
async fn schedule_membership_sweep(state: &AppState, group_id: GroupId, user_id: UserId) {
    let at = Utc::now() + chrono::Duration::seconds(state.config.membership_sweep_delay_secs as i64);
    if let Err(e) = state
        .scheduler
        .schedule(at, Activation::MembershipSweep { group_id, user_id })
        .await
    {
        warn!(group = group_id, user = user_id, error = %e,
            "could not schedule membership sweep");
    }
}

// -- group ---------------------------------------------------------------

async fn create_group(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(request): Json<PatchGroupRequest>,
) -> Result<Json<GroupCreatedResponse>, ApiError> {
    check_len(&request.name, NAME_MIN_LEN, NAME_MAX_LEN)?;
    if !request.calendar_mode.is_empty() {
        check_calendar_mode(&request.calendar_mode)?;
    }

    let group = Group {
        group_id: generate_id(),
        name: request.name,
        calendar_mode: request.calendar_mode,
        members: vec![user.user_id],
        ..Default::default()
    };
    state.db.create_group(&group).await?;
    info!(group = group.group_id, user = user.user_id, "created group");

    let group_id = group.group_id;
    state
        .db
        .update_user(user.user_id, move |user| {
            if !user.groups.contains(&group_id) {
                user.groups.push(group_id);
            }
            Ok(())
        })
        .await?;
    schedule_membership_sweep(&state, group_id, user.user_id).await;

    Ok(Json(GroupCreatedResponse { group_id }))
}

/// Reading a group joins it: opening a shared group link is how members
/// get in.
async fn get_group(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(group_id): Path<GroupId>,
) -> Result<Json<GroupResponse>, ApiError> {
    let mut group = load_group(&state.db, group_id).await?;

    if !group.is_member(user.user_id) {
        let user_id = user.user_id;
        group = update_and_notify_group(&state.db, &state.notifier, group_id, move |group| {
            if !group.members.contains(&user_id) {
                group.members.push(user_id);
            }
            Ok(())
        })
        .await?;
        state
            .db
            .update_user(user_id, move |user| {
                if !user.groups.contains(&group_id) {
                    user.groups.push(group_id);
                }
                Ok(())
            })
            .await?;
        schedule_membership_sweep(&state, group_id, user_id).await;
        info!(group = group_id, user = user_id, "user joined group");
    }

    Ok(Json(GroupResponse::from(&group)))
}

async fn patch_group(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(group_id): Path<GroupId>,
    Json(request): Json<PatchGroupRequest>,
) -> Result<Json<()>, ApiError> {
    let group = load_group(&state.db, group_id).await?;
    require_member(&group, user.user_id)?;

    if !request.name.is_empty() {
        check_len(&request.name, NAME_MIN_LEN, NAME_MAX_LEN)?;
    }
    if !request.calendar_mode.is_empty() {
        check_calendar_mode(&request.calendar_mode)?;
    }

    update_and_notify_group(&state.db, &state.notifier, group_id, move |group| {
        if !request.name.is_empty() {
            group.name = request.name.clone();
        }
        if !request.calendar_mode.is_empty() {
            group.calendar_mode = request.calendar_mode.clone();
        }
        Ok(())
    })
    .await?;
    Ok(Json(()))
}

async fn leave_group(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(group_id): Path<GroupId>,
) -> Result<Json<()>, ApiError> {
    let user_id = user.user_id;
    update_and_notify_group(&state.db, &state.notifier, group_id, move |group| {
        group.members.retain(|&m| m != user_id);
        Ok(())
    })
    .await?;

    state
        .db
        .update_user(user_id, move |user| {
            user.groups.retain(|&g| g != group_id);
            Ok(())
        })
        .await?;
    schedule_membership_sweep(&state, group_id, user_id).await;
    info!(group = group_id, user = user_id, "user left group");

    Ok(Json(()))
}

// -- poll ----------------------------------------------------------------

#[derive(Deserialize)]
struct PutPollRequest {
    title: String,
    options: Vec<String>,
}

#[derive(Deserialize)]
struct PatchPollRequest {
    votes: Vec<String>,
}

async fn put_poll(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(group_id): Path<GroupId>,
    Json(request): Json<PutPollRequest>,
) -> Result<Json<()>, ApiError> {
    let group = load_group(&state.db, group_id).await?;
    require_member(&group, user.user_id)?;

    check_len(&request.title, NAME_MIN_LEN, NAME_MAX_LEN)?;
    if request.options.is_empty() {
        return Err(ApiError::BadRequest("poll needs at least one option".into()));
    }
    for option in &request.options {
        check_len(option, NAME_MIN_LEN, NAME_MAX_LEN)?;
    }

    // A new poll replaces any active one; a group has at most one.
    update_and_notify_group(&state.db, &state.notifier, group_id, move |group| {
        group.poll = Some(Poll {
            title: request.title.clone(),
            timestamp: unix_millis(),
            options: request
                .options
                .iter()
                .map(|name| PollOption {
                    name: name.clone(),
                    votes: Vec::new(),
                })
                .collect(),
            done: false,
        });
        Ok(())
    })
    .await?;
    Ok(Json(()))
}

/// Voting replaces the caller's previous votes wholesale.
async fn vote_poll(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(group_id): Path<GroupId>,
    Json(request): Json<PatchPollRequest>,
) -> Result<Json<()>, ApiError> {
    let group = load_group(&state.db, group_id).await?;
    require_member(&group, user.user_id)?;

    let user_id = user.user_id;
    update_and_notify_group(&state.db, &state.notifier, group_id, move |group| {
        let poll = group
            .poll
            .as_mut()
            .ok_or_else(|| StoreError::Rejected("no active poll".into()))?;
        for option in &mut poll.options {
            option.votes.retain(|&v| v != user_id);
        }
        for vote in &request.votes {
            if let Some(option) = poll.options.iter_mut().find(|o| &o.name == vote) {
                if !option.votes.contains(&user_id) {
                    option.votes.push(user_id);
                }
            }
        }
        Ok(())
    })
    .await?;
    Ok(Json(()))
}

async fn delete_poll(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(group_id): Path<GroupId>,
) -> Result<Json<()>, ApiError> {
    let group = load_group(&state.db, group_id).await?;
    require_member(&group, user.user_id)?;

    update_and_notify_group(&state.db, &state.notifier, group_id, |group| {
        group.poll = None;
        Ok(())
    })
    .await?;
    Ok(Json(()))
}

// -- activity ------------------------------------------------------------

#[derive(Deserialize)]
struct PatchActivityRequest {
    title: String,
    date: String,
    start: String,
    end: String,
}

async fn create_activity(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(group_id): Path<GroupId>,
    Json(request): Json<PatchActivityRequest>,
) -> Result<Json<()>, ApiError> {
    let group = load_group(&state.db, group_id).await?;
    require_member(&group, user.user_id)?;

    check_len(&request.title, NAME_MIN_LEN, NAME_MAX_LEN)?;
    check_date(&request.date)?;
    check_clock(&request.start)?;
    check_clock(&request.end)?;

    let activity_id = generate_id();
    let (date, start) = (request.date.clone(), request.start.clone());
    update_and_notify_group(&state.db, &state.notifier, group_id, move |group| {
        group.activities.push(Activity {
            activity_id,
            title: request.title.clone(),
            date: request.date.clone(),
            start: request.start.clone(),
            end: request.end.clone(),
            confirmed: Vec::new(),
        });
        Ok(())
    })
    .await?;

    schedule_activity_reminder(&state, group_id, activity_id, &date, &start).await;

    Ok(Json(()))
}

/// Arrange a reminder shortly before the activity starts. Best-effort: an
/// unparsable or already-past start time simply schedules nothing.
async fn schedule_activity_reminder(
    state: &AppState,
    group_id: GroupId,
    activity_id: u64,
    date: &str,
    start: &str,
) {
    let (Some(date), Some(start)) = (parse_date(date), parse_clock(start)) else {
        return;
    };
    let at = Utc.from_utc_datetime(&date.and_time(start))
        - chrono::Duration::minutes(state.config.reminder_lead_minutes);
    if at <= Utc::now() {
        return;
    }
    if let Err(e) = state
        .scheduler
        .schedule(
            at,
            Activation::ActivityReminder {
                group_id,
                activity_id,
            },
        )
        .await
    {
        warn!(group = group_id, activity = activity_id, error = %e,
            "could not schedule activity reminder");
    }
}

/// Toggle the caller's attendance confirmation.
async fn confirm_activity(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path((group_id, activity_id)): Path<(GroupId, u64)>,
) -> Result<Json<()>, ApiError> {
    let group = load_group(&state.db, group_id).await?;
    require_member(&group, user.user_id)?;
    if group.activity(activity_id).is_none() {
        return Err(ApiError::NotFound("no such activity"));
    }

    let user_id = user.user_id;
    update_and_notify_group(&state.db, &state.notifier, group_id, move |group| {
        // Deleted concurrently: confirming nothing is fine.
        if let Some(activity) = group
            .activities
            .iter_mut()
            .find(|a| a.activity_id == activity_id)
        {
            if activity.confirmed.contains(&user_id) {
                activity.confirmed.retain(|&u| u != user_id);
            } else {
                activity.confirmed.push(user_id);
            }
        }
        Ok(())
    })
    .await?;
    Ok(Json(()))
}

async fn delete_activity(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path((group_id, activity_id)): Path<(GroupId, u64)>,
) -> Result<Json<()>, ApiError> {
    let group = load_group(&state.db, group_id).await?;
    require_member(&group, user.user_id)?;

    update_and_notify_group(&state.db, &state.notifier, group_id, move |group| {
        group.activities.retain(|a| a.activity_id != activity_id);
        Ok(())
    })
    .await?;
    Ok(Json(()))
}

// -- availability --------------------------------------------------------

#[derive(Deserialize)]
struct PatchAvailabilityRequest {
    date: String,
    start: String,
    end: String,
}

async fn create_availability(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(group_id): Path<GroupId>,
    Json(request): Json<PatchAvailabilityRequest>,
) -> Result<Json<()>, ApiError> {
    let group = load_group(&state.db, group_id).await?;
    require_member(&group, user.user_id)?;

    check_date(&request.date)?;
    check_clock(&request.start)?;
    check_clock(&request.end)?;

    let user_id = user.user_id;
    update_and_notify_group(&state.db, &state.notifier, group_id, move |group| {
        group.availabilities.push(Availability {
            availability_id: generate_id(),
            user_id,
            date: request.date.clone(),
            start: request.start.clone(),
            end: request.end.clone(),
        });
        Ok(())
    })
    .await?;
    Ok(Json(()))
}

async fn delete_availability(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path((group_id, availability_id)): Path<(GroupId, u64)>,
) -> Result<Json<()>, ApiError> {
    let group = load_group(&state.db, group_id).await?;
    require_member(&group, user.user_id)?;

    let Some(availability) = group.availability(availability_id) else {
        return Err(ApiError::NotFound("no such availability"));
    };
    // Only the member who stated an availability may retract it.
    if availability.user_id != user.user_id {
        return Err(ApiError::Unauthorized("not your availability"));
    }

    let user_id = user.user_id;
    update_and_notify_group(&state.db, &state.notifier, group_id, move |group| {
        group
            .availabilities
            .retain(|a| !(a.availability_id == availability_id && a.user_id == user_id));
        Ok(())
    })
    .await?;
    Ok(Json(()))
}

// -- task ----------------------------------------------------------------

#[derive(Deserialize)]
struct PatchTaskRequest {
    #[serde(default)]
    title: String,
    assignee: Option<UserId>,
    completed: Option<bool>,
}

async fn create_task(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(group_id): Path<GroupId>,
    Json(request): Json<PatchTaskRequest>,
) -> Result<Json<()>, ApiError> {
    let group = load_group(&state.db, group_id).await?;
    require_member(&group, user.user_id)?;

    check_len(&request.title, TASK_TITLE_MIN_LEN, TASK_TITLE_MAX_LEN)?;
    if let Some(assignee) = request.assignee {
        require_member(&group, assignee)
            .map_err(|_| ApiError::BadRequest("assignee is not a member".into()))?;
    }

    let user_id = user.user_id;
    update_and_notify_group(&state.db, &state.notifier, group_id, move |group| {
        if group.tasks.len() >= GROUP_MAX_TASKS {
            return Err(StoreError::Rejected("too many tasks".into()));
        }
        let assignee = match request.assignee {
            // Re-check against current state: the assignee may have left
            // since the pre-check.
            Some(assignee) if group.is_member(assignee) => assignee,
            Some(_) => return Err(StoreError::Rejected("assignee is not a member".into())),
            None => user_id,
        };
        group.tasks.push(Task {
            task_id: generate_id(),
            title: request.title.clone(),
            assignee,
            completed: request.completed.unwrap_or(false),
        });
        Ok(())
    })
    .await?;
    Ok(Json(()))
}

async fn patch_task(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path((group_id, task_id)): Path<(GroupId, u64)>,
    Json(request): Json<PatchTaskRequest>,
) -> Result<Json<()>, ApiError> {
    let group = load_group(&state.db, group_id).await?;
    require_member(&group, user.user_id)?;
    if group.task(task_id).is_none() {
        return Err(ApiError::NotFound("no such task"));
    }

    check_len(&request.title, 0, TASK_TITLE_MAX_LEN)?;

    update_and_notify_group(&state.db, &state.notifier, group_id, move |group| {
        // Re-check against current state: the assignee may have left
        // since the pre-check.
        if let Some(assignee) = request.assignee {
            if !group.is_member(assignee) {
                return Err(StoreError::Rejected("assignee is not a member".into()));
            }
        }
        let Some(task) = group.tasks.iter_mut().find(|t| t.task_id == task_id) else {
            // Deleted concurrently; nothing left to edit.
            return Ok(());
        };
        if !request.title.is_empty() {
            task.title = request.title.clone();
        }
        if let Some(assignee) = request.assignee {
            task.assignee = assignee;
        }
        if let Some(completed) = request.completed {
            task.completed = completed;
        }
        Ok(())
    })
    .await?;
    Ok(Json(()))
}

async fn delete_task(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path((group_id, task_id)): Path<(GroupId, u64)>,
) -> Result<Json<()>, ApiError> {
    let group = load_group(&state.db, group_id).await?;
    require_member(&group, user.user_id)?;

    update_and_notify_group(&state.db, &state.notifier, group_id, move |group| {
        group.tasks.retain(|t| t.task_id != task_id);
        Ok(())
    })
    .await?;
    Ok(Json(()))
}

// -- chat ----------------------------------------------------------------

#[derive(Deserialize)]
struct ChatQuery {
    start: Option<String>,
    end: Option<String>,
}

#[derive(Serialize)]
struct ChatResponse {
    messages: Vec<ChatMessageResponse>,
    /// Whether strictly more messages exist beyond this page.
    #[serde(rename = "continue")]
    has_more: bool,
}

#[derive(Serialize)]
struct ChatMessageResponse {
    sender: UserId,
    timestamp: u64,
    content: String,
}

#[derive(Deserialize)]
struct PatchChatRequest {
    content: String,
}

async fn get_chat(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(group_id): Path<GroupId>,
    Query(query): Query<ChatQuery>,
) -> Result<Json<ChatResponse>, ApiError> {
    let group = load_group(&state.db, group_id).await?;
    require_member(&group, user.user_id)?;

    let start = query
        .start
        .as_deref()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(0);
    let end = query
        .end
        .as_deref()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(u64::MAX);

    let (messages, has_more) = state.db.read_messages(group_id, start, end).await?;
    Ok(Json(ChatResponse {
        messages: messages
            .into_iter()
            .map(|m| ChatMessageResponse {
                sender: m.sender,
                timestamp: m.timestamp,
                content: m.content,
            })
            .collect(),
        has_more,
    }))
}

async fn post_chat(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(group_id): Path<GroupId>,
    Json(request): Json<PatchChatRequest>,
) -> Result<Json<()>, ApiError> {
    let group = load_group(&state.db, group_id).await?;
    require_member(&group, user.user_id)?;

    check_len(&request.content, CHAT_MESSAGE_MIN_LEN, CHAT_MESSAGE_MAX_LEN)?;

    let message = state
        .db
        .create_message(&Message {
            group_id,
            timestamp: unix_millis(),
            sender: user.user_id,
            content: request.content,
        })
        .await?;

    // Live connections get the raw message; the push channel gets display
    // names so a notification can render offline.
    let received = serde_json::to_value(MessageReceived {
        message: MessageReceivedBody {
            group_id,
            timestamp: message.timestamp,
            sender: message.sender,
            content: message.content.clone(),
        },
    })
    .expect("plain struct serializes");
    notify_group(&state.db, &state.notifier, &group, Some(received)).await;

    let pushed = serde_json::to_value(MessagePushed {
        message: MessagePushedBody {
            group: group.name.clone(),
            timestamp: message.timestamp,
            sender: user.name.clone(),
            content: message.content.clone(),
        },
    })
    .expect("plain struct serializes");
    state.push.push_group(&group, &pushed).await;

    Ok(Json(()))
}
