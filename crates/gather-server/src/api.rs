use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, Method};
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use gather_shared::constants::{NAME_MAX_LEN, NAME_MIN_LEN, STATUS_MAX_LEN};
use gather_shared::validate::check_len;
use gather_shared::{generate_id, GroupId, PushSubscription, User, UserId};
use gather_store::Database;

use crate::auth;
use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::groups;
use crate::notify::{self, LocalNotifier, Notifier};
use crate::push::PushFanout;
use crate::registry::ConnectionRegistry;
use crate::scheduler::Scheduler;
use crate::ws;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    /// Delivery channel for notification fan-out.
    pub notifier: Arc<dyn Notifier>,
    /// Live socket registry backing `/ws` in the single-process
    /// deployment.
    pub sockets: Arc<LocalNotifier>,
    pub registry: ConnectionRegistry,
    pub push: Arc<PushFanout>,
    pub scheduler: Arc<dyn Scheduler>,
    pub config: Arc<ServerConfig>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    Router::new()
        .route("/api/user", get(get_user).patch(patch_user))
        .route("/api/user/:user_id", get(get_user_profile))
        .route("/api/push", get(get_push).put(put_push).delete(delete_push))
        .route("/ws", get(ws::websocket))
        .merge(groups::router(state.clone()))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "HTTP API listening");
    axum::serve(listener, router).await?;
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UserResponse {
    user_id: UserId,
    name: String,
    status: String,
    groups: Vec<GroupId>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.user_id,
            name: user.name.clone(),
            status: user.status.clone(),
            groups: user.groups.clone(),
        }
    }
}

#[derive(Deserialize)]
struct PatchUserRequest {
    #[serde(default)]
    name: String,
    #[serde(default)]
    status: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PushKeyResponse {
    vapid_public_key: String,
}

#[derive(Deserialize)]
struct DeletePushRequest {
    endpoint: String,
}

/// First unauthenticated visit creates a user and issues the cookie;
/// later visits just return the caller's record.
async fn get_user(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    if let Some(user) = auth::check_cookie(&state.db, &headers).await? {
        return Ok(Json(UserResponse::from(&user)).into_response());
    }

    let user = User::new(generate_id());
    state.db.create_user(&user).await?;
    info!(user = user.user_id, "created user");

    let cookie = auth::session_cookie(user.user_id);
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(UserResponse::from(&user)),
    )
        .into_response())
}

async fn patch_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<PatchUserRequest>,
) -> Result<Json<()>, ApiError> {
    let user = auth::check_cookie(&state.db, &headers)
        .await?
        .ok_or(ApiError::Unauthorized("missing cookie or unknown user"))?;

    if !request.name.is_empty() {
        check_len(&request.name, NAME_MIN_LEN, NAME_MAX_LEN)?;
    }
    check_len(&request.status, 0, STATUS_MAX_LEN)?;

    notify::update_user_and_notify_groups(&state.db, &state.notifier, user.user_id, move |user| {
        if !request.name.is_empty() {
            user.name = request.name.clone();
        }
        if !request.status.is_empty() {
            user.status = request.status.clone();
        }
        Ok(())
    })
    .await?;

    Ok(Json(()))
}

async fn get_user_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<UserId>,
) -> Result<Json<UserResponse>, ApiError> {
    auth::check_cookie(&state.db, &headers)
        .await?
        .ok_or(ApiError::Unauthorized("missing cookie or unknown user"))?;

    let user = state
        .db
        .read_user(user_id)
        .await?
        .ok_or(ApiError::NotFound("no such user"))?;
    Ok(Json(UserResponse::from(&user)))
}

/// Public key clients subscribe against; generated lazily on first use.
async fn get_push(State(state): State<AppState>) -> Result<Json<PushKeyResponse>, ApiError> {
    Ok(Json(PushKeyResponse {
        vapid_public_key: state.push.public_key().await?,
    }))
}

async fn put_push(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(subscription): Json<PushSubscription>,
) -> Result<Json<()>, ApiError> {
    let user = auth::check_cookie(&state.db, &headers)
        .await?
        .ok_or(ApiError::Unauthorized("missing cookie or unknown user"))?;
    if subscription.endpoint.is_empty() {
        return Err(ApiError::BadRequest("missing endpoint".into()));
    }

    state
        .db
        .update_user(user.user_id, move |user| {
            // Re-subscribing replaces any previous subscription for the
            // same endpoint.
            user.push_subscriptions
                .retain(|s| s.endpoint != subscription.endpoint);
            user.push_subscriptions.push(subscription.clone());
            Ok(())
        })
        .await?;
    Ok(Json(()))
}

async fn delete_push(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<DeletePushRequest>,
) -> Result<Json<()>, ApiError> {
    let user = auth::check_cookie(&state.db, &headers)
        .await?
        .ok_or(ApiError::Unauthorized("missing cookie or unknown user"))?;

    state
        .db
        .update_user(user.user_id, move |user| {
            user.push_subscriptions
                .retain(|s| s.endpoint != request.endpoint);
            Ok(())
        })
        .await?;
    Ok(Json(()))
}
