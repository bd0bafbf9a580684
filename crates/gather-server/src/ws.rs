//! WebSocket endpoint: the live half of the connection registry.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{info, warn};

use gather_shared::UserId;

use crate::api::AppState;
use crate::auth;
use crate::error::ApiError;

pub async fn websocket(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
    headers: HeaderMap,
) -> Response {
    let user = match auth::check_cookie(&state.db, &headers).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            return ApiError::Unauthorized("missing cookie or unknown user").into_response()
        }
        Err(e) => return e.into_response(),
    };
    ws.on_upgrade(move |socket| handle_socket(state, socket, user.user_id))
}

async fn handle_socket(state: AppState, socket: WebSocket, user_id: UserId) {
    let connection_id = match state.registry.open(user_id).await {
        Ok(id) => id,
        Err(e) => {
            warn!(user = user_id, error = %e, "could not register connection");
            return;
        }
    };
    info!(connection = %connection_id, user = user_id, "websocket connected");

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    state.sockets.register(connection_id.clone(), tx).await;

    let (mut sink, mut stream) = socket.split();

    let mut writer = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    // Drain inbound frames until the client goes away; the protocol is
    // push-only, so inbound text is ignored.
    loop {
        tokio::select! {
            frame = stream.next() => match frame {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            _ = &mut writer => break,
        }
    }

    writer.abort();
    state.sockets.unregister(&connection_id).await;
    if let Err(e) = state.registry.close(&connection_id).await {
        warn!(connection = %connection_id, error = %e, "connection close cleanup failed");
    }
    info!(connection = %connection_id, user = user_id, "websocket disconnected");
}
