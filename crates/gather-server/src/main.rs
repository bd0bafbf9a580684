//! # gather-server
//!
//! Coordination server for shared group state.
//!
//! This binary provides:
//! - **REST API** (axum) over users, groups, polls, activities,
//!   availabilities, tasks and chat
//! - **Optimistic-concurrency storage**: every mutation is a versioned
//!   read-transform-write against a keyed store with conditional writes
//! - **Live notification fan-out** over WebSockets to every connection of
//!   every member of an affected group
//! - **Web push** delivery to subscribed, offline clients (VAPID-signed)
//! - **Deferred activations** (activity reminders, membership
//!   reconciliation) via an in-process scheduler

mod api;
mod auth;
mod config;
mod error;
mod groups;
mod notify;
mod push;
mod registry;
mod scheduler;
mod ws;

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use gather_store::Database;

use crate::api::AppState;
use crate::config::ServerConfig;
use crate::notify::{LocalNotifier, Notifier};
use crate::push::{PushFanout, WebPushSender};
use crate::registry::ConnectionRegistry;
use crate::scheduler::{InProcessScheduler, Pipeline};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,gather_server=debug")),
        )
        .init();

    info!("Starting Gather server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------

    // Volatile store for the single-process deployment. A managed keyed
    // store drops in behind `Database::new` without touching anything
    // above it.
    let db = Database::in_memory();

    // Live socket registry; doubles as the notification delivery channel.
    let sockets = Arc::new(LocalNotifier::new());
    let notifier: Arc<dyn Notifier> = sockets.clone();

    let registry = ConnectionRegistry::new(db.clone());

    let push = Arc::new(PushFanout::new(
        db.clone(),
        Arc::new(WebPushSender::new(config.push_contact.clone())),
    ));

    // Scheduled triggers re-enter the same update/notify pipeline the
    // REST handlers use.
    let pipeline = Pipeline {
        db: db.clone(),
        notifier: notifier.clone(),
        push: push.clone(),
    };
    let scheduler = Arc::new(InProcessScheduler::new(pipeline));

    let app_state = AppState {
        db,
        notifier,
        sockets,
        registry,
        push,
        scheduler: scheduler.clone(),
        config: Arc::new(config.clone()),
    };

    // -----------------------------------------------------------------------
    // 4. Run the HTTP server (blocks until shutdown)
    // -----------------------------------------------------------------------
    // tokio::select! ensures that if either the HTTP server or a shutdown
    // signal arrives, we exit cleanly.
    tokio::select! {
        result = api::serve(app_state, config.http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                scheduler.shutdown();
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    // Cancel pending timers without firing them.
    scheduler.shutdown();

    Ok(())
}
