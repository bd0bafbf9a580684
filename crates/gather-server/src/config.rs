//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// Contact URL or `mailto:` address presented to push services in the
    /// VAPID `sub` claim.
    /// Env: `PUSH_CONTACT`
    /// Default: `https://gather.example.org`
    pub push_contact: String,

    /// How long after a join/leave the membership reconciliation trigger
    /// fires, in seconds.
    /// Env: `MEMBERSHIP_SWEEP_DELAY_SECS`
    /// Default: `30`
    pub membership_sweep_delay_secs: u64,

    /// How many minutes before its start an activity reminder is
    /// delivered.
    /// Env: `REMINDER_LEAD_MINUTES`
    /// Default: `30`
    pub reminder_lead_minutes: i64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], 8080).into(),
            push_contact: "https://gather.example.org".to_string(),
            membership_sweep_delay_secs: 30,
            reminder_lead_minutes: 30,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default");
            }
        }

        if let Ok(contact) = std::env::var("PUSH_CONTACT") {
            if !contact.is_empty() {
                config.push_contact = contact;
            }
        }

        if let Ok(val) = std::env::var("MEMBERSHIP_SWEEP_DELAY_SECS") {
            if let Ok(n) = val.parse::<u64>() {
                config.membership_sweep_delay_secs = n;
            }
        }

        if let Ok(val) = std::env::var("REMINDER_LEAD_MINUTES") {
            if let Ok(n) = val.parse::<i64>() {
                config.reminder_lead_minutes = n;
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}
