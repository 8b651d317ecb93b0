//! WebSocket protocol types for the dashboard refresh channel.
//!
//! Messages are JSON-encoded and use a `type` field for discrimination.
//!
//! ## Client → Server Messages ([`ClientMessage`])
//! - `ping`: Keepalive ping
//!
//! ## Server → Client Messages ([`ServerMessage`])
//! - `reload`: The issue log changed; re-fetch and recompute
//! - `pong`: Keepalive response
//!
//! `reload` carries no data. Clients always re-read the full record set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Messages sent from browser clients to the server.
///
/// ```json
/// {"type": "ping"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Ping,
}

/// Messages sent from the server to browser clients.
///
/// ```json
/// {"type": "reload", "timestamp": "2026-01-31T22:00:00Z"}
/// {"type": "pong"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The backing store changed.
    Reload {
        /// When the server noticed the change
        timestamp: DateTime<Utc>,
    },
    Pong,
}

impl ServerMessage {
    /// A reload stamped with the current time.
    pub fn reload_now() -> Self {
        ServerMessage::Reload {
            timestamp: Utc::now(),
        }
    }

    /// Encode for the wire.
    pub fn to_json(&self) -> String {
        // Serializing a plain enum of strings and timestamps cannot fail.
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"type":"reload"}"#.to_string())
    }
}
