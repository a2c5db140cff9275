//! Wire protocol for the presence channel.
//!
//! JSON messages tagged by a dotted `type` field, camelCase payload
//! keys. Parsing is defensive: malformed inbound text is dropped, the
//! connection never errors because of one bad frame.

use log::debug;
use serde::{Deserialize, Serialize};

/// Role carried in presence messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Teacher,
    Student,
    Observer,
}

/// Client → server messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    #[serde(rename = "presence.join")]
    PresenceJoin {
        user_id: String,
        display_name: String,
        color: String,
        role: Role,
        ts: u64,
    },
    #[serde(rename = "presence.leave")]
    PresenceLeave { user_id: String, ts: u64 },
    #[serde(rename = "presence.heartbeat")]
    PresenceHeartbeat { user_id: String, ts: u64 },
    #[serde(rename = "cursor.update")]
    CursorUpdate {
        user_id: String,
        display_name: String,
        color: String,
        x: f64,
        y: f64,
        page_id: String,
        tool: String,
        ts: u64,
    },
    #[serde(rename = "session.lock")]
    SessionLock {
        locked: bool,
        locked_by: Option<String>,
    },
    #[serde(rename = "session.page")]
    SessionPage { page_index: usize },
    #[serde(rename = "session.kick")]
    SessionKick { user_id: String },
    #[serde(rename = "session.end")]
    SessionEnd { session_id: String },
}

/// Error codes the server attaches to `error` frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    PayloadTooLarge,
    RateLimited,
    InvalidMessage,
    Unauthorized,
    Forbidden,
}

/// Server → client messages. Presence and session frames are relayed
/// peer messages; `ack` and `error` come from the server itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    #[serde(rename = "presence.join")]
    PresenceJoin {
        user_id: String,
        display_name: String,
        color: String,
        role: Role,
        ts: u64,
    },
    #[serde(rename = "presence.leave")]
    PresenceLeave { user_id: String, ts: u64 },
    #[serde(rename = "cursor.update")]
    CursorUpdate {
        user_id: String,
        display_name: String,
        color: String,
        x: f64,
        y: f64,
        page_id: String,
        tool: String,
        ts: u64,
    },
    #[serde(rename = "session.lock")]
    SessionLock {
        locked: bool,
        locked_by: Option<String>,
    },
    #[serde(rename = "session.page")]
    SessionPage { page_index: usize },
    #[serde(rename = "session.kick")]
    SessionKick { user_id: String },
    #[serde(rename = "session.end")]
    SessionEnd { session_id: String },
    #[serde(rename = "ack")]
    Ack {
        ok: bool,
        #[serde(rename = "for")]
        target: String,
    },
    #[serde(rename = "error")]
    Error {
        code: ErrorCode,
        message: Option<String>,
        retry_after_seconds: Option<u64>,
    },
}

/// Parse an inbound frame. Malformed JSON or unknown shapes yield
/// `None` and are otherwise ignored.
pub fn parse_server_message(raw: &str) -> Option<ServerMessage> {
    match serde_json::from_str(raw) {
        Ok(msg) => Some(msg),
        Err(err) => {
            debug!("dropping malformed frame: {err}");
            None
        }
    }
}

// Close codes used by the presence endpoint.
pub const CLOSE_NORMAL: u16 = 1000;
pub const CLOSE_SERVER_ERROR: u16 = 1011;
pub const CLOSE_BAD_REQUEST: u16 = 4400;
pub const CLOSE_AUTH_EXPIRED: u16 = 4401;
pub const CLOSE_FORBIDDEN: u16 = 4403;
pub const CLOSE_RATE_LIMITED: u16 = 4429;

/// What a close code means for the reconnect loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseDisposition {
    /// Stay down; reconnecting would be wrong or pointless.
    Terminal,
    /// Transient; reconnect with backoff.
    Retry,
    /// The token aged out mid-session. The server accepts a fresh
    /// handshake, so warn and retry anyway.
    RenewAndRetry,
}

pub fn close_disposition(code: u16) -> CloseDisposition {
    match code {
        CLOSE_NORMAL | CLOSE_FORBIDDEN => CloseDisposition::Terminal,
        CLOSE_AUTH_EXPIRED => CloseDisposition::RenewAndRetry,
        // A bad-request close covers a single rejected frame, not a
        // broken session; the next handshake can still succeed.
        CLOSE_BAD_REQUEST | CLOSE_RATE_LIMITED | CLOSE_SERVER_ERROR => CloseDisposition::Retry,
        _ => CloseDisposition::Retry,
    }
}
