//! Presence client: WebSocket transport for the presence channel.
//!
//! The socket lives on a background thread; commands go in and events
//! come out over channels, and the owning thread drains them with
//! [`PresenceClient::poll_events`]. Reconnection runs inside the
//! thread with doubling backoff; an abort flag shared with the caller
//! is checked before every backoff sleep.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use log::{debug, info, warn};
use thiserror::Error;

use crate::wire::{
    ClientMessage, CloseDisposition, Role, ServerMessage, close_disposition,
    parse_server_message,
};

/// Default heartbeat cadence.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Minimum spacing between outbound cursor updates. Excess updates are
/// dropped, never queued.
pub const CURSOR_INTERVAL: Duration = Duration::from_millis(50);

/// Outbound payload ceiling in bytes.
pub const MAX_PAYLOAD_BYTES: usize = 2048;

/// Reconnect backoff bounds.
pub const BACKOFF_BASE: Duration = Duration::from_secs(1);
pub const BACKOFF_MAX: Duration = Duration::from_secs(15);

/// Give up after this many consecutive failed attempts.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 10;

#[derive(Debug, Error)]
pub enum PresenceError {
    #[error("invalid websocket url: {0}")]
    InvalidUrl(String),
    #[error("not connected")]
    NotConnected,
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Connection lifecycle as seen by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Events surfaced by [`PresenceClient::poll_events`].
#[derive(Debug, Clone)]
pub enum PresenceEvent {
    StateChanged(ConnectionState),
    Message(ServerMessage),
    /// The server closed the connection with this code.
    Closed { code: u16 },
    Error(String),
}

/// Identity and endpoint configuration.
#[derive(Debug, Clone)]
pub struct PresenceConfig {
    /// e.g. `ws://host`; the session path is appended.
    pub ws_base_url: String,
    pub class_id: String,
    pub session_id: String,
    /// Bearer token, carried in the websocket subprotocol.
    pub token: String,
    pub user_id: String,
    pub display_name: String,
    pub color: String,
    pub role: Role,
    pub heartbeat_interval: Duration,
    pub cursor_interval: Duration,
    pub max_payload_bytes: usize,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    pub max_reconnect_attempts: u32,
}

impl PresenceConfig {
    pub fn new(
        ws_base_url: impl Into<String>,
        class_id: impl Into<String>,
        session_id: impl Into<String>,
        token: impl Into<String>,
        user_id: impl Into<String>,
        role: Role,
    ) -> Self {
        Self {
            ws_base_url: ws_base_url.into(),
            class_id: class_id.into(),
            session_id: session_id.into(),
            token: token.into(),
            user_id: user_id.into(),
            display_name: String::new(),
            color: "#4a90d9".to_string(),
            role,
            heartbeat_interval: HEARTBEAT_INTERVAL,
            cursor_interval: CURSOR_INTERVAL,
            max_payload_bytes: MAX_PAYLOAD_BYTES,
            backoff_base: BACKOFF_BASE,
            backoff_max: BACKOFF_MAX,
            max_reconnect_attempts: MAX_RECONNECT_ATTEMPTS,
        }
    }

    fn url(&self) -> String {
        format!(
            "{}/classroom/{}/session/{}",
            self.ws_base_url.trim_end_matches('/'),
            self.class_id,
            self.session_id
        )
    }
}

/// Milliseconds since the epoch, for wire timestamps.
pub fn now_ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Raw backoff for the nth attempt (1-based): doubling from `base`,
/// capped at `max`.
pub fn backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    let exp = attempt.saturating_sub(1).min(31);
    let delay = base.saturating_mul(1u32 << exp);
    delay.min(max)
}

/// Apply ±20% jitter. `seed` only needs to vary between calls.
pub fn jittered(delay: Duration, seed: u64) -> Duration {
    let mut x = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    x ^= x >> 30;
    x = x.wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x ^= x >> 27;
    // Map to [-0.2, 0.2].
    let unit = (x >> 11) as f64 / (1u64 << 53) as f64;
    let factor = 1.0 + (unit * 2.0 - 1.0) * 0.2;
    Duration::from_secs_f64((delay.as_secs_f64() * factor).max(0.0))
}

/// Gate applied to outbound traffic: cursor throttling and the payload
/// byte ceiling. Kept separate from the socket so callers (and tests)
/// can reason about drop behavior without a connection.
#[derive(Debug)]
pub struct OutboundGate {
    cursor_interval: Duration,
    max_payload_bytes: usize,
    last_cursor: Option<Instant>,
    pub dropped_cursors: u64,
    pub dropped_oversize: u64,
}

impl OutboundGate {
    pub fn new(cursor_interval: Duration, max_payload_bytes: usize) -> Self {
        Self {
            cursor_interval,
            max_payload_bytes,
            last_cursor: None,
            dropped_cursors: 0,
            dropped_oversize: 0,
        }
    }

    /// Whether a cursor update may go out now. Denials are drops.
    pub fn admit_cursor(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_cursor {
            if now.duration_since(last) < self.cursor_interval {
                self.dropped_cursors += 1;
                return false;
            }
        }
        self.last_cursor = Some(now);
        true
    }

    /// Whether a serialized frame fits the payload ceiling.
    pub fn admit_payload(&mut self, raw: &str) -> bool {
        if raw.len() > self.max_payload_bytes {
            self.dropped_oversize += 1;
            warn!("payload of {} bytes over ceiling, dropping", raw.len());
            return false;
        }
        true
    }
}

enum WsCommand {
    Send(String),
    Close,
}

/// Frames still queued at shutdown. `disconnect()` enqueues the
/// `presence.leave` right before the close, so these must reach the
/// wire before the socket goes down.
fn drain_pending_sends(cmd_rx: &Receiver<WsCommand>) -> Vec<String> {
    let mut frames = Vec::new();
    while let Ok(cmd) = cmd_rx.try_recv() {
        if let WsCommand::Send(raw) = cmd {
            frames.push(raw);
        }
    }
    frames
}

/// The presence client. Dropping it raises the abort flag, which the
/// socket thread observes within one poll interval.
pub struct PresenceClient {
    config: PresenceConfig,
    state: ConnectionState,
    gate: OutboundGate,
    abort: Arc<AtomicBool>,
    cmd_tx: Option<Sender<WsCommand>>,
    event_rx: Option<Receiver<PresenceEvent>>,
    last_error: Option<String>,
}

impl PresenceClient {
    pub fn new(config: PresenceConfig) -> Self {
        let gate = OutboundGate::new(config.cursor_interval, config.max_payload_bytes);
        Self {
            config,
            state: ConnectionState::Disconnected,
            gate,
            abort: Arc::new(AtomicBool::new(false)),
            cmd_tx: None,
            event_rx: None,
            last_error: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn gate(&self) -> &OutboundGate {
        &self.gate
    }

    /// Start the socket thread. A second call while a thread is live
    /// is a no-op.
    pub fn connect(&mut self) -> Result<(), PresenceError> {
        if self.cmd_tx.is_some() {
            return Ok(());
        }
        url::Url::parse(&self.config.url())
            .map_err(|e| PresenceError::InvalidUrl(e.to_string()))?;

        self.abort.store(false, Ordering::SeqCst);
        let (cmd_tx, cmd_rx) = channel::<WsCommand>();
        let (event_tx, event_rx) = channel::<PresenceEvent>();
        let config = self.config.clone();
        let abort = self.abort.clone();

        thread::spawn(move || socket_thread(config, abort, cmd_rx, event_tx));

        self.cmd_tx = Some(cmd_tx);
        self.event_rx = Some(event_rx);
        self.state = ConnectionState::Connecting;
        Ok(())
    }

    /// Stop reconnection, say goodbye and close.
    pub fn disconnect(&mut self) {
        self.abort.store(true, Ordering::SeqCst);
        if let Some(tx) = self.cmd_tx.take() {
            let leave = ClientMessage::PresenceLeave {
                user_id: self.config.user_id.clone(),
                ts: now_ts(),
            };
            if let Ok(raw) = serde_json::to_string(&leave) {
                let _ = tx.send(WsCommand::Send(raw));
            }
            let _ = tx.send(WsCommand::Close);
        }
        self.event_rx = None;
        self.state = ConnectionState::Disconnected;
    }

    /// Send a message, subject to the payload ceiling.
    pub fn send(&mut self, msg: &ClientMessage) -> Result<(), PresenceError> {
        let Some(tx) = &self.cmd_tx else {
            return Err(PresenceError::NotConnected);
        };
        let raw = serde_json::to_string(msg)?;
        if !self.gate.admit_payload(&raw) {
            return Ok(()); // dropped by policy, not an error
        }
        tx.send(WsCommand::Send(raw))
            .map_err(|_| PresenceError::NotConnected)
    }

    /// Send a cursor position, throttled to one per interval. Surplus
    /// calls are silently dropped.
    pub fn send_cursor(&mut self, x: f64, y: f64, page_id: &str, tool: &str) -> bool {
        if !self.gate.admit_cursor(Instant::now()) {
            return false;
        }
        let msg = ClientMessage::CursorUpdate {
            user_id: self.config.user_id.clone(),
            display_name: self.config.display_name.clone(),
            color: self.config.color.clone(),
            // 1 decimal is plenty for cursor display.
            x: (x * 10.0).round() / 10.0,
            y: (y * 10.0).round() / 10.0,
            page_id: page_id.to_string(),
            tool: tool.to_string(),
            ts: now_ts(),
        };
        self.send(&msg).is_ok()
    }

    /// Drain pending events, tracking connection state along the way.
    pub fn poll_events(&mut self) -> Vec<PresenceEvent> {
        let Some(rx) = &self.event_rx else {
            return Vec::new();
        };
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            match &event {
                PresenceEvent::StateChanged(state) => self.state = *state,
                PresenceEvent::Closed { .. } => {
                    self.state = ConnectionState::Disconnected;
                    self.cmd_tx = None;
                }
                PresenceEvent::Error(e) => self.last_error = Some(e.clone()),
                PresenceEvent::Message(_) => {}
            }
            events.push(event);
        }
        events
    }
}

impl Drop for PresenceClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}

// ── Socket thread ───────────────────────────────────────────────────

fn socket_thread(
    config: PresenceConfig,
    abort: Arc<AtomicBool>,
    cmd_rx: Receiver<WsCommand>,
    event_tx: Sender<PresenceEvent>,
) {
    use tungstenite::client::IntoClientRequest;
    use tungstenite::http::HeaderValue;
    use tungstenite::stream::MaybeTlsStream;
    use tungstenite::{Message, connect};

    let url = config.url();
    let mut attempt: u32 = 0;

    'reconnect: loop {
        if abort.load(Ordering::SeqCst) {
            break;
        }
        let state = if attempt == 0 {
            ConnectionState::Connecting
        } else {
            ConnectionState::Reconnecting
        };
        let _ = event_tx.send(PresenceEvent::StateChanged(state));

        let mut request = match url.as_str().into_client_request() {
            Ok(r) => r,
            Err(e) => {
                let _ = event_tx.send(PresenceEvent::Error(format!("bad request: {e}")));
                break;
            }
        };
        // Contract: Sec-WebSocket-Protocol: access_token, <token>
        match HeaderValue::from_str(&format!("access_token, {}", config.token)) {
            Ok(value) => {
                request
                    .headers_mut()
                    .insert("Sec-WebSocket-Protocol", value);
            }
            Err(e) => {
                let _ = event_tx.send(PresenceEvent::Error(format!("bad token: {e}")));
                break;
            }
        }

        match connect(request) {
            Ok((mut socket, _response)) => {
                attempt = 0;
                info!("presence connected to {url}");
                let _ = event_tx.send(PresenceEvent::StateChanged(ConnectionState::Connected));

                // Poll with a short read timeout so commands and
                // heartbeats interleave with reads.
                if let MaybeTlsStream::Plain(stream) = socket.get_mut() {
                    let _ = stream.set_read_timeout(Some(Duration::from_millis(50)));
                }

                let join = ClientMessage::PresenceJoin {
                    user_id: config.user_id.clone(),
                    display_name: config.display_name.clone(),
                    color: config.color.clone(),
                    role: config.role,
                    ts: now_ts(),
                };
                if let Ok(raw) = serde_json::to_string(&join) {
                    let _ = socket.send(Message::Text(raw));
                }
                let mut last_heartbeat = Instant::now();

                loop {
                    if abort.load(Ordering::SeqCst) {
                        for raw in drain_pending_sends(&cmd_rx) {
                            let _ = socket.send(Message::Text(raw));
                        }
                        let _ = socket.close(None);
                        let _ = event_tx.send(PresenceEvent::StateChanged(
                            ConnectionState::Disconnected,
                        ));
                        break 'reconnect;
                    }

                    while let Ok(cmd) = cmd_rx.try_recv() {
                        match cmd {
                            WsCommand::Send(raw) => {
                                if let Err(e) = socket.send(Message::Text(raw)) {
                                    debug!("send failed: {e}");
                                }
                            }
                            WsCommand::Close => {
                                let _ = socket.close(None);
                                let _ = event_tx.send(PresenceEvent::StateChanged(
                                    ConnectionState::Disconnected,
                                ));
                                break 'reconnect;
                            }
                        }
                    }

                    if last_heartbeat.elapsed() >= config.heartbeat_interval {
                        last_heartbeat = Instant::now();
                        let beat = ClientMessage::PresenceHeartbeat {
                            user_id: config.user_id.clone(),
                            ts: now_ts(),
                        };
                        if let Ok(raw) = serde_json::to_string(&beat) {
                            let _ = socket.send(Message::Text(raw));
                        }
                    }

                    match socket.read() {
                        Ok(Message::Text(text)) => {
                            if let Some(msg) = parse_server_message(&text) {
                                let _ = event_tx.send(PresenceEvent::Message(msg));
                            }
                        }
                        Ok(Message::Close(frame)) => {
                            let code = frame.map(|f| u16::from(f.code)).unwrap_or(1005);
                            let _ = event_tx.send(PresenceEvent::Closed { code });
                            match close_disposition(code) {
                                CloseDisposition::Terminal => {
                                    info!("closed with terminal code {code}, staying down");
                                    let _ = event_tx.send(PresenceEvent::StateChanged(
                                        ConnectionState::Disconnected,
                                    ));
                                    break 'reconnect;
                                }
                                CloseDisposition::RenewAndRetry => {
                                    warn!("auth expired (code {code}); token needs renewal");
                                    break;
                                }
                                CloseDisposition::Retry => break,
                            }
                        }
                        Ok(_) => {}
                        Err(tungstenite::Error::Io(e))
                            if e.kind() == std::io::ErrorKind::WouldBlock
                                || e.kind() == std::io::ErrorKind::TimedOut => {}
                        Err(e) => {
                            debug!("read error: {e}");
                            let _ = event_tx.send(PresenceEvent::Error(e.to_string()));
                            break;
                        }
                    }
                }
            }
            Err(e) => {
                let _ = event_tx.send(PresenceEvent::Error(format!("connect failed: {e}")));
            }
        }

        attempt += 1;
        if attempt > config.max_reconnect_attempts {
            warn!("giving up after {} reconnect attempts", attempt - 1);
            let _ = event_tx.send(PresenceEvent::StateChanged(ConnectionState::Disconnected));
            break;
        }

        let delay = jittered(
            backoff_delay(attempt, config.backoff_base, config.backoff_max),
            now_ts().wrapping_add(attempt as u64),
        );
        info!("reconnecting in {delay:?} (attempt {attempt})");

        // Sleep in slices so an abort cuts the wait short.
        let wake = Instant::now() + delay;
        loop {
            if abort.load(Ordering::SeqCst) {
                break 'reconnect;
            }
            let remaining = wake.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            thread::sleep(Duration::from_millis(50).min(remaining));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let base = Duration::from_secs(1);
        let max = Duration::from_secs(15);
        assert_eq!(backoff_delay(1, base, max), Duration::from_secs(1));
        assert_eq!(backoff_delay(2, base, max), Duration::from_secs(2));
        assert_eq!(backoff_delay(3, base, max), Duration::from_secs(4));
        assert_eq!(backoff_delay(4, base, max), Duration::from_secs(8));
        assert_eq!(backoff_delay(5, base, max), Duration::from_secs(15));
        assert_eq!(backoff_delay(12, base, max), Duration::from_secs(15));
    }

    #[test]
    fn test_jitter_stays_within_20_percent() {
        let delay = Duration::from_secs(10);
        for seed in 0..200 {
            let j = jittered(delay, seed);
            assert!(j >= Duration::from_secs(8), "jitter too low: {j:?}");
            assert!(j <= Duration::from_secs(12), "jitter too high: {j:?}");
        }
    }

    #[test]
    fn test_cursor_gate_drops_excess() {
        let mut gate = OutboundGate::new(Duration::from_millis(50), MAX_PAYLOAD_BYTES);
        let start = Instant::now();
        let mut admitted = 0;
        // Ten updates inside one throttle window: at most one goes out.
        for i in 0..10 {
            if gate.admit_cursor(start + Duration::from_millis(i * 4)) {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 1);
        assert_eq!(gate.dropped_cursors, 9);

        // After the window, the next one is admitted again.
        assert!(gate.admit_cursor(start + Duration::from_millis(60)));
    }

    #[test]
    fn test_payload_ceiling() {
        let mut gate = OutboundGate::new(CURSOR_INTERVAL, 64);
        assert!(gate.admit_payload("small"));
        let big = "x".repeat(65);
        assert!(!gate.admit_payload(&big));
        assert_eq!(gate.dropped_oversize, 1);
    }

    #[test]
    fn test_send_requires_connection() {
        let mut client = PresenceClient::new(PresenceConfig::new(
            "ws://localhost:9",
            "c1",
            "s1",
            "tok",
            "u1",
            Role::Student,
        ));
        let msg = ClientMessage::PresenceHeartbeat {
            user_id: "u1".into(),
            ts: 0,
        };
        assert!(matches!(
            client.send(&msg),
            Err(PresenceError::NotConnected)
        ));
    }

    #[test]
    fn test_disconnect_goodbye_survives_shutdown_drain() {
        let mut client = PresenceClient::new(PresenceConfig::new(
            "ws://localhost:9",
            "c1",
            "s1",
            "tok",
            "u1",
            Role::Student,
        ));
        let (tx, rx) = channel::<WsCommand>();
        client.cmd_tx = Some(tx);

        // disconnect() raises the abort flag first; the shutdown drain
        // must still deliver the queued leave frame.
        client.disconnect();
        assert!(client.abort.load(Ordering::SeqCst));

        let frames = drain_pending_sends(&rx);
        assert_eq!(frames.len(), 1);
        assert!(frames[0].contains(r#""type":"presence.leave""#));
        assert!(frames[0].contains(r#""userId":"u1""#));
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        let mut client = PresenceClient::new(PresenceConfig::new(
            "ws://localhost:9",
            "c1",
            "s1",
            "tok",
            "u1",
            Role::Teacher,
        ));
        client.disconnect();
        client.disconnect();
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_url_composition() {
        let config = PresenceConfig::new("ws://host:8000/", "c1", "s1", "t", "u", Role::Student);
        assert_eq!(config.url(), "ws://host:8000/classroom/c1/session/s1");
    }
}
