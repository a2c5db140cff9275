//! Presence store: who is here and where their cursors are.
//!
//! Fed by [`crate::wire::ServerMessage`]s from the presence client.
//! Own-user frames are ignored, cursor updates with a timestamp older
//! than the stored one are rejected, and cursors idle for more than
//! five seconds are swept out.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::wire::{Role, ServerMessage};

/// Cursors idle longer than this are dropped by the sweep.
pub const STALE_CURSOR_AFTER: Duration = Duration::from_secs(5);

/// A user currently in the session.
#[derive(Debug, Clone, PartialEq)]
pub struct PresentUser {
    pub user_id: String,
    pub display_name: String,
    pub color: String,
    pub role: Option<Role>,
}

/// A remote user's cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteCursor {
    pub user_id: String,
    pub display_name: String,
    pub color: String,
    pub x: f64,
    pub y: f64,
    pub page_id: String,
    pub tool: String,
    /// Wire timestamp of the newest applied update.
    pub ts: u64,
    /// Local arrival time, used by the stale sweep.
    pub last_update: Instant,
}

/// Session-level state broadcast by the teacher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionFlags {
    pub drawing_locked: bool,
    pub kicked: bool,
    pub ended: bool,
}

/// The store.
#[derive(Debug)]
pub struct PresenceStore {
    own_user_id: String,
    users: HashMap<String, PresentUser>,
    cursors: HashMap<String, RemoteCursor>,
    session: SessionFlags,
    /// Page the teacher is presenting, from the last `session.page`.
    active_page: Option<usize>,
    /// When follow mode is on, page broadcasts update this target.
    follow_teacher: bool,
    followed_page: Option<usize>,
    last_error: Option<String>,
}

impl PresenceStore {
    pub fn new(own_user_id: impl Into<String>) -> Self {
        Self {
            own_user_id: own_user_id.into(),
            users: HashMap::new(),
            cursors: HashMap::new(),
            session: SessionFlags::default(),
            active_page: None,
            follow_teacher: false,
            followed_page: None,
            last_error: None,
        }
    }

    // ── Queries ─────────────────────────────────────────────────────

    pub fn users(&self) -> impl Iterator<Item = &PresentUser> {
        self.users.values()
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn cursor(&self, user_id: &str) -> Option<&RemoteCursor> {
        self.cursors.get(user_id)
    }

    pub fn cursors(&self) -> impl Iterator<Item = &RemoteCursor> {
        self.cursors.values()
    }

    pub fn session(&self) -> SessionFlags {
        self.session
    }

    pub fn active_page(&self) -> Option<usize> {
        self.active_page
    }

    pub fn followed_page(&self) -> Option<usize> {
        self.followed_page
    }

    pub fn is_following(&self) -> bool {
        self.follow_teacher
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    // ── Follow mode ─────────────────────────────────────────────────

    pub fn set_follow(&mut self, follow: bool) {
        self.follow_teacher = follow;
        if follow {
            self.followed_page = self.active_page;
        } else {
            self.followed_page = None;
        }
    }

    /// The user navigated on their own; following breaks.
    pub fn note_local_navigation(&mut self) {
        if self.follow_teacher {
            debug!("local navigation breaks follow mode");
            self.follow_teacher = false;
            self.followed_page = None;
        }
    }

    // ── Ingest ──────────────────────────────────────────────────────

    /// Apply one inbound message. `now` is the local receive time.
    pub fn apply(&mut self, msg: &ServerMessage, now: Instant) {
        match msg {
            ServerMessage::PresenceJoin {
                user_id,
                display_name,
                color,
                role,
                ..
            } => {
                if *user_id == self.own_user_id {
                    return;
                }
                self.users.insert(
                    user_id.clone(),
                    PresentUser {
                        user_id: user_id.clone(),
                        display_name: display_name.clone(),
                        color: color.clone(),
                        role: Some(*role),
                    },
                );
            }
            ServerMessage::PresenceLeave { user_id, .. } => {
                self.users.remove(user_id);
                self.cursors.remove(user_id);
            }
            ServerMessage::CursorUpdate {
                user_id,
                display_name,
                color,
                x,
                y,
                page_id,
                tool,
                ts,
            } => {
                if *user_id == self.own_user_id {
                    return;
                }
                if let Some(existing) = self.cursors.get(user_id) {
                    if *ts < existing.ts {
                        debug!("stale cursor for {user_id} ({ts} < {})", existing.ts);
                        return;
                    }
                }
                self.cursors.insert(
                    user_id.clone(),
                    RemoteCursor {
                        user_id: user_id.clone(),
                        display_name: display_name.clone(),
                        color: color.clone(),
                        x: *x,
                        y: *y,
                        page_id: page_id.clone(),
                        tool: tool.clone(),
                        ts: *ts,
                        last_update: now,
                    },
                );
                // A cursor implies presence even if the join got lost.
                self.users.entry(user_id.clone()).or_insert_with(|| PresentUser {
                    user_id: user_id.clone(),
                    display_name: display_name.clone(),
                    color: color.clone(),
                    role: None,
                });
            }
            ServerMessage::SessionLock { locked, locked_by } => {
                info!(
                    "drawing {} by {:?}",
                    if *locked { "locked" } else { "unlocked" },
                    locked_by
                );
                self.session.drawing_locked = *locked;
            }
            ServerMessage::SessionPage { page_index } => {
                self.active_page = Some(*page_index);
                if self.follow_teacher {
                    self.followed_page = Some(*page_index);
                }
            }
            ServerMessage::SessionKick { user_id } => {
                if *user_id == self.own_user_id {
                    warn!("kicked from session");
                    self.session.kicked = true;
                } else {
                    self.users.remove(user_id);
                    self.cursors.remove(user_id);
                }
            }
            ServerMessage::SessionEnd { .. } => {
                info!("session ended");
                self.session.ended = true;
            }
            ServerMessage::Ack { ok, target } => {
                if !*ok {
                    debug!("nack for {target}");
                }
            }
            ServerMessage::Error { code, message, .. } => {
                warn!("server error {code:?}: {message:?}");
                self.last_error = Some(
                    message
                        .clone()
                        .unwrap_or_else(|| format!("{code:?}")),
                );
            }
        }
    }

    /// Drop cursors that have not moved for [`STALE_CURSOR_AFTER`].
    /// Intended to be pumped every couple of seconds.
    pub fn sweep_stale(&mut self, now: Instant) -> usize {
        let before = self.cursors.len();
        self.cursors
            .retain(|_, c| now.duration_since(c.last_update) <= STALE_CURSOR_AFTER);
        before - self.cursors.len()
    }

    /// Reset presence on disconnect; session flags survive.
    pub fn clear_presence(&mut self) {
        self.users.clear();
        self.cursors.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn join(user_id: &str, role: Role) -> ServerMessage {
        ServerMessage::PresenceJoin {
            user_id: user_id.into(),
            display_name: user_id.to_uppercase(),
            color: "#123456".into(),
            role,
            ts: 1,
        }
    }

    fn cursor(user_id: &str, x: f64, ts: u64) -> ServerMessage {
        ServerMessage::CursorUpdate {
            user_id: user_id.into(),
            display_name: user_id.to_uppercase(),
            color: "#123456".into(),
            x,
            y: 0.0,
            page_id: "p1".into(),
            tool: "pen".into(),
            ts,
        }
    }

    #[test]
    fn test_own_frames_ignored() {
        let mut store = PresenceStore::new("me");
        let now = Instant::now();
        store.apply(&join("me", Role::Student), now);
        store.apply(&cursor("me", 1.0, 1), now);
        assert_eq!(store.user_count(), 0);
        assert!(store.cursor("me").is_none());
    }

    #[test]
    fn test_join_then_leave() {
        let mut store = PresenceStore::new("me");
        let now = Instant::now();
        store.apply(&join("u1", Role::Student), now);
        store.apply(&cursor("u1", 5.0, 1), now);
        assert_eq!(store.user_count(), 1);

        store.apply(
            &ServerMessage::PresenceLeave {
                user_id: "u1".into(),
                ts: 2,
            },
            now,
        );
        assert_eq!(store.user_count(), 0);
        assert!(store.cursor("u1").is_none());
    }

    #[test]
    fn test_stale_cursor_timestamp_rejected() {
        let mut store = PresenceStore::new("me");
        let now = Instant::now();
        store.apply(&cursor("u1", 10.0, 100), now);
        store.apply(&cursor("u1", 99.0, 50), now);
        assert_eq!(store.cursor("u1").unwrap().x, 10.0);

        store.apply(&cursor("u1", 20.0, 101), now);
        assert_eq!(store.cursor("u1").unwrap().x, 20.0);
    }

    #[test]
    fn test_cursor_implies_presence() {
        let mut store = PresenceStore::new("me");
        store.apply(&cursor("ghost", 1.0, 1), Instant::now());
        assert_eq!(store.user_count(), 1);
        assert!(store.users().next().unwrap().role.is_none());
    }

    #[test]
    fn test_sweep_removes_idle_cursors() {
        let mut store = PresenceStore::new("me");
        let start = Instant::now();
        store.apply(&cursor("u1", 1.0, 1), start);
        store.apply(&cursor("u2", 1.0, 1), start + Duration::from_secs(4));

        let swept = store.sweep_stale(start + Duration::from_secs(6));
        assert_eq!(swept, 1);
        assert!(store.cursor("u1").is_none());
        assert!(store.cursor("u2").is_some());
    }

    #[test]
    fn test_follow_mode_tracks_page_broadcasts() {
        let mut store = PresenceStore::new("me");
        let now = Instant::now();
        store.apply(&ServerMessage::SessionPage { page_index: 2 }, now);
        assert_eq!(store.active_page(), Some(2));
        assert_eq!(store.followed_page(), None);

        store.set_follow(true);
        assert_eq!(store.followed_page(), Some(2));

        store.apply(&ServerMessage::SessionPage { page_index: 5 }, now);
        assert_eq!(store.followed_page(), Some(5));

        store.note_local_navigation();
        assert!(!store.is_following());
        store.apply(&ServerMessage::SessionPage { page_index: 7 }, now);
        assert_eq!(store.followed_page(), None);
        assert_eq!(store.active_page(), Some(7));
    }

    #[test]
    fn test_kick_only_flags_own_user() {
        let mut store = PresenceStore::new("me");
        let now = Instant::now();
        store.apply(&join("u1", Role::Student), now);

        store.apply(&ServerMessage::SessionKick { user_id: "u1".into() }, now);
        assert!(!store.session().kicked);
        assert_eq!(store.user_count(), 0);

        store.apply(&ServerMessage::SessionKick { user_id: "me".into() }, now);
        assert!(store.session().kicked);
    }

    #[test]
    fn test_lock_and_end_flags() {
        let mut store = PresenceStore::new("me");
        let now = Instant::now();
        store.apply(
            &ServerMessage::SessionLock {
                locked: true,
                locked_by: Some("teacher".into()),
            },
            now,
        );
        assert!(store.session().drawing_locked);

        store.apply(
            &ServerMessage::SessionEnd {
                session_id: "s1".into(),
            },
            now,
        );
        assert!(store.session().ended);
    }

    #[test]
    fn test_error_recorded_not_thrown() {
        let mut store = PresenceStore::new("me");
        store.apply(
            &ServerMessage::Error {
                code: crate::wire::ErrorCode::RateLimited,
                message: Some("slow down".into()),
                retry_after_seconds: Some(2),
            },
            Instant::now(),
        );
        assert_eq!(store.last_error(), Some("slow down"));
    }
}
