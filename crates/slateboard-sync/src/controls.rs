//! Teacher-side session controls.
//!
//! Every control persists first, then broadcasts. A persistence
//! failure is recorded on the controls and reported to the caller as
//! `false`; it never aborts the session.

use log::{info, warn};
use thiserror::Error;

use crate::wire::ClientMessage;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("persistence rejected the change: {0}")]
    Rejected(String),
    #[error("persistence unavailable: {0}")]
    Unavailable(String),
}

/// Backing store for session state. Implementations talk to whatever
/// holds the canonical session record.
pub trait SessionPersistence {
    fn lock_session(&mut self, session_id: &str, locked: bool) -> Result<(), PersistenceError>;
    fn kick_student(&mut self, session_id: &str, user_id: &str) -> Result<(), PersistenceError>;
    fn end_session(&mut self, session_id: &str) -> Result<(), PersistenceError>;
}

/// Session controls available to the teacher role.
///
/// Outbound messages accumulate in an internal buffer; the owner
/// drains them with [`SessionControls::take_outgoing`] and hands them
/// to the presence client.
#[derive(Debug)]
pub struct SessionControls {
    session_id: String,
    teacher_id: String,
    locked: bool,
    active_page: usize,
    ended: bool,
    last_error: Option<String>,
    outgoing: Vec<ClientMessage>,
}

impl SessionControls {
    pub fn new(session_id: impl Into<String>, teacher_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            teacher_id: teacher_id.into(),
            locked: false,
            active_page: 0,
            ended: false,
            last_error: None,
            outgoing: Vec::new(),
        }
    }

    /// Seed state from a session record loaded elsewhere.
    pub fn set_initial_state(&mut self, locked: bool, active_page: usize) {
        self.locked = locked;
        self.active_page = active_page;
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn active_page(&self) -> usize {
        self.active_page
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Drain messages queued for the wire.
    pub fn take_outgoing(&mut self) -> Vec<ClientMessage> {
        std::mem::take(&mut self.outgoing)
    }

    /// Lock or unlock drawing for students. Returns whether the change
    /// took effect.
    pub fn lock_drawing<P: SessionPersistence>(&mut self, persistence: &mut P, locked: bool) -> bool {
        if self.ended {
            return false;
        }
        if let Err(err) = persistence.lock_session(&self.session_id, locked) {
            warn!("lock_session failed: {err}");
            self.last_error = Some(err.to_string());
            return false;
        }
        self.locked = locked;
        self.last_error = None;
        info!("drawing {}", if locked { "locked" } else { "unlocked" });
        self.outgoing.push(ClientMessage::SessionLock {
            locked,
            locked_by: Some(self.teacher_id.clone()),
        });
        true
    }

    /// Remove a student from the session.
    pub fn kick_student<P: SessionPersistence>(&mut self, persistence: &mut P, user_id: &str) -> bool {
        if self.ended || user_id == self.teacher_id {
            return false;
        }
        if let Err(err) = persistence.kick_student(&self.session_id, user_id) {
            warn!("kick_student failed: {err}");
            self.last_error = Some(err.to_string());
            return false;
        }
        self.last_error = None;
        info!("kicked {user_id}");
        self.outgoing.push(ClientMessage::SessionKick {
            user_id: user_id.to_string(),
        });
        true
    }

    /// End the session for everyone. Idempotent.
    pub fn end_session<P: SessionPersistence>(&mut self, persistence: &mut P) -> bool {
        if self.ended {
            return true;
        }
        if let Err(err) = persistence.end_session(&self.session_id) {
            warn!("end_session failed: {err}");
            self.last_error = Some(err.to_string());
            return false;
        }
        self.ended = true;
        self.last_error = None;
        info!("session {} ended", self.session_id);
        self.outgoing.push(ClientMessage::SessionEnd {
            session_id: self.session_id.clone(),
        });
        true
    }

    /// Broadcast the page the teacher is presenting. Pure broadcast,
    /// nothing to persist.
    pub fn set_active_page(&mut self, page_index: usize) {
        if self.ended {
            return;
        }
        self.active_page = page_index;
        self.outgoing
            .push(ClientMessage::SessionPage { page_index });
    }
}
