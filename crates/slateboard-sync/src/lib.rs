//! Realtime layer for slateboard: presence, cursors, session
//! controls, and the prioritized event queue feeding them.

pub mod controls;
pub mod presence;
pub mod queue;
pub mod roster;
pub mod wire;

pub use controls::{PersistenceError, SessionControls, SessionPersistence};
pub use presence::{
    ConnectionState, OutboundGate, PresenceClient, PresenceConfig, PresenceError, PresenceEvent,
};
pub use queue::{EventPriority, EventQueue, HandlerId, QueueConfig, QueueStats, QueuedEvent};
pub use roster::{PresenceStore, PresentUser, RemoteCursor, SessionFlags};
pub use wire::{ClientMessage, CloseDisposition, ErrorCode, Role, ServerMessage};
