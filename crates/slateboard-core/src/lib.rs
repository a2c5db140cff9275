//! Slateboard Core Library
//!
//! Board state, history and selection logic for the Slateboard
//! collaborative whiteboard. Rendering, transport and persistence live
//! elsewhere; this crate is the platform-agnostic document model.

pub mod align;
pub mod board;
pub mod geometry;
pub mod history;
pub mod items;
pub mod selection;

pub use align::{AlignMode, Axis, can_align, can_distribute};
pub use board::{Board, DeletedIds, Page};
pub use history::{History, HistoryEntry};
pub use items::{BoardItem, ItemId, ItemMove, ItemPatch, PageId, SerializableColor};
pub use selection::{HandleKind, Selection, SelectionMode};
